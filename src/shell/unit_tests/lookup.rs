use std::{ffi::OsStr, path::Path};

use crate::shell::{
    error::ProcessError,
    lookup::{check_dir, find_program},
};

#[test]
#[cfg(unix)]
fn finds_bare_name_in_search_path() {
    let found = find_program("sh", Some(OsStr::new("/nonexistent-dir:/bin:/usr/bin"))).unwrap();
    assert!(found.ends_with("sh"));
    assert!(found.is_absolute());
}

#[test]
#[cfg(unix)]
fn accepts_absolute_path() {
    let found = find_program("/bin/sh", None).unwrap();
    assert_eq!(found, Path::new("/bin/sh"));
}

#[test]
fn rejects_unknown_program() {
    let err = find_program("cae0e988-f55b-4803-a471-a877b686d1a8", Some(OsStr::new("/bin"))).unwrap_err();
    assert!(matches!(err, ProcessError::NotFound { .. }));
    assert_eq!(
        err.to_string(),
        "exec: \"cae0e988-f55b-4803-a471-a877b686d1a8\": executable file not found in $PATH"
    );
}

#[test]
fn rejects_empty_program() {
    assert!(matches!(
        find_program("", Some(OsStr::new("/bin"))),
        Err(ProcessError::NotFound { .. })
    ));
}

#[test]
#[cfg(unix)]
fn rejects_bare_name_without_search_path() {
    assert!(matches!(
        find_program("sh", None),
        Err(ProcessError::NotFound { .. })
    ));
}

#[test]
#[cfg(unix)]
fn rejects_non_executable_file() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap();

    assert!(matches!(
        find_program(path, None),
        Err(ProcessError::NotFound { .. })
    ));
}

#[test]
fn check_dir_accepts_directory() {
    let dir = tempfile::tempdir().unwrap();
    assert!(check_dir(dir.path()).is_ok());
}

#[test]
fn check_dir_rejects_missing_directory() {
    let err = check_dir(Path::new("cae0e988-f55b-4803-a471-a877b686d1a8")).unwrap_err();
    assert!(err.is_preparation());
    assert!(
        err.to_string()
            .starts_with("chdir cae0e988-f55b-4803-a471-a877b686d1a8: ")
    );
}

#[test]
fn check_dir_rejects_file() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let err = check_dir(file.path()).unwrap_err();
    assert!(matches!(err, ProcessError::Chdir { .. }));
}
