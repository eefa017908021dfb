use std::{
    ffi::OsStr,
    fs, io,
    path::{Path, PathBuf},
};

use crate::shell::error::ProcessError;

/// Resolves `program` the way a shell would before creating the process.
///
/// A name containing a path separator is checked as given. A bare name is
/// searched in each entry of `search_paths` (a `PATH`-style list); empty
/// entries are skipped rather than meaning the current directory.
pub fn find_program(program: &str, search_paths: Option<&OsStr>) -> Result<PathBuf, ProcessError> {
    let not_found = || ProcessError::NotFound {
        program: program.to_string(),
    };

    let path = Path::new(program);
    if program.is_empty() {
        return Err(not_found());
    }

    if path.components().count() > 1 || path.is_absolute() {
        return if is_executable(path) {
            Ok(path.to_path_buf())
        } else {
            Err(not_found())
        };
    }

    let search_paths = search_paths.ok_or_else(not_found)?;
    std::env::split_paths(search_paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(path))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(not_found)
}

/// Checks that `dir` can be used as a working directory.
pub fn check_dir(dir: &Path) -> Result<(), ProcessError> {
    let chdir_error = |source| ProcessError::Chdir {
        dir: dir.to_path_buf(),
        source,
    };

    let metadata = fs::metadata(dir).map_err(chdir_error)?;
    if !metadata.is_dir() {
        return Err(chdir_error(io::Error::new(
            io::ErrorKind::NotADirectory,
            "not a directory",
        )));
    }
    Ok(())
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}
