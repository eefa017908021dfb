use crate::shell::banner::{ICON_RUNNER, format_banner, secondary};

#[test]
fn banner_dims_arguments() {
    let args = vec!["-b".to_string(), "file.txt".to_string()];
    assert_eq!(
        format_banner("cat", &args),
        format!("{} cat \x1b[2m-b file.txt\x1b[0m", ICON_RUNNER)
    );
}

#[test]
fn banner_without_arguments_keeps_empty_style() {
    assert_eq!(
        format_banner("cat", &[]),
        format!("{} cat \x1b[2m\x1b[0m", ICON_RUNNER)
    );
}

#[test]
fn secondary_wraps_text() {
    assert_eq!(secondary("x"), "\x1b[2mx\x1b[0m");
}
