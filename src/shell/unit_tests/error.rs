use std::io;

use crate::shell::{
    command::Command,
    error::{ExecutionError, ProcessError},
};

#[cfg(unix)]
fn exit_failure(code: i32) -> crate::shell::error::ExitFailure {
    use std::os::unix::process::ExitStatusExt;
    crate::shell::error::ExitFailure::new(std::process::ExitStatus::from_raw(code << 8))
}

#[test]
#[cfg(unix)]
fn exit_failure_display() {
    assert_eq!(exit_failure(1).to_string(), "exit status 1");
    assert_eq!(exit_failure(1).code(), Some(1));
}

#[test]
#[cfg(unix)]
fn signal_failure_display() {
    use std::os::unix::process::ExitStatusExt;

    let failure = crate::shell::error::ExitFailure::new(std::process::ExitStatus::from_raw(9));
    assert_eq!(failure.to_string(), "signal: SIGKILL");
    assert_eq!(failure.code(), None);
    assert_eq!(ProcessError::Exit(failure).exit_code(), -1);
}

#[test]
#[cfg(unix)]
fn exit_failure_is_the_source_of_exit_error() {
    let err = ProcessError::Exit(exit_failure(5));
    assert_eq!(err.to_string(), "exit status 5");

    let source = std::error::Error::source(&err).unwrap();
    let failure = source.downcast_ref::<crate::shell::error::ExitFailure>().unwrap();
    assert_eq!(failure.code(), Some(5));
}

#[test]
fn unsupported_names_the_operation() {
    let err = ProcessError::Unsupported { operation: "wait" };
    assert_eq!(err.to_string(), "wait: not supported by this executor");
    assert!(!err.is_preparation());
    assert_eq!(err.exit_code(), -1);
}

#[test]
fn preparation_errors_have_no_exit_code() {
    let not_found = ProcessError::NotFound {
        program: "x".to_string(),
    };
    assert!(not_found.is_preparation());
    assert_eq!(not_found.exit_code(), -1);

    let custom = ProcessError::Custom("test error".to_string());
    assert!(!custom.is_preparation());
    assert_eq!(custom.exit_code(), -1);
}

#[test]
fn execution_error_copies_command_configuration() {
    let cmd = Command::new("cat")
        .arg("missing")
        .dir("/tmp")
        .env("K", "V");
    let err = ExecutionError::new(&cmd, ProcessError::Custom("test error".to_string()), true);

    // Later changes to the command do not leak into the error.
    let _cmd = cmd.arg("more").env("K2", "V2");

    assert_eq!(err.command(), "cat");
    assert_eq!(err.params(), ["missing"]);
    assert_eq!(err.dir().unwrap().to_str(), Some("/tmp"));
    assert_eq!(err.env().len(), 1);
    assert_eq!(err.exit_code(), -1);
    assert_eq!(err.captured_stderr(), None);
    assert!(err.exit_status().is_none());
    assert_eq!(err.to_string(), "execution error: test error");
}

#[test]
#[cfg(unix)]
fn execution_error_keeps_stderr_only_when_asked() {
    let cmd = Command::new("cat");
    let cause = || ProcessError::Exit(exit_failure(2).with_stderr(b"boom\n".to_vec()));

    let kept = ExecutionError::new(&cmd, cause(), true);
    assert_eq!(kept.exit_code(), 2);
    assert_eq!(kept.captured_stderr(), Some("boom\n"));
    assert_eq!(kept.exit_status().and_then(|s| s.code()), Some(2));

    let dropped = ExecutionError::new(&cmd, cause(), false);
    assert_eq!(dropped.captured_stderr(), None);
    assert_eq!(dropped.to_string(), "execution error: exit status 2");
}

#[test]
fn execution_error_exposes_source() {
    let cmd = Command::new("cat");
    let err = ExecutionError::new(
        &cmd,
        ProcessError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed")),
        false,
    );

    let source = std::error::Error::source(&err).unwrap();
    assert_eq!(source.to_string(), "pipe closed");
    assert!(matches!(err.cause(), ProcessError::Io(_)));
}

#[test]
fn report_snapshots_context() {
    let cmd = Command::new("env").env("K", "V");
    let err = ExecutionError::new(&cmd, ProcessError::Custom("test error".to_string()), false);

    let report = err.report();
    assert_eq!(report.command, "env");
    assert!(report.params.is_empty());
    assert_eq!(report.dir, None);
    assert_eq!(report.env.get("K").map(String::as_str), Some("V"));
    assert_eq!(report.exit_code, -1);
    assert_eq!(report.cause, "test error");
}

#[test]
#[cfg(feature = "serde")]
fn report_serializes() {
    let cmd = Command::new("cat").arg("x");
    let err = ExecutionError::new(&cmd, ProcessError::Custom("test error".to_string()), false);

    let report = err.report();
    let json = serde_json::to_string(&report).unwrap();
    let back: crate::shell::error::ExecutionReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
    assert!(json.contains("\"exit_code\":-1"));
}

#[test]
fn from_panic_recovers_error() {
    let cmd = Command::new("cat");
    let payload: Box<dyn std::any::Any + Send> = Box::new(ExecutionError::new(
        &cmd,
        ProcessError::Custom("test error".to_string()),
        false,
    ));

    let err = ExecutionError::from_panic(payload.as_ref()).unwrap();
    assert_eq!(err.command(), "cat");
    assert!(ExecutionError::from_panic(&"plain panic").is_none());
}
