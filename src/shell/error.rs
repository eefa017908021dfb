use std::{
    any::Any,
    collections::HashMap,
    fmt, io,
    path::{Path, PathBuf},
    process::ExitStatus,
};

use thiserror::Error;

use crate::shell::command::Command;

/// Exit code reported when no OS exit status is available.
pub const NO_EXIT_CODE: i32 = -1;

/// A child process that ran but did not exit successfully.
///
/// Displays like `exit status 1`, or `signal: SIGKILL` when the child was
/// terminated by a signal. Carries whatever stderr the executor captured.
#[derive(Debug)]
pub struct ExitFailure {
    status: ExitStatus,
    stderr: Vec<u8>,
}

impl ExitFailure {
    pub fn new(status: ExitStatus) -> Self {
        Self {
            status,
            stderr: Vec::new(),
        }
    }

    pub fn with_stderr(mut self, stderr: Vec<u8>) -> Self {
        self.stderr = stderr;
        self
    }

    pub fn status(&self) -> ExitStatus {
        self.status
    }

    /// OS exit code, `None` if the process was terminated by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }
}

impl fmt::Display for ExitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.status.code() {
            return write!(f, "exit status {}", code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;

            if let Some(signal) = self.status.signal() {
                return match nix::sys::signal::Signal::try_from(signal) {
                    Ok(signal) => write!(f, "signal: {}", signal.as_str()),
                    Err(_) => write!(f, "signal: {}", signal),
                };
            }
        }

        write!(f, "{}", self.status)
    }
}

impl std::error::Error for ExitFailure {}

/// Low-level cause of a failed execution, as reported by an executor or by
/// the preparation stage.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The program could not be resolved on the search path.
    #[error("exec: \"{program}\": executable file not found in $PATH")]
    NotFound { program: String },

    /// The working directory does not exist or is not a directory.
    #[error("chdir {}: {}", .dir.display(), .source)]
    Chdir { dir: PathBuf, source: io::Error },

    /// The OS refused to create the process.
    #[error("fork/exec {program}: {source}")]
    Spawn { program: String, source: io::Error },

    /// The process ran and exited non-zero or was killed by a signal.
    ///
    /// The [`ExitFailure`] is the error's source, so it can be found by
    /// walking the chain of an [`ExecutionError`].
    #[error("{0}")]
    Exit(#[from] ExitFailure),

    /// Reading or writing one of the child's pipes failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The executor does not implement this operation.
    #[error("{operation}: not supported by this executor")]
    Unsupported { operation: &'static str },

    /// Arbitrary failure reported by an alternate executor.
    #[error("{0}")]
    Custom(String),
}

impl ProcessError {
    /// True when the failure happened before any child process existed.
    pub fn is_preparation(&self) -> bool {
        matches!(self, ProcessError::NotFound { .. } | ProcessError::Chdir { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            ProcessError::Exit(failure) => failure.code().unwrap_or(NO_EXIT_CODE),
            _ => NO_EXIT_CODE,
        }
    }
}

/// Failure of one execution of a [`Command`].
///
/// The command configuration is copied when the error is built, so changing
/// the command afterwards never alters a reported error.
///
/// # Examples
///
/// ```rust,no_run
/// use tcrm_shell::shell::command::Command;
///
/// # async fn demo() {
/// let err = Command::new("cat").arg("missing.txt").run().await.unwrap_err();
/// assert_eq!(err.to_string(), "execution error: exit status 1");
/// assert_eq!(err.params(), ["missing.txt"]);
/// assert_eq!(err.exit_code(), 1);
/// # }
/// ```
#[derive(Error, Debug)]
#[error("execution error: {cause}")]
pub struct ExecutionError {
    command: String,
    params: Vec<String>,
    dir: Option<PathBuf>,
    env: HashMap<String, String>,
    exit_code: i32,
    captured_stderr: Option<String>,
    #[source]
    cause: ProcessError,
}

impl ExecutionError {
    /// Builds the error from the command that failed.
    ///
    /// Stderr attached to an [`ExitFailure`] is only kept when
    /// `keep_stderr` is set; otherwise it is dropped with the cause.
    pub(crate) fn new(command: &Command, cause: ProcessError, keep_stderr: bool) -> Self {
        let captured_stderr = match &cause {
            ProcessError::Exit(failure) if keep_stderr && !failure.stderr().is_empty() => {
                Some(String::from_utf8_lossy(failure.stderr()).into_owned())
            }
            _ => None,
        };

        Self {
            command: command.get_program().to_string(),
            params: command.get_args().to_vec(),
            dir: command.get_dir().map(Path::to_path_buf),
            env: command.get_env().clone(),
            exit_code: cause.exit_code(),
            captured_stderr,
            cause,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// OS exit code, or `-1` when the process never started or was killed
    /// by a signal.
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn captured_stderr(&self) -> Option<&str> {
        self.captured_stderr.as_deref()
    }

    pub fn cause(&self) -> &ProcessError {
        &self.cause
    }

    /// The underlying exit status when the process ran to completion.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        match &self.cause {
            ProcessError::Exit(failure) => Some(failure.status()),
            _ => None,
        }
    }

    pub fn is_preparation_failure(&self) -> bool {
        self.cause.is_preparation()
    }

    /// Owned snapshot for top-level handlers that log or serialize failures.
    pub fn report(&self) -> ExecutionReport {
        ExecutionReport {
            command: self.command.clone(),
            params: self.params.clone(),
            dir: self.dir.as_ref().map(|d| d.display().to_string()),
            env: self.env.clone(),
            exit_code: self.exit_code,
            captured_stderr: self.captured_stderr.clone(),
            cause: self.cause.to_string(),
        }
    }

    /// Recovers the error from the payload of a panic raised by one of the
    /// `must_` execution modes.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Option<&ExecutionError> {
        payload.downcast_ref::<ExecutionError>()
    }
}

/// Serializable view of an [`ExecutionError`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub command: String,
    pub params: Vec<String>,
    pub dir: Option<String>,
    pub env: HashMap<String, String>,
    pub exit_code: i32,
    pub captured_stderr: Option<String>,
    pub cause: String,
}
