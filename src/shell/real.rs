use std::io;
#[cfg(unix)]
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tokio::{io::AsyncWriteExt, process::Child, task::JoinHandle};

use crate::shell::{
    environ::split_environ_entry,
    error::{ExitFailure, ProcessError},
    executor::{Executor, ProcessHandle, ProcessSpec, Stream},
};

/// Executor backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealExecutor;

impl Executor for RealExecutor {
    fn run(&self, spec: ProcessSpec) -> BoxFuture<'_, Result<(), ProcessError>> {
        Box::pin(async move {
            let handle = self.start(spec).await?;
            self.wait(handle).await
        })
    }

    fn start(&self, spec: ProcessSpec) -> BoxFuture<'_, Result<ProcessHandle, ProcessError>> {
        Box::pin(async move {
            spawn(&spec).map(|(child, stdin_pump)| ProcessHandle::from_child(child, stdin_pump))
        })
    }

    fn wait(&self, handle: ProcessHandle) -> BoxFuture<'_, Result<(), ProcessError>> {
        Box::pin(async move {
            let (child, stdin_pump) = handle.into_parts();
            let Some(mut child) = child else {
                return Ok(());
            };

            let status = child.wait().await?;

            #[cfg(feature = "tracing")]
            tracing::debug!(exit_code = ?status.code(), "Child process exited");

            let pumped = join_stdin_pump(stdin_pump).await;
            if !status.success() {
                return Err(ExitFailure::new(status).into());
            }
            pumped
        })
    }

    fn output(&self, mut spec: ProcessSpec) -> BoxFuture<'_, Result<Vec<u8>, ProcessError>> {
        Box::pin(async move {
            spec.stdout = Stream::Piped;
            let (child, stdin_pump) = spawn(&spec)?;

            // Drains stdout and a piped stderr concurrently.
            let output = child.wait_with_output().await?;

            #[cfg(feature = "tracing")]
            tracing::debug!(exit_code = ?output.status.code(), "Child process exited");

            let pumped = join_stdin_pump(stdin_pump).await;
            if !output.status.success() {
                return Err(ExitFailure::new(output.status)
                    .with_stderr(output.stderr)
                    .into());
            }
            pumped.map(|_| output.stdout)
        })
    }

    fn exec(&self, spec: ProcessSpec) -> Result<(), ProcessError> {
        #[cfg(unix)]
        {
            use std::{ffi::CString, os::unix::ffi::OsStrExt};

            let to_cstring = |bytes: &[u8]| {
                CString::new(bytes)
                    .map_err(|e| ProcessError::Io(io::Error::new(io::ErrorKind::InvalidInput, e)))
            };

            let path = to_cstring(spec.program.as_os_str().as_bytes())?;
            let argv = spec
                .argv()
                .iter()
                .map(|arg| to_cstring(arg.as_bytes()))
                .collect::<Result<Vec<_>, _>>()?;
            let envv = spec
                .env
                .iter()
                .map(|entry| to_cstring(entry.as_os_str().as_bytes()))
                .collect::<Result<Vec<_>, _>>()?;

            // Undone when execve fails and the guard drops.
            let _cwd = match &spec.dir {
                Some(dir) => Some(CwdGuard::enter(dir)?),
                None => None,
            };

            #[cfg(feature = "tracing")]
            tracing::debug!(program = %spec.program.display(), "Replacing process image");

            match nix::unistd::execve(&path, &argv, &envv) {
                Ok(never) => match never {},
                Err(errno) => Err(ProcessError::Io(io::Error::from(errno))),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = spec;
            Err(ProcessError::Unsupported { operation: "exec" })
        }
    }
}

/// Switches the working directory of the current process and switches it
/// back when dropped.
#[cfg(unix)]
struct CwdGuard {
    original: PathBuf,
}

#[cfg(unix)]
impl CwdGuard {
    fn enter(dir: &Path) -> Result<Self, ProcessError> {
        let original = std::env::current_dir()?;
        std::env::set_current_dir(dir).map_err(|source| ProcessError::Chdir {
            dir: dir.to_path_buf(),
            source,
        })?;
        Ok(Self { original })
    }
}

#[cfg(unix)]
impl Drop for CwdGuard {
    fn drop(&mut self) {
        if let Err(_e) = std::env::set_current_dir(&self.original) {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_e, dir = %self.original.display(), "Failed to restore working directory");
        }
    }
}

/// Spawns the child and, when the spec has an input, a task feeding it to
/// the child's stdin. The stdin pipe is closed once the input is drained.
fn spawn(spec: &ProcessSpec) -> Result<(Child, Option<JoinHandle<io::Result<u64>>>), ProcessError> {
    let mut cmd = tokio::process::Command::new(&spec.program);

    #[cfg(unix)]
    cmd.arg0(&spec.name);

    cmd.args(&spec.args)
        .env_clear()
        .envs(spec.env.iter().filter_map(|entry| split_environ_entry(entry)))
        .stdin(if spec.stdin.is_some() {
            Stream::Piped.stdio()
        } else {
            Stream::Null.stdio()
        })
        .stdout(spec.stdout.stdio())
        .stderr(spec.stderr.stdio())
        .kill_on_drop(true);

    if let Some(dir) = &spec.dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|source| {
        #[cfg(feature = "tracing")]
        tracing::error!(error = %source, "Failed to spawn child process");

        ProcessError::Spawn {
            program: spec.program.display().to_string(),
            source,
        }
    })?;

    #[cfg(feature = "tracing")]
    tracing::debug!(process_id = ?child.id(), "Spawned child process");

    let stdin_pump = match (spec.stdin.clone(), child.stdin.take()) {
        (Some(input), Some(mut stdin)) => Some(tokio::spawn(async move {
            let copied = input.copy_to(&mut stdin).await?;
            stdin.shutdown().await?;
            Ok(copied)
        })),
        _ => None,
    };

    Ok((child, stdin_pump))
}

/// Waits for the stdin feeder. A child that exits without reading all of its
/// input closes the pipe early; that broken pipe is not a failure.
async fn join_stdin_pump(pump: Option<JoinHandle<io::Result<u64>>>) -> Result<(), ProcessError> {
    let Some(pump) = pump else {
        return Ok(());
    };

    match pump.await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Ok(Err(e)) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %e, "Failed to write child stdin");
            Err(ProcessError::Io(e))
        }
        Err(e) => Err(ProcessError::Io(io::Error::other(e))),
    }
}
