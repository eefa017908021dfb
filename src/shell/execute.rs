use std::{
    ffi::OsString,
    io,
    panic::panic_any,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

use crate::{
    helper::tracing::MaybeInstrument,
    shell::{
        banner::print_banner,
        command::Command,
        defaults::{default_echo, default_executor},
        environ::ambient_environ,
        error::{ExecutionError, ProcessError},
        executor::{BoxedReader, Executor, ProcessSpec, Stream},
        lookup::{check_dir, find_program},
    },
};

/// Initial capacity of the line scanner. Longer lines grow the buffer.
pub const SCAN_BUFFER_SIZE: usize = 4 * 1024;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// What [`Command::output_with`] does with the child's stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrMode {
    /// Passed through live to the caller's stderr.
    Echo,
    /// Neither shown nor kept.
    Discard,
    /// Kept and attached to the error if the command fails.
    Capture,
}

impl StderrMode {
    fn stream(self) -> Stream {
        match self {
            StderrMode::Echo => Stream::Inherit,
            StderrMode::Discard => Stream::Null,
            StderrMode::Capture => Stream::Piped,
        }
    }
}

impl From<bool> for StderrMode {
    fn from(echo_stderr: bool) -> Self {
        if echo_stderr {
            StderrMode::Echo
        } else {
            StderrMode::Discard
        }
    }
}

impl Command {
    /// Runs the command with stdout and stderr connected to the caller's.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(program = %self.get_program())))]
    pub async fn run(&self) -> Result<(), ExecutionError> {
        let spec = self.prepare(Stream::Inherit, Stream::Inherit)?;
        self.resolved_executor()
            .run(spec)
            .await
            .map_err(|cause| self.fail(cause, false))
    }

    /// Like [`Command::run`], but panics with the [`ExecutionError`] as payload.
    pub async fn must_run(&self) {
        if let Err(e) = self.run().await {
            abort(e)
        }
    }

    /// Runs the command and returns its stdout.
    ///
    /// With `echo_stderr` the child's stderr is passed through live;
    /// without it, stderr is discarded and a failure carries no captured
    /// stderr. Use [`Command::output_with`] with [`StderrMode::Capture`] to
    /// keep it instead.
    pub async fn output(&self, echo_stderr: bool) -> Result<Vec<u8>, ExecutionError> {
        self.output_with(echo_stderr.into()).await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(program = %self.get_program(), stderr = ?stderr)))]
    pub async fn output_with(&self, stderr: StderrMode) -> Result<Vec<u8>, ExecutionError> {
        let spec = self.prepare(Stream::Piped, stderr.stream())?;
        self.resolved_executor()
            .output(spec)
            .await
            .map_err(|cause| self.fail(cause, stderr == StderrMode::Capture))
    }

    /// [`Command::output`] decoded as UTF-8, invalid sequences replaced.
    pub async fn output_string(&self, echo_stderr: bool) -> Result<String, ExecutionError> {
        self.output(echo_stderr).await.map(into_string)
    }

    pub async fn must_output(&self, echo_stderr: bool) -> Vec<u8> {
        self.output(echo_stderr).await.unwrap_or_else(|e| abort(e))
    }

    pub async fn must_output_string(&self, echo_stderr: bool) -> String {
        self.output_string(echo_stderr)
            .await
            .unwrap_or_else(|e| abort(e))
    }

    /// Runs the command and returns stdout and stderr interleaved in one
    /// buffer, in the order the chunks arrived.
    ///
    /// On failure the output is dropped; the error has no captured stderr
    /// since it was not kept apart from stdout.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(program = %self.get_program())))]
    pub async fn combined_output(&self) -> Result<Vec<u8>, ExecutionError> {
        let spec = self.prepare(Stream::Piped, Stream::Piped)?;
        let executor = self.resolved_executor();
        let mut handle = executor
            .start(spec)
            .await
            .map_err(|cause| self.fail(cause, false))?;

        let buffer = Mutex::new(Vec::new());
        let program = self.get_program();
        let (stdout, stderr) = tokio::join!(
            drain_into(handle.take_stdout(), &buffer).maybe_instrument(program, "stdout"),
            drain_into(handle.take_stderr(), &buffer).maybe_instrument(program, "stderr"),
        );

        executor
            .wait(handle)
            .await
            .map_err(|cause| self.fail(cause, false))?;
        stdout
            .and(stderr)
            .map_err(|e| self.fail(ProcessError::Io(e), false))?;

        Ok(buffer.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    pub async fn combined_output_string(&self) -> Result<String, ExecutionError> {
        self.combined_output().await.map(into_string)
    }

    pub async fn must_combined_output(&self) -> Vec<u8> {
        self.combined_output().await.unwrap_or_else(|e| abort(e))
    }

    pub async fn must_combined_output_string(&self) -> String {
        self.combined_output_string()
            .await
            .unwrap_or_else(|e| abort(e))
    }

    /// Runs the command and calls `callback` once per line of stdout and
    /// stderr, without the line terminator.
    ///
    /// Lines of one stream arrive in order; lines of the two streams may
    /// interleave. Calls never overlap, so the callback needs no
    /// synchronization of its own. A final line without a newline is still
    /// delivered, and long lines are delivered whole.
    ///
    /// Lines are decoded as UTF-8 with invalid sequences replaced by
    /// `U+FFFD`. Use [`Command::byte_lines`] to receive the raw bytes.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use tcrm_shell::shell::command::Command;
    ///
    /// # async fn demo() -> Result<(), tcrm_shell::shell::error::ExecutionError> {
    /// let mut lines = Vec::new();
    /// Command::new("cat")
    ///     .stdin(&b"1\n2\n3\n"[..])
    ///     .lines(|line| lines.push(line))
    ///     .await?;
    /// assert_eq!(lines, ["1", "2", "3"]);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn lines<F>(&self, mut callback: F) -> Result<(), ExecutionError>
    where
        F: FnMut(String),
    {
        self.byte_lines(|line| callback(into_string(line))).await
    }

    /// Like [`Command::lines`], but hands each line over exactly as the child
    /// wrote it, minus the `\n` or `\r\n` terminator.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(program = %self.get_program())))]
    pub async fn byte_lines<F>(&self, callback: F) -> Result<(), ExecutionError>
    where
        F: FnMut(Vec<u8>),
    {
        let spec = self.prepare(Stream::Piped, Stream::Piped)?;
        let executor = self.resolved_executor();
        let mut handle = executor
            .start(spec)
            .await
            .map_err(|cause| self.fail(cause, false))?;

        let callback = Mutex::new(callback);
        let program = self.get_program();
        let (stdout, stderr) = tokio::join!(
            scan_lines(handle.take_stdout(), &callback).maybe_instrument(program, "stdout"),
            scan_lines(handle.take_stderr(), &callback).maybe_instrument(program, "stderr"),
        );

        executor
            .wait(handle)
            .await
            .map_err(|cause| self.fail(cause, false))?;
        stdout
            .and(stderr)
            .map_err(|e| self.fail(ProcessError::Io(e), false))
    }

    pub async fn must_lines<F>(&self, callback: F)
    where
        F: FnMut(String),
    {
        if let Err(e) = self.lines(callback).await {
            abort(e)
        }
    }

    pub async fn must_byte_lines<F>(&self, callback: F)
    where
        F: FnMut(Vec<u8>),
    {
        if let Err(e) = self.byte_lines(callback).await {
            abort(e)
        }
    }

    /// Replaces the current process with the command.
    ///
    /// Does not return on success. Resolution and working directory errors
    /// are reported before the replacement is attempted.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(program = %self.get_program())))]
    pub fn exec(&self) -> Result<(), ExecutionError> {
        let spec = self.prepare(Stream::Inherit, Stream::Inherit)?;
        self.resolved_executor()
            .exec(spec)
            .map_err(|cause| self.fail(cause, false))
    }

    pub fn must_exec(&self) {
        if let Err(e) = self.exec() {
            abort(e)
        }
    }

    fn resolved_echo(&self) -> bool {
        self.get_echo().unwrap_or_else(default_echo)
    }

    fn resolved_executor(&self) -> Arc<dyn Executor> {
        self.get_executor()
            .cloned()
            .unwrap_or_else(default_executor)
    }

    /// Shared preamble of every mode: banner, environment merge, program
    /// and working directory checks.
    fn prepare(&self, stdout: Stream, stderr: Stream) -> Result<ProcessSpec, ExecutionError> {
        if self.resolved_echo() {
            print_banner(self.get_program(), self.get_args());
        }

        let search_paths = self
            .get_env()
            .get("PATH")
            .map(OsString::from)
            .or_else(|| std::env::var_os("PATH"));
        let program = find_program(self.get_program(), search_paths.as_deref())
            .map_err(|cause| self.fail(cause, false))?;

        if let Some(dir) = self.get_dir() {
            check_dir(dir).map_err(|cause| self.fail(cause, false))?;
        }

        Ok(ProcessSpec {
            program,
            name: self.get_program().to_string(),
            args: self.get_args().to_vec(),
            dir: self.get_dir().map(Into::into),
            env: ambient_environ(self.get_env()),
            stdin: self.get_stdin().cloned(),
            stdout,
            stderr,
        })
    }

    fn fail(&self, cause: ProcessError, keep_stderr: bool) -> ExecutionError {
        let err = ExecutionError::new(self, cause, keep_stderr);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            exit_code = err.exit_code(),
            preparation = err.is_preparation_failure(),
            error = %err,
            "Command failed"
        );

        err
    }
}

fn abort(err: ExecutionError) -> ! {
    #[cfg(feature = "tracing")]
    tracing::error!(error = %err, "Aborting on command failure");

    panic_any(err)
}

fn into_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Appends everything `reader` yields to `buffer`, one chunk at a time.
async fn drain_into(reader: Option<BoxedReader>, buffer: &Mutex<Vec<u8>>) -> io::Result<()> {
    let Some(mut reader) = reader else {
        return Ok(());
    };

    let mut chunk = vec![0; READ_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(&chunk[..n]);
    }
}

/// Splits `reader` into lines and hands each one to `callback` while
/// holding its lock. Both `\n` and `\r\n` terminate a line.
async fn scan_lines<F>(reader: Option<BoxedReader>, callback: &Mutex<F>) -> io::Result<()>
where
    F: FnMut(Vec<u8>),
{
    let Some(reader) = reader else {
        return Ok(());
    };

    let mut reader = BufReader::with_capacity(SCAN_BUFFER_SIZE, reader);
    loop {
        let mut line = Vec::with_capacity(SCAN_BUFFER_SIZE);
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(line = %String::from_utf8_lossy(&line));

        let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
        (*callback)(line);
    }
}
