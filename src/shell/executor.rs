use std::{
    ffi::OsString,
    fmt, io,
    path::PathBuf,
    process::Stdio,
    sync::Arc,
};

use futures::future::{self, BoxFuture, FutureExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    process::Child,
    sync::Mutex,
    task::JoinHandle,
};

use crate::shell::error::ProcessError;

/// Boxed byte source used for child stdin and captured output streams.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// How one of the child's output streams is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Shares the caller's own stream.
    Inherit,
    /// Discarded.
    Null,
    /// Read by this layer.
    Piped,
}

impl Stream {
    pub(crate) fn stdio(self) -> Stdio {
        match self {
            Stream::Inherit => Stdio::inherit(),
            Stream::Null => Stdio::null(),
            Stream::Piped => Stdio::piped(),
        }
    }
}

/// Stdin source shared by every execution of a command.
///
/// Each execution copies whatever the reader still yields, so a reader that
/// was drained by a previous run feeds an empty stream to the next one.
#[derive(Clone)]
pub struct Input(Arc<Mutex<BoxedReader>>);

impl Input {
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Input(Arc::new(Mutex::new(Box::new(reader))))
    }

    /// Copies the remaining bytes into `writer`.
    pub async fn copy_to<W>(&self, writer: &mut W) -> io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut reader = self.0.lock().await;
        tokio::io::copy(&mut *reader, writer).await
    }

    /// True when both handles point at the same underlying reader.
    pub fn ptr_eq(&self, other: &Input) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Input(..)")
    }
}

/// Fully resolved description of one process to create.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Program path after search path resolution.
    pub program: PathBuf,
    /// Program name as configured, used as `argv[0]`.
    pub name: String,
    pub args: Vec<String>,
    pub dir: Option<PathBuf>,
    /// Complete child environment as `KEY=VALUE` entries.
    pub env: Vec<OsString>,
    pub stdin: Option<Input>,
    pub stdout: Stream,
    pub stderr: Stream,
}

impl ProcessSpec {
    /// Argument vector as the child sees it, program name first.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.name.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// A started process, or a stand-in built by a test double.
///
/// Dropping a handle that still owns a real child kills it.
pub struct ProcessHandle {
    child: Option<Child>,
    stdout: Option<BoxedReader>,
    stderr: Option<BoxedReader>,
    stdin_pump: Option<JoinHandle<io::Result<u64>>>,
}

impl ProcessHandle {
    /// Handle without a child process whose output streams are the given readers.
    pub fn from_streams<O, E>(stdout: O, stderr: E) -> Self
    where
        O: AsyncRead + Send + Unpin + 'static,
        E: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            child: None,
            stdout: Some(Box::new(stdout)),
            stderr: Some(Box::new(stderr)),
            stdin_pump: None,
        }
    }

    pub(crate) fn from_child(
        mut child: Child,
        stdin_pump: Option<JoinHandle<io::Result<u64>>>,
    ) -> Self {
        let stdout = child.stdout.take().map(|s| Box::new(s) as BoxedReader);
        let stderr = child.stderr.take().map(|s| Box::new(s) as BoxedReader);
        Self {
            child: Some(child),
            stdout,
            stderr,
            stdin_pump,
        }
    }

    /// OS process id, if a real child is attached and still running.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    pub fn take_stdout(&mut self) -> Option<BoxedReader> {
        self.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<BoxedReader> {
        self.stderr.take()
    }

    pub(crate) fn into_parts(self) -> (Option<Child>, Option<JoinHandle<io::Result<u64>>>) {
        (self.child, self.stdin_pump)
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("id", &self.id())
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}

/// Backend that performs the OS-level process operations.
///
/// [`RealExecutor`](crate::shell::real::RealExecutor) is the only production
/// implementation and overrides every operation. The defaults fail with
/// [`ProcessError::Unsupported`], so a test double only implements the
/// operations it fakes and never spawns anything for the others.
pub trait Executor: Send + Sync + fmt::Debug {
    /// Runs the process to completion.
    fn run(&self, _spec: ProcessSpec) -> BoxFuture<'_, Result<(), ProcessError>> {
        unsupported("run")
    }

    /// Starts the process without waiting for it.
    fn start(&self, _spec: ProcessSpec) -> BoxFuture<'_, Result<ProcessHandle, ProcessError>> {
        unsupported("start")
    }

    /// Waits for a process returned by [`Executor::start`] and releases it.
    fn wait(&self, _handle: ProcessHandle) -> BoxFuture<'_, Result<(), ProcessError>> {
        unsupported("wait")
    }

    /// Runs the process to completion and returns its stdout.
    fn output(&self, _spec: ProcessSpec) -> BoxFuture<'_, Result<Vec<u8>, ProcessError>> {
        unsupported("output")
    }

    /// Replaces the current process image. Only returns on failure, or when
    /// a test double chooses to.
    fn exec(&self, _spec: ProcessSpec) -> Result<(), ProcessError> {
        Err(ProcessError::Unsupported { operation: "exec" })
    }
}

fn unsupported<T>(operation: &'static str) -> BoxFuture<'static, Result<T, ProcessError>>
where
    T: Send + 'static,
{
    future::ready(Err(ProcessError::Unsupported { operation })).boxed()
}
