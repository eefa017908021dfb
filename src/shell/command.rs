use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::io::AsyncRead;

use crate::shell::executor::{Executor, Input};

/// Configured invocation of an external program.
///
/// Built once, then executed any number of times through one of the
/// execution modes ([`Command::run`], [`Command::output`],
/// [`Command::combined_output`], [`Command::lines`], [`Command::exec`]).
/// Every execution creates a fresh process; only the configuration carries
/// over between executions.
///
/// Arguments are passed to the OS verbatim. Nothing is interpreted by a shell.
///
/// # Examples
///
/// ```rust
/// use tcrm_shell::shell::command::Command;
///
/// let verbose = true;
/// let cmd = Command::new("cargo")
///     .args(["build", "--release"])
///     .args_if(verbose, ["--verbose"])
///     .dir("/tmp")
///     .env("RUST_LOG", "debug")
///     .echo(false);
///
/// assert_eq!(cmd.get_args(), ["build", "--release", "--verbose"]);
/// assert_eq!(cmd.get_echo(), Some(false));
/// ```
#[derive(Debug, Clone)]
pub struct Command {
    program: String,
    args: Vec<String>,
    dir: Option<PathBuf>,
    env: HashMap<String, String>,
    stdin: Option<Input>,
    echo: Option<bool>,
    executor: Option<Arc<dyn Executor>>,
}

impl Command {
    /// The program is resolved against the search path when the command
    /// executes, not here.
    pub fn new(program: impl Into<String>) -> Self {
        Command {
            program: program.into(),
            args: Vec::new(),
            dir: None,
            env: HashMap::new(),
            stdin: None,
            echo: None,
            executor: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends arguments after the ones already configured.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends arguments only when `condition` holds.
    pub fn args_if<I, S>(self, condition: bool, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if condition { self.args(args) } else { self }
    }

    /// Working directory of the child. Unset inherits the caller's.
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Sets one variable on top of the inherited environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Merges variables into the configured overrides; later values win.
    pub fn envs<K, V, I>(mut self, env: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.env
            .extend(env.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Byte source fed to the child's stdin. Without one the child reads an
    /// empty stream.
    pub fn stdin<R>(mut self, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.stdin = Some(Input::new(reader));
        self
    }

    /// Shares an existing [`Input`] with this command.
    pub fn stdin_input(mut self, input: Input) -> Self {
        self.stdin = Some(input);
        self
    }

    /// Overrides the process-wide echo default for this command.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = Some(echo);
        self
    }

    /// Overrides the process-wide default executor for this command.
    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn get_program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn get_env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn get_stdin(&self) -> Option<&Input> {
        self.stdin.as_ref()
    }

    pub fn has_stdin(&self) -> bool {
        self.stdin.is_some()
    }

    /// `None` when the process-wide default applies.
    pub fn get_echo(&self) -> Option<bool> {
        self.echo
    }

    pub fn get_executor(&self) -> Option<&Arc<dyn Executor>> {
        self.executor.as_ref()
    }
}
