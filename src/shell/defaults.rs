//! Process-wide defaults used by commands that do not override them.
//!
//! Meant for test isolation: swap a default, run the code under test, then
//! restore it. Production code leaves both at their initial values.

use std::sync::{
    Arc, LazyLock, PoisonError, RwLock,
    atomic::{AtomicBool, Ordering},
};

use crate::shell::{executor::Executor, real::RealExecutor};

const INITIAL_ECHO: bool = true;

static DEFAULT_EXECUTOR: LazyLock<RwLock<Arc<dyn Executor>>> =
    LazyLock::new(|| RwLock::new(Arc::new(RealExecutor)));

static DEFAULT_ECHO: AtomicBool = AtomicBool::new(INITIAL_ECHO);

/// Executor used by commands without their own.
pub fn default_executor() -> Arc<dyn Executor> {
    DEFAULT_EXECUTOR
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replaces the default executor and returns the previous one.
pub fn set_default_executor(executor: Arc<dyn Executor>) -> Arc<dyn Executor> {
    let mut current = DEFAULT_EXECUTOR
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *current, executor)
}

/// Puts the [`RealExecutor`] back as default.
pub fn restore_default_executor() {
    set_default_executor(Arc::new(RealExecutor));
}

/// Whether commands without an explicit echo setting print their banner.
pub fn default_echo() -> bool {
    DEFAULT_ECHO.load(Ordering::Relaxed)
}

/// Sets the default echo policy and returns the previous one.
pub fn set_default_echo(echo: bool) -> bool {
    DEFAULT_ECHO.swap(echo, Ordering::Relaxed)
}

pub fn restore_default_echo() {
    DEFAULT_ECHO.store(INITIAL_ECHO, Ordering::Relaxed);
}
