use std::future::Future;

#[cfg(feature = "tracing")]
use tracing::Instrument;

/// Reader futures for a child's output pipes. With the `tracing` feature on,
/// every event they emit is nested in a `stream_reader` span naming the
/// program and the pipe; without it the future is returned untouched.
pub(crate) trait MaybeInstrument: Future + Sized {
    #[cfg(feature = "tracing")]
    fn maybe_instrument(
        self,
        program: &str,
        stream: &'static str,
    ) -> tracing::instrument::Instrumented<Self> {
        self.instrument(tracing::debug_span!("stream_reader", program, stream))
    }

    #[cfg(not(feature = "tracing"))]
    fn maybe_instrument(self, _program: &str, _stream: &'static str) -> Self {
        self
    }
}

impl<F: Future> MaybeInstrument for F {}
