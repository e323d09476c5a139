//! Injectable wire-trace sink
//!
//! The client reports raw request URLs, response bodies and cookies through a
//! [`TraceSink`]. Structured events go through `tracing` regardless; the sink
//! exists so callers can capture the verbose wire chatter separately.

use std::fmt;
use std::sync::Arc;

/// Receiver for wire-level trace messages
pub trait TraceSink: Send + Sync + fmt::Debug {
    /// Record a plain message
    fn trace(&self, msg: &str);

    /// Record a formatted message
    fn trace_fmt(&self, args: fmt::Arguments<'_>) {
        self.trace(&fmt::format(args));
    }

    /// Child sink scoped under `name`
    fn module(&self, name: &str) -> Arc<dyn TraceSink>;
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {
    fn trace(&self, _msg: &str) {}

    fn trace_fmt(&self, _args: fmt::Arguments<'_>) {}

    fn module(&self, _name: &str) -> Arc<dyn TraceSink> {
        Arc::new(Self)
    }
}

/// Sink that forwards to `tracing` at TRACE level, tagged with a module path
#[derive(Debug, Clone, Default)]
pub struct TracingSink {
    module: String,
}

impl TracingSink {
    /// Root sink with an empty module path
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Module path this sink tags its events with
    #[must_use]
    pub fn module_path(&self) -> &str {
        &self.module
    }

    fn child_path(&self, name: &str) -> String {
        if self.module.is_empty() {
            name.to_string()
        } else {
            format!("{}::{name}", self.module)
        }
    }
}

impl TraceSink for TracingSink {
    fn trace(&self, msg: &str) {
        tracing::trace!(module = %self.module, "{msg}");
    }

    fn trace_fmt(&self, args: fmt::Arguments<'_>) {
        tracing::trace!(module = %self.module, "{args}");
    }

    fn module(&self, name: &str) -> Arc<dyn TraceSink> {
        Arc::new(Self {
            module: self.child_path(name),
        })
    }
}
