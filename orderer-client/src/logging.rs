//! Logging capability handed to the client at construction.
//!
//! The client never talks to the process-wide `log` backend directly.  It
//! writes through a [`Logger`], which by default forwards to whatever backend
//! the host installed and can be pointed at any other [`log::Log`]
//! implementation instead.

use {
    log::{Level, Log, Metadata, Record},
    std::{borrow::Cow, fmt, panic::Location, sync::Arc},
};

/// Target used for client diagnostics unless overridden.
pub const DEFAULT_TARGET: &str = "orderer_client";

#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn Log>,
    target: Cow<'static, str>,
}

impl Logger {
    /// Log into `sink`.
    pub fn new(sink: Arc<dyn Log>) -> Self {
        Self {
            sink,
            target: Cow::Borrowed(DEFAULT_TARGET),
        }
    }

    /// Log into the backend installed with the `log` crate (if any).
    pub fn global() -> Self {
        Self::new(Arc::new(GlobalLog))
    }

    pub fn with_target(mut self, target: impl Into<Cow<'static, str>>) -> Self {
        self.target = target.into();
        self
    }

    #[track_caller]
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let metadata = Metadata::builder()
            .level(level)
            .target(&self.target)
            .build();
        if !self.sink.enabled(&metadata) {
            return;
        }
        let location = Location::caller();
        self.sink.log(
            &Record::builder()
                .metadata(metadata)
                .args(args)
                .file_static(Some(location.file()))
                .line(Some(location.line()))
                .build(),
        );
    }

    #[track_caller]
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    #[track_caller]
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    #[track_caller]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Forwards to `log::logger()`, honouring `log::max_level()` the same way the
/// `log` macros do.
struct GlobalLog;

impl Log for GlobalLog {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level() && log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            log::logger().log(record);
        }
    }

    fn flush(&self) {
        log::logger().flush();
    }
}
