//! Tracing and logging setup shared by the portal binaries.

/// Subscriber configuration (filters, output format).
pub mod logging;

pub use logging::{LogFormat, ParseLogFormatError};

/// Initialize process-wide logging.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init(format: LogFormat) {
    logging::init(format);
}
