//! Error sink that reports through `tracing`.

use tracing::{info, warn};

use pluginhost_protocols::{ErrorCode, ErrorSink};

/// Default [`ErrorSink`]: every delivery becomes a log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn deliver(&self, success: bool, package: &str, code: ErrorCode, message: &str) {
        if success {
            info!(plugin = %package, %code, "{}", message);
        } else {
            warn!(plugin = %package, %code, "{}", message);
        }
    }
}
