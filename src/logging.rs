use std::path::Path;

use flexi_logger::{opt_format, Cleanup, Criterion, FileSpec, FlexiLoggerError, LoggerHandle, Logger, Naming};

/// Start logging for a host process.
///
/// The level spec comes from `RUST_LOG` when set, otherwise from `spec`
/// (e.g. `"info"` or `"ai_2048_worker::search=debug"`). Without `log_dir`
/// records go to stderr; with it they go to size-rotated files in that directory.
/// Keep the returned handle alive for as long as logging is wanted.
pub fn setup_logging(spec: &str, log_dir: Option<&Path>) -> Result<LoggerHandle, FlexiLoggerError> {
    let logger = Logger::try_with_env_or_str(spec)?.format(opt_format);
    match log_dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir))
            .rotate(
                Criterion::Size(10 * 1024 * 1024), // 10 MB per file
                Naming::Numbers,
                Cleanup::KeepLogFiles(3),
            )
            .start(),
        None => logger.start(),
    }
}
