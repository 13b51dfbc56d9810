use std::path::Path;

use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming,
};

/// Starts logging to rotating files in `directory`, echoed to the terminal.
///
/// `level` takes the usual `RUST_LOG` syntax, e.g. `info` or `colocnii=debug`.
/// Keep the returned handle alive until the program ends, dropping it stops
/// the file writer.
pub fn setup_logging(level: &str, directory: &Path) -> Result<LoggerHandle, FlexiLoggerError> {
    Logger::try_with_str(level)?
        .log_to_file(FileSpec::default().directory(directory))
        .duplicate_to_stderr(Duplicate::Warn)
        .duplicate_to_stdout(Duplicate::Info)
        .rotate(
            Criterion::Size(1024 * 1024), //1MB
            Naming::Timestamps,
            Cleanup::KeepLogFiles(5),
        )
        .start()
}
