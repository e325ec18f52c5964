use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;
use crate::config::General;
use crate::errors::LoggingError;

const PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%S)} {l} {m}{n}";

/// Sets up logging to stdout and/or file according to configuration
///
/// # Arguments
///
/// * 'general' - the general section of the configuration
pub fn setup_logger(general: &General) -> Result<(), LoggingError> {
    let config = build_config(general)?;
    log4rs::init_config(config).map_err(|e| LoggingError(e.to_string()))?;

    Ok(())
}

/// Builds the log4rs configuration
///
/// # Arguments
///
/// * 'general' - the general section of the configuration
fn build_config(general: &General) -> Result<log4rs::Config, LoggingError> {
    let mut builder = log4rs::Config::builder();
    let mut root = Root::builder();

    if general.log_to_stdout {
        let stdout = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build();
        builder = builder.appender(Appender::builder().build("stdout", Box::new(stdout)));
        root = root.appender("stdout");
    }

    if let Some(log_path) = &general.log_path {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build(log_path)
            .map_err(|e| LoggingError(format!("unable to open log file {}: {}", log_path, e)))?;
        builder = builder.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    builder.build(root.build(general.log_level))
        .map_err(|e| LoggingError(e.to_string()))
}
