use std::path::PathBuf;

use owo_colors::{OwoColorize, Stream::Stderr};

use crate::config::IpamConfig;

/// Setting this variable to anything turns on trace logging
pub const TRACE_ENV: &str = "FLAT_IPAM_TRACE";

/// Logger settings for one invocation, taken from the IPAM section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    /// Log at debug level instead of info
    pub debug: bool,
    /// Append logs to this file instead of writing them to stderr
    pub log_file: Option<PathBuf>,
}

impl LogSettings {
    #[must_use]
    pub fn from_ipam(ipam: &IpamConfig) -> Self {
        Self {
            debug: ipam.debug_enabled(),
            log_file: ipam.log_file().map(PathBuf::from),
        }
    }

    /// Pick the log level. `trace` wins over everything else
    #[must_use]
    pub fn level(&self, trace: bool) -> log::LevelFilter {
        match (trace, self.debug) {
            (true, _) => log::LevelFilter::Trace,
            (false, true) => log::LevelFilter::Debug,
            (false, false) => log::LevelFilter::Info,
        }
    }
}

/// Format a level name, padded to keep the output looking somewhat sane
fn level_label(level: log::Level, colored: bool) -> String {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !colored {
        return label.to_owned();
    }
    match level {
        log::Level::Error => label
            .if_supports_color(Stderr, |text| text.red())
            .if_supports_color(Stderr, |text| text.bold())
            .to_string(),
        log::Level::Warn => label
            .if_supports_color(Stderr, |text| text.yellow())
            .if_supports_color(Stderr, |text| text.bold())
            .to_string(),
        log::Level::Info => label
            .if_supports_color(Stderr, |text| text.green())
            .if_supports_color(Stderr, |text| text.bold())
            .to_string(),
        log::Level::Debug => label
            .if_supports_color(Stderr, |text| text.bright_blue())
            .if_supports_color(Stderr, |text| text.bold())
            .to_string(),
        log::Level::Trace => label
            .if_supports_color(Stderr, |text| text.bright_white())
            .if_supports_color(Stderr, |text| text.bold())
            .to_string(),
    }
}

/// Pick where logs go and whether they are colored.
///
/// Falls back to (colored) stderr if the log file can't be opened.
fn select_output(settings: &LogSettings) -> (fern::Output, bool) {
    let file = settings
        .log_file
        .as_ref()
        .and_then(|path| match fern::log_file(path) {
            Ok(file) => Some(file),
            Err(err) => {
                eprintln!("Failed to open log file {}: {}", path.display(), err);
                None
            }
        });
    match file {
        Some(file) => (fern::Output::from(file), false),
        None => (fern::Output::from(std::io::stderr()), true),
    }
}

/// Enable the logger.
///
/// Stdout belongs to the CNI result, so logs go to stderr or to the configured file.
pub fn enable_logger(settings: &LogSettings) -> Result<(), log::SetLoggerError> {
    let (output, colored) = select_output(settings);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                level_label(record.level(), colored),
                env!("CARGO_PKG_NAME"),
                message
            ));
        })
        .level(settings.level(std::env::var_os(TRACE_ENV).is_some()))
        .chain(output)
        .apply()?;

    log::debug!("Debug logging enabled");
    Ok(())
}
