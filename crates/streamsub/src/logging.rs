use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Per-crate filter directives (e.g. `streamsub_listener=trace`), layered
/// over `--log-level`.
pub const LOG_DIRECTIVES_ENV: &str = "STREAMSUB_LOG";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Default level plus any extra directives. Unparseable directives are
/// ignored with a note on stderr, since no subscriber exists yet.
fn log_filter(level: LogLevel, directives: Option<&str>) -> EnvFilter {
    let mut filter = EnvFilter::default().add_directive(LevelFilter::from(level).into());
    for directive in directives.into_iter().flat_map(|d| d.split(',')) {
        let directive = directive.trim();
        if directive.is_empty() {
            continue;
        }
        match directive.parse() {
            Ok(parsed) => filter = filter.add_directive(parsed),
            Err(err) => eprintln!("ignoring {LOG_DIRECTIVES_ENV} directive {directive:?}: {err}"),
        }
    }
    filter
}

/// Install the stderr subscriber. Listener threads are named after their
/// listener, so thread names are included.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let directives = std::env::var(LOG_DIRECTIVES_ENV).ok();
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(level, directives.as_deref()))
        .with_ansi(false)
        .with_target(directives.is_some())
        .with_thread_names(true);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
