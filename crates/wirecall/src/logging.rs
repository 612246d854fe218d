use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

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

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Filter directive for the CLI flag.
    ///
    /// The decoder traces every tag it dispatches, so `--log-level trace`
    /// applies to the wirecall crates only; dependencies stay at `warn`
    /// instead of flooding stderr alongside the per-byte output.
    pub fn directive(self) -> String {
        let level = self.as_str();
        format!(
            "warn,wirecall={level},wirecall_codec={level},wirecall_proto={level},\
             wirecall_registry={level},wirecall_value={level}"
        )
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the `--log-level`
/// flag when set.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.directive()));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
