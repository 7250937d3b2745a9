use copilot_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};
use tracing::Level;

/// Installs the global subscriber from `logging.*` config.
///
/// Falls back to compact/info when the config does not load; the command
/// itself reports the config error. Logs go to stderr so stdout only
/// carries the command payload.
pub fn init_from_env() {
    let logging = AppConfig::load(LoadOptions::default())
        .map(|config| config.logging)
        .unwrap_or_else(|_| LoggingConfig { level: "info".to_string(), format: LogFormat::Compact });

    if let Err(error) = init(&logging) {
        eprintln!("logging was not initialized: {error:#}");
    }
}

pub fn init(logging: &LoggingConfig) -> anyhow::Result<()> {
    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let installed = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|error| anyhow::anyhow!(error))
}
