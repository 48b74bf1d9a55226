mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};

pub use settings::{
    ConnectionSettings, ConsumerProbe, LoggingSettings, PartialSettings, ReconcileSettings, Settings,
};

/// Configuration file read when no path is given. Missing is fine.
pub const DEFAULT_CONFIG_PATH: &str = "config/default";

/// Prefix for environment overrides, e.g. `STREAMSYNC__CONNECTION__SERVERS`.
pub const ENV_PREFIX: &str = "STREAMSYNC";

/// Loads the configuration from the default file and environment variables
/// and merges it with default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    load(File::with_name(DEFAULT_CONFIG_PATH).required(false))
}

/// Like `load_config`, but the file at `path` must exist.
pub fn load_config_from(path: &Path) -> Result<Settings, ConfigError> {
    load(File::from(path).required(true))
}

fn load<S>(file: S) -> Result<Settings, ConfigError>
where
    S: config::Source + Send + Sync + 'static,
{
    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("connection.servers")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_onto(Settings::default()))
}
