use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

/// Environment variable prefix, e.g. `TRADESTATE_DATABASE__URL`.
pub const ENV_PREFIX: &str = "TRADESTATE_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by layering defaults, an optional TOML file and
    /// `TRADESTATE_` environment variables (`__` separates nested keys).
    ///
    /// # Errors
    ///
    /// Returns an error if the file or the environment cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<AppConfig> {
        let config: AppConfig = Self::figment(path.as_ref()).extract()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
