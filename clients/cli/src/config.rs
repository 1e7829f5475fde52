//! CLI configuration

use std::path::{Path, PathBuf};

use anyhow::Context;
use securechat_protocol::ServiceConfig;

/// Default config file, relative to the working directory
pub fn default_config_path() -> PathBuf {
    PathBuf::from("securechat.toml")
}

/// Load the service config
///
/// An explicit path is created with defaults when missing; without one the
/// built-in defaults are used and nothing is written.
pub fn load(path: Option<&Path>) -> anyhow::Result<ServiceConfig> {
    match path {
        Some(path) => ServiceConfig::load_or_default(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(ServiceConfig::default()),
    }
}

/// Render a config as TOML
pub fn render(config: &ServiceConfig) -> anyhow::Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_without_path() {
        let config = load(None).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_render_round_trips() {
        let config = ServiceConfig::default();
        let text = render(&config).unwrap();
        assert_eq!(ServiceConfig::from_toml_str(&text).unwrap(), config);
    }
}
