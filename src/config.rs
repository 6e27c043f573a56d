use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tandem_navigation::PlannerConfig;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Settings of the node itself, as opposed to the planner.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Capacity of each output topic.
    pub topic_capacity: usize,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            topic_capacity: 16,
        }
    }
}

/// Full configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TandemConfig {
    pub node: NodeSettings,
    pub planner: PlannerConfig,
}

/// Loads `path` (TOML, optional) with `TANDEM__*` environment overrides on top.
pub fn load_config(path: &str) -> anyhow::Result<TandemConfig> {
    info!("Attempting to load configuration from {}", path);

    let settings = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix("TANDEM")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: TandemConfig = settings.try_deserialize()?;
    debug!(?config, "Loaded configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config("config/does-not-exist.toml").unwrap();
        assert_eq!(config.planner, PlannerConfig::default());
        assert_eq!(config.node.topic_capacity, 16);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let settings = Config::builder()
            .add_source(File::from_str(
                "[planner]\nnum_paths = 5\nselection_threshold = 2.0\n",
                FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: TandemConfig = settings.try_deserialize().unwrap();

        assert_eq!(config.planner.num_paths, 5);
        assert_eq!(config.planner.selection_threshold, 2.0);
        assert_eq!(config.planner.occupancy_threshold, 65);
        assert_eq!(config.node.topic_capacity, 16);
    }
}
