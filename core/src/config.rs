use serde::{Deserialize, Serialize};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// How many cascaded updates (updates queued by observers while propagating) a single
    /// top-level update may trigger before propagation gives up.
    pub max_cascade_updates: usize,

    /// Iterator name for list items when a list does not declare one.
    pub default_iterator_name: String,

    /// How many items a list binds before the host reports its visible range.
    pub initial_window: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_cascade_updates: 64,
            default_iterator_name: "item".to_owned(),
            initial_window: 10,
        }
    }
}

impl Config {
    /// Loads a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Config, serde_json::Error> {
        serde_json::from_str(json)
    }
}
