//! Navigation Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Navigation simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// URL of the initial entry
    pub start_url: String,

    /// Run traversals before the triggering call returns
    pub synchronous_traversals: bool,

    /// Simulated latency before each queued traversal
    pub traversal_delay: Duration,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            start_url: "http://localhost/".to_string(),
            synchronous_traversals: false,
            traversal_delay: Duration::from_millis(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: NavigationConfig =
            serde_json::from_str(r#"{ "start_url": "https://example.com/app" }"#).unwrap();
        assert_eq!(config.start_url, "https://example.com/app");
        assert!(!config.synchronous_traversals);
        assert_eq!(config.traversal_delay, Duration::from_millis(1));
    }
}
