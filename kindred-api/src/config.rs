use std::path::PathBuf;

use serde::Deserialize;

/// What happens when a user swipes on someone they already decided on.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SwipePolicy {
    /// The second decision is refused with `AlreadySwiped`.
    #[default]
    Reject,
    /// The stored decision is overwritten in place.
    Supersede,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    /// Keep the document in memory only and never touch `data_file`.
    #[serde(default)]
    pub ephemeral: bool,
    #[serde(default = "default_discover_batch_size")]
    pub discover_batch_size: usize,
    #[serde(default)]
    pub swipe_policy: SwipePolicy,
    #[serde(default = "default_face_min_confidence")]
    pub face_min_confidence: f64,
}

fn default_port() -> u16 { 3000 }
fn default_data_file() -> PathBuf { "data.json".into() }
fn default_discover_batch_size() -> usize { 10 }
fn default_face_min_confidence() -> f64 { 50.0 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            data_file: default_data_file(),
            ephemeral: false,
            discover_batch_size: default_discover_batch_size(),
            swipe_policy: SwipePolicy::default(),
            face_min_confidence: default_face_min_confidence(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("KINDRED_API").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Ephemeral configuration for tests and demos.
    pub fn in_memory() -> Self {
        Self {
            ephemeral: true,
            ..Self::default()
        }
    }

    pub fn store_path(&self) -> Option<PathBuf> {
        (!self.ephemeral).then(|| self.data_file.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_config_has_no_store_path() {
        assert!(AppConfig::in_memory().store_path().is_none());
        assert_eq!(AppConfig::default().store_path(), Some(PathBuf::from("data.json")));
    }

    #[test]
    fn swipe_policy_parses_lowercase() {
        let policy: SwipePolicy = serde_json::from_str("\"supersede\"").unwrap();
        assert_eq!(policy, SwipePolicy::Supersede);
        assert_eq!(SwipePolicy::default(), SwipePolicy::Reject);
    }
}
