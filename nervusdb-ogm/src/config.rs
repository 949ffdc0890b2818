use nervusdb_ogm_query::{MAX_CASCADE_DEPTH, MAX_CREATE_DEPTH, MAX_EAGER_DEPTH, OverflowPolicy};
use serde::{Deserialize, Serialize};

/// Tuning knobs of an [`crate::Ogm`].
///
/// Every field is optional when loading from JSON:
///
/// ```json
/// { "max_eager_depth": 2, "write_overflow": "error" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OgmConfig {
    /// Deepest node projection that still expands eager relationships.
    pub max_eager_depth: usize,
    /// Deepest nesting level a create/merge payload is expanded to.
    pub max_write_depth: usize,
    pub max_cascade_depth: usize,
    pub write_overflow: OverflowPolicy,
    /// Emit existence constraints for required properties on schema install.
    pub enterprise: bool,
}

impl Default for OgmConfig {
    fn default() -> Self {
        Self {
            max_eager_depth: MAX_EAGER_DEPTH,
            max_write_depth: MAX_CREATE_DEPTH,
            max_cascade_depth: MAX_CASCADE_DEPTH,
            write_overflow: OverflowPolicy::Truncate,
            enterprise: false,
        }
    }
}

impl OgmConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = OgmConfig::from_json(r#"{ "max_eager_depth": 2, "write_overflow": "error" }"#)
            .unwrap();
        assert_eq!(config.max_eager_depth, 2);
        assert_eq!(config.write_overflow, OverflowPolicy::Error);
        assert_eq!(config.max_write_depth, 99);
        assert_eq!(config.max_cascade_depth, 10);
        assert!(!config.enterprise);
    }

    #[test]
    fn rejects_unknown_overflow_policy() {
        assert!(OgmConfig::from_json(r#"{ "write_overflow": "explode" }"#).is_err());
    }
}
