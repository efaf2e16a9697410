//! Node options and their defaults.

use serde::Deserialize;

use crate::allocator::Allocator;

/// Options applied to a node at init time.
///
/// Copied by value into the node; changing the caller's copy afterwards has
/// no effect on an initialized node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeOptions {
    /// If true, no parameter infrastructure is created for the node.
    pub no_parameters: bool,
    /// Allocator used for every internal allocation the node makes.
    pub allocator: Allocator,
}

impl NodeOptions {
    /// Return these options with `no_parameters` set.
    pub fn with_no_parameters(mut self, no_parameters: bool) -> Self {
        self.no_parameters = no_parameters;
        self
    }

    /// Return these options with a different allocator.
    pub fn with_allocator(mut self, allocator: Allocator) -> Self {
        self.allocator = allocator;
        self
    }
}

impl Default for NodeOptions {
    /// `no_parameters = false`, process-default allocator.
    fn default() -> Self {
        Self {
            no_parameters: false,
            allocator: Allocator::system(),
        }
    }
}

/// The baseline options used when `init` is given `None`.
pub fn default_options() -> NodeOptions {
    NodeOptions::default()
}

/// Serialisable part of [`NodeOptions`].
///
/// The allocator is a runtime capability and is supplied separately.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeOptionsConfig {
    pub no_parameters: bool,
}

impl NodeOptionsConfig {
    pub fn into_options(self, allocator: Allocator) -> NodeOptions {
        NodeOptions {
            no_parameters: self.no_parameters,
            allocator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::SystemAllocator;
    use std::sync::Arc;

    #[test]
    fn test_default_options() {
        let options = default_options();
        assert!(!options.no_parameters);
        assert_eq!(options.allocator, Allocator::system());
        assert_eq!(options, NodeOptions::default());
    }

    #[test]
    fn test_modifiers() {
        let custom = Allocator::new(Arc::new(SystemAllocator::default()));
        let options = NodeOptions::default()
            .with_no_parameters(true)
            .with_allocator(custom.clone());

        assert!(options.no_parameters);
        assert_eq!(options.allocator, custom);
        assert_ne!(options, NodeOptions::default());
    }

    #[test]
    fn test_config_from_json() {
        let config: NodeOptionsConfig = serde_json::from_str(r#"{"no_parameters": true}"#).unwrap();
        let options = config.into_options(Allocator::system());
        assert!(options.no_parameters);

        let empty: NodeOptionsConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.into_options(Allocator::system()), NodeOptions::default());
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        let parsed = serde_json::from_str::<NodeOptionsConfig>(r#"{"anonymous_name": true}"#);
        assert!(parsed.is_err());
    }
}
