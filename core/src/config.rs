//! Core Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use std::env;

/// Default maximum display-name length, in characters.
const DEFAULT_MAX_NAME_LENGTH: usize = 100;

/// Default maximum number of nodes in a single guild tree.
const DEFAULT_MAX_NODES_PER_TREE: usize = 10_000;

/// Core configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Maximum display-name length in characters (default: 100)
    pub max_name_length: usize,

    /// Maximum number of nodes in one tree, root included (default: 10000)
    pub max_nodes_per_tree: usize,
}

impl CoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let max_name_length = match env::var("MUSTER_MAX_NAME_LENGTH") {
            Ok(v) => v
                .parse()
                .context("MUSTER_MAX_NAME_LENGTH must be an integer")?,
            Err(_) => DEFAULT_MAX_NAME_LENGTH,
        };

        let max_nodes_per_tree = match env::var("MUSTER_MAX_NODES_PER_TREE") {
            Ok(v) => v
                .parse()
                .context("MUSTER_MAX_NODES_PER_TREE must be an integer")?,
            Err(_) => DEFAULT_MAX_NODES_PER_TREE,
        };

        Ok(Self {
            max_name_length,
            max_nodes_per_tree,
        })
    }

    /// Default configuration for tests, without touching the environment.
    pub const fn default_for_test() -> Self {
        Self {
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            max_nodes_per_tree: DEFAULT_MAX_NODES_PER_TREE,
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::default_for_test()
    }
}
