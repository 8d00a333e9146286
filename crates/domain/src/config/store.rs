use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::access::ClassAccessConfig;

/// Where access policy and quota balances live.
///
/// With no `sqlite_path` an in-memory store is used, seeded from `classes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
    /// Free queries granted to a user the first time their balance is read.
    #[serde(default = "d_default_tokens")]
    pub default_tokens: u32,
    /// Class access configs inserted at startup (upserted into SQLite).
    #[serde(default)]
    pub classes: Vec<ClassAccessConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: None,
            default_tokens: d_default_tokens(),
            classes: Vec::new(),
        }
    }
}

fn d_default_tokens() -> u32 {
    20
}
