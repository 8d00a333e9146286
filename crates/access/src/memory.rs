//! In-memory [`CredentialStore`].
//!
//! Lock-protected maps; every counter mutation happens under a single
//! `parking_lot::Mutex` guard so the check and the write cannot interleave.

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};

use tg_domain::access::ClassAccessConfig;
use tg_domain::error::Result;

use crate::store::CredentialStore;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MemoryCredentialStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct MemoryCredentialStore {
    default_tokens: u32,
    classes: RwLock<HashMap<String, ClassAccessConfig>>,
    quotas: Mutex<HashMap<String, u32>>,
    class_queries: Mutex<HashMap<(String, String), u32>>,
}

impl MemoryCredentialStore {
    pub fn new(default_tokens: u32) -> Self {
        Self {
            default_tokens,
            classes: RwLock::new(HashMap::new()),
            quotas: Mutex::new(HashMap::new()),
            class_queries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert or replace a class's policy.
    pub fn put_class(&self, config: ClassAccessConfig) {
        self.classes.write().insert(config.class_id.clone(), config);
    }

    /// Overwrite a user's balance (replenishment is an admin action).
    pub fn set_quota(&self, user_id: &str, tokens: u32) {
        self.quotas.lock().insert(user_id.to_string(), tokens);
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn class_config(&self, class_id: &str) -> Result<Option<ClassAccessConfig>> {
        Ok(self.classes.read().get(class_id).cloned())
    }

    async fn quota_balance(&self, user_id: &str) -> Result<u32> {
        Ok(self
            .quotas
            .lock()
            .get(user_id)
            .copied()
            .unwrap_or(self.default_tokens))
    }

    async fn decrement_quota_if_positive(&self, user_id: &str) -> Result<Option<u32>> {
        let mut quotas = self.quotas.lock();
        let balance = quotas
            .entry(user_id.to_string())
            .or_insert(self.default_tokens);
        if *balance == 0 {
            return Ok(None);
        }
        *balance -= 1;
        Ok(Some(*balance))
    }

    async fn class_queries_used(&self, class_id: &str, user_id: &str) -> Result<u32> {
        let key = (class_id.to_string(), user_id.to_string());
        Ok(self.class_queries.lock().get(&key).copied().unwrap_or(0))
    }

    async fn increment_class_queries_below(
        &self,
        class_id: &str,
        user_id: &str,
        limit: u32,
    ) -> Result<Option<u32>> {
        let mut counts = self.class_queries.lock();
        let used = counts
            .entry((class_id.to_string(), user_id.to_string()))
            .or_insert(0);
        if *used >= limit {
            return Ok(None);
        }
        *used += 1;
        Ok(Some(*used))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
