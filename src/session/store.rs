use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::session::SessionData;

/// Server-side session storage. The in-memory implementation below is the
/// default; the trait is the seam for an external store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, String>;
    async fn save(&self, id: &str, data: SessionData) -> Result<(), String>;
    async fn delete(&self, id: &str) -> Result<(), String>;
}

pub struct MemoryStore {
    entries: DashMap<String, (SessionData, Instant)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Drop sessions that have not been saved within `max_age`.
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.entries
            .retain(|_, (_, saved_at)| now.duration_since(*saved_at) < max_age);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, String> {
        Ok(self.entries.get(id).map(|e| e.value().0.clone()))
    }

    async fn save(&self, id: &str, data: SessionData) -> Result<(), String> {
        self.entries.insert(id.to_string(), (data, Instant::now()));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), String> {
        self.entries.remove(id);
        Ok(())
    }
}
