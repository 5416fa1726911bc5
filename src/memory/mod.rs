//! Persistence collaborators — consumed as traits; only
//! in-memory reference implementations live here so this crate's own tests
//! can exercise checkpoint/rollback without a real database.

mod runnable_config;

pub use runnable_config::RunnableConfig;

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone)]
pub enum MemoryError {
    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),
    #[error("store error: {0}")]
    Store(String),
}

/// Append-only checkpoint save/get/list, scoped by conversation.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, conversation_id: &str, payload: Value) -> Result<String, MemoryError>;
    async fn get(&self, conversation_id: &str, id: &str) -> Result<Option<Value>, MemoryError>;
    async fn list(&self, conversation_id: &str) -> Result<Vec<String>, MemoryError>;
}

/// Long-term key-value store scoped by namespace, used by `MemoryService`.
#[async_trait]
pub trait Store: Send + Sync {
    async fn put(&self, namespace: &str, key: &str, value: Value) -> Result<(), MemoryError>;
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, MemoryError>;
}

/// Opaque conversation switch — only `switch_conversation` is required by
/// the core.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn switch_conversation(&self, conversation_id: &str) -> Result<(), MemoryError>;
}

/// Loads a named memory record, or assembles all records for a conversation.
#[async_trait]
pub trait MemoryService: Send + Sync {
    async fn load(&self, conversation_id: &str, record: &str) -> Result<Option<Value>, MemoryError>;
    async fn assemble(&self, conversation_id: &str) -> Result<Vec<Value>, MemoryError>;
}

/// In-memory `Checkpointer`, keyed by conversation then checkpoint id.
#[derive(Default)]
pub struct InMemoryCheckpointer {
    checkpoints: RwLock<HashMap<String, Vec<(String, Value)>>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, conversation_id: &str, payload: Value) -> Result<String, MemoryError> {
        let id = Uuid::new_v4().to_string();
        let mut checkpoints = self.checkpoints.write().unwrap();
        checkpoints
            .entry(conversation_id.to_string())
            .or_default()
            .push((id.clone(), payload));
        Ok(id)
    }

    async fn get(&self, conversation_id: &str, id: &str) -> Result<Option<Value>, MemoryError> {
        let checkpoints = self.checkpoints.read().unwrap();
        Ok(checkpoints
            .get(conversation_id)
            .and_then(|list| list.iter().find(|(cid, _)| cid == id))
            .map(|(_, payload)| payload.clone()))
    }

    async fn list(&self, conversation_id: &str) -> Result<Vec<String>, MemoryError> {
        let checkpoints = self.checkpoints.read().unwrap();
        Ok(checkpoints
            .get(conversation_id)
            .map(|list| list.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default())
    }
}

/// In-memory `Store`, keyed by `(namespace, key)`.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<(String, String), Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn put(&self, namespace: &str, key: &str, value: Value) -> Result<(), MemoryError> {
        self.entries
            .write()
            .unwrap()
            .insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, MemoryError> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }
}
