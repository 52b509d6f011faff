//! Owner-scoped persistence behind async trait seams.
//!
//! The in-memory backends are the only implementations shipped; the
//! traits are the boundary a relational store would plug into. Every
//! workflow/credential query filters by owner, so a miss and a foreign
//! record are indistinguishable to callers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentflow_workflow::WorkflowPayload;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Email already registered")]
    EmailTaken,
}

/// A registered account.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
}

/// A stored workflow definition.
#[derive(Debug, Clone)]
pub struct StoredWorkflow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub data: WorkflowPayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A stored credential record; `encrypted_data` is the `$enc$` string.
#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub credential_type: String,
    pub encrypted_data: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: User) -> Result<User, StoreError>;
    async fn get(&self, id: Uuid) -> Option<User>;
    async fn find_by_email(&self, email: &str) -> Option<User>;
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn insert(&self, workflow: StoredWorkflow) -> StoredWorkflow;
    async fn get(&self, owner_id: Uuid, id: Uuid) -> Option<StoredWorkflow>;
    async fn list(&self, owner_id: Uuid) -> Vec<StoredWorkflow>;
    async fn delete(&self, owner_id: Uuid, id: Uuid) -> bool;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert(&self, credential: StoredCredential) -> StoredCredential;
    async fn get(&self, owner_id: Uuid, id: Uuid) -> Option<StoredCredential>;
    async fn list(&self, owner_id: Uuid) -> Vec<StoredCredential>;
}

/// In-memory user store.
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::EmailTaken);
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get(&self, id: Uuid) -> Option<User> {
        self.users.read().await.get(&id).cloned()
    }

    async fn find_by_email(&self, email: &str) -> Option<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned()
    }
}

/// In-memory workflow store.
pub struct MemoryWorkflowStore {
    workflows: Arc<RwLock<HashMap<Uuid, StoredWorkflow>>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self {
            workflows: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryWorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn insert(&self, workflow: StoredWorkflow) -> StoredWorkflow {
        self.workflows
            .write()
            .await
            .insert(workflow.id, workflow.clone());
        workflow
    }

    async fn get(&self, owner_id: Uuid, id: Uuid) -> Option<StoredWorkflow> {
        self.workflows
            .read()
            .await
            .get(&id)
            .filter(|w| w.owner_id == owner_id)
            .cloned()
    }

    async fn list(&self, owner_id: Uuid) -> Vec<StoredWorkflow> {
        let mut owned: Vec<StoredWorkflow> = self
            .workflows
            .read()
            .await
            .values()
            .filter(|w| w.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by_key(|w| w.created_at);
        owned
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> bool {
        let mut workflows = self.workflows.write().await;
        match workflows.get(&id) {
            Some(w) if w.owner_id == owner_id => {
                workflows.remove(&id);
                true
            }
            _ => false,
        }
    }
}

/// In-memory credential store.
pub struct MemoryCredentialStore {
    credentials: Arc<RwLock<HashMap<Uuid, StoredCredential>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            credentials: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn insert(&self, credential: StoredCredential) -> StoredCredential {
        self.credentials
            .write()
            .await
            .insert(credential.id, credential.clone());
        credential
    }

    async fn get(&self, owner_id: Uuid, id: Uuid) -> Option<StoredCredential> {
        self.credentials
            .read()
            .await
            .get(&id)
            .filter(|c| c.owner_id == owner_id)
            .cloned()
    }

    async fn list(&self, owner_id: Uuid) -> Vec<StoredCredential> {
        let mut owned: Vec<StoredCredential> = self
            .credentials
            .read()
            .await
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by_key(|c| c.created_at);
        owned
    }
}
