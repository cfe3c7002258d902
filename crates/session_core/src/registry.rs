use std::{collections::HashMap, sync::Arc};

use shared::domain::AccountId;
use tokio::sync::RwLock;
use tracing::info;

use crate::{
    error::{SessionError, SessionResult},
    CredentialProvider, SessionFactory, SessionHandle,
};

/// One live handle per account. Evicting callers drain in-flight work first.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<AccountId, Arc<dyn SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn get(&self, account: AccountId) -> SessionResult<Arc<dyn SessionHandle>> {
        self.sessions
            .read()
            .await
            .get(&account)
            .cloned()
            .ok_or(SessionError::SessionNotFound { account })
    }

    pub async fn put(&self, account: AccountId, handle: Arc<dyn SessionHandle>) {
        let displaced = self.sessions.write().await.insert(account, handle);
        if let Some(previous) = displaced {
            info!(account = account.0, "session: replacing live handle");
            previous.close();
        }
    }

    pub async fn remove(&self, account: AccountId) -> bool {
        let removed = self.sessions.write().await.remove(&account);
        match removed {
            Some(handle) => {
                info!(account = account.0, "session: evicted");
                handle.close();
                true
            }
            None => false,
        }
    }

    pub async fn open(
        &self,
        account: AccountId,
        credentials: &dyn CredentialProvider,
        factory: &dyn SessionFactory,
    ) -> SessionResult<Arc<dyn SessionHandle>> {
        let params = credentials
            .connection_params(account)
            .await
            .map_err(SessionError::Credentials)?;
        let handle = factory
            .create(params)
            .await
            .map_err(SessionError::Connect)?;
        self.put(account, handle.clone()).await;
        info!(account = account.0, "session: opened");
        Ok(handle)
    }

    pub async fn accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<_> = self.sessions.read().await.keys().copied().collect();
        accounts.sort();
        accounts
    }

    pub async fn shutdown(&self) {
        let drained: Vec<_> = self.sessions.write().await.drain().collect();
        for (account, handle) in drained {
            info!(account = account.0, "session: shutting down");
            handle.close();
        }
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
