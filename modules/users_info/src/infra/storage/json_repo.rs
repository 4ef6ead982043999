use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use crate::contract::model::{NewUser, User, UsersSnapshot};
use crate::domain::repo::UsersRepository;
use crate::infra::storage::json_store::{JsonFileStore, StoreError};
use crate::infra::storage::mapper::{document_to_snapshot, record_to_contract};

/// `UsersRepository` backed by the JSON document store.
///
/// File I/O and the store's write lock are blocking, so every call runs on
/// the blocking pool and never parks a runtime worker.
#[derive(Clone)]
pub struct JsonUsersRepository {
    store: Arc<JsonFileStore>,
}

impl JsonUsersRepository {
    pub fn new(store: Arc<JsonFileStore>) -> Self {
        Self { store }
    }

    async fn run<T, F>(&self, f: F) -> anyhow::Result<Result<T, StoreError>>
    where
        T: Send + 'static,
        F: FnOnce(&JsonFileStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .context("users store task did not complete")
    }
}

/// NotFound becomes `None`; everything else stays an error.
fn found<T>(res: Result<T, StoreError>) -> anyhow::Result<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl UsersRepository for JsonUsersRepository {
    async fn snapshot(&self) -> anyhow::Result<UsersSnapshot> {
        let doc = self.run(|s| s.list()).await??;
        Ok(document_to_snapshot(doc))
    }

    async fn find_by_id(&self, id: u64) -> anyhow::Result<Option<User>> {
        let res = self.run(move |s| s.get(id)).await?;
        Ok(found(res)?.map(record_to_contract))
    }

    async fn create(&self, new_user: NewUser) -> anyhow::Result<User> {
        let record = self
            .run(move |s| s.create(&new_user.display_name, &new_user.email))
            .await??;
        Ok(record_to_contract(record))
    }

    async fn rename(&self, id: u64, display_name: String) -> anyhow::Result<Option<User>> {
        let res = self.run(move |s| s.update(id, &display_name)).await?;
        Ok(found(res)?.map(record_to_contract))
    }

    async fn delete(&self, id: u64) -> anyhow::Result<bool> {
        let res = self.run(move |s| s.delete(id)).await?;
        Ok(found(res)?.is_some())
    }
}
