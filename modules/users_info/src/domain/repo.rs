use crate::contract::model::{NewUser, User, UsersSnapshot};
use async_trait::async_trait;

/// Port for the domain layer: persistence operations the domain needs.
/// Object-safe and async-friendly via `async_trait`.
///
/// Ids and timestamps are assigned by the repository, inside the same
/// critical section that persists the change.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    /// Whole collection: id counter plus every user.
    async fn snapshot(&self) -> anyhow::Result<UsersSnapshot>;
    /// Load a user by id.
    async fn find_by_id(&self, id: u64) -> anyhow::Result<Option<User>>;
    /// Allocate the next id and persist the new user.
    async fn create(&self, new_user: NewUser) -> anyhow::Result<User>;
    /// Set the display name. Returns None if the user does not exist.
    async fn rename(&self, id: u64, display_name: String) -> anyhow::Result<Option<User>>;
    /// Delete by id. Returns true if a user was deleted.
    async fn delete(&self, id: u64) -> anyhow::Result<bool>;
}
