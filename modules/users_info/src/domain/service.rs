use std::sync::Arc;

use crate::contract::model::{NewUser, User, UserPatch, UsersSnapshot};
use crate::domain::error::DomainError;
use crate::domain::repo::UsersRepository;
use tracing::{debug, error, info, instrument};

/// Business rules for the users collection.
///
/// Validation happens here, before the repository is touched, so a rejected
/// request never allocates an id or rewrites the document.
#[derive(Clone)]
pub struct Service {
    repo: Arc<dyn UsersRepository>,
    config: ServiceConfig,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub max_display_name_length: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_display_name_length: 100,
        }
    }
}

/// Log a repository failure and turn it into `DomainError::Storage`.
fn storage_failure(action: &'static str) -> impl FnOnce(anyhow::Error) -> DomainError {
    move |e| {
        error!(error = %format!("{e:#}"), "users repository failed to {action}");
        DomainError::storage(&e)
    }
}

impl Service {
    pub fn new(repo: Arc<dyn UsersRepository>, config: ServiceConfig) -> Self {
        Self { repo, config }
    }

    #[instrument(name = "users_info.service.list_users", skip(self))]
    pub async fn list_users(&self) -> Result<UsersSnapshot, DomainError> {
        let snapshot = self
            .repo
            .snapshot()
            .await
            .map_err(storage_failure("read the collection"))?;

        debug!(
            count = snapshot.users.len(),
            increment = snapshot.increment,
            "collection read"
        );
        Ok(snapshot)
    }

    #[instrument(name = "users_info.service.get_user", skip(self), fields(user_id = %id))]
    pub async fn get_user(&self, id: u64) -> Result<User, DomainError> {
        self.repo
            .find_by_id(id)
            .await
            .map_err(storage_failure("read a user"))?
            .ok_or_else(|| {
                debug!("user not present");
                DomainError::user_not_found(id)
            })
    }

    #[instrument(
        name = "users_info.service.create_user",
        skip(self, new_user),
        fields(email = %new_user.email)
    )]
    pub async fn create_user(&self, new_user: NewUser) -> Result<User, DomainError> {
        if new_user.email.trim().is_empty() {
            return Err(DomainError::empty_email());
        }
        self.check_display_name(&new_user.display_name)?;

        let user = self
            .repo
            .create(new_user)
            .await
            .map_err(storage_failure("create a user"))?;

        info!(user_id = user.id, "user created");
        Ok(user)
    }

    /// Only the display name changes; email is fixed at creation.
    #[instrument(name = "users_info.service.update_user", skip(self, patch), fields(user_id = %id))]
    pub async fn update_user(&self, id: u64, patch: UserPatch) -> Result<User, DomainError> {
        self.check_display_name(&patch.display_name)?;

        let user = self
            .repo
            .rename(id, patch.display_name)
            .await
            .map_err(storage_failure("rename a user"))?
            .ok_or_else(|| DomainError::user_not_found(id))?;

        info!("user renamed");
        Ok(user)
    }

    #[instrument(name = "users_info.service.delete_user", skip(self), fields(user_id = %id))]
    pub async fn delete_user(&self, id: u64) -> Result<(), DomainError> {
        let deleted = self
            .repo
            .delete(id)
            .await
            .map_err(storage_failure("delete a user"))?;

        if !deleted {
            return Err(DomainError::user_not_found(id));
        }
        info!("user deleted");
        Ok(())
    }

    /// Non-blank and at most `max_display_name_length` characters.
    fn check_display_name(&self, display_name: &str) -> Result<(), DomainError> {
        if display_name.trim().is_empty() {
            return Err(DomainError::empty_display_name());
        }
        let max = self.config.max_display_name_length;
        match display_name.chars().count() {
            len if len > max => Err(DomainError::display_name_too_long(len, max)),
            _ => Ok(()),
        }
    }
}
