use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use runtime::paths::resolve_under;
use tracing::{debug, info};

use crate::api::rest::routes;
use crate::config::UsersInfoConfig;
use crate::contract::client::UsersInfoApi;
use crate::domain::service::{Service, ServiceConfig};
use crate::gateways::local::UsersInfoLocalClient;
use crate::infra::storage::{JsonFileStore, JsonUsersRepository};

/// Wired users module: JSON store → repository → domain service.
///
/// Built once at startup and shared; the store inside owns the write lock.
#[derive(Clone)]
pub struct UsersInfo {
    service: Arc<Service>,
    storage_path: PathBuf,
}

impl UsersInfo {
    pub const NAME: &'static str = "users_info";

    /// Build the module and make sure the backing document exists.
    ///
    /// Relative `storage_path` values are resolved against `home_dir`; the
    /// parent directory is created if missing.
    pub async fn init(cfg: &UsersInfoConfig, home_dir: &Path) -> anyhow::Result<Self> {
        info!("Initializing users_info module");
        debug!(
            "Loaded users_info config: storage_path={}, max_display_name_length={}",
            cfg.storage_path, cfg.max_display_name_length
        );

        let storage_path = resolve_under(&cfg.storage_path, home_dir);
        if let Some(dir) = storage_path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("cannot create storage directory {}", dir.display()))?;
        }

        let store = Arc::new(JsonFileStore::new(&storage_path));
        let init_store = store.clone();
        tokio::task::spawn_blocking(move || init_store.ensure_document())
            .await
            .context("users store init task did not complete")?
            .context("cannot initialize users document")?;
        info!(path = %storage_path.display(), "Users document ready");

        let repo = JsonUsersRepository::new(store);
        let service = Service::new(
            Arc::new(repo),
            ServiceConfig {
                max_display_name_length: cfg.max_display_name_length,
            },
        );

        Ok(Self {
            service: Arc::new(service),
            storage_path,
        })
    }

    pub fn service(&self) -> Arc<Service> {
        self.service.clone()
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// In-process client for other modules.
    pub fn client(&self) -> Arc<dyn UsersInfoApi> {
        Arc::new(UsersInfoLocalClient::new(self.service.clone()))
    }

    /// Attach the users REST routes to `router`.
    pub fn register_rest(&self, router: axum::Router) -> axum::Router {
        info!("Registering users_info REST routes");
        routes::register_routes(router, self.service.clone())
    }
}
