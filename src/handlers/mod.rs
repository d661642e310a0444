use std::sync::Arc;

use crate::{
    auth::{JwtService, PasswordService, DECOY_PASSWORD},
    config::Config,
    database::{self, ImageStore, Stores, UserStore},
    errors::Result,
    services::{MetricsService, Reconciler},
    storage::{create_storage, Storage},
};

pub mod auth;
pub mod health;
pub mod images;
pub mod metrics;

/// Everything a request handler may touch. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<dyn UserStore>,
    pub images: Arc<dyn ImageStore>,
    pub storage: Arc<dyn Storage>,
    pub jwt: Arc<JwtService>,
    pub metrics: Arc<MetricsService>,
    /// Verified against when a login names an unknown email.
    pub password_decoy: Arc<str>,
}

impl AppState {
    pub fn new(config: Config, stores: Stores, storage: Arc<dyn Storage>) -> Result<Self> {
        let password_decoy = PasswordService::hash_password(DECOY_PASSWORD, config.bcrypt_cost)?;

        Ok(Self {
            password_decoy: Arc::from(password_decoy),
            jwt: Arc::new(JwtService::new(&config.jwt_secret)),
            metrics: Arc::new(MetricsService::new()?),
            config: Arc::new(config),
            users: stores.users,
            images: stores.images,
            storage,
        })
    }

    /// Connects the database and storage backend named by `config`.
    pub async fn from_config(config: Config) -> Result<Self> {
        let stores = database::connect(&config).await?;
        let storage = create_storage(&config.storage)?;
        tracing::info!(backend = storage.backend_name(), "storage backend ready");

        Self::new(config, stores, storage)
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.images.clone(),
            self.storage.clone(),
            self.metrics.clone(),
            self.config.reconcile_grace,
            self.config.timeouts.storage,
        )
    }
}
