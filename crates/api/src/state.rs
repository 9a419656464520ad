//! Application state shared across handlers.

use std::sync::Arc;

use crate::ai::{AiClients, AiError};
use crate::cache::CacheStore;
use crate::config::ApiConfig;
use crate::db::{self, DraftStore, FarmerStore};
use crate::services::{AccountService, EmailService, JwtService, RegistrationService};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("AI client setup failed: {0}")]
    Ai(#[from] AiError),
    #[error("SMTP setup failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the stores, cache, and external clients.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    drafts: DraftStore,
    farmers: FarmerStore,
    cache: CacheStore,
    jwt: JwtService,
    ai: AiClients,
    email: EmailService,
}

impl AppState {
    /// Connect to every configured backend and build the state.
    ///
    /// Without a database URL the stores are in-memory; an unreachable Redis
    /// falls back to the in-memory cache.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if the database is configured but unreachable, or
    /// if the AI or SMTP clients cannot be built.
    pub async fn connect(config: ApiConfig) -> Result<Self, StateError> {
        let (drafts, farmers) = match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url).await?;
                tracing::info!("Database pool created");
                (
                    DraftStore::postgres(pool.clone(), config.draft_ttl),
                    FarmerStore::postgres(pool),
                )
            }
            None => {
                tracing::warn!("No database configured, using in-memory stores (data is not persisted)");
                (DraftStore::in_memory(config.draft_ttl), FarmerStore::in_memory())
            }
        };
        let cache = CacheStore::connect(&config.cache).await;

        Self::from_parts(config, drafts, farmers, cache)
    }

    /// Build state around already-constructed stores.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if the AI or SMTP clients cannot be built.
    pub fn from_parts(
        config: ApiConfig,
        drafts: DraftStore,
        farmers: FarmerStore,
        cache: CacheStore,
    ) -> Result<Self, StateError> {
        let jwt = JwtService::new(&config.jwt_secret, config.jwt_ttl);
        let ai = AiClients::from_config(&config.ai)?;
        let email = match &config.email {
            Some(email) => EmailService::new(email, &config.base_url)?,
            None => {
                tracing::warn!("SMTP not configured, emails will be logged instead of sent");
                EmailService::log_only(&config.base_url)
            }
        };

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                drafts,
                farmers,
                cache,
                jwt,
                ai,
                email,
            }),
        })
    }

    /// State with in-memory stores and cache, for tests and local runs.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if the AI or SMTP clients cannot be built.
    pub fn in_memory(config: ApiConfig) -> Result<Self, StateError> {
        let drafts = DraftStore::in_memory(config.draft_ttl);
        let cache = CacheStore::in_memory(config.cache.max_capacity);
        Self::from_parts(config, drafts, FarmerStore::in_memory(), cache)
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Registration draft store.
    #[must_use]
    pub fn drafts(&self) -> &DraftStore {
        &self.inner.drafts
    }

    /// Permanent farmer store.
    #[must_use]
    pub fn farmers(&self) -> &FarmerStore {
        &self.inner.farmers
    }

    /// Shared cache.
    #[must_use]
    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    /// Token issuer and verifier.
    #[must_use]
    pub fn jwt(&self) -> &JwtService {
        &self.inner.jwt
    }

    /// External AI clients.
    #[must_use]
    pub fn ai(&self) -> &AiClients {
        &self.inner.ai
    }

    /// Registration flow over this state's stores.
    #[must_use]
    pub fn registration(&self) -> RegistrationService<'_> {
        RegistrationService::new(
            &self.inner.drafts,
            &self.inner.farmers,
            &self.inner.jwt,
            &self.inner.email,
        )
    }

    /// Account flows over this state's stores.
    #[must_use]
    pub fn accounts(&self) -> AccountService<'_> {
        AccountService::new(&self.inner.farmers, &self.inner.jwt, &self.inner.email)
    }
}
