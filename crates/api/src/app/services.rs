use std::sync::Arc;

use chrono::{DateTime, Utc};

use assettag_auth::{Hs256TokenCodec, TokenCodec};
use assettag_infra::{
    AppConfig, CredentialStore, InMemoryCredentialStore, PostgresCredentialStore, StoreBackend, db,
};

/// Source of "now" for token windows and the trial gate.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Shared handles every handler and middleware works through.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub tokens: Arc<dyn TokenCodec>,
    clock: Clock,
}

impl AppState {
    pub fn new(store: Arc<dyn CredentialStore>, tokens: Arc<dyn TokenCodec>) -> Self {
        Self {
            store,
            tokens,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

impl core::fmt::Debug for AppState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

/// Wire the store and token codec selected by `config`.
pub async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let tokens = Arc::new(Hs256TokenCodec::new(config.jwt_secret.as_bytes())?);

    let store: Arc<dyn CredentialStore> = match &config.store {
        StoreBackend::Postgres(db_config) => {
            let pool = db::connect(db_config).await?;
            Arc::new(PostgresCredentialStore::new(pool))
        }
        StoreBackend::InMemory => {
            tracing::warn!("using in-memory credential store; data is lost on restart");
            Arc::new(InMemoryCredentialStore::new())
        }
    };

    Ok(AppState::new(store, tokens))
}
