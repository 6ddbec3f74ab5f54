//! Service wiring shared by every handler.

use std::path::PathBuf;
use std::sync::Arc;

use stockflow_auth::{Hs256JwtValidator, JwtValidator, TriggerToken};
use stockflow_core::SharedClock;
use stockflow_infra::{
    InMemoryStore, InventoryService, LifecycleService, LocalPhotoStorage, Mailer, PostgresStore,
    Settings, SharedStore, StockNotifier, StoreError, ToolService,
};
use stockflow_notifications::NotificationWindow;

use crate::middleware::AuthState;

pub struct AppServices {
    pub inventory: InventoryService,
    pub lifecycle: LifecycleService,
    pub tools: ToolService,
    pub notifier: Arc<StockNotifier>,
    pub jwt: Arc<dyn JwtValidator>,
    pub trigger_token: Option<TriggerToken>,
    pub clock: SharedClock,
    pub upload_dir: PathBuf,
}

impl AppServices {
    pub fn new(
        store: SharedStore,
        mailer: Arc<dyn Mailer>,
        clock: SharedClock,
        settings: &Settings,
    ) -> Self {
        let photos = Arc::new(LocalPhotoStorage::new(settings.upload_dir.clone()));
        let notifier = Arc::new(StockNotifier::new(
            store.clone(),
            mailer,
            clock.clone(),
            NotificationWindow::hours(settings.notify_window_hours),
            settings.notify_timezone,
        ));

        Self {
            inventory: InventoryService::new(store.clone(), clock.clone()),
            tools: ToolService::new(store.clone()),
            lifecycle: LifecycleService::new(store, photos, clock.clone()),
            notifier,
            jwt: Arc::new(Hs256JwtValidator::new(settings.jwt_secret.as_bytes())),
            trigger_token: settings.notify_token.clone().and_then(TriggerToken::new),
            clock,
            upload_dir: settings.upload_dir.clone(),
        }
    }

    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt: self.jwt.clone(),
            clock: self.clock.clone(),
        }
    }
}

/// Postgres when `DATABASE_URL` is set (migrations applied), the in-memory
/// store otherwise.
pub async fn connect_store(settings: &Settings) -> Result<SharedStore, StoreError> {
    match &settings.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url).await?;
            store.migrate().await?;
            tracing::info!("using postgres store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; data lives in memory only");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}
