//! Infrastructure layer: persistence, mail transport, photo files,
//! configuration and the services that tie them to the domain rules.

pub mod config;
pub mod jobs;
pub mod mail;
pub mod photos;
pub mod services;
pub mod store;

pub use config::{ConfigError, MailSettings, Settings};
pub use jobs::DailyStockCheck;
pub use mail::{MailError, Mailer, RecordingMailer, SmtpMailer};
pub use photos::{LocalPhotoStorage, PhotoError, PhotoStorage};
pub use services::{
    InventoryService, LifecycleService, ServiceError, StockNotifier, ToolService,
};
pub use store::{InMemoryStore, PostgresStore, SharedStore, Store, StoreError};
