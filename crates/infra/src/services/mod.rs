//! Application services: the entry points the HTTP layer and the scheduler
//! call. Each one reads the clock, hands the domain rules to a store and
//! reports what happened.

mod lifecycle;
mod notifier;
mod orders;
mod tools;

pub use lifecycle::LifecycleService;
pub use notifier::StockNotifier;
pub use orders::InventoryService;
pub use tools::ToolService;

use thiserror::Error;

use stockflow_core::DomainError;
use stockflow_notifications::RenderError;

use crate::mail::MailError;
use crate::photos::PhotoError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error(transparent)]
    Photo(#[from] PhotoError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        ServiceError::Store(StoreError::Domain(err))
    }
}

impl ServiceError {
    /// The domain error behind this failure, if any.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Store(StoreError::Domain(e)) => Some(e),
            _ => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
