use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, LifecycleItemId};

use crate::photos::PhotoSet;

pub const DEFAULT_PRODUCT: &str = "Commande";
pub const DEFAULT_SUPPLIER: &str = "Dépôt";

/// Where a batch currently sits. Only `Received` can move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Received,
    Installed,
    Defective,
}

impl LifecycleStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            LifecycleStatus::Received => "received",
            LifecycleStatus::Installed => "installed",
            LifecycleStatus::Defective => "defective",
        }
    }

    /// Display label shown in listings.
    pub const fn label(self) -> &'static str {
        match self {
            LifecycleStatus::Received => "Reçu",
            LifecycleStatus::Installed => "Installé",
            LifecycleStatus::Defective => "Défectueux",
        }
    }
}

impl FromStr for LifecycleStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(LifecycleStatus::Received),
            "installed" => Ok(LifecycleStatus::Installed),
            "defective" => Ok(LifecycleStatus::Defective),
            other => Err(DomainError::validation(format!(
                "unknown lifecycle status: {other}"
            ))),
        }
    }
}

impl core::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked physical batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleItem {
    pub id: LifecycleItemId,
    pub status: LifecycleStatus,
    pub product: String,
    pub supplier: String,
    pub client: String,
    pub date: NaiveDate,
    pub photos: PhotoSet,
    pub quantity: i64,
    /// Set when the record left `Received`; absent for direct defective entries.
    pub received_id: Option<LifecycleItemId>,
    pub installed_date: Option<DateTime<Utc>>,
    pub defective_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LifecycleItem {
    /// Build a fresh record from validated input.
    pub fn create(
        id: LifecycleItemId,
        status: LifecycleStatus,
        new: NewLifecycleItem,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            status,
            product: new.details.product,
            supplier: new.details.supplier,
            client: new.details.client,
            date: new.details.date,
            photos: new.photos,
            quantity: 1,
            received_id: None,
            installed_date: None,
            defective_date: (status == LifecycleStatus::Defective).then_some(now),
            created_at: now,
        }
    }

    pub fn photos_paths(&self) -> Vec<String> {
        self.photos.to_external_list()
    }

    /// Whether this received record duplicates the given intake details.
    pub fn matches_intake(&self, details: &LifecycleDetails) -> bool {
        self.status == LifecycleStatus::Received
            && self.product == details.product
            && self.supplier == details.supplier
            && self.client == details.client
            && self.date == details.date
    }

    fn ensure_received(&self) -> DomainResult<()> {
        if self.status == LifecycleStatus::Received {
            Ok(())
        } else {
            Err(DomainError::not_found("received item", self.id))
        }
    }

    /// Received → Installed.
    ///
    /// Client falls back to the record's own client, photos to the record's
    /// consolidated set. A photo override may only reorder or drop photos
    /// this record already holds.
    pub fn install(&self, installation: &Installation, now: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_received()?;
        let installation = installation.clone().validated()?;

        let client = installation
            .client
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.client.clone());
        let photos = match installation.photos {
            Some(list) => {
                let held = self.photos_paths();
                if let Some(foreign) = list.iter().find(|p| !held.contains(p)) {
                    return Err(DomainError::validation(format!(
                        "photo {foreign} does not belong to received item {}",
                        self.id
                    )));
                }
                PhotoSet::from_external_list(list)
            }
            None => self.photos.clone(),
        };

        Ok(Self {
            status: LifecycleStatus::Installed,
            client,
            photos,
            quantity: installation.quantity.unwrap_or(1),
            received_id: Some(self.id),
            installed_date: Some(now),
            ..self.clone()
        })
    }

    /// Received → Defective. Every field and photo is carried over.
    pub fn mark_defective(&self, now: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_received()?;
        Ok(Self {
            status: LifecycleStatus::Defective,
            received_id: Some(self.id),
            defective_date: Some(now),
            ..self.clone()
        })
    }

    /// Replace the descriptive fields of a received record.
    pub fn edited(&self, details: LifecycleDetails) -> DomainResult<Self> {
        self.ensure_received()?;
        Ok(Self {
            product: details.product,
            supplier: details.supplier,
            client: details.client,
            date: details.date,
            ..self.clone()
        })
    }
}

/// A committed change of a received record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub before: LifecycleItem,
    pub after: LifecycleItem,
}

impl Transition {
    /// Photos the record referenced before the change and no longer does.
    pub fn released_photos(&self) -> Vec<String> {
        let kept = self.after.photos_paths();
        self.before
            .photos_paths()
            .into_iter()
            .filter(|p| !kept.contains(p))
            .collect()
    }
}

/// Raw descriptive fields as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LifecycleFields {
    pub product: Option<String>,
    pub supplier: Option<String>,
    pub client: Option<String>,
    pub date: Option<NaiveDate>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl LifecycleFields {
    /// Resolve fields for intake or edit: product and supplier have defaults,
    /// date defaults to `today`, client is required.
    pub fn for_intake(self, today: NaiveDate) -> DomainResult<LifecycleDetails> {
        let client = non_blank(self.client)
            .ok_or_else(|| DomainError::validation("client is required"))?;
        Ok(LifecycleDetails {
            product: non_blank(self.product).unwrap_or_else(|| DEFAULT_PRODUCT.to_string()),
            supplier: non_blank(self.supplier).unwrap_or_else(|| DEFAULT_SUPPLIER.to_string()),
            client,
            date: self.date.unwrap_or(today),
        })
    }

    /// Resolve fields for a defective entry with no received counterpart:
    /// product, supplier and client are all required.
    pub fn for_direct_defective(self, today: NaiveDate) -> DomainResult<LifecycleDetails> {
        let product = non_blank(self.product);
        let supplier = non_blank(self.supplier);
        let client = non_blank(self.client);
        match (product, supplier, client) {
            (Some(product), Some(supplier), Some(client)) => Ok(LifecycleDetails {
                product,
                supplier,
                client,
                date: self.date.unwrap_or(today),
            }),
            _ => Err(DomainError::validation(
                "product, supplier and client are required",
            )),
        }
    }
}

/// Resolved descriptive fields of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleDetails {
    pub product: String,
    pub supplier: String,
    pub client: String,
    pub date: NaiveDate,
}

/// Validated input for a new record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLifecycleItem {
    pub details: LifecycleDetails,
    pub photos: PhotoSet,
}

/// Overrides supplied when installing a received batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Installation {
    pub quantity: Option<i64>,
    pub client: Option<String>,
    pub photos: Option<Vec<String>>,
}

impl Installation {
    pub fn validated(self) -> DomainResult<Self> {
        if let Some(q) = self.quantity {
            if q < 1 {
                return Err(DomainError::validation("quantity must be at least 1"));
            }
        }
        Ok(Self {
            client: self.client.map(|c| c.trim().to_string()),
            ..self
        })
    }
}

/// Outcome of an intake: a new record, or the received record it duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intake {
    Created(LifecycleItem),
    Existing(LifecycleItem),
}

impl Intake {
    pub fn item(&self) -> &LifecycleItem {
        match self {
            Intake::Created(item) | Intake::Existing(item) => item,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Intake::Existing(_))
    }
}
