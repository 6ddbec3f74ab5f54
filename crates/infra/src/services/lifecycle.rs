use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use stockflow_core::{LifecycleItemId, SharedClock};
use stockflow_lifecycle::{
    Installation, Intake, LifecycleFields, LifecycleItem, LifecycleStatus, NewLifecycleItem,
    PhotoSet, Transition,
};

use super::ServiceResult;
use crate::photos::PhotoStorage;
use crate::store::{LifecycleRepository, SharedStore};

/// Received, installed and defective batches, with their photos.
#[derive(Clone)]
pub struct LifecycleService {
    store: SharedStore,
    photos: Arc<dyn PhotoStorage>,
    clock: SharedClock,
}

impl LifecycleService {
    pub fn new(store: SharedStore, photos: Arc<dyn PhotoStorage>, clock: SharedClock) -> Self {
        Self {
            store,
            photos,
            clock,
        }
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    /// Persist an uploaded file and return its reference.
    pub async fn store_upload(&self, original_name: &str, bytes: &[u8]) -> ServiceResult<String> {
        Ok(self.photos.store(original_name, bytes).await?)
    }

    /// Remove uploaded files that ended up attached to nothing.
    pub async fn discard_uploads(&self, photos: &PhotoSet) {
        for reference in photos.to_external_list() {
            self.photos.remove(&reference).await;
        }
    }

    /// Register a received batch. A batch identical to one already received
    /// returns the existing record; the uploads sent with the duplicate are
    /// discarded.
    #[instrument(skip(self, fields, photos), err)]
    pub async fn intake(&self, fields: LifecycleFields, photos: PhotoSet) -> ServiceResult<Intake> {
        let details = match fields.for_intake(self.today()) {
            Ok(details) => details,
            Err(e) => {
                self.discard_uploads(&photos).await;
                return Err(e.into());
            }
        };

        let intake = self
            .store
            .intake(
                NewLifecycleItem {
                    details,
                    photos: photos.clone(),
                },
                self.clock.now(),
            )
            .await?;

        match &intake {
            Intake::Created(item) => info!(item_id = %item.id, "received item registered"),
            Intake::Existing(item) => {
                info!(item_id = %item.id, "duplicate intake, returning existing item");
                self.discard_uploads(&photos).await;
            }
        }
        Ok(intake)
    }

    /// Photo files a committed change stopped referencing.
    async fn release_photos(&self, transition: &Transition) {
        for reference in transition.released_photos() {
            self.photos.remove(&reference).await;
        }
    }

    /// Move a received batch to installed. Photos dropped by an override are
    /// removed from disk once the move is committed.
    #[instrument(skip(self, installation), fields(item_id = %id), err)]
    pub async fn mark_installed(
        &self,
        id: LifecycleItemId,
        installation: Installation,
    ) -> ServiceResult<LifecycleItem> {
        let installation = installation.validated()?;
        let transition = self
            .store
            .install(id, &installation, self.clock.now())
            .await?;
        self.release_photos(&transition).await;
        let item = transition.after;
        info!(item_id = %id, quantity = item.quantity, "item installed");
        Ok(item)
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    pub async fn mark_defective(&self, id: LifecycleItemId) -> ServiceResult<LifecycleItem> {
        let item = self.store.mark_defective(id, self.clock.now()).await?;
        info!(item_id = %id, "item marked defective");
        Ok(item)
    }

    /// Record a defective batch that never went through reception.
    #[instrument(skip(self, fields, photos), err)]
    pub async fn add_defective_direct(
        &self,
        fields: LifecycleFields,
        photos: PhotoSet,
    ) -> ServiceResult<LifecycleItem> {
        let details = match fields.for_direct_defective(self.today()) {
            Ok(details) => details,
            Err(e) => {
                self.discard_uploads(&photos).await;
                return Err(e.into());
            }
        };
        let item = self
            .store
            .insert_defective(NewLifecycleItem { details, photos }, self.clock.now())
            .await?;
        info!(item_id = %item.id, "defective item registered");
        Ok(item)
    }

    #[instrument(skip(self, fields), fields(item_id = %id), err)]
    pub async fn edit_details(
        &self,
        id: LifecycleItemId,
        fields: LifecycleFields,
    ) -> ServiceResult<LifecycleItem> {
        let details = fields.for_intake(self.today())?;
        Ok(self.store.edit_details(id, details).await?)
    }

    /// Replace the primary photo (when given) and append extras; returns the
    /// resulting flat list. A replaced primary is removed from disk.
    #[instrument(skip(self, primary, additional), fields(item_id = %id), err)]
    pub async fn add_photos(
        &self,
        id: LifecycleItemId,
        primary: Option<String>,
        additional: Vec<String>,
    ) -> ServiceResult<Vec<String>> {
        let uploaded = PhotoSet::new(primary.clone(), additional.clone());
        match self.store.add_photos(id, primary, additional).await {
            Ok(transition) => {
                self.release_photos(&transition).await;
                Ok(transition.after.photos_paths())
            }
            Err(e) => {
                self.discard_uploads(&uploaded).await;
                Err(e.into())
            }
        }
    }

    /// Delete a record from its collection, then its photo files.
    ///
    /// Returns `false` when nothing matched. File removal happens after the
    /// delete and never fails the call.
    #[instrument(skip(self), fields(item_id = %id, status = %status), err)]
    pub async fn delete(&self, status: LifecycleStatus, id: LifecycleItemId) -> ServiceResult<bool> {
        let Some(item) = self.store.delete_lifecycle_item(status, id).await? else {
            warn!(item_id = %id, status = %status, "nothing to delete");
            return Ok(false);
        };
        self.discard_uploads(&item.photos).await;
        info!(item_id = %id, status = %status, "lifecycle item deleted");
        Ok(true)
    }

    pub async fn list(&self, status: LifecycleStatus) -> ServiceResult<Vec<LifecycleItem>> {
        Ok(self.store.list_lifecycle(status).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use stockflow_core::{DomainError, ManualClock};

    use super::*;
    use crate::photos::LocalPhotoStorage;
    use crate::services::ServiceError;
    use crate::store::InMemoryStore;

    struct Fixture {
        svc: LifecycleService,
        storage: LocalPhotoStorage,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalPhotoStorage::new(dir.path());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap(),
        ));
        let svc = LifecycleService::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(storage.clone()),
            clock,
        );
        Fixture {
            svc,
            storage,
            _dir: dir,
        }
    }

    fn client(name: &str) -> LifecycleFields {
        LifecycleFields {
            client: Some(name.to_string()),
            ..Default::default()
        }
    }

    async fn upload(f: &Fixture, name: &str) -> String {
        f.svc.store_upload(name, b"img").await.unwrap()
    }

    fn on_disk(f: &Fixture, reference: &str) -> bool {
        let name = reference.trim_start_matches("uploads/");
        f.storage.root().join(name).exists()
    }

    #[tokio::test]
    async fn intake_defaults_date_to_today() {
        let f = fixture();
        let intake = f.svc.intake(client("Dupont"), PhotoSet::default()).await.unwrap();
        assert_eq!(intake.item().date, NaiveDate::from_ymd_opt(2024, 3, 14).unwrap());
        assert_eq!(intake.item().product, "Commande");
    }

    #[tokio::test]
    async fn duplicate_intake_discards_new_uploads() {
        let f = fixture();
        let first = f.svc.intake(client("Dupont"), PhotoSet::default()).await.unwrap();

        let extra = upload(&f, "dup.jpg").await;
        let second = f
            .svc
            .intake(client("Dupont"), PhotoSet::new(Some(extra.clone()), vec![]))
            .await
            .unwrap();

        assert!(second.is_duplicate());
        assert_eq!(second.item().id, first.item().id);
        assert!(!on_disk(&f, &extra));
    }

    #[tokio::test]
    async fn install_then_delete_removes_photos() {
        let f = fixture();
        let p = upload(&f, "p.jpg").await;
        let a = upload(&f, "a.jpg").await;
        let id = f
            .svc
            .intake(client("Dupont"), PhotoSet::new(Some(p.clone()), vec![a.clone()]))
            .await
            .unwrap()
            .item()
            .id;

        let installed = f.svc.mark_installed(id, Installation::default()).await.unwrap();
        assert_eq!(installed.photos_paths(), vec![p.clone(), a.clone()]);
        assert!(f.svc.list(LifecycleStatus::Received).await.unwrap().is_empty());

        // Wrong collection: nothing happens.
        assert!(!f.svc.delete(LifecycleStatus::Received, id).await.unwrap());
        assert!(on_disk(&f, &p));

        assert!(f.svc.delete(LifecycleStatus::Installed, id).await.unwrap());
        assert!(!on_disk(&f, &p));
        assert!(!on_disk(&f, &a));
    }

    #[tokio::test]
    async fn install_override_cannot_claim_another_records_photo() {
        let f = fixture();
        let p = upload(&f, "p.jpg").await;
        let a = f
            .svc
            .intake(client("Dupont"), PhotoSet::new(Some(p.clone()), vec![]))
            .await
            .unwrap()
            .item()
            .id;
        let b = f
            .svc
            .intake(client("Martin"), PhotoSet::default())
            .await
            .unwrap()
            .item()
            .id;

        let err = f
            .svc
            .mark_installed(
                b,
                Installation {
                    photos: Some(vec![p.clone()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::Validation(_))));
        assert_eq!(f.svc.list(LifecycleStatus::Received).await.unwrap().len(), 2);

        f.svc.mark_installed(b, Installation::default()).await.unwrap();
        assert!(f.svc.delete(LifecycleStatus::Installed, b).await.unwrap());

        let received = f.svc.list(LifecycleStatus::Received).await.unwrap();
        assert_eq!(received[0].id, a);
        assert_eq!(received[0].photos_paths(), vec![p.clone()]);
        assert!(on_disk(&f, &p));
    }

    #[tokio::test]
    async fn install_override_removes_dropped_photos() {
        let f = fixture();
        let p = upload(&f, "p.jpg").await;
        let a = upload(&f, "a.jpg").await;
        let id = f
            .svc
            .intake(client("Dupont"), PhotoSet::new(Some(p.clone()), vec![a.clone()]))
            .await
            .unwrap()
            .item()
            .id;

        let installed = f
            .svc
            .mark_installed(
                id,
                Installation {
                    photos: Some(vec![a.clone()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(installed.photos_paths(), vec![a.clone()]);
        assert!(!on_disk(&f, &p));
        assert!(on_disk(&f, &a));
    }

    #[tokio::test]
    async fn concurrent_installs_move_the_record_once() {
        let f = fixture();
        let id = f
            .svc
            .intake(client("Dupont"), PhotoSet::default())
            .await
            .unwrap()
            .item()
            .id;

        let first = tokio::spawn({
            let svc = f.svc.clone();
            async move { svc.mark_installed(id, Installation::default()).await }
        });
        let second = tokio::spawn({
            let svc = f.svc.clone();
            async move { svc.mark_installed(id, Installation::default()).await }
        });
        let (first, second) = tokio::join!(first, second);
        let results = [first.unwrap(), second.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let failure = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert!(matches!(failure.as_domain(), Some(DomainError::NotFound { .. })));
        assert_eq!(f.svc.list(LifecycleStatus::Installed).await.unwrap().len(), 1);
        assert!(f.svc.list(LifecycleStatus::Received).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_tolerates_missing_files() {
        let f = fixture();
        let id = f
            .svc
            .intake(
                client("Martin"),
                PhotoSet::new(Some("uploads/never-written.jpg".into()), vec![]),
            )
            .await
            .unwrap()
            .item()
            .id;
        assert!(f.svc.delete(LifecycleStatus::Received, id).await.unwrap());
    }

    #[tokio::test]
    async fn mark_defective_requires_received_record() {
        let f = fixture();
        let err = f.svc.mark_defective(LifecycleItemId::new(42)).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn direct_defective_has_no_provenance() {
        let f = fixture();
        let item = f
            .svc
            .add_defective_direct(
                LifecycleFields {
                    product: Some("Volet roulant".into()),
                    supplier: Some("Somfy".into()),
                    client: Some("Leroy".into()),
                    date: None,
                },
                PhotoSet::default(),
            )
            .await
            .unwrap();
        assert_eq!(item.status, LifecycleStatus::Defective);
        assert_eq!(item.received_id, None);
        assert!(item.defective_date.is_some());
    }

    #[tokio::test]
    async fn direct_defective_validation_discards_uploads() {
        let f = fixture();
        let p = upload(&f, "p.jpg").await;
        let err = f
            .svc
            .add_defective_direct(client("Leroy"), PhotoSet::new(Some(p.clone()), vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(_)));
        assert!(!on_disk(&f, &p));
    }

    #[tokio::test]
    async fn add_photos_appends_and_coalesces() {
        let f = fixture();
        let id = f
            .svc
            .intake(
                client("Dupont"),
                PhotoSet::new(Some("uploads/p.jpg".into()), vec!["uploads/a.jpg".into()]),
            )
            .await
            .unwrap()
            .item()
            .id;
        let list = f
            .svc
            .add_photos(id, None, vec!["uploads/b.jpg".into()])
            .await
            .unwrap();
        assert_eq!(list, vec!["uploads/p.jpg", "uploads/a.jpg", "uploads/b.jpg"]);
    }

    #[tokio::test]
    async fn replacing_the_primary_removes_the_old_file() {
        let f = fixture();
        let old = upload(&f, "old.jpg").await;
        let id = f
            .svc
            .intake(client("Dupont"), PhotoSet::new(Some(old.clone()), vec![]))
            .await
            .unwrap()
            .item()
            .id;
        let new = upload(&f, "new.jpg").await;
        let list = f.svc.add_photos(id, Some(new.clone()), vec![]).await.unwrap();
        assert_eq!(list, vec![new.clone()]);
        assert!(!on_disk(&f, &old));
        assert!(on_disk(&f, &new));
    }

    #[tokio::test]
    async fn edit_resets_defaults() {
        let f = fixture();
        let id = f
            .svc
            .intake(
                LifecycleFields {
                    product: Some("Porte".into()),
                    client: Some("Dupont".into()),
                    ..Default::default()
                },
                PhotoSet::default(),
            )
            .await
            .unwrap()
            .item()
            .id;
        let edited = f.svc.edit_details(id, client("Durand")).await.unwrap();
        assert_eq!(edited.product, "Commande");
        assert_eq!(edited.client, "Durand");
    }
}
