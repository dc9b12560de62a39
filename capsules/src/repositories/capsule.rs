use async_trait::async_trait;
use chrono::NaiveDate;
use common::{
    default_timestamp,
    entities::capsule::{Capsule, CapsuleStatus, CreateCapsule},
    repository::{mongo_repository::MongoRepository, test_repository::TestRepository, Repository},
};
use mongodb::{
    bson::{doc, oid::ObjectId, Bson},
    options::FindOptions,
};

use crate::error::StoreError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Persistence for capsule documents.
///
/// `mark_delivered` only flips a capsule that is still unsent, so a second
/// writer racing on the same document gets `AlreadyDelivered` instead of
/// silently overwriting `deliveredAt`.
#[async_trait]
pub trait CapsuleStore: Send + Sync {
    /// Stores a new capsule, assigning its id and `createdAt`.
    async fn create(&self, capsule: CreateCapsule) -> Result<Capsule, StoreError>;

    async fn get(&self, id: ObjectId) -> Result<Option<Capsule>, StoreError>;

    /// All capsules, earliest delivery date first.
    async fn list(&self) -> Result<Vec<Capsule>, StoreError>;

    async fn remove(&self, id: ObjectId) -> Result<Option<Capsule>, StoreError>;

    /// Every capsule with `deliveryDate <= today` and `emailSent == false`.
    async fn query_due_unsent(&self, today: NaiveDate) -> Result<Vec<Capsule>, StoreError>;

    /// Sets `emailSent`, `status` and `deliveredAt` in one document update.
    async fn mark_delivered(&self, id: ObjectId) -> Result<(), StoreError>;
}

#[async_trait]
impl CapsuleStore for MongoRepository<Capsule> {
    async fn create(&self, capsule: CreateCapsule) -> Result<Capsule, StoreError> {
        let capsule = Capsule::seal(capsule, default_timestamp());
        <Self as Repository<Capsule>>::insert(self, &capsule).await?;
        Ok(capsule)
    }

    async fn get(&self, id: ObjectId) -> Result<Option<Capsule>, StoreError> {
        Ok(<Self as Repository<Capsule>>::find(self, "id", &Bson::ObjectId(id)).await?)
    }

    async fn list(&self) -> Result<Vec<Capsule>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! {"deliveryDate": 1, "createdAt": 1})
            .build();
        Ok(self.find_by(doc! {}, Some(options)).await?)
    }

    async fn remove(&self, id: ObjectId) -> Result<Option<Capsule>, StoreError> {
        Ok(<Self as Repository<Capsule>>::delete(self, "id", &id).await?)
    }

    async fn query_due_unsent(&self, today: NaiveDate) -> Result<Vec<Capsule>, StoreError> {
        // ISO dates compare chronologically as strings
        let today = today.format(DATE_FORMAT).to_string();
        let filter = doc! {
            "deliveryDate": {"$lte": today},
            "emailSent": false,
        };
        Ok(self.find_by(filter, None).await?)
    }

    async fn mark_delivered(&self, id: ObjectId) -> Result<(), StoreError> {
        let status = CapsuleStatus::Delivered.as_str();
        let delivered_at = default_timestamp();

        let result = self
            .collection
            .update_one(
                doc! {"id": id, "emailSent": false},
                doc! {"$set": {
                    "emailSent": true,
                    "status": status,
                    "deliveredAt": delivered_at,
                }},
                None,
            )
            .await?;

        if result.matched_count > 0 {
            return Ok(());
        }

        match <Self as Repository<Capsule>>::find(self, "id", &Bson::ObjectId(id)).await? {
            Some(_) => Err(StoreError::AlreadyDelivered { id }),
            None => Err(StoreError::NotFound { id }),
        }
    }
}

#[async_trait]
impl CapsuleStore for TestRepository<Capsule> {
    async fn create(&self, capsule: CreateCapsule) -> Result<Capsule, StoreError> {
        let capsule = Capsule::seal(capsule, default_timestamp());
        <Self as Repository<Capsule>>::insert(self, &capsule).await?;
        Ok(capsule)
    }

    async fn get(&self, id: ObjectId) -> Result<Option<Capsule>, StoreError> {
        Ok(<Self as Repository<Capsule>>::find(self, "id", &Bson::ObjectId(id)).await?)
    }

    async fn list(&self) -> Result<Vec<Capsule>, StoreError> {
        let mut capsules = self.find_all(0, u32::MAX).await?;
        capsules.sort_by_key(|c| (c.delivery_date, c.created_at));
        Ok(capsules)
    }

    async fn remove(&self, id: ObjectId) -> Result<Option<Capsule>, StoreError> {
        Ok(<Self as Repository<Capsule>>::delete(self, "id", &id).await?)
    }

    async fn query_due_unsent(&self, today: NaiveDate) -> Result<Vec<Capsule>, StoreError> {
        let unsent = self.find_many("emailSent", &Bson::Boolean(false)).await?;
        Ok(unsent.into_iter().filter(|c| c.is_due(today)).collect())
    }

    async fn mark_delivered(&self, id: ObjectId) -> Result<(), StoreError> {
        let mut db = self.lock();
        let Some(document) = db
            .iter_mut()
            .find(|x| x.get_object_id("id").map_or(false, |x| x == id))
        else {
            return Err(StoreError::NotFound { id });
        };

        if document.get_bool("emailSent").unwrap_or(false) {
            return Err(StoreError::AlreadyDelivered { id });
        }

        document.insert("emailSent", true);
        document.insert("status", CapsuleStatus::Delivered.as_str());
        document.insert("deliveredAt", default_timestamp());
        Ok(())
    }
}
