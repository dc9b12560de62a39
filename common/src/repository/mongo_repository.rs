use async_trait::async_trait;
use futures::StreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    options::FindOptions,
};
use serde::{de::DeserializeOwned, Serialize};

use super::{Entity, Repository};

pub struct MongoRepository<T> {
    pub collection: mongodb::Collection<T>,
}

impl<T> MongoRepository<T> {
    pub async fn new(
        mongo_uri: &str,
        database: &str,
        collection: &str,
    ) -> mongodb::error::Result<Self> {
        let collection = mongodb::Client::with_uri_str(mongo_uri)
            .await?
            .database(database)
            .collection(collection);
        Ok(Self { collection })
    }
}

impl<T> MongoRepository<T>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    /// Runs an arbitrary filter and drains the cursor.
    pub async fn find_by(
        &self,
        filter: Document,
        options: Option<FindOptions>,
    ) -> mongodb::error::Result<Vec<T>> {
        let results: Vec<mongodb::error::Result<T>> = self
            .collection
            .find(filter, options)
            .await?
            .collect()
            .await;

        results.into_iter().collect()
    }
}

#[async_trait]
impl<T> Repository<T> for MongoRepository<T>
where
    T: Entity + Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    type Error = mongodb::error::Error;

    async fn insert(&self, item: &T) -> Result<bool, Self::Error> {
        let result = self
            .collection
            .find_one(doc! {"id": item.id()}, None)
            .await?
            .is_none();

        if result {
            self.collection.insert_one(item, None).await?;
        }
        Ok(result)
    }

    async fn find(&self, field: &str, value: &Bson) -> Result<Option<T>, Self::Error> {
        let result = self.collection.find_one(doc! {field: value}, None).await?;
        Ok(result)
    }

    async fn delete(&self, field: &str, id: &ObjectId) -> Result<Option<T>, Self::Error> {
        let result = self
            .collection
            .find_one_and_delete(doc! {field: id}, None)
            .await?;
        Ok(result)
    }

    async fn find_many(&self, field: &str, value: &Bson) -> Result<Vec<T>, Self::Error> {
        self.find_by(doc! {field: value}, None).await
    }

    async fn find_all(&self, skip: u32, limit: u32) -> Result<Vec<T>, Self::Error> {
        let find_options = FindOptions::builder()
            .skip(skip as u64)
            .limit(limit as i64)
            .build();

        self.find_by(doc! {}, Some(find_options)).await
    }
}
