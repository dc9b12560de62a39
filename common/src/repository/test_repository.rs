use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use mongodb::bson::{self, oid::ObjectId, Bson, Document};
use serde::{de::DeserializeOwned, Serialize};

use super::{Entity, Repository};

/// In-memory repository keeping every item as a BSON document, the same shape
/// it would have in a collection.
pub struct TestRepository<T> {
    _t: std::marker::PhantomData<T>,
    pub db: Mutex<Vec<Document>>,
}

impl<T> Default for TestRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TestRepository<T> {
    pub fn new() -> Self {
        Self {
            _t: std::marker::PhantomData,
            db: Mutex::new(Vec::new()),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Vec<Document>> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn has_object_id(document: &Document, field: &str, id: &ObjectId) -> bool {
    document.get_object_id(field).map_or(false, |x| &x == id)
}

#[async_trait]
impl<T> Repository<T> for TestRepository<T>
where
    T: Entity + Serialize + DeserializeOwned + Send + Sync,
{
    type Error = mongodb::error::Error;

    async fn insert(&self, item: &T) -> Result<bool, Self::Error> {
        let document = bson::to_document(item)?;
        let id = item.id();

        let mut db = self.lock();
        let contains = db.iter().any(|x| has_object_id(x, "id", &id));
        if !contains {
            db.push(document);
        }
        Ok(!contains)
    }

    async fn find(&self, field: &str, value: &Bson) -> Result<Option<T>, Self::Error> {
        let found = self
            .lock()
            .iter()
            .find(|x| x.get(field) == Some(value))
            .cloned();

        Ok(found.map(bson::from_document).transpose()?)
    }

    async fn delete(&self, field: &str, id: &ObjectId) -> Result<Option<T>, Self::Error> {
        let removed = {
            let mut db = self.lock();
            db.iter()
                .position(|x| has_object_id(x, field, id))
                .map(|pos| db.remove(pos))
        };

        Ok(removed.map(bson::from_document).transpose()?)
    }

    async fn find_many(&self, field: &str, value: &Bson) -> Result<Vec<T>, Self::Error> {
        let matching: Vec<Document> = self
            .lock()
            .iter()
            .filter(|x| x.get(field) == Some(value))
            .cloned()
            .collect();

        Ok(matching
            .into_iter()
            .map(bson::from_document)
            .collect::<Result<_, _>>()?)
    }

    async fn find_all(&self, skip: u32, limit: u32) -> Result<Vec<T>, Self::Error> {
        let page: Vec<Document> = self
            .lock()
            .iter()
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect();

        Ok(page
            .into_iter()
            .map(bson::from_document)
            .collect::<Result<_, _>>()?)
    }
}
