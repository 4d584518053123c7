use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use wor_core::{same_address, PartnerRecord, PartnerStore};

/// Simple in-memory partner store for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryPartnerStore {
    records: Arc<RwLock<HashMap<i64, PartnerRecord>>>,
    next_id: AtomicI64,
}

impl InMemoryPartnerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("partner store lock poisoned")
}

#[async_trait]
impl PartnerStore for InMemoryPartnerStore {
    async fn get_by_url(&self, url: &str) -> Result<Option<PartnerRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.values().find(|r| same_address(&r.url, url)).cloned())
    }

    async fn get(&self, id: i64) -> Result<Option<PartnerRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<PartnerRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        let mut all: Vec<PartnerRecord> = records.values().cloned().collect();
        all.sort_by_key(|r| r.id);
        Ok(all)
    }

    async fn create(&self, mut record: PartnerRecord) -> Result<PartnerRecord> {
        let mut records = self.records.write().map_err(poisoned)?;
        if records.values().any(|r| same_address(&r.url, &record.url)) {
            bail!("partner with url {} already exists", record.url);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        record.id = Some(id);
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, record: PartnerRecord) -> Result<PartnerRecord> {
        let id = record.id.ok_or_else(|| anyhow!("cannot update partner without id"))?;
        let mut records = self.records.write().map_err(poisoned)?;
        if records
            .values()
            .any(|r| r.id != Some(id) && same_address(&r.url, &record.url))
        {
            bail!("partner with url {} already exists", record.url);
        }
        match records.get_mut(&id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(record)
            }
            None => bail!("partner {id} does not exist"),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut records = self.records.write().map_err(poisoned)?;
        Ok(records.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wor_core::{PartnerCredentials, PartnerStatus};

    fn approved(url: &str) -> PartnerRecord {
        PartnerRecord::approved(
            url,
            "Partner",
            PartnerCredentials {
                api_key: "k".into(),
                salt: "s".into(),
                authentication_token: "t".into(),
            },
        )
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let store = InMemoryPartnerStore::new();
        let a = store.create(approved("a.example.org")).await.unwrap();
        let b = store
            .create(PartnerRecord::unconfirmed("b.example.org", "", PartnerStatus::ContactFailed))
            .await
            .unwrap();
        assert_eq!(a.id, Some(1));
        assert_eq!(b.id, Some(2));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_url_is_unique() {
        let store = InMemoryPartnerStore::new();
        store.create(approved("a.example.org")).await.unwrap();
        assert!(store.create(approved("A.example.org")).await.is_err());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_get_update_delete() {
        let store = InMemoryPartnerStore::new();
        let created = store.create(approved("a.example.org")).await.unwrap();
        let id = created.id.unwrap();

        let mut record = store.get_by_url("a.example.org").await.unwrap().unwrap();
        record.set_status(PartnerStatus::ContactFailed);
        store.update(record).await.unwrap();

        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.status, PartnerStatus::ContactFailed);
        assert!(fetched.credentials.is_none());

        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert!(store.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_requires_existing_record() {
        let store = InMemoryPartnerStore::new();
        let mut record = approved("a.example.org");
        assert!(store.update(record.clone()).await.is_err());
        record.id = Some(42);
        assert!(store.update(record).await.is_err());
    }
}
