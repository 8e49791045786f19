use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::errors::StoreError;
use super::models::AttributeUpdate;
use super::models::ConditionalPut;
use super::models::PutCondition;
use super::models::Record;
use super::models::RecordKey;
use super::validate_puts;
use super::KeyValueStore;
use crate::domain::context::RequestContext;

/// Process-local store used by tests and by `backend = "memory"`.
///
/// A single mutex serialises transactions, so conditional puts race the same
/// way they do against a real transactional store.
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    items: Mutex<BTreeMap<RecordKey, Record>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored item in key order.
    pub async fn snapshot(&self) -> Vec<Record> {
        self.items.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn transact_put(
        &self,
        ctx: &RequestContext,
        puts: Vec<ConditionalPut>,
    ) -> Result<(), StoreError> {
        validate_puts(&puts)?;

        let mut items = ctx.run(self.items.lock()).await?;

        let failed: Vec<RecordKey> = puts
            .iter()
            .filter(|put| {
                put.condition == PutCondition::NotExists && items.contains_key(&put.record.key)
            })
            .map(|put| put.record.key.clone())
            .collect();

        if !failed.is_empty() {
            tracing::debug!(keys = ?failed, "Transaction cancelled by condition");
            return Err(StoreError::ConditionalCheckFailed { keys: failed });
        }

        // Last chance to honour the deadline before anything becomes visible.
        if ctx.is_expired() {
            return Err(StoreError::DeadlineExceeded);
        }

        for put in puts {
            items.insert(put.record.key.clone(), put.record);
        }

        Ok(())
    }

    async fn get(
        &self,
        ctx: &RequestContext,
        key: &RecordKey,
    ) -> Result<Option<Record>, StoreError> {
        let items = ctx.run(self.items.lock()).await?;
        Ok(items.get(key).cloned())
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        key: &RecordKey,
        update: AttributeUpdate,
    ) -> Result<Record, StoreError> {
        if let Some(name) = update.conflict() {
            return Err(StoreError::InvalidRequest(format!(
                "Attribute {} cannot be updated",
                name
            )));
        }

        let mut items = ctx.run(self.items.lock()).await?;

        if ctx.is_expired() {
            return Err(StoreError::DeadlineExceeded);
        }

        let record = items
            .get_mut(key)
            .ok_or_else(|| StoreError::ConditionalCheckFailed {
                keys: vec![key.clone()],
            })?;

        for name in &update.remove {
            record.attributes.remove(name);
        }
        record.attributes.extend(update.set);

        Ok(record.clone())
    }
}
