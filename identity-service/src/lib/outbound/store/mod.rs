//! Single-table key-value store port and its adapters.

pub mod dynamodb;
pub mod errors;
pub mod memory;
pub mod models;

use std::collections::BTreeSet;

use async_trait::async_trait;

pub use dynamodb::DynamoDbKeyValueStore;
pub use errors::StoreError;
pub use memory::InMemoryKeyValueStore;
pub use models::AttributeUpdate;
pub use models::ConditionalPut;
pub use models::PutCondition;
pub use models::Record;
pub use models::RecordKey;

use crate::domain::context::RequestContext;

/// Transactional primitive of a single-table key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Write all `puts` atomically.
    ///
    /// Either every precondition holds and every record is written, or
    /// nothing is written.
    ///
    /// # Errors
    /// * `ConditionalCheckFailed` - Lists the keys whose precondition failed
    /// * `InvalidRequest` - Empty transaction or the same key twice
    /// * `DeadlineExceeded` - Context deadline elapsed
    /// * `Backend` - Any other failure
    async fn transact_put(
        &self,
        ctx: &RequestContext,
        puts: Vec<ConditionalPut>,
    ) -> Result<(), StoreError>;

    /// Strongly consistent point read.
    async fn get(&self, ctx: &RequestContext, key: &RecordKey)
        -> Result<Option<Record>, StoreError>;

    /// Apply `update` to an existing item and return the item after the
    /// update.
    ///
    /// # Errors
    /// * `ConditionalCheckFailed` - No item exists at `key`
    /// * `InvalidRequest` - Update touches a key attribute or names an
    ///   attribute twice
    async fn update(
        &self,
        ctx: &RequestContext,
        key: &RecordKey,
        update: AttributeUpdate,
    ) -> Result<Record, StoreError>;
}

/// Reject an empty transaction or one that writes the same key twice.
pub(crate) fn validate_puts(puts: &[ConditionalPut]) -> Result<(), StoreError> {
    if puts.is_empty() {
        return Err(StoreError::InvalidRequest(
            "Transaction has no items".to_string(),
        ));
    }

    let mut seen = BTreeSet::new();
    for put in puts {
        if !seen.insert(&put.record.key) {
            return Err(StoreError::InvalidRequest(format!(
                "Key {} appears twice in one transaction",
                put.record.key
            )));
        }
    }

    Ok(())
}
