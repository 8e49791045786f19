use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::AttributeDefinition;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::types::BillingMode;
use aws_sdk_dynamodb::types::KeySchemaElement;
use aws_sdk_dynamodb::types::KeyType;
use aws_sdk_dynamodb::types::Put;
use aws_sdk_dynamodb::types::ReturnValue;
use aws_sdk_dynamodb::types::ScalarAttributeType;
use aws_sdk_dynamodb::types::TransactWriteItem;
use aws_sdk_dynamodb::Client;

use super::errors::StoreError;
use super::models::Attributes;
use super::models::AttributeUpdate;
use super::models::ConditionalPut;
use super::models::PutCondition;
use super::models::Record;
use super::models::RecordKey;
use super::models::PARTITION_KEY;
use super::models::SORT_KEY;
use super::validate_puts;
use super::KeyValueStore;
use crate::config::StoreConfig;
use crate::domain::context::RequestContext;

type Item = HashMap<String, AttributeValue>;

/// DynamoDB caps a transaction at 100 items.
const MAX_TRANSACTION_ITEMS: usize = 100;

/// Single-table store backed by Amazon DynamoDB.
///
/// Items are keyed by a string partition key `pk` and a string sort key
/// `sk`. Every other attribute is a string.
#[derive(Clone)]
pub struct DynamoDbKeyValueStore {
    client: Client,
    table_name: String,
}

impl DynamoDbKeyValueStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Build a client from the default AWS provider chain.
    ///
    /// `config.endpoint` points the client at a local DynamoDB when set.
    pub async fn connect(config: &StoreConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let shared = loader.load().await;

        tracing::info!(
            table = %config.table_name,
            region = %config.region,
            endpoint = ?config.endpoint,
            "DynamoDB client configured"
        );

        Self::new(Client::new(&shared), config.table_name.clone())
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Create the table if it does not exist yet.
    ///
    /// # Returns
    /// `true` when the table was created, `false` when it already existed
    pub async fn create_table(&self) -> Result<bool, StoreError> {
        let key_schema = vec![
            key_schema_element(PARTITION_KEY, KeyType::Hash)?,
            key_schema_element(SORT_KEY, KeyType::Range)?,
        ];
        let attribute_definitions = vec![
            attribute_definition(PARTITION_KEY)?,
            attribute_definition(SORT_KEY)?,
        ];

        let result = self
            .client
            .create_table()
            .table_name(&self.table_name)
            .set_key_schema(Some(key_schema))
            .set_attribute_definitions(Some(attribute_definitions))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::info!(table = %self.table_name, "Table created");
                Ok(true)
            }
            Err(err) => match err.into_service_error() {
                CreateTableError::ResourceInUseException(_) => {
                    tracing::info!(table = %self.table_name, "Table already exists");
                    Ok(false)
                }
                other => Err(backend(other)),
            },
        }
    }

    pub async fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        let output = self
            .client
            .list_tables()
            .send()
            .await
            .map_err(backend)?;

        Ok(output.table_names().to_vec())
    }

    fn put_item(&self, put: ConditionalPut) -> Result<TransactWriteItem, StoreError> {
        let mut builder = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(record_to_item(put.record)));

        if put.condition == PutCondition::NotExists {
            builder =
                builder.condition_expression(format!("attribute_not_exists({})", PARTITION_KEY));
        }

        let put = builder.build().map_err(backend)?;

        Ok(TransactWriteItem::builder().put(put).build())
    }
}

#[async_trait]
impl KeyValueStore for DynamoDbKeyValueStore {
    async fn transact_put(
        &self,
        ctx: &RequestContext,
        puts: Vec<ConditionalPut>,
    ) -> Result<(), StoreError> {
        validate_puts(&puts)?;
        if puts.len() > MAX_TRANSACTION_ITEMS {
            return Err(StoreError::InvalidRequest(format!(
                "Transaction must have at most {} items, got {}",
                MAX_TRANSACTION_ITEMS,
                puts.len()
            )));
        }

        // Cancellation reasons come back in request order.
        let keys: Vec<RecordKey> = puts.iter().map(|put| put.record.key.clone()).collect();
        let items = puts
            .into_iter()
            .map(|put| self.put_item(put))
            .collect::<Result<Vec<_>, _>>()?;

        let result = ctx
            .run(
                self.client
                    .transact_write_items()
                    .set_transact_items(Some(items))
                    .send(),
            )
            .await?;

        match result {
            Ok(_) => Ok(()),
            Err(err) => match err.into_service_error() {
                TransactWriteItemsError::TransactionCanceledException(cancelled) => {
                    let failed = failed_keys(
                        &keys,
                        cancelled
                            .cancellation_reasons()
                            .iter()
                            .map(|reason| reason.code()),
                    );

                    if failed.is_empty() {
                        Err(StoreError::Backend(cancelled.to_string()))
                    } else {
                        tracing::debug!(keys = ?failed, "Transaction cancelled by condition");
                        Err(StoreError::ConditionalCheckFailed { keys: failed })
                    }
                }
                other => Err(backend(other)),
            },
        }
    }

    async fn get(
        &self,
        ctx: &RequestContext,
        key: &RecordKey,
    ) -> Result<Option<Record>, StoreError> {
        let output = ctx
            .run(
                self.client
                    .get_item()
                    .table_name(&self.table_name)
                    .set_key(Some(key_to_item(key)))
                    .consistent_read(true)
                    .send(),
            )
            .await?
            .map_err(backend)?;

        output.item().map(item_to_record).transpose()
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

        let expression = UpdateExpression::from_update(&update);

        let result = ctx
            .run(
                self.client
                    .update_item()
                    .table_name(&self.table_name)
                    .set_key(Some(key_to_item(key)))
                    .set_update_expression(expression.expression)
                    .set_expression_attribute_names(expression.names)
                    .set_expression_attribute_values(expression.values)
                    .condition_expression(format!("attribute_exists({})", PARTITION_KEY))
                    .return_values(ReturnValue::AllNew)
                    .send(),
            )
            .await?;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                return match err.into_service_error() {
                    UpdateItemError::ConditionalCheckFailedException(_) => {
                        Err(StoreError::ConditionalCheckFailed {
                            keys: vec![key.clone()],
                        })
                    }
                    other => Err(backend(other)),
                }
            }
        };

        let item = output
            .attributes()
            .ok_or_else(|| StoreError::Backend("Update returned no attributes".to_string()))?;

        item_to_record(item)
    }
}

/// Placeholder-based `UpdateItem` expression.
///
/// Attribute names always go through `#` placeholders; DynamoDB reserves
/// words such as `name`.
#[derive(Debug)]
struct UpdateExpression {
    expression: Option<String>,
    names: Option<HashMap<String, String>>,
    values: Option<Item>,
}

impl UpdateExpression {
    fn from_update(update: &AttributeUpdate) -> Self {
        let mut names = HashMap::new();
        let mut values = HashMap::new();
        let mut clauses = Vec::new();

        let set: Vec<String> = update
            .set
            .iter()
            .enumerate()
            .map(|(i, (name, value))| {
                names.insert(format!("#s{}", i), name.clone());
                values.insert(format!(":s{}", i), AttributeValue::S(value.clone()));
                format!("#s{} = :s{}", i, i)
            })
            .collect();

        if !set.is_empty() {
            clauses.push(format!("SET {}", set.join(", ")));
        }

        let remove: Vec<String> = update
            .remove
            .iter()
            .enumerate()
            .map(|(i, name)| {
                names.insert(format!("#r{}", i), name.clone());
                format!("#r{}", i)
            })
            .collect();

        if !remove.is_empty() {
            clauses.push(format!("REMOVE {}", remove.join(", ")));
        }

        Self {
            expression: (!clauses.is_empty()).then(|| clauses.join(" ")),
            names: (!names.is_empty()).then_some(names),
            values: (!values.is_empty()).then_some(values),
        }
    }
}

/// Map cancellation reason codes back to the keys of the request items.
fn failed_keys<'a>(
    keys: &[RecordKey],
    codes: impl Iterator<Item = Option<&'a str>>,
) -> Vec<RecordKey> {
    keys.iter()
        .zip(codes)
        .filter(|(_, code)| *code == Some("ConditionalCheckFailed"))
        .map(|(key, _)| key.clone())
        .collect()
}

fn key_to_item(key: &RecordKey) -> Item {
    HashMap::from([
        (
            PARTITION_KEY.to_string(),
            AttributeValue::S(key.partition_key.clone()),
        ),
        (SORT_KEY.to_string(), AttributeValue::S(key.sort_key.clone())),
    ])
}

fn record_to_item(record: Record) -> Item {
    let mut item = key_to_item(&record.key);
    item.extend(
        record
            .attributes
            .into_iter()
            .map(|(name, value)| (name, AttributeValue::S(value))),
    );
    item
}

fn item_to_record(item: &Item) -> Result<Record, StoreError> {
    let string = |name: &str, value: &AttributeValue| -> Result<String, StoreError> {
        value
            .as_s()
            .cloned()
            .map_err(|_| StoreError::Backend(format!("Attribute {} is not a string", name)))
    };

    let key_part = |name: &str| -> Result<String, StoreError> {
        let value = item
            .get(name)
            .ok_or_else(|| StoreError::Backend(format!("Item has no {} attribute", name)))?;
        string(name, value)
    };

    let key = RecordKey::new(key_part(PARTITION_KEY)?, key_part(SORT_KEY)?);

    let attributes = item
        .iter()
        .filter(|(name, _)| name.as_str() != PARTITION_KEY && name.as_str() != SORT_KEY)
        .map(|(name, value)| Ok((name.clone(), string(name, value)?)))
        .collect::<Result<Attributes, StoreError>>()?;

    Ok(Record { key, attributes })
}

fn key_schema_element(name: &str, key_type: KeyType) -> Result<KeySchemaElement, StoreError> {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .map_err(backend)
}

fn attribute_definition(name: &str) -> Result<AttributeDefinition, StoreError> {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ScalarAttributeType::S)
        .build()
        .map_err(backend)
}

fn backend<E: std::error::Error>(err: E) -> StoreError {
    StoreError::Backend(DisplayErrorContext(err).to_string())
}
