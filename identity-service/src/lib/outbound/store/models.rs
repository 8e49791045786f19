use std::collections::BTreeMap;
use std::fmt;

/// Name of the partition key attribute.
pub const PARTITION_KEY: &str = "pk";

/// Name of the sort key attribute.
pub const SORT_KEY: &str = "sk";

/// Composite primary key of an item in the single table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub partition_key: String,
    pub sort_key: String,
}

impl RecordKey {
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition_key, self.sort_key)
    }
}

/// Non-key attributes of an item. Every value is stored as a string.
pub type Attributes = BTreeMap<String, String>;

/// Item stored under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: RecordKey,
    pub attributes: Attributes,
}

impl Record {
    pub fn new(key: RecordKey) -> Self {
        Self {
            key,
            attributes: Attributes::new(),
        }
    }

    /// Add an attribute, builder style.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Precondition attached to a put inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutCondition {
    /// Write unconditionally, replacing any existing item.
    Always,
    /// Write only if no item exists at the key.
    NotExists,
}

/// One write of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalPut {
    pub record: Record,
    pub condition: PutCondition,
}

impl ConditionalPut {
    pub fn if_not_exists(record: Record) -> Self {
        Self {
            record,
            condition: PutCondition::NotExists,
        }
    }

    pub fn always(record: Record) -> Self {
        Self {
            record,
            condition: PutCondition::Always,
        }
    }
}

/// Partial update of an existing item.
///
/// An attribute named in both `set` and `remove` is rejected by the stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeUpdate {
    pub set: Attributes,
    pub remove: Vec<String>,
}

impl AttributeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set.insert(name.into(), value.into());
        self
    }

    pub fn remove(mut self, name: impl Into<String>) -> Self {
        self.remove.push(name.into());
        self
    }

    /// First attribute that is a key attribute or is named in both lists.
    pub fn conflict(&self) -> Option<&str> {
        let is_key = |name: &str| name == PARTITION_KEY || name == SORT_KEY;

        self.remove
            .iter()
            .map(String::as_str)
            .find(|name| is_key(name) || self.set.contains_key(*name))
            .or_else(|| self.set.keys().map(String::as_str).find(|name| is_key(name)))
    }
}
