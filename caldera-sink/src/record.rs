//! Records queued for batch submission
//!
//! A record is one unit of data destined for the Caldera bulk endpoint:
//! either a user-attribute update or a track event. Records are built through
//! chainable setters, validated at construction, and serialized directly into
//! the wire shape the endpoint expects.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};

/// A single attribute or event property value.
///
/// Attribute bags are free-form, but the value space is closed so that
/// serialization stays well-defined: timestamps always go out as RFC 3339
/// strings, nested bags keep the same value space.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    String(String),
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

/// Attribute bag carried by records
pub type Attributes = BTreeMap<String, AttrValue>;

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::String(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::String(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<DateTime<Utc>> for AttrValue {
    fn from(v: DateTime<Utc>) -> Self {
        AttrValue::Timestamp(v)
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(v: Vec<T>) -> Self {
        AttrValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<AttrValue>> From<BTreeMap<String, T>> for AttrValue {
    fn from(v: BTreeMap<String, T>) -> Self {
        AttrValue::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => AttrValue::Null,
        }
    }
}

/// Kind of record a queue accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    User,
    Event,
}

impl RecordKind {
    /// Stable label for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::User => "user",
            RecordKind::Event => "event",
        }
    }
}

/// A user-attribute update destined for the bulk endpoint.
///
/// Serializes to one object in the `attributes` list: `external_id` and
/// `_update_existing_only` alongside the flattened attribute bag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    external_id: String,
    #[serde(rename = "_update_existing_only")]
    update_existing_only: bool,
    #[serde(flatten)]
    attributes: Attributes,
}

impl UserRecord {
    /// Create a user record for the given external id.
    ///
    /// Fails with [`Error::Validation`] if the id is empty.
    pub fn new(external_id: impl Into<String>) -> Result<Self> {
        let external_id = external_id.into();
        if external_id.is_empty() {
            return Err(Error::Validation(
                "user record requires a non-empty external_id".to_string(),
            ));
        }

        Ok(Self {
            external_id,
            update_existing_only: false,
            attributes: Attributes::new(),
        })
    }

    /// Set an attribute. Returns self for chaining.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Ask the platform not to create the profile if it does not exist.
    pub fn update_existing_only(mut self, flag: bool) -> Self {
        self.update_existing_only = flag;
        self
    }

    /// External id this update targets
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    /// Attribute bag
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

/// A track event destined for the bulk endpoint.
///
/// Serializes to one object in the `events` list: `external_id`, `name`,
/// `time` (RFC 3339), and a `properties` bag omitted when empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackEvent {
    external_id: String,
    name: String,
    time: DateTime<Utc>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    properties: Attributes,
}

impl TrackEvent {
    /// Create a track event for the given user, name, and time.
    ///
    /// Fails with [`Error::Validation`] if the external id or name is empty.
    pub fn new(
        external_id: impl Into<String>,
        name: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Result<Self> {
        let external_id = external_id.into();
        if external_id.is_empty() {
            return Err(Error::Validation(
                "track event requires a non-empty external_id".to_string(),
            ));
        }

        let name = name.into();
        if name.is_empty() {
            return Err(Error::Validation(
                "track event requires a non-empty name".to_string(),
            ));
        }

        Ok(Self {
            external_id,
            name,
            time,
            properties: Attributes::new(),
        })
    }

    /// Set an event property. Returns self for chaining.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// External id of the user the event relates to
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    /// Event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event timestamp
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Property bag
    pub fn properties(&self) -> &Attributes {
        &self.properties
    }
}

/// Either kind of record, for routing into the matching queue
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    User(UserRecord),
    Event(TrackEvent),
}

impl Record {
    /// Which queue this record belongs to
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::User(_) => RecordKind::User,
            Record::Event(_) => RecordKind::Event,
        }
    }

    /// External id carried by the record
    pub fn external_id(&self) -> &str {
        match self {
            Record::User(user) => user.external_id(),
            Record::Event(event) => event.external_id(),
        }
    }
}

impl From<UserRecord> for Record {
    fn from(user: UserRecord) -> Self {
        Record::User(user)
    }
}

impl From<TrackEvent> for Record {
    fn from(event: TrackEvent) -> Self {
        Record::Event(event)
    }
}
