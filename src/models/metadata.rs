//! Per-call metadata and the call context handed to interceptors.
//!
//! `Metadata` is an ordered multimap: duplicate keys are allowed and entries
//! keep their insertion order, matching what the transport puts on the wire.

use std::borrow::Cow;

use tonic::metadata::{
    Ascii, Binary, KeyAndValueRef, MetadataKey, MetadataMap, MetadataValue,
};

use super::token::BearerToken;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Text(String),
    /// Accepted by the transport but not printable ASCII (obs-text bytes).
    Opaque(MetadataValue<Ascii>),
    Binary(MetadataValue<Binary>),
}

impl Value {
    fn as_text(&self) -> Cow<'_, str> {
        match self {
            Value::Text(v) => Cow::Borrowed(v),
            Value::Opaque(v) => String::from_utf8_lossy(v.as_encoded_bytes()),
            Value::Binary(v) => String::from_utf8_lossy(v.as_encoded_bytes()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, Value)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Never replaces an existing key.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), Value::Text(value.into())));
    }

    /// Exact, case-sensitive key lookup over every entry, text or not.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Text values stored under `key`, in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries.iter().filter_map(move |(k, v)| match v {
            Value::Text(text) if k == key => Some(text.as_str()),
            _ => None,
        })
    }

    /// Every entry in order. Values that are not plain text are shown in
    /// their wire encoding, lossily for obs-text bytes.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Cow<'_, str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_text()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot every entry of a tonic map, in map order.
    ///
    /// Binary (`-bin`) entries and values that are not printable ASCII are
    /// kept as the transport's own values so `write_into` restores them
    /// byte for byte.
    pub fn from_metadata_map(map: &MetadataMap) -> Self {
        let entries = map
            .iter()
            .map(|kv| match kv {
                KeyAndValueRef::Ascii(key, value) => {
                    let value = match value.to_str() {
                        Ok(text) => Value::Text(text.to_string()),
                        Err(_) => Value::Opaque(value.clone()),
                    };
                    (key.as_str().to_string(), value)
                }
                KeyAndValueRef::Binary(key, value) => {
                    (key.as_str().to_string(), Value::Binary(value.clone()))
                }
            })
            .collect();
        Self { entries }
    }

    /// Replace the contents of `map` with this collection, in order.
    ///
    /// Entries that fail tonic's key/value validation are dropped with a
    /// warning rather than failing the call.
    pub fn write_into(&self, map: &mut MetadataMap) {
        let mut rebuilt = MetadataMap::with_capacity(self.entries.len());

        for (key, value) in &self.entries {
            let written = match value {
                Value::Text(text) => match (
                    MetadataKey::<Ascii>::from_bytes(key.as_bytes()),
                    text.parse::<MetadataValue<Ascii>>(),
                ) {
                    (Ok(k), Ok(v)) => {
                        rebuilt.append(k, v);
                        true
                    }
                    _ => false,
                },
                Value::Opaque(v) => match MetadataKey::<Ascii>::from_bytes(key.as_bytes()) {
                    Ok(k) => {
                        rebuilt.append(k, v.clone());
                        true
                    }
                    Err(_) => false,
                },
                Value::Binary(v) => match MetadataKey::<Binary>::from_bytes(key.as_bytes()) {
                    Ok(k) => {
                        rebuilt.append_bin(k, v.clone());
                        true
                    }
                    Err(_) => false,
                },
            };
            if !written {
                tracing::warn!(key = key.as_str(), "dropping metadata entry tonic cannot encode");
            }
        }

        *map = rebuilt;
    }
}

impl<K, V> From<Vec<(K, V)>> for Metadata
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Metadata
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), Value::Text(v.into())))
                .collect(),
        }
    }
}

/// Transport-level credential attached to a channel, separate from metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallCredentials {
    /// `token=` parameter from the connection string.
    AccessToken(BearerToken),
}

/// Everything an interceptor may inspect or change about one outgoing call.
#[derive(Debug, Clone, Default)]
pub struct CallDetails {
    /// Full RPC path, e.g. `/spark.connect.SparkConnectService/ExecutePlan`.
    pub method: Option<String>,
    pub metadata: Metadata,
    pub credentials: Option<CallCredentials>,
}

impl CallDetails {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, metadata: impl Into<Metadata>) -> Self {
        self.metadata = metadata.into();
        self
    }

    pub fn with_credentials(mut self, credentials: CallCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Build call details from a tonic request about to leave the channel.
    pub fn from_request<T>(request: &tonic::Request<T>, credentials: Option<CallCredentials>) -> Self {
        let method = request
            .extensions()
            .get::<tonic::GrpcMethod>()
            .map(|m| format!("/{}/{}", m.service(), m.method()));
        Self {
            method,
            metadata: Metadata::from_metadata_map(request.metadata()),
            credentials,
        }
    }
}
