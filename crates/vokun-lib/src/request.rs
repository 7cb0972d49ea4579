//! The audited request record and its header/query-parameter shapes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named parameter carrying one or more values, in arrival order.
///
/// Serialised as `{"name": "...", "value": ["...", ...]}`, which is also the
/// shape persisted in the `headers` and `query_params` columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: Vec<String>,
}

impl Param {
    pub fn new(name: impl Into<String>, value: Vec<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// An HTTP header with all of its values.
pub type Header = Param;

/// A URL query parameter with all of its values.
pub type QueryParam = Param;

/// Fold ordered `(name, value)` pairs into [`Param`]s.
///
/// Names keep the order in which they first appear; every value is kept,
/// duplicates included.
pub fn group_params<I, K, V>(pairs: I) -> Vec<Param>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut params: Vec<Param> = Vec::new();
    for (name, value) in pairs {
        let name = name.as_ref();
        match params.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value.push(value.into()),
            None => params.push(Param::new(name, vec![value.into()])),
        }
    }
    params
}

/// Unique identifier assigned to a request when it is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new time-ordered (UUID v7) identifier.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for RequestId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One inbound call, captured at arrival time.
///
/// Built once by the serving layer and handed to the audit log; never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub timestamp: DateTime<Utc>,

    #[serde(with = "base64_body", default)]
    pub body: Vec<u8>,

    pub subpath: String,

    #[serde(rename = "query-params", default)]
    pub query_params: Vec<QueryParam>,

    #[serde(default)]
    pub headers: Vec<Header>,
}

impl Request {
    pub fn new(
        subpath: impl Into<String>,
        timestamp: DateTime<Utc>,
        body: impl Into<Vec<u8>>,
        headers: Vec<Header>,
        query_params: Vec<QueryParam>,
    ) -> Self {
        Self {
            timestamp,
            body: body.into(),
            subpath: subpath.into(),
            query_params,
            headers,
        }
    }
}

/// Bodies travel as standard base64 strings in JSON; `null` reads as empty.
mod base64_body {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
