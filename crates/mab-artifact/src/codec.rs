//! Durable record layout
//!
//! One JSON array of records:
//! `{id, instruction, body, createdAt, status, failureReason?, history:[{speaker, text}]}`
//!
//! Loading is lenient: a missing or malformed `history` becomes empty, and
//! records written by the original web client (`prompt`, `code`,
//! `timestamp`, `errorMessage`) are accepted. Records that still fail to
//! decode are kept verbatim so a later save writes them back unchanged.

use crate::artifact::Artifact;
use crate::id::ArtifactId;
use crate::status::ArtifactStatus;
use crate::turn::Turn;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordRef<'a> {
    id: ArtifactId,
    instruction: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_instruction: Option<&'a str>,
    body: &'a str,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
    status: ArtifactStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_reason: Option<&'a str>,
    history: &'a [Turn],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    id: ArtifactId,
    #[serde(alias = "prompt")]
    instruction: String,
    #[serde(default)]
    generation_instruction: Option<String>,
    #[serde(default, alias = "code")]
    body: String,
    #[serde(alias = "timestamp", with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
    status: ArtifactStatus,
    #[serde(default, alias = "errorMessage")]
    failure_reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_history")]
    history: Vec<Turn>,
}

fn lenient_history<'de, D>(deserializer: D) -> Result<Vec<Turn>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

impl From<Record> for Artifact {
    fn from(r: Record) -> Self {
        let failure_reason = match r.status {
            ArtifactStatus::Failed => r.failure_reason,
            _ => None,
        };
        Artifact {
            id: r.id,
            instruction: r.instruction,
            generation_instruction: r.generation_instruction,
            body: r.body,
            created_at: r.created_at,
            status: r.status,
            failure_reason,
            history: r.history,
            revision: 0,
        }
    }
}

impl Serialize for Artifact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RecordRef {
            id: self.id,
            instruction: &self.instruction,
            generation_instruction: self.generation_instruction.as_deref(),
            body: &self.body,
            created_at: self.created_at,
            status: self.status,
            failure_reason: self.failure_reason.as_deref(),
            history: &self.history,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Artifact {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Record::deserialize(deserializer).map(Artifact::from)
    }
}

/// Result of decoding a stored collection
#[derive(Debug, Default)]
pub struct DecodedCollection {
    /// Records that decoded, in stored order
    pub artifacts: Vec<Artifact>,
    /// Records that could not be decoded, verbatim
    pub unreadable: Vec<Value>,
}

/// `id` of an undecodable record, when it has a string one
#[must_use]
pub fn raw_record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

#[derive(Serialize)]
#[serde(untagged)]
enum Entry<'a> {
    Artifact(&'a Artifact),
    Raw(&'a Value),
}

/// Serialize the whole collection, newest first
///
/// # Errors
/// Propagates serializer failures.
pub fn encode_collection(artifacts: &[Artifact]) -> Result<Vec<u8>, serde_json::Error> {
    encode_collection_with(artifacts, &[])
}

/// Serialize the collection followed by records kept from an earlier load
///
/// # Errors
/// Propagates serializer failures.
pub fn encode_collection_with(
    artifacts: &[Artifact],
    unreadable: &[Value],
) -> Result<Vec<u8>, serde_json::Error> {
    let entries: Vec<Entry<'_>> = artifacts
        .iter()
        .map(Entry::Artifact)
        .chain(unreadable.iter().map(Entry::Raw))
        .collect();
    serde_json::to_vec_pretty(&entries)
}

/// Decode a stored collection.
///
/// The top level must be a JSON array; individual records that fail to
/// decode land in [`DecodedCollection::unreadable`] instead of failing the
/// whole load.
///
/// # Errors
/// Fails when the bytes are not a JSON array.
pub fn decode_collection(bytes: &[u8]) -> Result<DecodedCollection, serde_json::Error> {
    let records: Vec<Value> = serde_json::from_slice(bytes)?;
    let mut decoded = DecodedCollection::default();
    for record in records {
        match Artifact::deserialize(&record) {
            Ok(artifact) => decoded.artifacts.push(artifact),
            Err(_) => decoded.unreadable.push(record),
        }
    }
    Ok(decoded)
}
