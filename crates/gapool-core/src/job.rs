// crates/gapool-core/src/job.rs
//
// Job templates handed out to miners, the share payloads they submit back,
// and the verdict the chain node returns for a share.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifier derived from a job's `data`, used to detect a changed job
/// without comparing full payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a work payload (hex SHA-256 of its bytes).
    pub fn of(data: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        Fingerprint(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A proof-of-work job: the payload to mine and its difficulty target.
///
/// Immutable once built. The cache replaces templates wholesale, so the
/// fields are private and only readable through accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTemplate {
    data: String,
    difficulty: u64,
    fingerprint: Fingerprint,
    fetched_at: DateTime<Utc>,
}

impl JobTemplate {
    /// Build a template, deriving its fingerprint from `data`.
    pub fn new(data: impl Into<String>, difficulty: u64) -> Self {
        let data = data.into();
        let fingerprint = Fingerprint::of(&data);
        Self {
            data,
            difficulty,
            fingerprint,
            fetched_at: Utc::now(),
        }
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn difficulty(&self) -> u64 {
        self.difficulty
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// When this template was obtained from the chain node.
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// The `{data, difficulty}` body sent to miners.
    pub fn work(&self) -> JobWork<'_> {
        JobWork {
            data: &self.data,
            difficulty: self.difficulty,
        }
    }
}

/// Wire view of a job template, as carried in responses and notifications.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct JobWork<'a> {
    pub data: &'a str,
    pub difficulty: u64,
}

/// A share submitted by a miner: the solved work payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionPayload {
    pub data: String,
}

/// The chain node's verdict on a submitted share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVerdict {
    /// The node accepted the share.
    pub accepted: bool,
    /// The share extended the chain, so the current job is now stale.
    pub advanced_chain: bool,
    /// Free-form detail reported by the node, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SubmitVerdict {
    pub fn rejected(detail: impl Into<String>) -> Self {
        Self {
            accepted: false,
            advanced_chain: false,
            detail: Some(detail.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_depends_only_on_data() {
        let a = JobTemplate::new("abc", 5);
        let b = JobTemplate::new("abc", 9);
        let c = JobTemplate::new("abd", 5);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = Fingerprint::of("abc");
        assert_eq!(
            fp.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(fp.short(), "ba7816bf8f01");
    }

    #[test]
    fn short_never_splits_a_character() {
        assert_eq!(Fingerprint("abc".to_string()).short(), "abc");
        let wide = Fingerprint("é".repeat(10));
        assert_eq!(wide.short(), wide.as_str());
    }

    #[test]
    fn work_serializes_data_and_difficulty_only() {
        let job = JobTemplate::new("abc", 5);
        let value = serde_json::to_value(job.work()).unwrap();
        assert_eq!(value, serde_json::json!({"data": "abc", "difficulty": 5}));
    }

    #[test]
    fn verdict_uses_camel_case_and_omits_empty_detail() {
        let verdict = SubmitVerdict {
            accepted: true,
            advanced_chain: true,
            detail: None,
        };
        let value = serde_json::to_value(&verdict).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"accepted": true, "advancedChain": true})
        );

        let rejected = SubmitVerdict::rejected("stale");
        let value = serde_json::to_value(&rejected).unwrap();
        assert_eq!(value["detail"], "stale");
        assert_eq!(value["advancedChain"], false);
    }
}
