use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MASK_PREFIX_LEN: usize = 10;
const MIN_CREDENTIAL_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialHealth {
    Healthy,
    Warning,
    Error,
}

/// Health and usage bookkeeping for one pooled credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: String,
    pub health: CredentialHealth,
    pub usage_count: u64,
    pub error_count: u32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    pub fn new(id: String) -> Self {
        Self {
            id,
            health: CredentialHealth::Healthy,
            usage_count: 0,
            error_count: 0,
            last_used_at: None,
            cooldown_until: None,
        }
    }

    pub fn is_cooling_down(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }
}

/// Display view of a credential; never carries the full secret
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialStats {
    pub key: String,
    pub health: CredentialHealth,
    pub usage: u64,
    pub errors: u32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_rate_limited: bool,
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl From<&CredentialRecord> for CredentialStats {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            key: mask_credential(&record.id),
            health: record.health,
            usage: record.usage_count,
            errors: record.error_count,
            last_used_at: record.last_used_at,
            is_rate_limited: record.cooldown_until.is_some(),
            cooldown_until: record.cooldown_until,
        }
    }
}

/// Format heuristic for Google-style API keys
pub fn is_valid_credential(key: &str) -> bool {
    key.len() > MIN_CREDENTIAL_LEN && key.contains("AI")
}

pub fn mask_credential(key: &str) -> String {
    let prefix: String = key.chars().take(MASK_PREFIX_LEN).collect();
    format!("{}...", prefix)
}
