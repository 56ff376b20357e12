use super::error::CredentialError;
use super::model::{
    is_valid_credential, mask_credential, CredentialHealth, CredentialRecord, CredentialStats,
};
use super::{DEFAULT_MAX_CONCURRENCY, ERROR_THRESHOLD, MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::domain::synthesis::{SynthesisError, SynthesisErrorKind};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;

/// Message fragments that mark an otherwise unclassified error as throttling
const THROTTLE_MARKERS: &[&str] = &[
    "quota",
    "rate",
    "429",
    "limit",
    "exceeded",
    "timeout",
    "unavailable",
    "503",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleTier {
    Timeout,
    RateLimit,
}

impl ThrottleTier {
    pub fn cooldown(&self) -> Duration {
        match self {
            ThrottleTier::Timeout => Duration::minutes(10),
            ThrottleTier::RateLimit => Duration::minutes(5),
        }
    }
}

/// Decide whether a failure means "slow down" rather than "broken"
///
/// The error kind decides when it is conclusive. Kinds that carry no throttle
/// meaning of their own fall back to scanning the message.
pub fn classify_throttle(error: &SynthesisError) -> Option<ThrottleTier> {
    match error.kind {
        SynthesisErrorKind::Timeout => return Some(ThrottleTier::Timeout),
        SynthesisErrorKind::RateLimited
        | SynthesisErrorKind::QuotaOrForbidden
        | SynthesisErrorKind::Unavailable => return Some(ThrottleTier::RateLimit),
        SynthesisErrorKind::Unauthorized => return None,
        _ => {}
    }

    let message = error.message.to_lowercase();
    if message.contains("timeout") {
        Some(ThrottleTier::Timeout)
    } else if THROTTLE_MARKERS.iter().any(|marker| message.contains(marker)) {
        Some(ThrottleTier::RateLimit)
    } else {
        None
    }
}

struct TrackerState {
    records: Vec<CredentialRecord>,
    max_concurrency: usize,
}

impl TrackerState {
    fn record_mut(&mut self, id: &str) -> Option<&mut CredentialRecord> {
        self.records.iter_mut().find(|record| record.id == id)
    }

    /// Available credentials in pool order, promoting elapsed cooldowns
    fn healthy_at(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut healthy = Vec::new();
        for record in self.records.iter_mut() {
            if record.health == CredentialHealth::Error || record.is_cooling_down(now) {
                continue;
            }
            if record.cooldown_until.take().is_some() {
                record.health = CredentialHealth::Healthy;
                tracing::info!(
                    credential = %mask_credential(&record.id),
                    "Credential cooldown elapsed, back to healthy"
                );
            }
            healthy.push(record.id.clone());
        }
        healthy
    }
}

/// Owns the credential pool and every credential's health record
///
/// All reads and writes go through one mutex, so concurrent chunk tasks
/// reporting against the same credential never lose an update.
pub struct CredentialTracker {
    state: Mutex<TrackerState>,
}

impl Default for CredentialTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl CredentialTracker {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                records: Vec::new(),
                max_concurrency: max_concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY),
            }),
        }
    }

    /// Split newline- or comma-separated input into well-formed credentials
    pub fn parse_credentials(text: &str) -> Vec<String> {
        text.split(['\n', ','])
            .map(str::trim)
            .filter(|key| !key.is_empty() && is_valid_credential(key))
            .map(str::to_string)
            .collect()
    }

    /// Replace the pool, resetting every record. Returns the accepted count.
    pub fn set_credentials<I, S>(&self, credentials: I) -> Result<usize, CredentialError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut rejected = 0usize;
        let records: Vec<CredentialRecord> = credentials
            .into_iter()
            .filter_map(|key| {
                let key = key.as_ref().trim();
                if !is_valid_credential(key) {
                    rejected += 1;
                    return None;
                }
                seen.insert(key.to_string())
                    .then(|| CredentialRecord::new(key.to_string()))
            })
            .collect();

        if records.is_empty() {
            return Err(CredentialError::NoValidCredentials);
        }

        let accepted = records.len();
        self.state.lock().records = records;

        tracing::info!(
            accepted = accepted,
            rejected = rejected,
            "Credential pool replaced"
        );

        Ok(accepted)
    }

    pub fn set_max_concurrency(&self, max_concurrency: usize) -> usize {
        let clamped = max_concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY);
        self.state.lock().max_concurrency = clamped;
        clamped
    }

    pub fn max_concurrency(&self) -> usize {
        self.state.lock().max_concurrency
    }

    pub fn credential_count(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn healthy_credentials(&self) -> Vec<String> {
        self.healthy_credentials_at(Utc::now())
    }

    pub fn healthy_credentials_at(&self, now: DateTime<Utc>) -> Vec<String> {
        self.state.lock().healthy_at(now)
    }

    pub fn has_healthy_credentials(&self) -> bool {
        !self.healthy_credentials().is_empty()
    }

    pub fn healthy_count(&self) -> usize {
        self.healthy_credentials().len()
    }

    pub fn is_healthy(&self, id: &str) -> bool {
        self.healthy_credentials().iter().any(|key| key == id)
    }

    /// Least-used healthy credential, pool order breaking ties
    pub fn best_credential(&self) -> Result<String, CredentialError> {
        let mut state = self.state.lock();
        let healthy = state.healthy_at(Utc::now());

        healthy
            .iter()
            .filter_map(|id| state.records.iter().find(|record| &record.id == id))
            .min_by_key(|record| record.usage_count)
            .map(|record| record.id.clone())
            .ok_or(CredentialError::NoCredentialAvailable)
    }

    /// Round-robin one healthy credential per unit of work
    pub fn distribute_for_batch(&self, count: usize) -> Result<Vec<String>, CredentialError> {
        let healthy = self.healthy_credentials();
        if healthy.is_empty() {
            return Err(CredentialError::NoCredentialAvailable);
        }

        let assignments: Vec<String> = (0..count)
            .map(|i| healthy[i % healthy.len()].clone())
            .collect();

        let masked: Vec<String> = assignments.iter().map(|key| mask_credential(key)).collect();
        tracing::debug!(
            chunks = count,
            credentials = healthy.len(),
            assignments = ?masked,
            "Round-robin credential distribution"
        );

        Ok(assignments)
    }

    pub fn report_success(&self, id: &str) {
        self.report_success_at(id, Utc::now());
    }

    pub fn report_success_at(&self, id: &str, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        let Some(record) = state.record_mut(id) else {
            tracing::warn!(credential = %mask_credential(id), "Success reported for unknown credential");
            return;
        };

        record.usage_count += 1;
        record.last_used_at = Some(now);
        record.error_count = 0;

        if record.cooldown_until.is_some_and(|until| now >= until) {
            record.cooldown_until = None;
        }
        if record.health == CredentialHealth::Warning && record.cooldown_until.is_none() {
            record.health = CredentialHealth::Healthy;
        }
    }

    pub fn report_failure(&self, id: &str, error: &SynthesisError) {
        self.report_failure_at(id, error, Utc::now());
    }

    pub fn report_failure_at(&self, id: &str, error: &SynthesisError, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        let Some(record) = state.record_mut(id) else {
            tracing::warn!(credential = %mask_credential(id), "Failure reported for unknown credential");
            return;
        };

        record.error_count += 1;

        if let Some(tier) = classify_throttle(error) {
            let cooldown = tier.cooldown();
            record.cooldown_until = Some(now + cooldown);
            record.health = CredentialHealth::Warning;
            tracing::warn!(
                credential = %mask_credential(id),
                error_kind = %error.kind,
                cooldown_minutes = cooldown.num_minutes(),
                "Credential throttled, cooling down"
            );
            return;
        }

        if record.error_count >= ERROR_THRESHOLD {
            record.health = CredentialHealth::Error;
            tracing::error!(
                credential = %mask_credential(id),
                error_count = record.error_count,
                error = %error,
                "Credential disabled after repeated errors"
            );
        } else {
            record.health = CredentialHealth::Warning;
        }
    }

    /// Parallelism never exceeds the number of currently healthy credentials
    pub fn effective_concurrency(&self) -> usize {
        let mut state = self.state.lock();
        let healthy = state.healthy_at(Utc::now()).len();
        state.max_concurrency.min(healthy)
    }

    pub fn record(&self, id: &str) -> Option<CredentialRecord> {
        self.state
            .lock()
            .records
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    pub fn stats(&self) -> Vec<CredentialStats> {
        let mut state = self.state.lock();
        state.healthy_at(Utc::now());
        state.records.iter().map(CredentialStats::from).collect()
    }
}
