use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observation of a community, as extracted from a listing page or an about document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub name: String,
    pub subscribers: u64,
    pub active_users: u64,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub description: String,
    pub scraped_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "RecordMetadata::is_empty")]
    pub metadata: RecordMetadata,
}

/// Optional extras a source may carry alongside the core fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsfw: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_utc: Option<f64>,
}

impl RecordMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A [`Record`] plus the history derived from earlier observations of the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRecord {
    #[serde(flatten)]
    pub record: Record,
    pub previous_subscribers: u64,
    pub previous_active_users: u64,
    pub subscriber_growth_rate: f64,
    pub active_user_growth_rate: f64,
    pub engagement_ratio: f64,
    pub scrape_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl TrackedRecord {
    /// First observation of an id. Previous counts mirror the current ones, growth is zero.
    pub fn first_observation(record: Record, now: DateTime<Utc>) -> Self {
        Self {
            previous_subscribers: record.subscribers,
            previous_active_users: record.active_users,
            subscriber_growth_rate: 0.0,
            active_user_growth_rate: 0.0,
            engagement_ratio: engagement_ratio(record.active_users, record.subscribers),
            scrape_count: 1,
            first_seen: now,
            last_updated: now,
            record,
        }
    }

    /// Builds the successor of `self` from a fresh observation.
    /// Growth is measured against the counts `self` holds, not against `record`.
    pub fn observe(&self, record: Record, now: DateTime<Utc>) -> Self {
        Self {
            previous_subscribers: self.record.subscribers,
            previous_active_users: self.record.active_users,
            subscriber_growth_rate: growth_rate(self.record.subscribers, record.subscribers),
            active_user_growth_rate: growth_rate(self.record.active_users, record.active_users),
            engagement_ratio: engagement_ratio(record.active_users, record.subscribers),
            scrape_count: self.scrape_count + 1,
            first_seen: self.first_seen,
            last_updated: now.max(self.first_seen),
            record,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }
}

/// `(current - previous) / previous`, or `0` when there is no previous count.
pub fn growth_rate(previous: u64, current: u64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    (current as f64 - previous as f64) / previous as f64
}

/// `active / subscribers`, or `0` for a community without subscribers.
pub fn engagement_ratio(active_users: u64, subscribers: u64) -> f64 {
    if subscribers == 0 {
        return 0.0;
    }
    active_users as f64 / subscribers as f64
}
