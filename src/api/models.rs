use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollStatus {
    Active,
    Inactive,
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::Active => "ACTIVE",
            PollStatus::Inactive => "INACTIVE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: PollStatus,
    pub allow_guests: bool,
    pub allow_multiple: bool,
    pub created_at: String,
    pub expires_at: Option<String>,
    pub options: Vec<PollOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub id: String,
    pub poll_id: String,
    pub text: String,
    pub position: i64,
    pub created_at: String,
    pub vote_count: u64,
}

impl Poll {
    /// Options in display order. Equal positions keep their server order.
    pub fn options_by_position(&self) -> Vec<&PollOption> {
        let mut options: Vec<&PollOption> = self.options.iter().collect();
        options.sort_by_key(|opt| opt.position);
        options
    }

    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|opt| opt.vote_count).sum()
    }

    /// An absent or unparsable expiry never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .is_some_and(|expires| expires.with_timezone(&Utc) <= now)
    }

    pub fn option(&self, option_id: &str) -> Option<&PollOption> {
        self.options.iter().find(|opt| opt.id == option_id)
    }
}
