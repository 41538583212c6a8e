use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotesUpdateMessage {
    pub poll_id: String,
    pub option_id: String,
    pub vote_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteAckError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteAckMessage {
    pub poll_id: String,
    pub option_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<VoteAckError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    #[serde(rename_all = "camelCase")]
    VoteCast {
        poll_id: String,
        option_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    VotesUpdate(VotesUpdateMessage),
    VoteAck(VoteAckMessage),
}

/// Result of a submission attempt. `accepted` means dispatched, not counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub accepted: bool,
    pub reason: Option<String>,
}

impl SubmitOutcome {
    pub const NOT_CONNECTED: &'static str = "not connected";
    pub const MISSING_POLL_ID: &'static str = "missing poll id";

    pub fn accepted() -> Self {
        SubmitOutcome {
            accepted: true,
            reason: None,
        }
    }

    pub fn rejected(reason: &str) -> Self {
        SubmitOutcome {
            accepted: false,
            reason: Some(reason.to_string()),
        }
    }
}
