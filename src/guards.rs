//! Structural predicates for untrusted JSON.
//!
//! These are the only functions allowed to turn a raw `serde_json::Value`
//! into a typed model. Each `is_*` predicate is a pure yes/no verdict; the
//! `to_*` helpers run the predicate first and only then deserialize, so
//! nothing downstream ever re-checks a shape.

use crate::api::envelope::{ApiError, ApiErrorCode, ApiResponse};
use crate::api::models::{Poll, PollOption};
use crate::realtime::models::{InboundMessage, VoteAckMessage, VotesUpdateMessage};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

type Record = Map<String, Value>;

fn is_string(v: Option<&Value>) -> bool {
    matches!(v, Some(Value::String(_)))
}

fn is_bool(v: Option<&Value>) -> bool {
    matches!(v, Some(Value::Bool(_)))
}

fn is_nullable_string(v: Option<&Value>) -> bool {
    matches!(v, Some(Value::String(_)) | Some(Value::Null))
}

fn is_integer(v: Option<&Value>) -> bool {
    v.is_some_and(|n| n.as_i64().is_some())
}

fn is_count(v: Option<&Value>) -> bool {
    v.is_some_and(|n| n.as_u64().is_some())
}

fn has_tag(record: &Record, tag: &str) -> bool {
    record.get("type").and_then(Value::as_str) == Some(tag)
}

pub fn is_api_response(v: &Value) -> bool {
    v.as_object().is_some_and(|r| is_bool(r.get("success")))
}

pub fn is_api_error(v: &Value) -> bool {
    let Some(r) = v.as_object() else {
        return false;
    };

    r.get("code")
        .and_then(Value::as_str)
        .is_some_and(|code| ApiErrorCode::parse(code).is_some())
        && is_string(r.get("message"))
        && r.get("details").is_none_or(Value::is_object)
}

pub fn is_poll_option(v: &Value) -> bool {
    let Some(r) = v.as_object() else {
        return false;
    };

    is_string(r.get("id"))
        && is_string(r.get("pollId"))
        && is_string(r.get("text"))
        && is_integer(r.get("position"))
        && is_string(r.get("createdAt"))
        && is_count(r.get("voteCount"))
}

pub fn is_poll(v: &Value) -> bool {
    let Some(r) = v.as_object() else {
        return false;
    };

    is_string(r.get("id"))
        && is_string(r.get("ownerId"))
        && is_string(r.get("title"))
        && is_nullable_string(r.get("description"))
        && matches!(
            r.get("status").and_then(Value::as_str),
            Some("ACTIVE") | Some("INACTIVE")
        )
        && is_bool(r.get("allowGuests"))
        && is_bool(r.get("allowMultiple"))
        && is_string(r.get("createdAt"))
        && is_nullable_string(r.get("expiresAt"))
        && r.get("options")
            .and_then(Value::as_array)
            .is_some_and(|options| options.iter().all(is_poll_option))
}

pub fn is_poll_list(v: &Value) -> bool {
    v.as_array().is_some_and(|polls| polls.iter().all(is_poll))
}

pub fn is_votes_update_message(v: &Value) -> bool {
    let Some(r) = v.as_object() else {
        return false;
    };

    has_tag(r, "votes_update")
        && is_string(r.get("pollId"))
        && is_string(r.get("optionId"))
        && is_count(r.get("voteCount"))
}

pub fn is_vote_ack_message(v: &Value) -> bool {
    let Some(r) = v.as_object() else {
        return false;
    };

    // `error` may be absent, but when present it must be well formed
    let error_ok = match r.get("error") {
        None => true,
        Some(Value::Object(e)) => is_string(e.get("code")) && is_string(e.get("message")),
        Some(_) => false,
    };

    has_tag(r, "vote_ack")
        && is_string(r.get("pollId"))
        && is_string(r.get("optionId"))
        && is_bool(r.get("success"))
        && error_ok
}

fn convert<T: DeserializeOwned>(v: Value, guard: fn(&Value) -> bool) -> Option<T> {
    if !guard(&v) {
        return None;
    }
    serde_json::from_value(v).ok()
}

/// `None` for anything that is not an envelope, including a failure
/// envelope whose `error` is malformed.
pub fn to_api_response(v: Value) -> Option<ApiResponse> {
    if !is_api_response(&v) {
        return None;
    }
    let Value::Object(mut r) = v else {
        return None;
    };

    if r.get("success") == Some(&Value::Bool(true)) {
        return Some(ApiResponse::Success(r.remove("data").unwrap_or(Value::Null)));
    }

    let error: ApiError = convert(r.remove("error")?, is_api_error)?;
    Some(ApiResponse::Failure(error))
}

pub fn to_poll_option(v: Value) -> Option<PollOption> {
    convert(v, is_poll_option)
}

pub fn to_poll(v: Value) -> Option<Poll> {
    convert(v, is_poll)
}

pub fn to_poll_list(v: Value) -> Option<Vec<Poll>> {
    convert(v, is_poll_list)
}

/// Classifies a realtime frame. Unknown tags and bad shapes are `None`.
pub fn to_inbound_message(v: Value) -> Option<InboundMessage> {
    if is_votes_update_message(&v) {
        convert::<VotesUpdateMessage>(v, is_votes_update_message).map(InboundMessage::VotesUpdate)
    } else if is_vote_ack_message(&v) {
        convert::<VoteAckMessage>(v, is_vote_ack_message).map(InboundMessage::VoteAck)
    } else {
        None
    }
}
