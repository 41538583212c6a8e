use crate::api::envelope::ApiResponse;
use crate::api::models::Poll;
use crate::error::LoadError;
use crate::guards;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Snapshot loader for the poll HTTP endpoints.
#[derive(Debug, Clone)]
pub struct PollsClient {
    http: Client,
    base_url: Url,
}

impl PollsClient {
    pub fn new(base_url: Url) -> Result<Self, LoadError> {
        if base_url.cannot_be_a_base() {
            return Err(LoadError::Request(format!("{base_url} cannot be a base URL")));
        }

        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!("poll-live-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, base_url })
    }

    /// `GET /polls`
    pub async fn list_polls(&self) -> Result<Vec<Poll>, LoadError> {
        let data = self.fetch_data(&["polls"], false).await?;
        let polls = guards::to_poll_list(data).ok_or(LoadError::InvalidPollList)?;
        info!("loaded {} polls", polls.len());
        Ok(polls)
    }

    /// `GET /polls/{id}`; a 404 becomes `PollNotFound`.
    pub async fn get_poll(&self, poll_id: &str) -> Result<Poll, LoadError> {
        let data = self.fetch_data(&["polls", poll_id], true).await?;
        let poll = guards::to_poll(data).ok_or(LoadError::InvalidPoll)?;
        info!("loaded poll {} with {} options", poll.id, poll.options.len());
        Ok(poll)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, LoadError> {
        let mut endpoint = self.base_url.clone();
        endpoint
            .path_segments_mut()
            .map_err(|_| LoadError::Request(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(endpoint)
    }

    async fn fetch_data(&self, segments: &[&str], detail: bool) -> Result<Value, LoadError> {
        let endpoint = self.endpoint(segments)?;
        debug!("GET {}", endpoint);

        let resp = self.http.get(endpoint).send().await?;
        let status = resp.status();

        if !status.is_success() {
            if detail && status == StatusCode::NOT_FOUND {
                return Err(LoadError::PollNotFound);
            }
            return Err(LoadError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body: Value = resp.json().await.map_err(|_| LoadError::InvalidEnvelope)?;

        match guards::to_api_response(body) {
            Some(ApiResponse::Success(data)) => Ok(data),
            Some(ApiResponse::Failure(error)) => Err(LoadError::Api {
                code: error.code,
                message: error.message,
            }),
            None => Err(LoadError::InvalidEnvelope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::envelope::ApiErrorCode;
    use axum::{
        Json, Router,
        extract::Path,
        http::StatusCode as AxumStatus,
        response::{IntoResponse, Response},
        routing::get,
    };
    use serde_json::json;

    fn poll_json(id: &str) -> Value {
        json!({
            "id": id,
            "ownerId": "u1",
            "title": "Lunch?",
            "description": "Pick one",
            "status": "ACTIVE",
            "allowGuests": false,
            "allowMultiple": false,
            "createdAt": "2025-01-01T00:00:00Z",
            "expiresAt": null,
            "options": [{
                "id": "a",
                "pollId": id,
                "text": "Pizza",
                "position": 1,
                "createdAt": "2025-01-01T00:00:00Z",
                "voteCount": 2
            }]
        })
    }

    async fn list() -> Json<Value> {
        Json(json!({"success": true, "data": [poll_json("p1"), poll_json("p2")]}))
    }

    async fn detail(Path(id): Path<String>) -> Response {
        match id.as_str() {
            "missing" => (AxumStatus::NOT_FOUND, "nope").into_response(),
            "broken" => (AxumStatus::INTERNAL_SERVER_ERROR, "boom").into_response(),
            "not-json" => (AxumStatus::OK, "hello").into_response(),
            "no-envelope" => Json(poll_json("no-envelope")).into_response(),
            "bad-shape" => {
                let mut poll = poll_json("bad-shape");
                poll.as_object_mut().unwrap().remove("title");
                Json(json!({"success": true, "data": poll})).into_response()
            }
            "private" => Json(json!({
                "success": false,
                "error": {"code": "FORBIDDEN", "message": "private poll"}
            }))
            .into_response(),
            _ => Json(json!({"success": true, "data": poll_json(&id)})).into_response(),
        }
    }

    async fn serve() -> PollsClient {
        let app = Router::new()
            .route("/polls", get(list))
            .route("/polls/:id", get(detail));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        PollsClient::new(Url::parse(&format!("http://{addr}")).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn lists_and_loads_polls() {
        let client = serve().await;

        let polls = client.list_polls().await.unwrap();
        assert_eq!(polls.len(), 2);
        assert_eq!(polls[1].id, "p2");

        let poll = client.get_poll("p7").await.unwrap();
        assert_eq!(poll.id, "p7");
        assert_eq!(poll.options[0].vote_count, 2);
    }

    #[tokio::test]
    async fn maps_each_failure_to_its_load_error() {
        let client = serve().await;

        assert!(matches!(
            client.get_poll("missing").await,
            Err(LoadError::PollNotFound)
        ));
        let Err(LoadError::Http { status, reason }) = client.get_poll("broken").await else {
            panic!("expected HTTP error");
        };
        assert_eq!(status, 500);
        assert_eq!(reason, "Internal Server Error");

        assert!(matches!(
            client.get_poll("not-json").await,
            Err(LoadError::InvalidEnvelope)
        ));
        assert!(matches!(
            client.get_poll("no-envelope").await,
            Err(LoadError::InvalidEnvelope)
        ));
        assert!(matches!(
            client.get_poll("bad-shape").await,
            Err(LoadError::InvalidPoll)
        ));

        let err = client.get_poll("private").await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::Api {
                code: ApiErrorCode::Forbidden,
                ..
            }
        ));
        assert_eq!(err.to_string(), "FORBIDDEN: private poll");
    }

    #[test]
    fn endpoints_keep_base_path() {
        let client = PollsClient::new(Url::parse("http://localhost:8000/api/").unwrap()).unwrap();
        assert_eq!(
            client.endpoint(&["polls", "p 1"]).unwrap().as_str(),
            "http://localhost:8000/api/polls/p%201"
        );
    }
}
