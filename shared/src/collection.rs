//! Remote collection client: request builders and response parsers for the
//! `posts` resource.
//!
//! Nothing here performs I/O. Requests are handed to the HTTP capability and
//! the shell's responses come back through the `parse_*` functions.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::capabilities::{HttpError, HttpRequest, HttpResponse, HttpResult, ValidatedUrl};
use crate::model::{Record, RecordDraft, RecordId};
use crate::DashboardConfig;

pub const RESOURCE_PATH: &str = "posts";

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("HTTP {status}")]
    Status { status: u16, body: Option<String> },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("could not build request: {0}")]
    Request(String),
}

impl From<HttpError> for TransportError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Timeout { timeout_ms, .. } => Self::Timeout { timeout_ms },
            HttpError::InvalidResponse { reason, .. } => Self::Decode(reason),
            other if other.is_local() => Self::Request(other.to_string()),
            other => Self::Network(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RemoteError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("post {0} not found")]
    NotFound(RecordId),
}

/// Wire shape of a post. Create and update responses may omit fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDto {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user_id: Option<u64>,
}

impl PostDto {
    /// Missing fields are taken from `draft`; a missing id from `fallback_id`.
    fn merge(self, draft: &RecordDraft, fallback_id: RecordId) -> Record {
        Record {
            id: self.id.map_or(fallback_id, RecordId),
            title: self.title.unwrap_or_else(|| draft.title.clone()),
            body: self.body.unwrap_or_else(|| draft.body.clone()),
            owner_id: self.user_id.unwrap_or(draft.owner_id),
        }
    }

    fn into_listed(self) -> Option<Record> {
        Some(Record {
            id: RecordId(self.id?),
            title: self.title.unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            owner_id: self.user_id.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PostBody<'a> {
    title: &'a str,
    body: &'a str,
    user_id: u64,
}

impl<'a> From<&'a RecordDraft> for PostBody<'a> {
    fn from(draft: &'a RecordDraft) -> Self {
        Self {
            title: &draft.title,
            body: &draft.body,
            user_id: draft.owner_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectionClient {
    collection_url: ValidatedUrl,
    timeout: Duration,
}

impl CollectionClient {
    pub fn new(base: &ValidatedUrl, timeout: Duration) -> Result<Self, HttpError> {
        Ok(Self {
            collection_url: base.join(RESOURCE_PATH)?,
            timeout,
        })
    }

    /// Config values are checked again here; a bad one fails the request it was built for.
    pub fn from_config(config: &DashboardConfig) -> Result<Self, HttpError> {
        let base = ValidatedUrl::new(config.base_url.as_str())?;
        Self::new(&base, config.request_timeout)
    }

    pub fn list_request(&self) -> Result<HttpRequest, HttpError> {
        HttpRequest::get(self.collection_url.clone()).with_timeout(self.timeout)
    }

    pub fn create_request(&self, draft: &RecordDraft) -> Result<HttpRequest, HttpError> {
        HttpRequest::post(self.collection_url.clone())
            .with_json(&PostBody::from(draft))?
            .with_timeout(self.timeout)
    }

    pub fn update_request(
        &self,
        id: RecordId,
        draft: &RecordDraft,
    ) -> Result<HttpRequest, HttpError> {
        HttpRequest::put(self.item_url(id)?)
            .with_json(&PostBody::from(draft))?
            .with_timeout(self.timeout)
    }

    pub fn remove_request(&self, id: RecordId) -> Result<HttpRequest, HttpError> {
        HttpRequest::delete(self.item_url(id)?).with_timeout(self.timeout)
    }

    fn item_url(&self, id: RecordId) -> Result<ValidatedUrl, HttpError> {
        self.collection_url.join(&id.to_string())
    }
}

fn successful(result: HttpResult) -> Result<HttpResponse, TransportError> {
    let response = result?;
    if response.is_success() {
        Ok(response)
    } else {
        let body = String::from_utf8_lossy(response.body()).into_owned();
        debug!(
            status = response.status(),
            request_id = response.request_id(),
            "non-2xx response"
        );
        Err(TransportError::Status {
            status: response.status(),
            body: (!body.is_empty()).then_some(body),
        })
    }
}

/// Entries without an id are skipped. Repeated ids are left for the cache to drop.
pub fn parse_list(result: HttpResult) -> Result<Vec<Record>, TransportError> {
    let response = successful(result)?;
    let posts: Vec<PostDto> = response.json()?;
    let total = posts.len();
    let records: Vec<Record> = posts.into_iter().filter_map(PostDto::into_listed).collect();
    if records.len() != total {
        warn!(skipped = total - records.len(), "list entries without id skipped");
    }
    Ok(records)
}

/// The created record always takes `assigned_id`; the server's echo id is ignored.
pub fn parse_created(
    result: HttpResult,
    draft: &RecordDraft,
    assigned_id: RecordId,
) -> Result<Record, TransportError> {
    let response = successful(result)?;
    let dto = decode_optional(&response)?;
    let mut record = dto.merge(draft, assigned_id);
    record.id = assigned_id;
    Ok(record)
}

/// The submitted id wins over whatever the server echoes.
pub fn parse_updated(
    result: HttpResult,
    id: RecordId,
    draft: &RecordDraft,
) -> Result<Record, RemoteError> {
    let response = match successful(result) {
        Err(TransportError::Status { status: 404, .. }) => return Err(RemoteError::NotFound(id)),
        other => other?,
    };
    let dto = decode_optional(&response)?;
    let mut record = dto.merge(draft, id);
    record.id = id;
    Ok(record)
}

pub fn parse_removed(result: HttpResult) -> Result<(), TransportError> {
    successful(result).map(|_| ())
}

fn decode_optional(response: &HttpResponse) -> Result<PostDto, TransportError> {
    if response.body().iter().all(u8::is_ascii_whitespace) {
        return Ok(PostDto {
            id: None,
            title: None,
            body: None,
            user_id: None,
        });
    }
    Ok(response.json()?)
}

/// Shown when the remote list cannot be fetched.
#[must_use]
pub fn fallback_records() -> Vec<Record> {
    vec![
        Record {
            id: RecordId(1),
            title: "Welcome to the Admin Panel".into(),
            body: concat!(
                "This is a sample post to demonstrate the functionality of the admin panel. ",
                "You can add, edit, and delete posts here."
            )
            .into(),
            owner_id: 1,
        },
        Record {
            id: RecordId(2),
            title: "Getting Started Guide".into(),
            body: concat!(
                "Learn how to use all the features of this admin panel. ",
                "Navigate through different sections using the sidebar."
            )
            .into(),
            owner_id: 1,
        },
        Record {
            id: RecordId(3),
            title: "Data Management".into(),
            body: concat!(
                "Manage your data efficiently with our comprehensive ",
                "data management tools and features."
            )
            .into(),
            owner_id: 2,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::HttpMethod;

    fn client() -> CollectionClient {
        let base = ValidatedUrl::new("https://jsonplaceholder.typicode.com").unwrap();
        CollectionClient::new(&base, Duration::from_secs(30)).unwrap()
    }

    fn ok(status: u16, body: &str) -> HttpResult {
        Ok(HttpResponse::new(status, body.as_bytes().to_vec(), "req"))
    }

    fn draft() -> RecordDraft {
        RecordDraft::new("Hello there", "A body of sufficient length", 4)
    }

    #[test]
    fn builds_requests_against_posts() {
        let client = client();

        let list = client.list_request().unwrap();
        assert_eq!(list.method(), HttpMethod::Get);
        assert_eq!(list.url().as_str(), "https://jsonplaceholder.typicode.com/posts");
        assert_eq!(list.timeout(), Duration::from_secs(30));

        let create = client.create_request(&draft()).unwrap();
        assert_eq!(create.method(), HttpMethod::Post);
        let body: serde_json::Value = serde_json::from_slice(create.body().unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "title": "Hello there",
                "body": "A body of sufficient length",
                "userId": 4
            })
        );

        let update = client.update_request(RecordId(7), &draft()).unwrap();
        assert_eq!(update.method(), HttpMethod::Put);
        assert_eq!(update.url().as_str(), "https://jsonplaceholder.typicode.com/posts/7");

        let remove = client.remove_request(RecordId(7)).unwrap();
        assert_eq!(remove.method(), HttpMethod::Delete);
        assert!(remove.body().is_none());
    }

    #[test]
    fn client_from_config_checks_the_base_url() {
        let config = DashboardConfig {
            base_url: "http://127.0.0.1:4000/api".into(),
            ..DashboardConfig::default()
        };
        let list = CollectionClient::from_config(&config)
            .unwrap()
            .list_request()
            .unwrap();
        assert_eq!(list.url().as_str(), "http://127.0.0.1:4000/api/posts");

        let broken = DashboardConfig {
            base_url: "not a url".into(),
            ..DashboardConfig::default()
        };
        assert!(matches!(
            CollectionClient::from_config(&broken),
            Err(HttpError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn list_parses_posts() {
        let records = parse_list(ok(
            200,
            r#"[{"id":1,"title":"a","body":"b","userId":3},{"title":"no id"}]"#,
        ))
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].owner_id, 3);
    }

    #[test]
    fn list_errors_are_classified() {
        assert!(matches!(
            parse_list(ok(500, "oops")),
            Err(TransportError::Status { status: 500, body: Some(_) })
        ));
        assert!(matches!(parse_list(ok(200, "<html>")), Err(TransportError::Decode(_))));
        assert!(matches!(
            parse_list(Err(HttpError::Timeout { timeout_ms: 30_000, request_id: "r".into() })),
            Err(TransportError::Timeout { timeout_ms: 30_000 })
        ));
        assert!(matches!(
            parse_list(Err(HttpError::Connection { host: "h".into(), message: "refused".into() })),
            Err(TransportError::Network(_))
        ));
    }

    #[test]
    fn created_record_keeps_assigned_id_and_fills_gaps() {
        let created = ok(201, r#"{"id":101,"title":"Hello there"}"#);
        let record = parse_created(created, &draft(), RecordId(4)).unwrap();
        assert_eq!(record.id, RecordId(4));
        assert_eq!(record.body, "A body of sufficient length");
        assert_eq!(record.owner_id, 4);

        let empty = parse_created(ok(201, ""), &draft(), RecordId(9)).unwrap();
        assert_eq!(empty, draft().into_record(RecordId(9)));
    }

    #[test]
    fn update_404_is_not_found() {
        assert!(matches!(
            parse_updated(ok(404, "{}"), RecordId(3), &draft()),
            Err(RemoteError::NotFound(RecordId(3)))
        ));
        assert!(matches!(
            parse_updated(ok(500, ""), RecordId(3), &draft()),
            Err(RemoteError::Transport(TransportError::Status { status: 500, body: None }))
        ));
        let echoed = ok(200, r#"{"id":99,"title":"Server title"}"#);
        let updated = parse_updated(echoed, RecordId(3), &draft()).unwrap();
        assert_eq!(updated.id, RecordId(3));
        assert_eq!(updated.title, "Server title");
    }

    #[test]
    fn remove_accepts_any_2xx() {
        assert!(parse_removed(ok(200, "{}")).is_ok());
        assert!(parse_removed(ok(204, "")).is_ok());
        assert!(matches!(
            parse_removed(ok(403, "")),
            Err(TransportError::Status { status: 403, .. })
        ));
    }

    #[test]
    fn fallback_dataset_is_fixed() {
        let records = fallback_records();
        let ids: Vec<u64> = records.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(records[2].title, "Data Management");
        assert_eq!(records[2].owner_id, 2);
    }
}
