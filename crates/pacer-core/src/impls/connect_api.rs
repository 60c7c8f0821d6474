//! ConnectApiSource - Garmin Connect 互換 API の activity source
//!
//! # 実装
//! - 最新 1 件: `GET {base}/activitylist-service/activities/search/activities?start=0&limit=1`
//! - 表示名: `GET {base}/userprofile-service/socialProfile` の `fullName`（adapter ごとに 1 回だけ取得）
//! - 認証: session blob 内の access token を Bearer で送る
//!
//! # ステータスの扱い
//! - 401 → Auth
//! - 403 / 429 → RateLimited（取得元は短間隔アクセスを "Forbidden" で返す）
//! - それ以外の失敗、transport error、body の parse 失敗 → Transient

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::debug;

use super::http::{build_client, normalize_base_url, snippet};
use crate::domain::{ActivityId, ActivityRecord, ConfigError, Session, SourceError};
use crate::ports::ActivityQuerySource;

const LATEST_PATH: &str = "/activitylist-service/activities/search/activities";
const PROFILE_PATH: &str = "/userprofile-service/socialProfile";

pub struct ConnectApiSource {
    http: reqwest::Client,
    base_url: String,
    owner_name: OnceCell<String>,
}

impl ConnectApiSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            http: build_client(timeout)?,
            base_url: normalize_base_url(base_url)?,
            owner_name: OnceCell::new(),
        })
    }

    async fn get_text(&self, url: &str, token: &str, query: &[(&str, &str)]) -> Result<String, SourceError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| SourceError::Transient(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Transient(e.to_string()))?;
        classify_status(status, &body)?;
        Ok(body)
    }

    async fn owner_name(&self, token: &str) -> Result<&str, SourceError> {
        let name = self
            .owner_name
            .get_or_try_init(|| async {
                let url = format!("{}{}", self.base_url, PROFILE_PATH);
                let body = self.get_text(&url, token, &[]).await?;
                parse_owner_name(&body)
            })
            .await?;
        Ok(name.as_str())
    }
}

#[async_trait]
impl ActivityQuerySource for ConnectApiSource {
    async fn fetch_latest(&self, session: &Session) -> Result<Option<ActivityRecord>, SourceError> {
        let token = session
            .bearer_token()
            .ok_or_else(|| SourceError::Auth("session has no access token".to_string()))?;

        let url = format!("{}{}", self.base_url, LATEST_PATH);
        let body = self
            .get_text(&url, token, &[("start", "0"), ("limit", "1")])
            .await?;
        let Some(summary) = parse_latest(&body)? else {
            return Ok(None);
        };

        let owner = self.owner_name(token).await?;
        let record = summary.into_record(owner);
        debug!(activity_id = %record.id, activity_type = %record.activity_type, "fetched latest activity");
        Ok(Some(record))
    }
}

/// Map a non-success HTTP status to the source error taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> Result<(), SourceError> {
    if status.is_success() {
        return Ok(());
    }
    let detail = format!("HTTP {status}: {}", snippet(body, 200));
    match status {
        StatusCode::UNAUTHORIZED => Err(SourceError::Auth(detail)),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => Err(SourceError::RateLimited(detail)),
        _ => Err(SourceError::Transient(detail)),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct ActivityType {
    #[serde(rename = "typeKey")]
    type_key: String,
}

/// One entry of the activity search response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    activity_id: RawId,
    activity_type: ActivityType,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    elapsed_duration: Option<f64>,
    #[serde(default)]
    duration: Option<f64>,
}

impl ActivitySummary {
    pub fn into_record(self, owner_name: &str) -> ActivityRecord {
        let id = match self.activity_id {
            RawId::Number(n) => ActivityId::from(n),
            RawId::Text(s) => ActivityId::from(s),
        };
        ActivityRecord {
            id,
            activity_type: self.activity_type.type_key,
            distance_meters: self.distance.unwrap_or(0.0),
            duration_secs: self.elapsed_duration.or(self.duration).unwrap_or(0.0),
            owner_name: owner_name.to_string(),
        }
    }
}

/// Parse the search response; an empty list means no activities yet.
pub fn parse_latest(body: &str) -> Result<Option<ActivitySummary>, SourceError> {
    let mut entries: Vec<ActivitySummary> = serde_json::from_str(body)
        .map_err(|e| SourceError::Transient(format!("unexpected activity list: {e}")))?;
    if entries.is_empty() {
        return Ok(None);
    }
    Ok(Some(entries.swap_remove(0)))
}

pub fn parse_owner_name(body: &str) -> Result<String, SourceError> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Profile {
        full_name: Option<String>,
        display_name: Option<String>,
    }

    let profile: Profile = serde_json::from_str(body)
        .map_err(|e| SourceError::Transient(format!("unexpected profile: {e}")))?;
    profile
        .full_name
        .or(profile.display_name)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| SourceError::Transient("profile has no name".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(StatusCode::UNAUTHORIZED, "auth")]
    #[case(StatusCode::FORBIDDEN, "rate")]
    #[case(StatusCode::TOO_MANY_REQUESTS, "rate")]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, "transient")]
    #[case(StatusCode::NOT_FOUND, "transient")]
    fn statuses_map_to_source_errors(#[case] status: StatusCode, #[case] expected: &str) {
        let err = classify_status(status, "Forbidden url").unwrap_err();
        let actual = match err {
            SourceError::Auth(_) => "auth",
            SourceError::RateLimited(_) => "rate",
            SourceError::Transient(_) => "transient",
        };
        assert_eq!(actual, expected);
    }

    #[test]
    fn success_passes_through() {
        assert!(classify_status(StatusCode::OK, "[]").is_ok());
    }

    #[test]
    fn parses_the_latest_activity() {
        let body = r#"[{
            "activityId": 250,
            "activityName": "Morning Run",
            "activityType": { "typeId": 1, "typeKey": "running" },
            "distance": 3218.0,
            "duration": 1795.2,
            "elapsedDuration": 1800.0
        }]"#;

        let record = parse_latest(body).unwrap().unwrap().into_record("Alice");
        assert_eq!(record.id, ActivityId::from(250));
        assert_eq!(record.activity_type, "running");
        assert_eq!(record.distance_meters, 3218.0);
        assert_eq!(record.duration_secs, 1800.0);
        assert_eq!(record.owner_name, "Alice");
    }

    #[test]
    fn missing_distance_defaults_to_zero() {
        let body = r#"[{
            "activityId": "yoga-1",
            "activityType": { "typeKey": "yoga" },
            "distance": null,
            "duration": 600.0
        }]"#;

        let record = parse_latest(body).unwrap().unwrap().into_record("Bob");
        assert_eq!(record.id, ActivityId::from("yoga-1"));
        assert_eq!(record.distance_meters, 0.0);
        assert_eq!(record.duration_secs, 600.0);
    }

    #[test]
    fn empty_list_means_no_activity() {
        assert!(parse_latest("[]").unwrap().is_none());
    }

    #[test]
    fn garbage_body_is_transient() {
        let err = parse_latest("<html>maintenance</html>").unwrap_err();
        assert!(matches!(err, SourceError::Transient(_)));
    }

    #[test]
    fn owner_name_prefers_full_name() {
        assert_eq!(
            parse_owner_name(r#"{"fullName":"Alice Smith","displayName":"alice"}"#).unwrap(),
            "Alice Smith"
        );
        assert_eq!(
            parse_owner_name(r#"{"displayName":"alice"}"#).unwrap(),
            "alice"
        );
        assert!(parse_owner_name(r#"{"fullName":""}"#).is_err());
    }

    #[tokio::test]
    async fn session_without_token_is_an_auth_error() {
        let source = ConnectApiSource::new("https://connect.example.com", Duration::from_secs(5)).unwrap();
        let session = Session::new(serde_json::json!({ "cookies": [] }));

        let err = source.fetch_latest(&session).await.unwrap_err();
        assert!(matches!(err, SourceError::Auth(_)));
    }
}
