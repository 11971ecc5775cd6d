use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::config::ServiceConfig;
use crate::filter::Filter;
use crate::models::{DetailRecord, UserRecord};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    #[error("not authenticated")]
    Unauthenticated,

    #[error("decode: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityQuery {
    pub filter: Option<Filter>,
    /// Extra URL parameters, e.g. a raw `$filter` for count queries.
    pub params: Vec<(String, String)>,
}

impl EntityQuery {
    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            params: Vec::new(),
        }
    }

    pub fn raw_filter(expression: impl Into<String>) -> Self {
        Self {
            filter: None,
            params: vec![("$filter".to_string(), expression.into())],
        }
    }

    pub fn url_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.params.len() + 1);
        if let Some(filter) = &self.filter {
            params.push(("$filter".to_string(), filter.to_odata()));
        }
        params.extend(self.params.iter().cloned());
        params
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Result<UserRecord, ServiceError>;
}

#[async_trait]
pub trait DataService: Send + Sync {
    async fn read(&self, entity_set: &str, query: &EntityQuery) -> Result<Vec<Value>, ServiceError>;

    async fn count(&self, entity_set: &str, query: &EntityQuery) -> Result<u64, ServiceError>;

    /// Every entity of a collection, fully materialized.
    async fn read_all(&self, entity_set: &str) -> Result<Vec<Value>, ServiceError>;
}

pub struct ODataClient {
    http: reqwest::Client,
    base_url: String,
    identity_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct CurrentUser {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    firstname: Option<String>,
    #[serde(default)]
    lastname: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl ODataClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            identity_url: config.identity_url.clone(),
            token: config.token.clone(),
        })
    }

    fn entity_url(&self, entity_set: &str) -> String {
        format!("{}/{}", self.base_url, entity_set.trim_start_matches('/'))
    }

    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<reqwest::Response, ServiceError> {
        let mut request = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(params);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ServiceError::Unauthenticated);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }

    /// Resolves a next-page link against the service root and keeps the
    /// response format on JSON when the link does not say so itself.
    fn next_page(&self, link: &str) -> Result<(String, Vec<(String, String)>), ServiceError> {
        let root = reqwest::Url::parse(&format!("{}/", self.base_url))
            .map_err(|e| ServiceError::Decode(format!("service root {}: {e}", self.base_url)))?;
        let url = root
            .join(link)
            .map_err(|e| ServiceError::Decode(format!("next link {link}: {e}")))?;

        let params = if url.query_pairs().any(|(key, _)| key == "$format") {
            Vec::new()
        } else {
            json_format()
        };
        Ok((url.to_string(), params))
    }

    async fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<Value, ServiceError> {
        self.get(url, params)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Decode(format!("{url}: {e}")))
    }
}

#[async_trait]
impl IdentityProvider for ODataClient {
    async fn current_user(&self) -> Result<UserRecord, ServiceError> {
        let body = self.get_json(&self.identity_url, &[]).await?;
        let user: CurrentUser = serde_json::from_value(body)
            .map_err(|e| ServiceError::Decode(format!("current user: {e}")))?;

        let name = match (user.firstname, user.lastname) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            _ => user.name.unwrap_or_default(),
        };
        Ok(UserRecord {
            name,
            email: user.email.filter(|email| !email.is_empty()),
        })
    }
}

#[async_trait]
impl DataService for ODataClient {
    async fn read(&self, entity_set: &str, query: &EntityQuery) -> Result<Vec<Value>, ServiceError> {
        let mut params = query.url_params();
        params.extend(json_format());
        let body = self.get_json(&self.entity_url(entity_set), &params).await?;
        let (rows, _) = split_envelope(body)?;
        Ok(rows)
    }

    async fn count(&self, entity_set: &str, query: &EntityQuery) -> Result<u64, ServiceError> {
        let url = format!("{}/$count", self.entity_url(entity_set));
        let text = self.get(&url, &query.url_params()).await?.text().await?;
        text.trim()
            .parse()
            .map_err(|_| ServiceError::Decode(format!("{url}: not a count: {text:?}")))
    }

    async fn read_all(&self, entity_set: &str) -> Result<Vec<Value>, ServiceError> {
        let mut rows = Vec::new();
        let mut url = self.entity_url(entity_set);
        let mut params = json_format();

        loop {
            let body = self.get_json(&url, &params).await?;
            let (page, next) = split_envelope(body)?;
            rows.extend(page);
            match next {
                Some(link) => (url, params) = self.next_page(&link)?,
                None => break,
            }
        }

        tracing::debug!(entity_set, rows = rows.len(), "collection read");
        Ok(rows)
    }
}

fn json_format() -> Vec<(String, String)> {
    vec![("$format".to_string(), "json".to_string())]
}

/// Splits an OData v2 or v4 response body into rows and the next-page link.
pub fn split_envelope(body: Value) -> Result<(Vec<Value>, Option<String>), ServiceError> {
    let next_link = |value: &Value, key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

    if let Some(data) = body.get("d") {
        return match data {
            Value::Array(rows) => Ok((rows.clone(), None)),
            Value::Object(_) => match data.get("results") {
                Some(Value::Array(rows)) => Ok((rows.clone(), next_link(data, "__next"))),
                _ => Ok((vec![data.clone()], None)),
            },
            _ => Err(ServiceError::Decode("unexpected `d` payload".to_string())),
        };
    }
    if let Some(Value::Array(rows)) = body.get("value") {
        return Ok((rows.clone(), next_link(&body, "@odata.nextLink")));
    }
    Err(ServiceError::Decode("missing OData envelope".to_string()))
}

/// Parses `/Date(1700000000000)/`, `/Date(1700000000000+0100)/` or RFC 3339.
pub fn parse_odata_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Some(inner) = raw.strip_prefix("/Date(").and_then(|s| s.strip_suffix(")/")) {
        // the offset suffix is informational; the millis are already UTC
        let end = inner
            .get(1..)?
            .find(['+', '-'])
            .map_or(inner.len(), |idx| idx + 1);
        let millis: i64 = inner[..end].parse().ok()?;
        return Utc.timestamp_millis_opt(millis).single();
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|value| value.with_timezone(&Utc))
}

pub fn string_field(entity: &Value, name: &str) -> Option<String> {
    match entity.get(name)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Maps one validation entity onto a [`DetailRecord`].
pub fn detail_record(entity: &Value) -> DetailRecord {
    DetailRecord {
        person_id: string_field(entity, "cust_PSID"),
        unit_text: string_field(entity, "cust_IC"),
        status: string_field(entity, "cust_Status").unwrap_or_default(),
        last_modified: entity
            .get("lastModifiedDateTime")
            .and_then(Value::as_str)
            .and_then(parse_odata_datetime),
        submitted_by: string_field(entity, "cust_SubmittedBy"),
        approver: string_field(entity, "cust_Approver"),
    }
}
