//! In-memory stand-ins for the identity endpoint and the OData service.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::UserRecord;
use crate::odata::{DataService, EntityQuery, IdentityProvider, ServiceError};

pub struct FakeIdentity {
    user: Option<UserRecord>,
}

impl FakeIdentity {
    pub fn with_email(email: &str) -> Self {
        Self {
            user: Some(UserRecord {
                name: "Avery Lee".to_string(),
                email: Some(email.to_string()),
            }),
        }
    }

    pub fn without_email() -> Self {
        Self {
            user: Some(UserRecord {
                name: "Avery Lee".to_string(),
                email: None,
            }),
        }
    }

    pub fn unauthenticated() -> Self {
        Self { user: None }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn current_user(&self) -> Result<UserRecord, ServiceError> {
        self.user.clone().ok_or(ServiceError::Unauthenticated)
    }
}

#[derive(Default)]
pub struct FakeService {
    rows: HashMap<String, Vec<Value>>,
    counts: HashMap<String, u64>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeService {
    pub fn with_rows(mut self, entity_set: &str, rows: Vec<Value>) -> Self {
        self.rows.insert(entity_set.to_string(), rows);
        self
    }

    /// Registers the answer for a count whose raw `$filter` equals `filter`.
    pub fn with_count(mut self, filter: &str, count: u64) -> Self {
        self.counts.insert(filter.to_string(), count);
        self
    }

    /// Makes reads of an entity set, or counts with this raw filter, fail.
    pub fn failing(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn failure(key: &str) -> ServiceError {
        ServiceError::Status {
            status: 500,
            message: format!("{key} unavailable"),
        }
    }
}

#[async_trait]
impl DataService for FakeService {
    async fn read(&self, entity_set: &str, query: &EntityQuery) -> Result<Vec<Value>, ServiceError> {
        self.record(format!("read {entity_set}"));
        if self.failing.contains(entity_set) {
            return Err(Self::failure(entity_set));
        }
        let rows = self.rows.get(entity_set).cloned().unwrap_or_default();
        Ok(match &query.filter {
            Some(filter) => rows.into_iter().filter(|row| filter.matches(row)).collect(),
            None => rows,
        })
    }

    async fn count(&self, entity_set: &str, query: &EntityQuery) -> Result<u64, ServiceError> {
        let raw = query
            .url_params()
            .into_iter()
            .find(|(key, _)| key == "$filter")
            .map(|(_, value)| value)
            .unwrap_or_default();
        self.record(format!("count {entity_set} {raw}"));
        if self.failing.contains(&raw) {
            return Err(Self::failure(&raw));
        }
        Ok(self.counts.get(&raw).copied().unwrap_or(0))
    }

    async fn read_all(&self, entity_set: &str) -> Result<Vec<Value>, ServiceError> {
        self.read(entity_set, &EntityQuery::default()).await
    }
}
