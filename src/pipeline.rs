use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Instrument;
use uuid::Uuid;

use crate::aggregate::{aggregate, Aggregation};
use crate::catalog;
use crate::config::ReportConfig;
use crate::models::{DetailRecord, OrganizationalUnit, PermissionScope, SessionContext};
use crate::odata::{detail_record, DataService, IdentityProvider, ServiceError};
use crate::session::{self, IdentityError};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("identity resolution failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("permission lookup failed: {0}")]
    Authorization(#[source] ServiceError),

    #[error("unit catalog unavailable: {0}")]
    Catalog(#[source] ServiceError),

    #[error("validation records unavailable: {0}")]
    DetailFetch(#[source] ServiceError),
}

#[derive(Debug)]
pub struct Report {
    pub session: SessionContext,
    pub aggregation: Aggregation,
}

#[derive(Debug)]
pub enum LoadOutcome {
    Ready(Report),
    NoAccess { person_id: String },
}

/// Busy flag raised for the duration of a load.
#[derive(Debug, Default)]
pub struct BusyIndicator {
    busy: AtomicBool,
}

impl BusyIndicator {
    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn raise(&self) -> BusyGuard<'_> {
        self.busy.store(true, Ordering::SeqCst);
        BusyGuard { indicator: self }
    }
}

pub struct BusyGuard<'a> {
    indicator: &'a BusyIndicator,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.indicator.busy.store(false, Ordering::SeqCst);
    }
}

pub struct ReportPipeline<'a> {
    identity: &'a dyn IdentityProvider,
    data: &'a dyn DataService,
    config: &'a ReportConfig,
}

impl<'a> ReportPipeline<'a> {
    pub fn new(
        identity: &'a dyn IdentityProvider,
        data: &'a dyn DataService,
        config: &'a ReportConfig,
    ) -> Self {
        Self {
            identity,
            data,
            config,
        }
    }

    pub async fn load(&self, busy: &BusyIndicator) -> Result<LoadOutcome, LoadError> {
        let _guard = busy.raise();
        let span = tracing::info_span!("load", load_id = %Uuid::new_v4());

        self.run().instrument(span).await
    }

    async fn run(&self) -> Result<LoadOutcome, LoadError> {
        let person_id = self.identify().await?;
        let session = self.authorize(person_id).await?;
        if session.scope == PermissionScope::NoAccess {
            tracing::warn!(person_id = %session.person_id, "user has no access to the report");
            return Ok(LoadOutcome::NoAccess {
                person_id: session.person_id,
            });
        }
        let units = self.fetch_catalog(&session).await?;
        let aggregation = self.aggregate(&units).await?;
        Ok(LoadOutcome::Ready(Report {
            session,
            aggregation,
        }))
    }

    pub async fn identify(&self) -> Result<String, LoadError> {
        Ok(session::resolve_person_id(self.identity, self.data, self.config).await?)
    }

    pub async fn authorize(&self, person_id: String) -> Result<SessionContext, LoadError> {
        let scope = session::resolve_scope(self.data, &person_id, self.config)
            .await
            .map_err(LoadError::Authorization)?;
        tracing::info!(?scope, "permission scope resolved");
        Ok(SessionContext { person_id, scope })
    }

    pub async fn fetch_catalog(
        &self,
        session: &SessionContext,
    ) -> Result<Vec<OrganizationalUnit>, LoadError> {
        catalog::fetch_units(self.data, session, self.config)
            .await
            .map_err(LoadError::Catalog)
    }

    pub async fn aggregate(&self, units: &[OrganizationalUnit]) -> Result<Aggregation, LoadError> {
        let entities = self
            .data
            .read_all(&self.config.entities.validations)
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "validation records fetch failed");
                LoadError::DetailFetch(err)
            })?;
        let records: Vec<DetailRecord> = entities.iter().map(detail_record).collect();
        Ok(aggregate(&records, units))
    }
}
