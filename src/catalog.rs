use futures::future::join_all;

use crate::config::ReportConfig;
use crate::filter::{quote, Filter};
use crate::models::{OrganizationalUnit, SessionContext};
use crate::odata::{string_field, DataService, EntityQuery, ServiceError};

pub fn unit_filter(session: &SessionContext, config: &ReportConfig) -> Filter {
    let mut clauses = vec![Filter::eq("status", config.catalog.active_status.as_str())];
    clauses.extend(
        config
            .catalog
            .excluded_codes
            .iter()
            .map(|code| Filter::ne("externalCode", code.as_str())),
    );
    if let Some(code) = session.unit_restriction() {
        clauses.push(Filter::eq("externalCode", code));
    }
    Filter::And(clauses)
}

pub fn population_filter(code: &str, config: &ReportConfig) -> String {
    format!(
        "businessUnit eq {} and emplStatus eq {}",
        quote(code),
        quote(&config.catalog.eligible_status)
    )
}

/// Fetches the visible units and their eligible population.
///
/// Population counts run concurrently; a failed count leaves that unit's
/// population empty instead of failing the catalog.
pub async fn fetch_units(
    data: &dyn DataService,
    session: &SessionContext,
    config: &ReportConfig,
) -> Result<Vec<OrganizationalUnit>, ServiceError> {
    let query = EntityQuery::filtered(unit_filter(session, config));
    let rows = data.read(&config.entities.units, &query).await?;

    let units: Vec<(String, String)> = rows
        .iter()
        .filter_map(|row| {
            let code = string_field(row, "externalCode")?;
            let text = string_field(row, "name").unwrap_or_else(|| code.clone());
            Some((code, text))
        })
        .collect();

    let populations = join_all(units.iter().map(|(code, _)| async move {
        let query = EntityQuery::raw_filter(population_filter(code, config));
        match data.count(&config.entities.employment, &query).await {
            Ok(count) => {
                let population = i64::try_from(count).ok();
                if population.is_none() {
                    tracing::warn!(unit = %code, count, "population count out of range");
                }
                population
            }
            Err(err) => {
                tracing::warn!(unit = %code, error = %err, "population count failed");
                None
            }
        }
    }))
    .await;

    let catalog: Vec<OrganizationalUnit> = units
        .into_iter()
        .zip(populations)
        .map(|((code, text), population)| OrganizationalUnit {
            code,
            text,
            population,
        })
        .collect();

    tracing::info!(units = catalog.len(), "unit catalog loaded");
    Ok(catalog)
}
