use crate::config::ReportConfig;
use crate::filter::Filter;
use crate::models::PermissionScope;
use crate::odata::{string_field, DataService, EntityQuery, IdentityProvider, ServiceError};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity endpoint unavailable: {0}")]
    Endpoint(#[source] ServiceError),

    #[error("current user has no email address")]
    MissingEmail,

    #[error("person lookup for {email} failed: {source}")]
    Lookup {
        email: String,
        #[source]
        source: ServiceError,
    },

    #[error("no person record for {0}")]
    PersonNotFound(String),
}

/// Maps the signed-in user to the person identifier used by the data service.
pub async fn resolve_person_id(
    identity: &dyn IdentityProvider,
    data: &dyn DataService,
    config: &ReportConfig,
) -> Result<String, IdentityError> {
    let user = identity.current_user().await.map_err(IdentityError::Endpoint)?;
    let email = user.email.ok_or(IdentityError::MissingEmail)?;

    let query = EntityQuery::filtered(Filter::eq("emailAddress", email.as_str()));
    let rows = data
        .read(&config.entities.email, &query)
        .await
        .map_err(|source| IdentityError::Lookup {
            email: email.clone(),
            source,
        })?;

    let person_id = rows
        .iter()
        .find_map(|row| string_field(row, "personIdExternal"))
        .ok_or_else(|| IdentityError::PersonNotFound(email.clone()))?;

    tracing::info!(user = %user.name, %person_id, "identity resolved");
    Ok(person_id)
}

/// Looks up the person's permission groups and, for scoped users, their unit.
pub async fn resolve_scope(
    data: &dyn DataService,
    person_id: &str,
    config: &ReportConfig,
) -> Result<PermissionScope, ServiceError> {
    let query = EntityQuery::filtered(Filter::eq("personId", person_id));
    let groups: Vec<String> = data
        .read(&config.entities.group_members, &query)
        .await?
        .iter()
        .filter_map(|row| string_field(row, "groupName"))
        .collect();

    if groups.iter().any(|group| *group == config.access.admin_group) {
        return Ok(PermissionScope::Unrestricted);
    }
    if !groups.iter().any(|group| *group == config.access.scoped_group) {
        return Ok(PermissionScope::NoAccess);
    }

    let query = EntityQuery::filtered(Filter::eq("userId", person_id));
    let unit = data
        .read(&config.entities.employment, &query)
        .await?
        .iter()
        .find_map(|row| string_field(row, "businessUnit"));

    match unit {
        Some(code) => Ok(PermissionScope::UnitScoped(code)),
        None => {
            tracing::warn!(person_id, "scoped user has no business unit on the employment record");
            Ok(PermissionScope::NoAccess)
        }
    }
}
