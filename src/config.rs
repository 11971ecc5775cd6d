use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "edu-report.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub service: ServiceConfig,
    pub access: AccessConfig,
    pub catalog: CatalogConfig,
    pub entities: EntityConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// OData service root, e.g. `https://api.example.com/odata/v2`.
    pub base_url: String,
    pub identity_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4004/odata/v2".to_string(),
            identity_url: "http://localhost:4004/user-api/currentUser".to_string(),
            token: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub admin_group: String,
    pub scoped_group: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            admin_group: "EDU_REPORT_ADMIN".to_string(),
            scoped_group: "EDU_REPORT_IC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub active_status: String,
    pub excluded_codes: Vec<String>,
    pub eligible_status: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            active_status: "A".to_string(),
            excluded_codes: vec!["CORP".to_string(), "TEST".to_string(), "DUMMY".to_string()],
            eligible_status: "A".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    pub email: String,
    pub group_members: String,
    pub employment: String,
    pub units: String,
    pub validations: String,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            email: "PerEmail".to_string(),
            group_members: "PermissionGroupMember".to_string(),
            employment: "EmpJob".to_string(),
            units: "FOBusinessUnit".to_string(),
            validations: "cust_EducationalValidation".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub directory: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

impl ReportConfig {
    /// Loads the file if present, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Self::from_toml(&content)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("EDU_REPORT_BASE_URL") {
            self.service.base_url = url;
        }
        if let Some(url) = lookup("EDU_REPORT_IDENTITY_URL") {
            self.service.identity_url = url;
        }
        if let Some(token) = lookup("EDU_REPORT_TOKEN") {
            self.service.token = Some(token);
        }
    }
}
