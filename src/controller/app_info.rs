//! # Application Identity
//!
//! Extracts the platform identity of an `Application` from its annotations.
//!
//! Required keys are checked in a fixed order (region, app code, app name,
//! module name, environment) and the first missing one is reported by name.
//! The workload name is synthesized when absent and the tenant id defaults to
//! an empty string.

use crate::constants::{
    ANNOTATION_APP_CODE, ANNOTATION_APP_NAME, ANNOTATION_ENVIRONMENT, ANNOTATION_MODULE_NAME,
    ANNOTATION_REGION, ANNOTATION_TENANT_ID, ANNOTATION_WORKLOAD_NAME,
};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Stable identity of an application module in one environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationIdentity {
    pub region: String,
    pub app_code: String,
    pub app_name: String,
    pub module_name: String,
    pub environment: String,
    pub workload_name: String,
    pub tenant_id: String,
}

impl ApplicationIdentity {
    /// Name used when `workload-name` is not supplied
    #[must_use]
    pub fn default_workload_name(app_code: &str, environment: &str) -> String {
        format!("workload-{app_code}-{environment}")
    }
}

/// Identity fields that must be present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    Region,
    AppCode,
    AppName,
    ModuleName,
    Environment,
}

impl IdentityField {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityField::Region => "region",
            IdentityField::AppCode => "app-code",
            IdentityField::AppName => "app-name",
            IdentityField::ModuleName => "module-name",
            IdentityField::Environment => "environment",
        }
    }

    /// Annotation key the field is read from
    #[must_use]
    pub fn annotation_key(&self) -> &'static str {
        match self {
            IdentityField::Region => ANNOTATION_REGION,
            IdentityField::AppCode => ANNOTATION_APP_CODE,
            IdentityField::AppName => ANNOTATION_APP_NAME,
            IdentityField::ModuleName => ANNOTATION_MODULE_NAME,
            IdentityField::Environment => ANNOTATION_ENVIRONMENT,
        }
    }
}

impl fmt::Display for IdentityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing required metadata '{field}' (annotation '{}')", .field.annotation_key())]
    MissingField { field: IdentityField },
}

impl ParseError {
    #[must_use]
    pub fn field(&self) -> IdentityField {
        match self {
            ParseError::MissingField { field } => *field,
        }
    }
}

/// Extract the identity from resource metadata
///
/// Empty values count as missing.
pub fn extract(metadata: &BTreeMap<String, String>) -> Result<ApplicationIdentity, ParseError> {
    let lookup = |key: &str| {
        metadata
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let require = |field: IdentityField| {
        lookup(field.annotation_key()).ok_or(ParseError::MissingField { field })
    };

    let region = require(IdentityField::Region)?;
    let app_code = require(IdentityField::AppCode)?;
    let app_name = require(IdentityField::AppName)?;
    let module_name = require(IdentityField::ModuleName)?;
    let environment = require(IdentityField::Environment)?;

    let workload_name = lookup(ANNOTATION_WORKLOAD_NAME)
        .unwrap_or_else(|| ApplicationIdentity::default_workload_name(&app_code, &environment));
    let tenant_id = lookup(ANNOTATION_TENANT_ID).unwrap_or_default();

    Ok(ApplicationIdentity {
        region,
        app_code,
        app_name,
        module_name,
        environment,
        workload_name,
        tenant_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_metadata() -> BTreeMap<String, String> {
        [
            (ANNOTATION_REGION, "default"),
            (ANNOTATION_APP_CODE, "demo"),
            (ANNOTATION_APP_NAME, "Demo App"),
            (ANNOTATION_MODULE_NAME, "web"),
            (ANNOTATION_ENVIRONMENT, "stag"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_extract_defaults_workload_name() {
        let identity = extract(&full_metadata()).unwrap();
        assert_eq!(identity.workload_name, "workload-demo-stag");
        assert_eq!(identity.tenant_id, "");
        assert_eq!(identity.module_name, "web");
    }

    #[test]
    fn test_extract_reads_optional_fields() {
        let mut metadata = full_metadata();
        metadata.insert(ANNOTATION_WORKLOAD_NAME.to_string(), "demo-web".to_string());
        metadata.insert(ANNOTATION_TENANT_ID.to_string(), "tenant-a".to_string());

        let identity = extract(&metadata).unwrap();
        assert_eq!(identity.workload_name, "demo-web");
        assert_eq!(identity.tenant_id, "tenant-a");
    }

    #[test]
    fn test_missing_region_is_reported_by_name() {
        let mut metadata = full_metadata();
        metadata.remove(ANNOTATION_REGION);

        let err = extract(&metadata).unwrap_err();
        assert_eq!(err.field(), IdentityField::Region);
        assert!(err.to_string().contains("region"));
    }

    #[test]
    fn test_first_missing_field_wins() {
        let mut metadata = full_metadata();
        metadata.remove(ANNOTATION_MODULE_NAME);
        metadata.remove(ANNOTATION_ENVIRONMENT);

        let err = extract(&metadata).unwrap_err();
        assert_eq!(err.field(), IdentityField::ModuleName);
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut metadata = full_metadata();
        metadata.insert(ANNOTATION_APP_CODE.to_string(), "  ".to_string());

        let err = extract(&metadata).unwrap_err();
        assert_eq!(err.field(), IdentityField::AppCode);
    }
}
