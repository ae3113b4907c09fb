//! Import settings, stored per workspace as the `setup.import` section.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::model::EmploymentType;

pub const IMPORT_SECTION_KEY: &str = "setup.import";

/// Hard ceiling for one write chunk; the remote store rejects larger batches.
pub const MAX_BATCH_SIZE: i64 = 500;

/// Defaults for a workspace with no stored section. Teacher rows must carry an
/// email unless `requireTeacherEmail` is switched off.
pub fn default_import_section() -> Value {
    json!({
        "defaultEnrollmentYear": "2024-2025",
        "defaultEmploymentType": "full_time",
        "requireTeacherEmail": true,
        "batchSize": MAX_BATCH_SIZE,
        "maxReportedErrors": 10
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    pub default_enrollment_year: String,
    pub default_employment_type: EmploymentType,
    pub require_teacher_email: bool,
    pub batch_size: usize,
    pub max_reported_errors: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSection {
    default_enrollment_year: String,
    default_employment_type: String,
    require_teacher_email: bool,
    batch_size: usize,
    max_reported_errors: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            default_enrollment_year: "2024-2025".to_string(),
            default_employment_type: EmploymentType::FullTime,
            require_teacher_email: true,
            batch_size: MAX_BATCH_SIZE as usize,
            max_reported_errors: 10,
        }
    }
}

impl ImportSettings {
    /// Build settings from a stored section, filling gaps from the defaults.
    /// A section that no longer deserializes falls back to defaults.
    pub fn from_section(stored: Option<&Value>) -> Self {
        let section = merged_section(stored);
        match serde_json::from_value::<StoredSection>(section) {
            Ok(s) => Self {
                default_enrollment_year: s.default_enrollment_year,
                default_employment_type: EmploymentType::from_key(
                    &s.default_employment_type.to_ascii_lowercase(),
                )
                .unwrap_or(EmploymentType::FullTime),
                require_teacher_email: s.require_teacher_email,
                batch_size: s.batch_size.clamp(1, MAX_BATCH_SIZE as usize),
                max_reported_errors: s.max_reported_errors.max(1),
            },
            Err(e) => {
                warn!(error = %e, "stored import settings are unreadable, using defaults");
                Self::default()
            }
        }
    }
}

/// Defaults overlaid with whatever keys the stored section carries.
pub fn merged_section(stored: Option<&Value>) -> Value {
    let mut section = default_import_section();
    if let (Some(obj), Some(Value::Object(stored))) = (section.as_object_mut(), stored) {
        for (k, v) in stored {
            if obj.contains_key(k) {
                obj.insert(k.clone(), v.clone());
            }
        }
    }
    section
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

/// Validate and apply a patch to the import section in place. Nothing is
/// applied unless every field validates.
pub fn merge_import_patch(current: &mut Value, patch: &Map<String, Value>) -> Result<(), String> {
    let mut next = current.clone();
    let obj = next
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match k.as_str() {
            "defaultEnrollmentYear" => {
                let s = parse_string_max(v, k, 16)?;
                if s.is_empty() {
                    return Err(format!("{} must not be empty", k));
                }
                obj.insert(k.clone(), Value::String(s));
            }
            "defaultEmploymentType" => {
                let s = parse_string_max(v, k, 16)?.to_ascii_lowercase();
                if EmploymentType::from_key(&s).is_none() {
                    let allowed = EmploymentType::ALL
                        .iter()
                        .map(|t| t.key())
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(format!("{} must be one of: {}", k, allowed));
                }
                obj.insert(k.clone(), Value::String(s));
            }
            "requireTeacherEmail" => {
                obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
            }
            "batchSize" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, MAX_BATCH_SIZE)?));
            }
            "maxReportedErrors" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 100)?));
            }
            _ => return Err(format!("unknown import field: {}", k)),
        }
    }
    *current = next;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_section_yields_defaults() {
        assert_eq!(ImportSettings::from_section(None), ImportSettings::default());
    }

    #[test]
    fn teacher_email_is_required_by_default() {
        assert_eq!(default_import_section()["requireTeacherEmail"], true);
        assert!(ImportSettings::from_section(None).require_teacher_email);
    }

    #[test]
    fn stored_keys_override_defaults() {
        let stored = json!({ "defaultEnrollmentYear": "2025-2026", "batchSize": 50, "legacy": 1 });
        let s = ImportSettings::from_section(Some(&stored));
        assert_eq!(s.default_enrollment_year, "2025-2026");
        assert_eq!(s.batch_size, 50);
        assert_eq!(s.max_reported_errors, 10);
        assert!(merged_section(Some(&stored)).get("legacy").is_none());
    }

    #[test]
    fn corrupt_section_falls_back_to_defaults() {
        let stored = json!({ "batchSize": "many" });
        assert_eq!(
            ImportSettings::from_section(Some(&stored)),
            ImportSettings::default()
        );
    }

    #[test]
    fn patch_validates_every_field_before_applying() {
        let mut section = default_import_section();
        let patch = json!({ "defaultEnrollmentYear": "2030-2031", "batchSize": 900 });
        let err = merge_import_patch(&mut section, patch.as_object().unwrap()).unwrap_err();
        assert_eq!(err, "batchSize must be in 1..=500");
        assert_eq!(section["defaultEnrollmentYear"], "2024-2025");
    }

    #[test]
    fn patch_normalizes_employment_type() {
        let mut section = default_import_section();
        let patch = json!({ "defaultEmploymentType": "Part_Time", "requireTeacherEmail": false });
        merge_import_patch(&mut section, patch.as_object().unwrap()).expect("patch");
        let s = ImportSettings::from_section(Some(&section));
        assert_eq!(s.default_employment_type, EmploymentType::PartTime);
        assert!(!s.require_teacher_email);

        let bad = json!({ "defaultEmploymentType": "volunteer" });
        let err = merge_import_patch(&mut section, bad.as_object().unwrap()).unwrap_err();
        assert!(err.starts_with("defaultEmploymentType must be one of"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut section = default_import_section();
        let patch = json!({ "colour": "blue" });
        assert_eq!(
            merge_import_patch(&mut section, patch.as_object().unwrap()).unwrap_err(),
            "unknown import field: colour"
        );
    }
}
