use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

use super::schema::ResourceSpec;

/// Fields owned by the system; client input may never set them. The
/// tenant id always comes from the authenticated request context, so a
/// body-supplied `schoolId` is rejected rather than silently trusted.
const SYSTEM_FIELDS: &[&str] = &[
    "id",
    "schoolId",
    "school_id",
    "createdAt",
    "updatedAt",
    "created_at",
    "updated_at",
];

/// Errors from validating client-supplied documents
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("System field '{0}' cannot be set via API input")]
    SystemFieldNotAllowed(String),
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),
    #[error("Invalid value '{value}' for field '{field}' (allowed: {allowed})")]
    InvalidEnumValue {
        field: String,
        value: String,
        allowed: String,
    },
    #[error("Invalid date for field '{field}': {value}")]
    InvalidDate { field: String, value: String },
}

/// A persisted resource row. Domain fields live in `data`; the envelope
/// columns are shared by every resource table.
#[derive(Debug, Clone, FromRow)]
pub struct ResourceRow {
    pub id: Uuid,
    pub school_id: Uuid,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceRow {
    /// Flatten the row for the API: domain fields beside the envelope
    /// fields, camelCase keys.
    pub fn to_api_value(&self) -> Value {
        let mut out = Map::new();
        out.insert("id".to_string(), Value::String(self.id.to_string()));
        out.insert("schoolId".to_string(), Value::String(self.school_id.to_string()));
        if let Value::Object(data) = &self.data {
            for (key, value) in data {
                out.insert(key.clone(), value.clone());
            }
        }
        out.insert("createdAt".to_string(), serde_json::json!(self.created_at));
        out.insert("updatedAt".to_string(), serde_json::json!(self.updated_at));
        Value::Object(out)
    }

    pub fn data_object(&self) -> Map<String, Value> {
        match &self.data {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        }
    }
}

/// Validate a create payload against the resource spec. Returns the
/// cleaned document with derived fields applied.
pub fn validate_create(input: &Value, spec: &ResourceSpec) -> Result<Map<String, Value>, RecordError> {
    let mut data = reject_system_fields(input, spec)?;

    for field in spec.required {
        let present = data.get(*field).map(is_meaningful).unwrap_or(false);
        if !present {
            return Err(RecordError::MissingRequiredField(field.to_string()));
        }
    }

    validate_typed_fields(&data, spec)?;

    if let Some(derive) = spec.derive {
        derive(&mut data)?;
    }

    Ok(data)
}

/// Validate a partial update. Only fields present in the patch are
/// checked; required-ness is a create-time concern. The caller merges
/// the patch over the stored document and re-runs the derive hook via
/// [`apply_patch`].
pub fn validate_patch(input: &Value, spec: &ResourceSpec) -> Result<Map<String, Value>, RecordError> {
    let data = reject_system_fields(input, spec)?;
    validate_typed_fields(&data, spec)?;
    Ok(data)
}

/// Merge a validated patch over the stored document and re-run the
/// derive hook so dependent fields (e.g. holiday year) stay consistent.
pub fn apply_patch(
    original: &Map<String, Value>,
    patch: Map<String, Value>,
    spec: &ResourceSpec,
) -> Result<Map<String, Value>, RecordError> {
    let mut merged = original.clone();
    for (key, value) in patch {
        if value.is_null() {
            merged.remove(&key);
        } else {
            merged.insert(key, value);
        }
    }
    if let Some(derive) = spec.derive {
        derive(&mut merged)?;
    }
    Ok(merged)
}

fn reject_system_fields(input: &Value, spec: &ResourceSpec) -> Result<Map<String, Value>, RecordError> {
    let map = match input {
        Value::Object(map) => map,
        _ => return Err(RecordError::InvalidJson("Expected JSON object".to_string())),
    };

    let mut data = Map::new();
    for (key, value) in map {
        if SYSTEM_FIELDS.contains(&key.as_str()) {
            return Err(RecordError::SystemFieldNotAllowed(key.clone()));
        }
        // The attachment list and cover are managed by the lifecycle
        // manager, not by raw document writes.
        if let Some(policy) = &spec.attachments {
            if key == policy.field || (policy.cover && key == "cover") {
                return Err(RecordError::SystemFieldNotAllowed(key.clone()));
            }
        }
        data.insert(key.clone(), value.clone());
    }
    Ok(data)
}

fn validate_typed_fields(data: &Map<String, Value>, spec: &ResourceSpec) -> Result<(), RecordError> {
    for enum_field in spec.enums {
        if let Some(value) = data.get(enum_field.field) {
            if value.is_null() {
                continue;
            }
            let as_str = value.as_str().unwrap_or_default();
            if !enum_field.allowed.contains(&as_str) {
                return Err(RecordError::InvalidEnumValue {
                    field: enum_field.field.to_string(),
                    value: as_str.to_string(),
                    allowed: enum_field.allowed.join(", "),
                });
            }
        }
    }

    for field in spec.date_fields {
        if let Some(value) = data.get(*field) {
            if value.is_null() {
                continue;
            }
            let as_str = value.as_str().unwrap_or_default();
            parse_date(as_str).ok_or_else(|| RecordError::InvalidDate {
                field: field.to_string(),
                value: as_str.to_string(),
            })?;
        }
    }

    Ok(())
}

/// Structured date parsing; accepted as ISO-8601 calendar dates only.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::{AttachmentPolicy, EnumField, ResourceSpec};
    use crate::query::sort::Direction;
    use serde_json::json;

    static ATTENDANCE: ResourceSpec = ResourceSpec {
        name: "attendance",
        table: "attendance",
        required: &["studentId", "date", "status"],
        enums: &[EnumField { field: "status", allowed: &["present", "absent", "late", "leave"] }],
        date_fields: &["date"],
        unique_key: &["studentId", "date"],
        filterable: &["studentId", "classId", "status"],
        range_field: Some("date"),
        default_sort: ("date", Direction::Desc),
        derive: None,
        attachments: None,
    };

    static ALBUMS: ResourceSpec = ResourceSpec {
        name: "albums",
        table: "albums",
        required: &["title", "date"],
        enums: &[],
        date_fields: &["date"],
        unique_key: &["title", "date"],
        filterable: &[],
        range_field: Some("date"),
        default_sort: ("created_at", Direction::Desc),
        derive: None,
        attachments: Some(AttachmentPolicy { field: "images", folder: "albums", cover: true }),
    };

    #[test]
    fn create_requires_declared_fields() {
        let err = validate_create(&json!({"studentId": "stu1", "date": "2024-03-01"}), &ATTENDANCE);
        assert!(matches!(err, Err(RecordError::MissingRequiredField(f)) if f == "status"));
    }

    #[test]
    fn blank_required_string_is_missing() {
        let err = validate_create(
            &json!({"studentId": "  ", "date": "2024-03-01", "status": "present"}),
            &ATTENDANCE,
        );
        assert!(matches!(err, Err(RecordError::MissingRequiredField(f)) if f == "studentId"));
    }

    #[test]
    fn enum_membership_is_enforced() {
        let err = validate_create(
            &json!({"studentId": "stu1", "date": "2024-03-01", "status": "vacationing"}),
            &ATTENDANCE,
        );
        assert!(matches!(err, Err(RecordError::InvalidEnumValue { field, .. }) if field == "status"));
    }

    #[test]
    fn dates_must_be_structured() {
        let err = validate_create(
            &json!({"studentId": "stu1", "date": "March 1st, 2024", "status": "present"}),
            &ATTENDANCE,
        );
        assert!(matches!(err, Err(RecordError::InvalidDate { .. })));
    }

    #[test]
    fn tenant_id_in_body_is_rejected() {
        let err = validate_create(
            &json!({"studentId": "s", "date": "2024-03-01", "status": "present", "schoolId": "S2"}),
            &ATTENDANCE,
        );
        assert!(matches!(err, Err(RecordError::SystemFieldNotAllowed(f)) if f == "schoolId"));
    }

    #[test]
    fn attachment_list_is_not_writable_directly() {
        let err = validate_create(
            &json!({"title": "Sports Day", "date": "2024-03-01", "images": []}),
            &ALBUMS,
        );
        assert!(matches!(err, Err(RecordError::SystemFieldNotAllowed(f)) if f == "images"));
    }

    #[test]
    fn valid_create_passes_through() {
        let data = validate_create(
            &json!({"studentId": "stu1", "date": "2024-03-01", "status": "present"}),
            &ATTENDANCE,
        )
        .unwrap();
        assert_eq!(data["status"], "present");
    }

    #[test]
    fn patch_merge_removes_nulls_and_overwrites() {
        let original = validate_create(
            &json!({"studentId": "stu1", "date": "2024-03-01", "status": "present", "note": "x"}),
            &ATTENDANCE,
        )
        .unwrap();
        let patch = validate_patch(&json!({"status": "late", "note": null}), &ATTENDANCE).unwrap();
        let merged = apply_patch(&original, patch, &ATTENDANCE).unwrap();
        assert_eq!(merged["status"], "late");
        assert!(!merged.contains_key("note"));
        assert_eq!(merged["studentId"], "stu1");
    }

    #[test]
    fn row_flattens_for_api() {
        let row = ResourceRow {
            id: Uuid::nil(),
            school_id: Uuid::nil(),
            data: json!({"title": "Sports Day"}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let api = row.to_api_value();
        assert_eq!(api["title"], "Sports Day");
        assert!(api.get("schoolId").is_some());
        assert!(api.get("createdAt").is_some());
        assert!(api.get("data").is_none());
    }
}
