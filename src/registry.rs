// Resource registry: one declarative spec per business entity. The
// repository, HTTP boundary and DDL generation are all driven from here;
// adding a resource means adding a spec, not writing new query code.

use chrono::Datelike;
use serde_json::{Map, Value};

use crate::database::record::{parse_date, RecordError};
use crate::database::schema::{AttachmentPolicy, EnumField, ResourceSpec};
use crate::query::sort::Direction;

pub static ALBUMS: ResourceSpec = ResourceSpec {
    name: "albums",
    table: "albums",
    required: &["title", "date"],
    enums: &[],
    date_fields: &["date"],
    unique_key: &["title", "date"],
    filterable: &["title"],
    range_field: Some("date"),
    default_sort: ("created_at", Direction::Desc),
    derive: None,
    attachments: Some(AttachmentPolicy { field: "images", folder: "albums", cover: true }),
};

pub static PHOTOS: ResourceSpec = ResourceSpec {
    name: "photos",
    table: "photos",
    required: &["albumId"],
    enums: &[],
    date_fields: &[],
    unique_key: &[],
    filterable: &["albumId"],
    range_field: None,
    default_sort: ("created_at", Direction::Desc),
    derive: None,
    attachments: Some(AttachmentPolicy { field: "images", folder: "photos", cover: true }),
};

pub static ATTENDANCE: ResourceSpec = ResourceSpec {
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

pub static CLASSES: ResourceSpec = ResourceSpec {
    name: "classes",
    table: "classes",
    required: &["name"],
    enums: &[],
    date_fields: &[],
    unique_key: &[],
    filterable: &["name", "section"],
    range_field: None,
    default_sort: ("name", Direction::Asc),
    derive: None,
    attachments: None,
};

pub static SESSIONS: ResourceSpec = ResourceSpec {
    name: "sessions",
    table: "sessions",
    required: &["name", "startDate", "endDate"],
    enums: &[],
    date_fields: &["startDate", "endDate"],
    unique_key: &[],
    filterable: &["name"],
    range_field: Some("startDate"),
    default_sort: ("startDate", Direction::Desc),
    derive: None,
    attachments: None,
};

pub static CIRCULARS: ResourceSpec = ResourceSpec {
    name: "circulars",
    table: "circulars",
    required: &["title", "date"],
    enums: &[EnumField {
        field: "audience",
        allowed: &["all", "students", "teachers", "parents"],
    }],
    date_fields: &["date"],
    unique_key: &["title", "date"],
    filterable: &["audience"],
    range_field: Some("date"),
    default_sort: ("date", Direction::Desc),
    derive: None,
    attachments: None,
};

pub static CLASSWORK: ResourceSpec = ResourceSpec {
    name: "classwork",
    table: "classwork",
    required: &["subject", "date", "topic", "classId"],
    enums: &[],
    date_fields: &["date"],
    unique_key: &["subject", "date", "topic", "classId"],
    filterable: &["classId", "subject"],
    range_field: Some("date"),
    default_sort: ("date", Direction::Desc),
    derive: None,
    attachments: Some(AttachmentPolicy { field: "attachments", folder: "classwork", cover: false }),
};

pub static DIARIES: ResourceSpec = ResourceSpec {
    name: "diaries",
    table: "diaries",
    required: &["classId", "date", "note"],
    enums: &[],
    date_fields: &["date"],
    unique_key: &[],
    filterable: &["classId", "studentId"],
    range_field: Some("date"),
    default_sort: ("date", Direction::Desc),
    derive: None,
    attachments: None,
};

pub static EVENTS: ResourceSpec = ResourceSpec {
    name: "events",
    table: "events",
    required: &["title", "date"],
    enums: &[],
    date_fields: &["date"],
    unique_key: &[],
    filterable: &["title"],
    range_field: Some("date"),
    default_sort: ("date", Direction::Desc),
    derive: None,
    attachments: None,
};

pub static HOLIDAYS: ResourceSpec = ResourceSpec {
    name: "holidays",
    table: "holidays",
    required: &["name", "date", "type"],
    enums: &[EnumField {
        field: "type",
        allowed: &["National Holiday", "Festival", "Religious Holiday"],
    }],
    date_fields: &["date"],
    unique_key: &[],
    filterable: &["type", "year"],
    range_field: Some("date"),
    default_sort: ("date", Direction::Asc),
    derive: Some(derive_holiday_year),
    attachments: None,
};

pub static PACKAGES: ResourceSpec = ResourceSpec {
    name: "packages",
    table: "packages",
    required: &["name", "price"],
    enums: &[],
    date_fields: &[],
    unique_key: &["name"],
    filterable: &["name"],
    range_field: None,
    default_sort: ("created_at", Direction::Desc),
    derive: None,
    attachments: None,
};

pub static PAYMENTS: ResourceSpec = ResourceSpec {
    name: "payments",
    table: "payments",
    required: &["packageId", "amount", "paymentMethod", "date"],
    enums: &[EnumField { field: "paymentMethod", allowed: &["card", "upi"] }],
    date_fields: &["date"],
    unique_key: &[],
    filterable: &["packageId", "paymentMethod"],
    range_field: Some("date"),
    default_sort: ("date", Direction::Desc),
    derive: None,
    attachments: None,
};

pub static EXAM_TYPES: ResourceSpec = ResourceSpec {
    name: "exam-types",
    table: "exam_types",
    required: &["name"],
    enums: &[],
    date_fields: &[],
    unique_key: &["name"],
    filterable: &["name"],
    range_field: None,
    default_sort: ("name", Direction::Asc),
    derive: None,
    attachments: None,
};

pub static RESOURCES: &[&ResourceSpec] = &[
    &ALBUMS,
    &PHOTOS,
    &ATTENDANCE,
    &CLASSES,
    &SESSIONS,
    &CIRCULARS,
    &CLASSWORK,
    &DIARIES,
    &EVENTS,
    &HOLIDAYS,
    &PACKAGES,
    &PAYMENTS,
    &EXAM_TYPES,
];

/// Resolve a route segment to its resource spec.
pub fn find(name: &str) -> Option<&'static ResourceSpec> {
    RESOURCES.iter().copied().find(|spec| spec.name == name)
}

const SUPER_ADMINS_DDL: &str = "CREATE TABLE IF NOT EXISTS \"super_admins\" (\n    \
    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),\n    \
    school_id uuid NOT NULL,\n    \
    name text NOT NULL,\n    \
    email text NOT NULL UNIQUE,\n    \
    password_digest text NOT NULL,\n    \
    salt text NOT NULL,\n    \
    role text NOT NULL DEFAULT 'admin',\n    \
    created_at timestamptz NOT NULL DEFAULT now(),\n    \
    updated_at timestamptz NOT NULL DEFAULT now()\n)";

/// Full DDL for the registry: every resource table plus super admins.
/// Indexes derive from the declared unique keys, so the index set can
/// never disagree with the specs.
pub fn ddl() -> Vec<String> {
    let mut statements = vec![SUPER_ADMINS_DDL.to_string()];
    for spec in RESOURCES {
        statements.extend(spec.ddl());
    }
    statements
}

/// Holiday `year` is derived from the structured date, never parsed out
/// of a display string.
fn derive_holiday_year(data: &mut Map<String, Value>) -> Result<(), RecordError> {
    let raw = data.get("date").and_then(Value::as_str).unwrap_or_default();
    let date = parse_date(raw).ok_or_else(|| RecordError::InvalidDate {
        field: "date".to_string(),
        value: raw.to_string(),
    })?;
    data.insert("year".to_string(), Value::from(date.year()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_spec_is_well_formed() {
        for spec in RESOURCES {
            spec.validate().unwrap_or_else(|e| panic!("{}", e));
        }
    }

    #[test]
    fn route_names_are_unique() {
        let mut names: Vec<&str> = RESOURCES.iter().map(|s| s.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), RESOURCES.len());
    }

    #[test]
    fn find_resolves_route_segments() {
        assert_eq!(find("attendance").unwrap().table, "attendance");
        assert_eq!(find("exam-types").unwrap().table, "exam_types");
        assert!(find("unknown").is_none());
    }

    #[test]
    fn declared_unique_keys_match_the_domain_rules() {
        assert_eq!(ALBUMS.unique_key, ["title", "date"]);
        assert_eq!(CIRCULARS.unique_key, ["title", "date"]);
        assert_eq!(ATTENDANCE.unique_key, ["studentId", "date"]);
        assert_eq!(PACKAGES.unique_key, ["name"]);
        assert_eq!(CLASSWORK.unique_key, ["subject", "date", "topic", "classId"]);
    }

    #[test]
    fn ddl_covers_every_resource_and_super_admins() {
        let ddl = ddl();
        assert!(ddl[0].contains("super_admins"));
        for spec in RESOURCES {
            assert!(
                ddl.iter().any(|s| s.contains(&format!("CREATE TABLE IF NOT EXISTS \"{}\"", spec.table))),
                "no table DDL for {}",
                spec.table
            );
        }
        // Unique indexes exist exactly for resources that declare keys
        assert!(ddl.iter().any(|s| s.contains("attendance_unique_key_idx")));
        assert!(!ddl.iter().any(|s| s.contains("events_unique_key_idx")));
    }

    #[test]
    fn holiday_year_is_derived_from_structured_date() {
        let mut data = json!({"name": "Diwali", "date": "2024-11-01", "type": "Festival"})
            .as_object()
            .cloned()
            .unwrap();
        derive_holiday_year(&mut data).unwrap();
        assert_eq!(data["year"], json!(2024));
    }

    #[test]
    fn holiday_year_rejects_display_strings() {
        let mut data = json!({"date": "1st November 2024"}).as_object().cloned().unwrap();
        assert!(derive_holiday_year(&mut data).is_err());
    }
}
