use crate::query::sort::Direction;
use crate::query::validate_field_name;

/// Field restricted to a closed value set (e.g. attendance status).
#[derive(Debug, Clone, Copy)]
pub struct EnumField {
    pub field: &'static str,
    pub allowed: &'static [&'static str],
}

/// Attachment behavior for resources that carry files.
///
/// `field` is the document key holding the ordered attachment list,
/// `folder` namespaces object-store keys, and `cover` opts into the
/// first-attachment-becomes-cover policy.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentPolicy {
    pub field: &'static str,
    pub folder: &'static str,
    pub cover: bool,
}

/// Declarative description of one resource type. The repository, the
/// HTTP boundary and the DDL generator are all driven by this — per
/// resource there is configuration here and nothing else.
pub struct ResourceSpec {
    /// Route segment and display name, e.g. "albums"
    pub name: &'static str,
    /// Backing table
    pub table: &'static str,
    /// Fields that must be present and non-empty on create
    pub required: &'static [&'static str],
    /// Closed-set fields
    pub enums: &'static [EnumField],
    /// Fields validated as ISO-8601 calendar dates
    pub date_fields: &'static [&'static str],
    /// Tenant-scoped compound unique key (school_id is implied)
    pub unique_key: &'static [&'static str],
    /// Fields filterable by equality from the query string
    pub filterable: &'static [&'static str],
    /// Field targeted by from/to range parameters
    pub range_field: Option<&'static str>,
    /// Stated default ordering for listings
    pub default_sort: (&'static str, Direction),
    /// Hook run after validation with the full document (e.g. derived fields)
    pub derive: Option<fn(&mut serde_json::Map<String, serde_json::Value>) -> Result<(), super::record::RecordError>>,
    /// Attachment behavior, if the resource carries files
    pub attachments: Option<AttachmentPolicy>,
}

impl ResourceSpec {
    /// DDL for this resource: table, tenant index, unique-key index and a
    /// sort index on the default ordering field. Generated from the spec
    /// so indexes cannot drift from the declared constraints.
    pub fn ddl(&self) -> Vec<String> {
        let mut statements = vec![
            format!(
                "CREATE TABLE IF NOT EXISTS \"{table}\" (\n    \
                 id uuid PRIMARY KEY DEFAULT gen_random_uuid(),\n    \
                 school_id uuid NOT NULL,\n    \
                 data jsonb NOT NULL DEFAULT '{{}}'::jsonb,\n    \
                 created_at timestamptz NOT NULL DEFAULT now(),\n    \
                 updated_at timestamptz NOT NULL DEFAULT now()\n)",
                table = self.table
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS \"{table}_school_id_idx\" ON \"{table}\" (school_id)",
                table = self.table
            ),
        ];

        if !self.unique_key.is_empty() {
            let mut columns = vec!["school_id".to_string()];
            columns.extend(self.unique_key.iter().map(|f| format!("(data->>'{}')", f)));
            statements.push(format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS \"{table}_unique_key_idx\" ON \"{table}\" ({cols})",
                table = self.table,
                cols = columns.join(", ")
            ));
        }

        let (sort_field, _) = self.default_sort;
        if !matches!(sort_field, "created_at" | "updated_at" | "id") {
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS \"{table}_{field}_idx\" ON \"{table}\" (school_id, (data->>'{field}'))",
                table = self.table,
                field = sort_field
            ));
        }

        statements
    }

    /// Sanity-check the declaration itself; run by the registry tests and
    /// the `init` command before emitting DDL.
    pub fn validate(&self) -> Result<(), String> {
        validate_field_name(self.table).map_err(|e| e.to_string())?;
        let all_fields = self
            .required
            .iter()
            .chain(self.unique_key.iter())
            .chain(self.filterable.iter())
            .chain(self.date_fields.iter())
            .chain(self.range_field.iter())
            .chain(std::iter::once(&self.default_sort.0));
        for field in all_fields {
            validate_field_name(field).map_err(|e| format!("{}: {}", self.name, e))?;
        }
        for e in self.enums {
            validate_field_name(e.field).map_err(|err| format!("{}: {}", self.name, err))?;
            if e.allowed.is_empty() {
                return Err(format!("{}: enum field {} allows nothing", self.name, e.field));
            }
        }
        if let Some(policy) = &self.attachments {
            validate_field_name(policy.field).map_err(|e| format!("{}: {}", self.name, e))?;
            if policy.folder.is_empty() {
                return Err(format!("{}: attachment folder cannot be empty", self.name));
            }
        }
        Ok(())
    }

    pub fn enum_for(&self, field: &str) -> Option<&EnumField> {
        self.enums.iter().find(|e| e.field == field)
    }

    pub fn is_date_field(&self, field: &str) -> bool {
        self.date_fields.contains(&field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SPEC: ResourceSpec = ResourceSpec {
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

    #[test]
    fn ddl_includes_tenant_scoped_unique_index() {
        let ddl = SPEC.ddl();
        let unique = ddl.iter().find(|s| s.contains("UNIQUE")).unwrap();
        assert!(unique.contains("(school_id, (data->>'title'), (data->>'date'))"));
    }

    #[test]
    fn ddl_creates_table_and_tenant_index() {
        let ddl = SPEC.ddl();
        assert!(ddl[0].contains("CREATE TABLE IF NOT EXISTS \"albums\""));
        assert!(ddl[0].contains("school_id uuid NOT NULL"));
        assert!(ddl[1].contains("albums_school_id_idx"));
    }

    #[test]
    fn spec_validates() {
        SPEC.validate().unwrap();
    }
}
