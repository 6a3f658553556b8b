// Typed query layer: predicates, sort and pagination for resource listings.
//
// Conditions compile to SQL over the jsonb `data` column; the repository
// prepends the tenant predicate so callers can never forget it.

pub mod error;
pub mod page;
pub mod predicate;
pub mod sort;

pub use error::QueryError;
pub use page::{Page, PageRequest};
pub use predicate::{Condition, Predicate};
pub use sort::{Direction, Sort};

/// A complete listing request: filters, optional sort override, pagination.
#[derive(Debug, Default)]
pub struct ListQuery {
    pub conditions: Vec<Condition>,
    pub sort: Option<Sort>,
    pub page: PageRequest,
}

impl ListQuery {
    pub fn new(page: PageRequest) -> Self {
        Self {
            conditions: vec![],
            sort: None,
            page,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// SQL expression addressing a field: system columns are real columns,
/// everything else lives in the jsonb document.
pub(crate) fn column_expr(field: &str) -> Result<String, QueryError> {
    validate_field_name(field)?;
    Ok(match field {
        "id" | "created_at" | "updated_at" | "school_id" => format!("\"{}\"", field),
        _ => format!("(data->>'{}')", field),
    })
}

pub(crate) fn validate_field_name(field: &str) -> Result<(), QueryError> {
    if field.is_empty() {
        return Err(QueryError::InvalidField("field name cannot be empty".to_string()));
    }
    let mut chars = field.chars();
    let first = chars.next().unwrap();
    if !(first.is_ascii_alphabetic() || first == '_')
        || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(QueryError::InvalidField(format!("invalid field name: {}", field)));
    }
    Ok(())
}
