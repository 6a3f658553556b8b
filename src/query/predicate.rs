use super::{column_expr, QueryError};

/// Comparison applied to one document field. Values are bound as text
/// parameters; date fields compare correctly because they are stored in
/// ISO-8601 form.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String),
    Ne(String),
    Gt(String),
    Gte(String),
    Lt(String),
    Lte(String),
    Like(String),
    In(Vec<String>),
    Between(String, String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub predicate: Predicate,
}

impl Condition {
    pub fn new(field: impl Into<String>, predicate: Predicate) -> Self {
        Self { field: field.into(), predicate }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, Predicate::Eq(value.into()))
    }

    pub fn gte(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, Predicate::Gte(value.into()))
    }

    pub fn lte(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, Predicate::Lte(value.into()))
    }

    pub fn between(
        field: impl Into<String>,
        low: impl Into<String>,
        high: impl Into<String>,
    ) -> Self {
        Self::new(field, Predicate::Between(low.into(), high.into()))
    }

    pub fn is_in(field: impl Into<String>, values: Vec<String>) -> Self {
        Self::new(field, Predicate::In(values))
    }

    /// Render this condition as a SQL fragment, appending bound values to
    /// `params`. Placeholder numbering continues from the current length
    /// of `params`, so the caller controls the starting index.
    pub fn to_sql(&self, params: &mut Vec<String>) -> Result<String, QueryError> {
        let column = column_expr(&self.field)?;

        let mut bind = |value: &str, params: &mut Vec<String>| {
            params.push(value.to_string());
            format!("${}", params.len())
        };

        Ok(match &self.predicate {
            Predicate::Eq(v) => format!("{} = {}", column, bind(v, params)),
            Predicate::Ne(v) => format!("{} <> {}", column, bind(v, params)),
            Predicate::Gt(v) => format!("{} > {}", column, bind(v, params)),
            Predicate::Gte(v) => format!("{} >= {}", column, bind(v, params)),
            Predicate::Lt(v) => format!("{} < {}", column, bind(v, params)),
            Predicate::Lte(v) => format!("{} <= {}", column, bind(v, params)),
            Predicate::Like(v) => format!("{} ILIKE {}", column, bind(v, params)),
            Predicate::In(values) => {
                if values.is_empty() {
                    return Err(QueryError::EmptyIn);
                }
                let placeholders: Vec<String> =
                    values.iter().map(|v| bind(v, params)).collect();
                format!("{} IN ({})", column, placeholders.join(", "))
            }
            Predicate::Between(low, high) => {
                let low_ph = bind(low, params);
                let high_ph = bind(high, params);
                format!("{} BETWEEN {} AND {}", column, low_ph, high_ph)
            }
        })
    }
}

/// Combine conditions into a WHERE fragment joined with AND.
pub fn conditions_to_sql(
    conditions: &[Condition],
    params: &mut Vec<String>,
) -> Result<Vec<String>, QueryError> {
    conditions.iter().map(|c| c.to_sql(params)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_binds_sequential_placeholder() {
        let mut params = vec!["school".to_string()]; // caller already bound $1
        let sql = Condition::eq("studentId", "stu1").to_sql(&mut params).unwrap();
        assert_eq!(sql, "(data->>'studentId') = $2");
        assert_eq!(params, vec!["school".to_string(), "stu1".to_string()]);
    }

    #[test]
    fn between_binds_two_placeholders() {
        let mut params = vec![];
        let sql = Condition::between("date", "2024-03-01", "2024-03-31")
            .to_sql(&mut params)
            .unwrap();
        assert_eq!(sql, "(data->>'date') BETWEEN $1 AND $2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn in_expands_placeholders() {
        let mut params = vec![];
        let sql = Condition::is_in("status", vec!["present".into(), "late".into()])
            .to_sql(&mut params)
            .unwrap();
        assert_eq!(sql, "(data->>'status') IN ($1, $2)");
    }

    #[test]
    fn empty_in_is_rejected() {
        let mut params = vec![];
        let err = Condition::is_in("status", vec![]).to_sql(&mut params);
        assert!(matches!(err, Err(QueryError::EmptyIn)));
    }

    #[test]
    fn field_names_are_validated() {
        let mut params = vec![];
        let err = Condition::eq("x'); --", "v").to_sql(&mut params);
        assert!(matches!(err, Err(QueryError::InvalidField(_))));
    }
}
