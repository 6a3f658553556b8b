use super::{column_expr, QueryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn to_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    pub fn parse(s: &str) -> Result<Self, QueryError> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(QueryError::InvalidDirection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self { field: field.into(), direction }
    }

    /// ORDER BY clause; id is appended as a tiebreaker so paginated pages
    /// are stable under equal sort keys.
    pub fn to_sql(&self) -> Result<String, QueryError> {
        let column = column_expr(&self.field)?;
        Ok(format!(
            "ORDER BY {} {}, \"id\" {}",
            column,
            self.direction.to_sql(),
            self.direction.to_sql()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_order_clause_with_tiebreaker() {
        let sort = Sort::new("date", Direction::Desc);
        assert_eq!(sort.to_sql().unwrap(), "ORDER BY (data->>'date') DESC, \"id\" DESC");
    }

    #[test]
    fn created_at_sorts_on_real_column() {
        let sort = Sort::new("created_at", Direction::Desc);
        assert_eq!(sort.to_sql().unwrap(), "ORDER BY \"created_at\" DESC, \"id\" DESC");
    }

    #[test]
    fn parse_direction() {
        assert_eq!(Direction::parse("ASC").unwrap(), Direction::Asc);
        assert_eq!(Direction::parse("desc").unwrap(), Direction::Desc);
        assert!(Direction::parse("sideways").is_err());
    }
}
