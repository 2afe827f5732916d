use super::quote_ident;
use std::fmt::{Display, Formatter};

/// Engine type a parameter is bound as. Every binding is textual; comparisons follow the
/// engine's text collation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SqlType {
    Varchar,
}

/// One positional binding of a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlParam {
    pub name: String,
    pub value: Option<String>,
    pub sql_type: SqlType,
}

impl SqlParam {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        SqlParam {
            name: name.into(),
            value,
            sql_type: SqlType::Varchar,
        }
    }
}

/// A compiled WHERE clause plus its bindings in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Predicate {
    clause: String,
    params: Vec<SqlParam>,
}

impl Predicate {
    pub fn new() -> Self {
        Predicate::default()
    }

    pub fn clause(&self) -> &str {
        &self.clause
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }

    pub(crate) fn push_str(&mut self, text: &str) {
        self.clause.push_str(text);
    }

    /// Appends `column <op> ?` and records the binding.
    pub(crate) fn add_bind(&mut self, param: SqlParam, operator: &str) {
        self.clause.push_str(&quote_ident(&param.name));
        self.clause.push(' ');
        self.clause.push_str(operator);
        self.clause.push_str(" ?");
        self.params.push(param);
    }

    /// Appends a bare `?` and records the binding.
    pub(crate) fn bind(&mut self, param: SqlParam) {
        self.clause.push('?');
        self.params.push(param);
    }

    pub(crate) fn add_null(&mut self, column: &str) {
        self.clause.push_str(&quote_ident(column));
        self.clause.push_str(" IS NULL");
    }

    /// `NOT (clause)` with the same bindings.
    pub(crate) fn negate(self) -> Predicate {
        Predicate {
            clause: format!("NOT ({})", self.clause),
            params: self.params,
        }
    }

    /// `(left) <operator> (right)`, bindings concatenated in the same order.
    pub fn join(operator: &str, left: Predicate, right: Predicate) -> Predicate {
        let mut params = left.params;
        params.extend(right.params);
        Predicate {
            clause: format!("({}) {} ({})", left.clause, operator, right.clause),
            params,
        }
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.clause)
    }
}
