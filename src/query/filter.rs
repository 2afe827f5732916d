use crate::config::CsvDirConfig;
use crate::mapping::{ENABLE, NAME, PASSWORD, UID};
use crate::query::predicate::{Predicate, SqlParam};
use crate::query::quote_ident;
use crate::{split_key, Attribute, Value};

/// Boolean filter tree handed in by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
    Equals(Attribute),
    Contains(Attribute),
    StartsWith(Attribute),
    EndsWith(Attribute),
    GreaterThan(Attribute),
    GreaterOrEqual(Attribute),
    LessThan(Attribute),
    LessOrEqual(Attribute),
}

impl Filter {
    pub fn and(left: Filter, right: Filter) -> Filter {
        Filter::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Filter, right: Filter) -> Filter {
        Filter::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Filter) -> Filter {
        Filter::Not(Box::new(inner))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Like {
    Contains,
    StartsWith,
    EndsWith,
}

/// Compiles filter trees into parameterized predicates over the physical columns of a
/// configuration.
pub struct FilterCompiler<'a> {
    config: &'a CsvDirConfig,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(config: &'a CsvDirConfig) -> Self {
        FilterCompiler { config }
    }

    /// Compiles `filter`, negated when `not` is set. `None` means the filter cannot be
    /// expressed as a predicate and must be evaluated in memory.
    ///
    /// Negation is pushed to the leaves. A conjunction with one unsupported side keeps the
    /// other side, which then selects a superset of the matching rows. A disjunction with an
    /// unsupported side is unsupported as a whole.
    pub fn compile(&self, filter: &Filter, not: bool) -> Option<Predicate> {
        match filter {
            Filter::Not(inner) => self.compile(inner, !not),
            Filter::And(left, right) if not => self.or(left, right, not),
            Filter::And(left, right) => self.and(left, right, not),
            Filter::Or(left, right) if not => self.and(left, right, not),
            Filter::Or(left, right) => self.or(left, right, not),
            Filter::Equals(attr) if attr.is(ENABLE) => self.status(attr, not),
            Filter::Equals(attr) => self.equals(attr, not),
            Filter::Contains(attr) => self.like(attr, Like::Contains, not),
            Filter::StartsWith(attr) => self.like(attr, Like::StartsWith, not),
            Filter::EndsWith(attr) => self.like(attr, Like::EndsWith, not),
            Filter::GreaterThan(attr) => self.compare(attr, if not { "<=" } else { ">" }),
            Filter::GreaterOrEqual(attr) => self.compare(attr, if not { "<" } else { ">=" }),
            Filter::LessThan(attr) => self.compare(attr, if not { ">=" } else { "<" }),
            Filter::LessOrEqual(attr) => self.compare(attr, if not { ">" } else { "<=" }),
        }
    }

    /// Whether every leaf of `filter` compiles, so the predicate selects exactly the
    /// matching rows.
    pub fn is_exact(&self, filter: &Filter) -> bool {
        match filter {
            Filter::Not(inner) => self.is_exact(inner),
            Filter::And(left, right) | Filter::Or(left, right) => {
                self.is_exact(left) && self.is_exact(right)
            }
            leaf => self.compile(leaf, false).is_some(),
        }
    }

    fn and(&self, left: &Filter, right: &Filter, not: bool) -> Option<Predicate> {
        match (self.compile(left, not), self.compile(right, not)) {
            (Some(left), Some(right)) => Some(Predicate::join("AND", left, right)),
            (Some(single), None) | (None, Some(single)) => Some(single),
            (None, None) => None,
        }
    }

    fn or(&self, left: &Filter, right: &Filter, not: bool) -> Option<Predicate> {
        let left = self.compile(left, not)?;
        let right = self.compile(right, not)?;
        Some(Predicate::join("OR", left, right))
    }

    fn equals(&self, attr: &Attribute, not: bool) -> Option<Predicate> {
        let pairs = self.resolve(attr)?;
        let mut predicate = Predicate::new();
        if not {
            predicate.push_str("NOT (");
        }
        for (idx, (column, value)) in pairs.into_iter().enumerate() {
            if idx > 0 {
                predicate.push_str(" AND ");
            }
            match value {
                Some(value) => predicate.add_bind(SqlParam::new(column, Some(value)), "="),
                None => predicate.add_null(&column),
            }
        }
        if not {
            predicate.push_str(")");
        }
        Some(predicate)
    }

    /// Compares the resolved status with the enabled token. A blank or null column resolves
    /// to the default token first, so the result is never null and negation flips the
    /// operator.
    fn status(&self, attr: &Attribute, not: bool) -> Option<Predicate> {
        let column = self.config.status_column.as_deref()?;
        let wanted = match &attr.value {
            None => None,
            Some(Value::Bool(flag)) => Some(*flag),
            Some(Value::Text(text)) => Some(text.eq_ignore_ascii_case("true")),
            Some(_) => return None,
        };

        let mut predicate = Predicate::new();
        let Some(wanted) = wanted else {
            // a resolved status is never null
            predicate.push_str("0 = 1");
            return Some(if not { predicate.negate() } else { predicate });
        };

        let quoted = quote_ident(column);
        predicate.push_str(&format!("CASE WHEN trim(coalesce({quoted}, '')) = '' THEN "));
        predicate.bind(SqlParam::new(column, Some(self.config.default_status_value.clone())));
        predicate.push_str(&format!(" ELSE {quoted} END "));
        predicate.push_str(if wanted != not { "= " } else { "<> " });
        predicate.bind(SqlParam::new(column, Some(self.config.enabled_status_value.clone())));
        Some(predicate)
    }

    fn like(&self, attr: &Attribute, kind: Like, not: bool) -> Option<Predicate> {
        let pairs = self
            .resolve(attr)?
            .into_iter()
            .filter_map(|(column, value)| value.map(|value| (column, wrap(&value, kind))));
        let predicate = bind_all(pairs, "LIKE")?;
        Some(if not { predicate.negate() } else { predicate })
    }

    fn compare(&self, attr: &Attribute, operator: &str) -> Option<Predicate> {
        let pairs = self
            .resolve(attr)?
            .into_iter()
            .filter_map(|(column, value)| value.map(|value| (column, value)));
        bind_all(pairs, operator)
    }

    /// Physical columns and values an attribute stands for. `None` when the attribute has no
    /// column or its value has no textual form. The enable attribute only supports equality,
    /// which `status` compiles.
    fn resolve(&self, attr: &Attribute) -> Option<Vec<(String, Option<String>)>> {
        if let Some(Value::Binary(_)) = attr.value {
            return None;
        }

        if attr.is(UID) || attr.is(NAME) {
            let keys = &self.config.key_column_names;
            let text = attr.value.as_ref().and_then(text_of);
            let components = text
                .as_deref()
                .map(|uid| split_key(uid, &self.config.key_separator))
                .filter(|components| components.len() == keys.len());
            return Some(
                keys.iter()
                    .enumerate()
                    .map(|(idx, key)| {
                        let value = components.as_ref().map(|c| c[idx].to_string());
                        (key.clone(), value)
                    })
                    .collect(),
            );
        }

        if attr.is(PASSWORD) {
            let column = self.config.password_column_name.clone()?;
            return Some(vec![(column, attr.value.as_ref().and_then(text_of))]);
        }

        if attr.is(ENABLE) {
            return None;
        }

        Some(vec![(attr.name.clone(), attr.value.as_ref().and_then(text_of))])
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Secret(secret) => Some(secret.reveal().to_string()),
        other => other.as_text(),
    }
}

fn wrap(value: &str, kind: Like) -> String {
    let leading = matches!(kind, Like::Contains | Like::EndsWith) && !value.starts_with('%');
    let trailing = matches!(kind, Like::Contains | Like::StartsWith) && !value.ends_with('%');

    let mut pattern = String::with_capacity(value.len() + 2);
    if leading {
        pattern.push('%');
    }
    pattern.push_str(value);
    if trailing {
        pattern.push('%');
    }
    pattern
}

/// ANDs `column <operator> ?` over the pairs; `None` when there are none.
fn bind_all(pairs: impl Iterator<Item = (String, String)>, operator: &str) -> Option<Predicate> {
    let mut predicate = Predicate::new();
    for (column, value) in pairs {
        if !predicate.is_empty() {
            predicate.push_str(" AND ");
        }
        predicate.add_bind(SqlParam::new(column, Some(value)), operator);
    }
    (!predicate.is_empty()).then_some(predicate)
}
