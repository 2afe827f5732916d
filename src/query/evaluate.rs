use crate::mapping::{ENABLE, NAME, UID};
use crate::query::filter::Filter;
use crate::value_cmp::{compare_text, like_matches};
use crate::{Attribute, Record, Value};
use std::cmp::Ordering;

impl Filter {
    /// Whether the record matches. A leaf over an absent attribute is unknown, as a
    /// comparison with a null column is in the engine, and an unknown result does not match.
    ///
    /// A multivalued attribute matches a leaf when any of its values does. Records built
    /// with [`RowMapper::to_stored_record`](crate::mapping::RowMapper::to_stored_record)
    /// keep each column as one stored value and so match exactly what the engine matches.
    pub fn accepts(&self, record: &Record) -> bool {
        self.eval(record) == Some(true)
    }

    fn eval(&self, record: &Record) -> Option<bool> {
        match self {
            Filter::And(left, right) => match (left.eval(record), right.eval(record)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Filter::Or(left, right) => match (left.eval(record), right.eval(record)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Filter::Not(inner) => inner.eval(record).map(|matched| !matched),
            Filter::Equals(attr) => equals(attr, record),
            Filter::Contains(attr) => like(attr, record, true, true),
            Filter::StartsWith(attr) => like(attr, record, false, true),
            Filter::EndsWith(attr) => like(attr, record, true, false),
            Filter::GreaterThan(attr) => compare(attr, record, |o| o == Ordering::Greater),
            Filter::GreaterOrEqual(attr) => compare(attr, record, |o| o != Ordering::Less),
            Filter::LessThan(attr) => compare(attr, record, |o| o == Ordering::Less),
            Filter::LessOrEqual(attr) => compare(attr, record, |o| o != Ordering::Greater),
        }
    }
}

fn candidates(attr: &Attribute, record: &Record) -> Vec<String> {
    if attr.is(UID) || attr.is(NAME) {
        return vec![record.uid.0.clone()];
    }
    match record.get(&attr.name) {
        Some(Value::Secret(secret)) => vec![secret.reveal().to_string()],
        Some(value) => value.values(),
        None => vec![],
    }
}

fn operand(attr: &Attribute) -> Option<String> {
    match attr.value.as_ref()? {
        Value::Secret(secret) => Some(secret.reveal().to_string()),
        other => other.as_text(),
    }
}

/// Status equality on the resolved flag; a null operand never matches.
fn status(attr: &Attribute, stored: bool) -> bool {
    match &attr.value {
        Some(Value::Bool(flag)) => *flag == stored,
        Some(Value::Text(text)) => text.eq_ignore_ascii_case("true") == stored,
        _ => false,
    }
}

fn equals(attr: &Attribute, record: &Record) -> Option<bool> {
    if attr.is(ENABLE) {
        if let Some(Value::Bool(stored)) = record.get(ENABLE) {
            return Some(status(attr, *stored));
        }
    }

    match &attr.value {
        None => Some(candidates(attr, record).is_empty()),
        Some(Value::Binary(bytes)) => match record.get(&attr.name)? {
            Value::Binary(stored) => Some(stored == bytes),
            _ => Some(false),
        },
        Some(_) => {
            let wanted = operand(attr)?;
            let values = candidates(attr, record);
            if values.is_empty() {
                return None;
            }
            Some(values.iter().any(|value| *value == wanted))
        }
    }
}

fn like(attr: &Attribute, record: &Record, leading: bool, trailing: bool) -> Option<bool> {
    let Some(wanted) = operand(attr) else {
        return Some(false);
    };
    let mut pattern = String::with_capacity(wanted.len() + 2);
    if leading && !wanted.starts_with('%') {
        pattern.push('%');
    }
    pattern.push_str(&wanted);
    if trailing && !wanted.ends_with('%') {
        pattern.push('%');
    }

    let values = candidates(attr, record);
    if values.is_empty() {
        return None;
    }
    Some(values.iter().any(|value| like_matches(value, &pattern)))
}

fn compare(attr: &Attribute, record: &Record, accept: impl Fn(Ordering) -> bool) -> Option<bool> {
    let Some(wanted) = operand(attr) else {
        return Some(false);
    };
    let values = candidates(attr, record);
    if values.is_empty() {
        return None;
    }
    Some(values.iter().any(|value| accept(compare_text(value, &wanted))))
}
