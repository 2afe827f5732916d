use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of the per-session identifiers that name a session's view and tables.
pub trait IdGenerator {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs in simple (hex only) form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Monotonic counter, for deterministic names.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn starting_at(first: u64) -> Self {
        SequentialIds {
            next: AtomicU64::new(first),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        self.next.fetch_add(1, Ordering::Relaxed).to_string()
    }
}

impl<G: IdGenerator + ?Sized> IdGenerator for &G {
    fn next_id(&self) -> String {
        (**self).next_id()
    }
}

/// Table name for a source file: the file stem reduced to `[A-Z0-9_]`, suffixed with the
/// session id.
pub(crate) fn table_name(stem: &str, session_id: &str) -> String {
    let mut name: String = stem
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() || name.starts_with(|ch: char| ch.is_ascii_digit()) {
        name.insert(0, 'T');
    }
    format!("{name}_{session_id}")
}
