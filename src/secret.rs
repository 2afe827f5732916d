use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use zeroize::Zeroizing;

/// A password value. The clear text is wiped from memory when the value is dropped and is
/// only reachable through [`GuardedString::reveal`].
#[derive(Clone, Default)]
pub struct GuardedString {
    inner: Zeroizing<String>,
}

impl GuardedString {
    pub fn new(clear: impl Into<String>) -> Self {
        GuardedString {
            inner: Zeroizing::new(clear.into()),
        }
    }

    /// Returns an owned copy of the clear text that is zeroed when dropped. Callers must not
    /// keep it beyond the mapping step that needed it.
    pub fn reveal(&self) -> Revealed {
        Revealed(Zeroizing::new(self.inner.as_str().to_owned()))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl PartialEq for GuardedString {
    fn eq(&self, other: &Self) -> bool {
        let (left, right) = (self.inner.as_bytes(), other.inner.as_bytes());
        left.len() == right.len()
            && left
                .iter()
                .zip(right)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

impl Debug for GuardedString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("GuardedString(****)")
    }
}

impl From<&str> for GuardedString {
    fn from(value: &str) -> Self {
        GuardedString::new(value)
    }
}

/// Clear text handed out by [`GuardedString::reveal`].
pub struct Revealed(Zeroizing<String>);

impl Deref for Revealed {
    type Target = str;

    fn deref(&self) -> &str {
        self.0.as_str()
    }
}

impl Debug for Revealed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Revealed(****)")
    }
}
