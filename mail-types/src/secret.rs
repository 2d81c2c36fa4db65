//! Credential wrappers.

use std::fmt::{Debug, Formatter};

/// Holds a password or token and keeps it out of `Debug` output.
///
/// Session structs and credentials end up in log lines via `{:?}` sooner or
/// later; wrapping the sensitive field means a stray debug print shows a
/// placeholder instead of the value. Access goes through
/// [`declassify`](Secret::declassify), which makes every read of the inner
/// value easy to grep for.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    pub fn new(inner: T) -> Self {
        Self(inner)
    }

    /// Deliberate access to the wrapped value.
    pub fn declassify(&self) -> &T {
        &self.0
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> Debug for Secret<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(****)")
    }
}

#[cfg(test)]
mod tests {
    use super::Secret;

    #[test]
    fn test_debug_hides_the_value() {
        let secret = Secret::new("xyz123");
        let printed = format!("{:?}", secret);

        assert_eq!("Secret(****)", printed);
        assert!(!printed.contains("xyz123"));
        assert_eq!("xyz123", *secret.declassify());
    }

    #[test]
    fn test_debug_needs_no_inner_debug() {
        // The placeholder works even when T itself has no Debug impl.
        struct Opaque;
        let secret = Secret::new(Opaque);
        assert_eq!("Secret(****)", format!("{:?}", secret));
    }
}
