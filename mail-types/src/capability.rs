//! Capability sets.

use std::collections::HashSet;

/// The extensions a server has advertised.
///
/// The raw token list is preserved in wire order for logging; membership
/// tests go through a case-folded set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    raw: Vec<String>,
    folded: HashSet<String>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for token in tokens {
            set.insert(token.as_ref());
        }

        set
    }

    pub fn insert(&mut self, token: &str) {
        if token.is_empty() {
            return;
        }

        self.folded.insert(token.to_ascii_uppercase());
        self.raw.push(token.to_owned());
    }

    pub fn has(&self, capability: &str) -> bool {
        self.folded.contains(&capability.to_ascii_uppercase())
    }

    /// True when any of the given spellings is advertised. Some extensions
    /// appear under more than one name (`ANNOTATE` vs `ANNOTATION`).
    pub fn has_any(&self, capabilities: &[&str]) -> bool {
        capabilities.iter().any(|capability| self.has(capability))
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn raw(&self) -> &[String] {
        &self.raw
    }
}
