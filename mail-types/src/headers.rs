//! Header name sets for HEADER.FIELDS fetches.

use std::fmt::{Display, Formatter};

use crate::{
    error::{ValidationError, ValidationErrorKind},
    utils::indicators::is_header_atext,
};

/// An ordered set of case-folded header field names.
///
/// Used to build `BODY[HEADER.FIELDS (...)]` and `BODY[HEADER.FIELDS.NOT
/// (...)]` sections. Names are validated against the RFC 5322 `atext` set
/// (plus `.`, which real field names like `Content-Type` never need but
/// resent chains do). A set can be frozen at construction; mutating a frozen
/// set fails instead of silently succeeding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderSet {
    names: Vec<String>,
    exclude: bool,
    read_only: bool,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            exclude: false,
            read_only: false,
        }
    }

    /// A set matching every header except the listed ones
    /// (`HEADER.FIELDS.NOT`).
    pub fn excluding() -> Self {
        Self {
            names: Vec::new(),
            exclude: true,
            read_only: false,
        }
    }

    pub fn try_from_names<I, S>(names: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for name in names {
            set.add(name.as_ref())?;
        }

        Ok(set)
    }

    /// Freezes the set. Further `add`/`remove` calls fail.
    pub fn into_read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn verify(name: &str) -> Result<(), ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::new(ValidationErrorKind::Empty));
        }

        if let Some(at) = name.bytes().position(|b| !is_header_atext(b) && b != b'.') {
            return Err(ValidationError::new(ValidationErrorKind::InvalidByteAt {
                byte: name.as_bytes()[at],
                at,
            }));
        }

        Ok(())
    }

    pub fn add(&mut self, name: &str) -> Result<(), ValidationError> {
        if self.read_only {
            return Err(ValidationError::new(ValidationErrorKind::ReadOnly));
        }
        Self::verify(name)?;

        let folded = name.to_ascii_uppercase();
        if !self.names.contains(&folded) {
            self.names.push(folded);
        }

        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<(), ValidationError> {
        if self.read_only {
            return Err(ValidationError::new(ValidationErrorKind::ReadOnly));
        }

        let folded = name.to_ascii_uppercase();
        self.names.retain(|known| *known != folded);

        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_ascii_uppercase())
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn is_exclude(&self) -> bool {
        self.exclude
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Default for HeaderSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for HeaderSet {
    /// The parenthesized wire form, e.g. `(FROM TO SUBJECT)`.
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str("(")?;
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
        }
        f.write_str(")")
    }
}
