//! Flag-related types.

use std::fmt::{Display, Formatter};

/// A message flag.
///
/// System flags are pre-defined in RFC 3501 and begin with `\`. Flags that
/// begin with `\` but are not pre-defined are extension flags; a client must
/// accept them. Keywords are server- or user-defined and carry no backslash.
///
/// `\Recent` is accepted here even though it can never be stored by a client:
/// servers deliver it in FETCH FLAGS lists, and the parsers keep what the
/// wire said.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// `\Answered`
    Answered,
    /// `\Deleted`
    Deleted,
    /// `\Draft`
    Draft,
    /// `\Flagged`
    Flagged,
    /// `\Seen`
    Seen,
    /// `\Recent`
    Recent,
    /// A future expansion of a system flag.
    Extension(String),
    /// A keyword.
    Keyword(String),
}

impl Flag {
    pub fn system(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "answered" => Self::Answered,
            "deleted" => Self::Deleted,
            "draft" => Self::Draft,
            "flagged" => Self::Flagged,
            "seen" => Self::Seen,
            "recent" => Self::Recent,
            _ => Self::Extension(name.to_owned()),
        }
    }

    pub fn keyword(name: impl Into<String>) -> Self {
        Self::Keyword(name.into())
    }

    /// Parse the textual form, with or without the leading backslash.
    pub fn parse(value: &str) -> Self {
        match value.strip_prefix('\\') {
            Some(name) => Self::system(name),
            None => Self::Keyword(value.to_owned()),
        }
    }
}

impl Display for Flag {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Flag::Answered => f.write_str("\\Answered"),
            Flag::Deleted => f.write_str("\\Deleted"),
            Flag::Draft => f.write_str("\\Draft"),
            Flag::Flagged => f.write_str("\\Flagged"),
            Flag::Seen => f.write_str("\\Seen"),
            Flag::Recent => f.write_str("\\Recent"),
            Flag::Extension(other) => write!(f, "\\{}", other),
            Flag::Keyword(keyword) => f.write_str(keyword),
        }
    }
}

/// How a STORE command combines the given flags with the existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreAction {
    Replace,
    Add,
    Remove,
}

impl StoreAction {
    /// The FETCH-item prefix: `FLAGS`, `+FLAGS`, or `-FLAGS`.
    pub fn item(&self, silent: bool) -> &'static str {
        match (self, silent) {
            (Self::Replace, false) => "FLAGS",
            (Self::Replace, true) => "FLAGS.SILENT",
            (Self::Add, false) => "+FLAGS",
            (Self::Add, true) => "+FLAGS.SILENT",
            (Self::Remove, false) => "-FLAGS",
            (Self::Remove, true) => "-FLAGS.SILENT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_parse_display() {
        let tests = [
            ("\\Seen", Flag::Seen),
            ("\\seen", Flag::Seen),
            ("\\Answered", Flag::Answered),
            ("\\Recent", Flag::Recent),
            ("\\MDNSent", Flag::Extension("MDNSent".into())),
            ("$Forwarded", Flag::Keyword("$Forwarded".into())),
        ];

        for (input, expected) in tests {
            let got = Flag::parse(input);
            assert_eq!(expected, got);
        }

        assert_eq!("\\Seen", Flag::Seen.to_string());
        assert_eq!("$Forwarded", Flag::keyword("$Forwarded").to_string());
        assert_eq!("\\MDNSent", Flag::Extension("MDNSent".into()).to_string());
    }

    #[test]
    fn test_store_action_items() {
        assert_eq!("FLAGS", StoreAction::Replace.item(false));
        assert_eq!("+FLAGS.SILENT", StoreAction::Add.item(true));
        assert_eq!("-FLAGS", StoreAction::Remove.item(false));
    }
}
