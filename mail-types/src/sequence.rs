//! Sequence sets and UID sets.
//!
//! Both share the textual form `1,3:5,10:*`. A [`SequenceSet`] is the command
//! side: it may contain `*` and is never interpreted by the client. A
//! [`UidSet`] is the response side: a concrete, sorted set of unique
//! identifiers as delivered by SEARCH, SORT, or VANISHED, with the set
//! operations the selected-mailbox reducer needs.

use std::{
    fmt::{Display, Formatter},
    num::NonZeroU32,
    str::FromStr,
};

use crate::error::{ValidationError, ValidationErrorKind};

/// A single element of a [`SequenceSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sequence {
    Single(SeqOrUid),
    Range(SeqOrUid, SeqOrUid),
}

/// A message number, or `*` for "the largest number in use".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeqOrUid {
    Value(NonZeroU32),
    Asterisk,
}

impl Display for SeqOrUid {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{}", value),
            Self::Asterisk => f.write_str("*"),
        }
    }
}

impl FromStr for SeqOrUid {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == "*" {
            Ok(SeqOrUid::Asterisk)
        } else if value.starts_with('0') {
            // IMAP numbers never carry leading zeroes; Rust's parser would
            // accept them.
            Err(ValidationError::new(ValidationErrorKind::Invalid))
        } else {
            Ok(SeqOrUid::Value(NonZeroU32::from_str(value).map_err(
                |_| ValidationError::new(ValidationErrorKind::Invalid),
            )?))
        }
    }
}

impl From<NonZeroU32> for SeqOrUid {
    fn from(value: NonZeroU32) -> Self {
        Self::Value(value)
    }
}

impl Display for Sequence {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::Single(value) => write!(f, "{}", value),
            Self::Range(start, end) => write!(f, "{}:{}", start, end),
        }
    }
}

impl FromStr for Sequence {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.split(':').count() {
            1 => Ok(Sequence::Single(value.parse()?)),
            2 => {
                let mut split = value.split(':');

                // Safety: `unwrap` can't panic due to the count above.
                let start = split.next().unwrap().parse()?;
                let end = split.next().unwrap().parse()?;

                Ok(Sequence::Range(start, end))
            }
            _ => Err(ValidationError::new(ValidationErrorKind::Invalid)),
        }
    }
}

/// A non-empty set of sequence numbers or UIDs, as used in commands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceSet(Vec<Sequence>);

impl SequenceSet {
    pub fn iter(&self) -> impl Iterator<Item = &Sequence> {
        self.0.iter()
    }

    /// `1:*`, the whole mailbox.
    pub fn all() -> Self {
        Self(vec![Sequence::Range(
            SeqOrUid::Value(NonZeroU32::MIN),
            SeqOrUid::Asterisk,
        )])
    }
}

impl TryFrom<Vec<Sequence>> for SequenceSet {
    type Error = ValidationError;

    fn try_from(sequences: Vec<Sequence>) -> Result<Self, Self::Error> {
        if sequences.is_empty() {
            return Err(ValidationError::new(ValidationErrorKind::Empty));
        }

        Ok(Self(sequences))
    }
}

impl From<NonZeroU32> for SequenceSet {
    fn from(value: NonZeroU32) -> Self {
        Self(vec![Sequence::Single(SeqOrUid::Value(value))])
    }
}

impl TryFrom<&[u32]> for SequenceSet {
    type Error = ValidationError;

    fn try_from(values: &[u32]) -> Result<Self, Self::Error> {
        let mut checked = Vec::with_capacity(values.len());

        for value in values {
            let value = NonZeroU32::new(*value)
                .ok_or_else(|| ValidationError::new(ValidationErrorKind::Invalid))?;
            checked.push(Sequence::Single(SeqOrUid::Value(value)));
        }

        Self::try_from(checked)
    }
}

impl FromStr for SequenceSet {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut results = vec![];

        for seq in value.split(',') {
            results.push(seq.parse()?);
        }

        Self::try_from(results)
    }
}

impl Display for SequenceSet {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        for (i, sequence) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", sequence)?;
        }

        Ok(())
    }
}

/// A concrete set of UIDs, kept as sorted, coalesced, inclusive ranges.
///
/// Unlike [`SequenceSet`] this type has no `*`: it describes identifiers the
/// server has actually named. The empty set is representable; its textual
/// form is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UidSet {
    ranges: Vec<(u32, u32)>,
}

impl UidSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of UIDs in the set.
    pub fn len(&self) -> u64 {
        self.ranges
            .iter()
            .map(|(start, end)| u64::from(*end) - u64::from(*start) + 1)
            .sum()
    }

    pub fn contains(&self, uid: u32) -> bool {
        self.ranges
            .binary_search_by(|(start, end)| {
                if uid < *start {
                    std::cmp::Ordering::Greater
                } else if uid > *end {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn insert(&mut self, uid: u32) {
        if uid == 0 || self.contains(uid) {
            return;
        }

        self.ranges.push((uid, uid));
        self.normalize();
    }

    pub fn remove(&mut self, uid: u32) {
        let Some(at) = self
            .ranges
            .iter()
            .position(|(start, end)| *start <= uid && uid <= *end)
        else {
            return;
        };

        let (start, end) = self.ranges.remove(at);
        if uid > start {
            self.ranges.insert(at, (start, uid - 1));
        }
        if uid < end {
            let at = self.ranges.partition_point(|(s, _)| *s < uid + 1);
            self.ranges.insert(at, (uid + 1, end));
        }
    }

    pub fn insert_range(&mut self, start: u32, end: u32) {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        if start == 0 {
            return;
        }

        self.ranges.push((start, end));
        self.normalize();
    }

    pub fn remove_all(&mut self, other: &UidSet) {
        for uid in other.iter() {
            self.remove(uid);
        }
    }

    /// Ascending iteration over every UID in the set.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|(start, end)| *start..=*end)
    }

    /// UIDs present in `self` but not in `other`, ascending.
    pub fn difference(&self, other: &UidSet) -> Vec<u32> {
        self.iter().filter(|uid| !other.contains(*uid)).collect()
    }

    fn normalize(&mut self) {
        self.ranges.sort_unstable();

        let mut coalesced: Vec<(u32, u32)> = Vec::with_capacity(self.ranges.len());
        for (start, end) in self.ranges.drain(..) {
            match coalesced.last_mut() {
                Some((_, last_end)) if u64::from(start) <= u64::from(*last_end) + 1 => {
                    *last_end = (*last_end).max(end);
                }
                _ => coalesced.push((start, end)),
            }
        }

        self.ranges = coalesced;
    }
}

impl FromIterator<u32> for UidSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = Self::new();
        set.ranges
            .extend(iter.into_iter().filter(|uid| *uid != 0).map(|uid| (uid, uid)));
        set.normalize();
        set
    }
}

impl Display for UidSet {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        for (i, (start, end)) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if start == end {
                write!(f, "{}", start)?;
            } else {
                write!(f, "{}:{}", start, end)?;
            }
        }

        Ok(())
    }
}

impl FromStr for UidSet {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut set = Self::new();

        if value.is_empty() {
            return Ok(set);
        }

        for piece in value.split(',') {
            match piece.split_once(':') {
                None => {
                    set.ranges.push({
                        let uid = parse_uid(piece)?;
                        (uid, uid)
                    });
                }
                Some((start, end)) => {
                    let start = parse_uid(start)?;
                    let end = parse_uid(end)?;
                    set.ranges
                        .push(if start <= end { (start, end) } else { (end, start) });
                }
            }
        }

        set.normalize();
        Ok(set)
    }
}

fn parse_uid(value: &str) -> Result<u32, ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(ValidationErrorKind::Empty));
    }
    if value.starts_with('0') {
        return Err(ValidationError::new(ValidationErrorKind::Invalid));
    }

    value
        .parse::<u32>()
        .map_err(|_| ValidationError::new(ValidationErrorKind::Invalid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_set_roundtrip() {
        let tests = ["1", "1,3:5", "1:*", "5,1:3,10:*", "*"];

        for test in tests {
            let got: SequenceSet = test.parse().unwrap();
            assert_eq!(test, got.to_string());
        }
    }

    #[test]
    fn test_sequence_set_rejects() {
        let tests = ["", "0", "01", "a", "1:2:3", "1,,2"];

        for test in tests {
            assert!(test.parse::<SequenceSet>().is_err(), "{:?}", test);
        }
    }

    #[test]
    fn test_uid_set_parse_and_display() {
        let tests = [
            ("1:3,5", vec![1, 2, 3, 5], "1:3,5"),
            ("5,1:3", vec![1, 2, 3, 5], "1:3,5"),
            ("3:1", vec![1, 2, 3], "1:3"),
            ("1,2,3", vec![1, 2, 3], "1:3"),
            ("7", vec![7], "7"),
            ("", vec![], ""),
        ];

        for (input, uids, canonical) in tests {
            let got: UidSet = input.parse().unwrap();
            assert_eq!(uids, got.iter().collect::<Vec<_>>());
            assert_eq!(canonical, got.to_string());
        }
    }

    #[test]
    fn test_uid_set_insert_remove() {
        let mut set: UidSet = "1:5".parse().unwrap();

        set.remove(3);
        assert_eq!("1:2,4:5", set.to_string());
        assert_eq!(4, set.len());

        set.insert(3);
        assert_eq!("1:5", set.to_string());

        set.remove(1);
        set.remove(5);
        assert_eq!("2:4", set.to_string());

        set.insert(7);
        assert_eq!("2:4,7", set.to_string());
        assert!(set.contains(7));
        assert!(!set.contains(6));
    }

    #[test]
    fn test_uid_set_difference() {
        let before: UidSet = "1:5,9".parse().unwrap();
        let after: UidSet = "2:6".parse().unwrap();

        assert_eq!(vec![1, 9], before.difference(&after));
        assert_eq!(vec![6], after.difference(&before));
    }

    #[test]
    fn test_uid_set_from_iter_coalesces() {
        let set: UidSet = [5u32, 1, 2, 3, 0, 2].into_iter().collect();
        assert_eq!("1:3,5", set.to_string());
    }
}
