use crate::records::record::Record;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt, str::FromStr};
use thiserror::Error;

/// Column the backing store is paged by, always ascending.
///
/// Only `id` is unique. The other keys are paired with `id` as a tie-breaker so
/// that the resulting order is strict and page boundaries never split ties.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Id,
    RollNumber,
    Name,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown sort key column: {0}")]
pub struct UnknownSortKey(pub String);

impl SortKey {
    pub fn column(&self) -> &'static str {
        match self {
            SortKey::Id => "id",
            SortKey::RollNumber => "roll_number",
            SortKey::Name => "name",
        }
    }

    /// Total order over records: the sort column first, then `id`.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let primary = match self {
            SortKey::Id => Ordering::Equal,
            SortKey::RollNumber => a.roll_number.cmp(&b.roll_number),
            SortKey::Name => a.name.cmp(&b.name),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }

    /// Value of the (non-unique) sort column for `record`.
    pub fn value_of<'a>(&self, record: &'a Record) -> Option<&'a str> {
        match self {
            SortKey::Id => None,
            SortKey::RollNumber => Some(&record.roll_number),
            SortKey::Name => Some(&record.name),
        }
    }
}

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(SortKey::Id),
            "roll_number" => Ok(SortKey::RollNumber),
            "name" => Ok(SortKey::Name),
            other => Err(UnknownSortKey(other.to_string())),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_are_broken_by_id() {
        let a = Record::new(2, "R", "Same");
        let b = Record::new(1, "R", "Same");
        assert_eq!(SortKey::Name.compare(&a, &b), Ordering::Greater);
        assert_eq!(SortKey::RollNumber.compare(&b, &a), Ordering::Less);
    }

    #[test]
    fn parses_column_names() {
        assert_eq!("ID".parse::<SortKey>(), Ok(SortKey::Id));
        assert_eq!("roll_number".parse::<SortKey>(), Ok(SortKey::RollNumber));
        assert!("age".parse::<SortKey>().is_err());
    }
}
