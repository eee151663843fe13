use crate::{pagination::sort::SortKey, records::record::Record};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Represents the pagination cursor: the key of the last record handed out.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub enum Cursor {
    /// Nothing read yet.
    #[default]
    None,

    /// Cursor for the unique, strictly increasing primary key.
    Pk { id: i64 },

    /// Composite cursor for a non-unique text column with `id` as tie-breaker.
    Composite { value: String, id: i64 },
}

impl Cursor {
    /// Cursor positioned just after `record` under `sort_key`.
    pub fn after(record: &Record, sort_key: SortKey) -> Self {
        match sort_key.value_of(record) {
            None => Cursor::Pk { id: record.id },
            Some(value) => Cursor::Composite {
                value: value.to_string(),
                id: record.id,
            },
        }
    }

    /// True if `record` sorts strictly after this cursor.
    pub fn precedes(&self, record: &Record, sort_key: SortKey) -> bool {
        match self {
            Cursor::None => true,
            Cursor::Pk { id } => record.id > *id,
            Cursor::Composite { value, id } => {
                let Some(current) = sort_key.value_of(record) else {
                    return record.id > *id;
                };
                match current.cmp(value.as_str()) {
                    Ordering::Greater => true,
                    Ordering::Equal => record.id > *id,
                    Ordering::Less => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pk_cursor_only_admits_larger_ids() {
        let cursor = Cursor::after(&Record::new(5, "R5", "E"), SortKey::Id);
        assert_eq!(cursor, Cursor::Pk { id: 5 });
        assert!(!cursor.precedes(&Record::new(5, "R5", "E"), SortKey::Id));
        assert!(cursor.precedes(&Record::new(6, "R6", "F"), SortKey::Id));
    }

    #[test]
    fn composite_cursor_handles_ties() {
        let cursor = Cursor::after(&Record::new(3, "R3", "Ann"), SortKey::Name);
        assert!(!cursor.precedes(&Record::new(2, "R2", "Ann"), SortKey::Name));
        assert!(cursor.precedes(&Record::new(4, "R4", "Ann"), SortKey::Name));
        assert!(cursor.precedes(&Record::new(1, "R1", "Bob"), SortKey::Name));
        assert!(!cursor.precedes(&Record::new(9, "R9", "Al"), SortKey::Name));
    }
}
