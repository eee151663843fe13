use serde::{Deserialize, Serialize};

/// A single student row as read from the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub roll_number: String,
    pub name: String,
}

/// Field names understood by [`Record::field`], in the default output order.
pub const RECORD_FIELDS: [&str; 3] = ["id", "roll_number", "name"];

impl Record {
    pub fn new(id: i64, roll_number: impl Into<String>, name: impl Into<String>) -> Self {
        Record {
            id,
            roll_number: roll_number.into(),
            name: name.into(),
        }
    }

    /// Returns the textual value of a named field, or `None` if the field is unknown.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "id" => Some(self.id.to_string()),
            "roll_number" => Some(self.roll_number.clone()),
            "name" => Some(self.name.clone()),
            _ => None,
        }
    }

    pub fn is_known_field(name: &str) -> bool {
        RECORD_FIELDS.contains(&name)
    }
}
