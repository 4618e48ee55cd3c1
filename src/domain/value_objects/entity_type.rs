use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain table name a record belongs to. The engine treats rows as opaque, so
/// this is the only schema knowledge it carries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(value: String) -> Result<Self, String> {
        if value.is_empty() {
            return Err("Entity type must not be empty".to_string());
        }
        if value.len() > 64 {
            return Err("Entity type must be at most 64 characters".to_string());
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(format!("Entity type contains invalid characters: {value}"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_snake_case_names() {
        assert!(EntityType::new("commitment".into()).is_ok());
        assert!(EntityType::new("goal_entry".into()).is_ok());
    }

    #[test]
    fn rejects_empty_and_invalid() {
        assert!(EntityType::new(String::new()).is_err());
        assert!(EntityType::new("bad name".into()).is_err());
        assert!(EntityType::new("a".repeat(65)).is_err());
    }
}
