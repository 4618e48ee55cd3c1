use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Replica-assigned identifier, minted once per device and persisted. Carried
/// on every write as its origin; its total order is the deterministic
/// tie-break when two replicas produce the same `updated_at`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DeviceId(Uuid);

impl DeviceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|e| format!("Invalid device id: {e}"))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips() {
        let id = DeviceId::generate();
        assert_eq!(DeviceId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn ordering_is_total() {
        let a = DeviceId::parse("00000000-0000-0000-0000-000000000001").unwrap();
        let b = DeviceId::parse("00000000-0000-0000-0000-000000000002").unwrap();
        assert!(a < b);
    }
}
