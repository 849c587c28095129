use serde::{Deserialize, Serialize};

/// Permission grants checked explicitly by the inventory core
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    /// Confirm or hold seats regardless of who currently holds them
    BypassHoldOwnership,
    /// Reallocate, cancel or create paid reservations on behalf of customers
    ManageReservations,
}

/// Whoever is acting on the inventory: a customer session or back-office staff
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub capabilities: Vec<Capability>,
}

impl Actor {
    pub fn customer(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capabilities: vec![Capability::BypassHoldOwnership, Capability::ManageReservations],
        }
    }

    /// Maps a token role onto capabilities. Unknown roles get none.
    pub fn from_role(id: impl Into<String>, role: &str) -> Self {
        match role {
            "ADMIN" | "SUPER_ADMIN" => Self::admin(id),
            _ => Self::customer(id),
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn can_bypass_hold_ownership(&self) -> bool {
        self.has_capability(Capability::BypassHoldOwnership)
    }

    pub fn can_manage_reservations(&self) -> bool {
        self.has_capability(Capability::ManageReservations)
    }
}
