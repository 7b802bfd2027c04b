//! Roles, their write permissions, and the user registry.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::crypto::{generate_keypair, Keypair};
use crate::event::EventType;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Manufacturer,
    Dmv,
    Mechanic,
    Insurer,
    /// Read-only.
    Buyer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Manufacturer => "MANUFACTURER",
            Role::Dmv => "DMV",
            Role::Mechanic => "MECHANIC",
            Role::Insurer => "INSURER",
            Role::Buyer => "BUYER",
        }
    }

    /// Event types this role may submit.
    pub fn allowed_events(&self) -> &'static [EventType] {
        match self {
            Role::Manufacturer | Role::Dmv => {
                &[EventType::VehicleCreated, EventType::OwnershipTransfer]
            }
            Role::Mechanic => &[EventType::MileageUpdate, EventType::ServiceRecord],
            Role::Insurer => &[EventType::AccidentRecord],
            Role::Buyer => &[],
        }
    }

    pub fn permits(&self, event_type: EventType) -> bool {
        self.allowed_events().contains(&event_type)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MANUFACTURER" => Ok(Role::Manufacturer),
            "DMV" => Ok(Role::Dmv),
            "MECHANIC" => Ok(Role::Mechanic),
            "INSURER" => Ok(Role::Insurer),
            "BUYER" => Ok(Role::Buyer),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

/// Capability check consulted before a transaction is accepted.
pub trait Permissions {
    fn can_act(&self, actor_id: &str, event_type: EventType) -> bool;
}

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: String,
    pub role: Role,
    pub keypair: Keypair,
}

/// Public view of a user.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub user_id: String,
    pub role: Role,
    pub public_key: String,
}

impl User {
    pub fn info(&self) -> UserInfo {
        UserInfo {
            user_id: self.user_id.clone(),
            role: self.role,
            public_key: hex::encode(self.keypair.verifying.to_bytes()),
        }
    }
}

/// Known users and their keys. Built once at startup and handed to whatever
/// constructs transactions.
#[derive(Debug, Default, Clone)]
pub struct UserRegistry {
    users: BTreeMap<String, User>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manufacturers, DMV offices, mechanics, insurers and buyers used when
    /// no roster is configured.
    pub fn default_roster() -> Vec<(String, Role)> {
        [
            ("manufacturer_1", Role::Manufacturer),
            ("manufacturer_2", Role::Manufacturer),
            ("dmv_1", Role::Dmv),
            ("dmv_2", Role::Dmv),
            ("mechanic_1", Role::Mechanic),
            ("mechanic_2", Role::Mechanic),
            ("mechanic_3", Role::Mechanic),
            ("insurer_1", Role::Insurer),
            ("insurer_2", Role::Insurer),
            ("buyer_1", Role::Buyer),
            ("buyer_2", Role::Buyer),
            ("buyer_3", Role::Buyer),
        ]
        .into_iter()
        .map(|(id, role)| (id.to_string(), role))
        .collect()
    }

    pub fn with_roster(roster: impl IntoIterator<Item = (String, Role)>) -> Self {
        let mut registry = Self::new();
        for (user_id, role) in roster {
            registry.register(user_id, role);
        }
        registry
    }

    pub fn with_default_roster() -> Self {
        Self::with_roster(Self::default_roster())
    }

    /// Register a user with a freshly generated keypair, replacing any
    /// previous user of the same id.
    pub fn register(&mut self, user_id: impl Into<String>, role: Role) -> &User {
        let user_id = user_id.into();
        let user = User {
            user_id: user_id.clone(),
            role,
            keypair: generate_keypair(),
        };
        self.users.insert(user_id.clone(), user);
        &self.users[&user_id]
    }

    pub fn get(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id)
    }

    pub fn by_role(&self, role: Role) -> Vec<&User> {
        self.users.values().filter(|u| u.role == role).collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Permissions for UserRegistry {
    fn can_act(&self, actor_id: &str, event_type: EventType) -> bool {
        self.get(actor_id)
            .map_or(false, |user| user.role.permits(event_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_table() {
        assert!(Role::Manufacturer.permits(EventType::VehicleCreated));
        assert!(Role::Dmv.permits(EventType::OwnershipTransfer));
        assert!(Role::Mechanic.permits(EventType::MileageUpdate));
        assert!(!Role::Mechanic.permits(EventType::OwnershipTransfer));
        assert!(Role::Insurer.permits(EventType::AccidentRecord));
        assert!(EventType::ALL.iter().all(|e| !Role::Buyer.permits(*e)));
    }

    #[test]
    fn default_roster_shape() {
        let registry = UserRegistry::with_default_roster();
        assert_eq!(registry.len(), 12);
        assert_eq!(registry.by_role(Role::Mechanic).len(), 3);
        assert_eq!(registry.by_role(Role::Buyer).len(), 3);
    }

    #[test]
    fn can_act_consults_role() {
        let registry = UserRegistry::with_default_roster();
        assert!(registry.can_act("mechanic_1", EventType::ServiceRecord));
        assert!(!registry.can_act("buyer_1", EventType::ServiceRecord));
        assert!(!registry.can_act("nobody", EventType::VehicleCreated));
    }

    #[test]
    fn role_names_round_trip() {
        for role in [Role::Manufacturer, Role::Dmv, Role::Mechanic, Role::Insurer, Role::Buyer] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            assert_eq!(
                serde_json::to_string(&role).unwrap(),
                format!("\"{}\"", role.as_str())
            );
        }
        assert!("ADMIN".parse::<Role>().is_err());
    }

    #[test]
    fn public_info_exposes_key_hex() {
        let mut registry = UserRegistry::new();
        let info = registry.register("dmv_9", Role::Dmv).info();
        assert_eq!(info.public_key.len(), 64);
        assert_eq!(info.role, Role::Dmv);
    }
}
