//! The two rival roles sharing the room.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Goth,
    Hipster,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Goth, Role::Hipster];

    /// The role that must be absent for this one to be admitted.
    pub fn other(self) -> Role {
        match self {
            Role::Goth => Role::Hipster,
            Role::Hipster => Role::Goth,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Goth => "goth",
            Role::Hipster => "hipster",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Role::Goth => 0,
            Role::Hipster => 1,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
