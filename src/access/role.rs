use std::fmt;

use serde::{Deserialize, Serialize};

/// Access roles, totally ordered by rank. A smaller rank means more
/// privilege, so an owner grant satisfies any editor or viewer requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Editor,
    Viewer,
}

impl Role {
    pub fn rank(&self) -> u8 {
        match self {
            Role::Owner => 1,
            Role::Editor => 2,
            Role::Viewer => 3,
        }
    }

    /// True when this role grants at least the privilege of `required`.
    pub fn covers(&self, required: Role) -> bool {
        self.rank() <= required.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "owner" => Some(Role::Owner),
            "editor" => Some(Role::Editor),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
