use std::fmt;

/// Ordered access levels for commands and plugins
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PermissionLevel {
    User = 1,
    Admin = 2,
    Owner = 3,
}

impl PermissionLevel {
    /// Parse a permission tag such as `admin`. Unknown tags yield `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "user" => Some(PermissionLevel::User),
            "admin" => Some(PermissionLevel::Admin),
            "owner" => Some(PermissionLevel::Owner),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PermissionLevel::User => "user",
            PermissionLevel::Admin => "admin",
            PermissionLevel::Owner => "owner",
        }
    }

    pub fn allows(&self, required: PermissionLevel) -> bool {
        *self >= required
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
