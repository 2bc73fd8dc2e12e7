//! Tenant (store) identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a tenant. `0` is the admin scope: content assigned to it is
/// visible in every tenant.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TenantId(pub u32);

impl TenantId {
    /// The scope shared by all tenants.
    pub const ALL: TenantId = TenantId(0);
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TenantId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// An isolated catalog scope with its own index versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    #[serde(default)]
    pub code: String,
    /// Ignored tenants are excluded from every sync.
    #[serde(default)]
    pub ignored: bool,
}

impl Tenant {
    pub fn new(id: u32, code: impl Into<String>) -> Self {
        Self {
            id: TenantId(id),
            code: code.into(),
            ignored: false,
        }
    }

    /// Mark this tenant as ignored.
    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }
}
