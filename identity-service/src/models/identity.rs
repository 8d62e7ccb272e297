//! Identity model - platform accounts created on first external-provider login.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Singular coarse-grained tier of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BaseRole {
    Administrator,
    Curator,
    Explorator,
}

impl BaseRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseRole::Administrator => "administrator",
            BaseRole::Curator => "curator",
            BaseRole::Explorator => "explorator",
        }
    }
}

impl std::fmt::Display for BaseRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Additive grant of extra permissions. Only meaningful when the base role
/// is curator; administrators hold every permission implicitly and
/// explorators hold none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    AgentAccess,
    AnalyticsAccess,
    ReviewerStatus,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::AgentAccess => "agent_access",
            Capability::AnalyticsAccess => "analytics_access",
            Capability::ReviewerStatus => "reviewer_status",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity lifecycle states. Identities are never hard-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStatus {
    PendingApproval,
    Active,
    Suspended,
}

/// Identity record, created on first successful provider login with
/// `pending_approval` status and no role until an administrator decides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "_id")]
    pub id: String,

    /// Unique subject identifier issued by the external identity provider.
    pub provider_subject: String,

    pub email: String,

    pub display_name: Option<String>,

    /// None until an administrator assigns a base role.
    pub base_role: Option<BaseRole>,

    #[serde(default)]
    pub capabilities: Vec<Capability>,

    pub status: IdentityStatus,

    #[serde(default)]
    pub login_count: i64,

    pub last_login_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Create a pending identity from a provider profile.
    pub fn new(provider_subject: String, email: String, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            provider_subject,
            email,
            display_name,
            base_role: None,
            capabilities: Vec::new(),
            status: IdentityStatus::PendingApproval,
            login_count: 0,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == IdentityStatus::Active
    }

    pub fn is_admin(&self) -> bool {
        self.base_role == Some(BaseRole::Administrator)
    }

    /// Union the granted capabilities into the held set, idempotently.
    /// Keeps the set ordered so repeated grants produce identical records.
    pub fn grant_capabilities(&mut self, granted: &[Capability]) {
        for cap in granted {
            if !self.capabilities.contains(cap) {
                self.capabilities.push(*cap);
            }
        }
        self.capabilities.sort();
        self.updated_at = Utc::now();
    }

    /// Assign a base role, activating a pending identity. Explorators must
    /// hold an empty capability set, so assignment clears it.
    pub fn assign_role(&mut self, role: BaseRole) {
        self.base_role = Some(role);
        if role == BaseRole::Explorator {
            self.capabilities.clear();
        }
        if self.status == IdentityStatus::PendingApproval {
            self.status = IdentityStatus::Active;
        }
        self.updated_at = Utc::now();
    }

    /// Lightweight authorization view of this identity.
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id.clone(),
            email: self.email.clone(),
            base_role: self.base_role,
            capabilities: self.capabilities.clone(),
        }
    }

    /// Convert to sanitized response (no provider subject).
    pub fn sanitized(&self) -> IdentityResponse {
        IdentityResponse {
            id: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            base_role: self.base_role,
            capabilities: self.capabilities.clone(),
            status: self.status,
            login_count: self.login_count,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
        }
    }
}

/// The authorization-relevant view of an identity. For bearer-token calls
/// this is built straight from the signed claims without a store lookup;
/// for API-key calls it is built from the loaded identity record.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub email: String,
    pub base_role: Option<BaseRole>,
    pub capabilities: Vec<Capability>,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.base_role == Some(BaseRole::Administrator)
    }
}

/// Identity response for API (without provider linkage).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IdentityResponse {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub base_role: Option<BaseRole>,
    pub capabilities: Vec<Capability>,
    pub status: IdentityStatus,
    pub login_count: i64,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
