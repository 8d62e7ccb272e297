//! Permission model - the fixed vocabulary of platform permissions.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A platform permission. The mapping from role/capability to permission
/// sets is a static table in the resolver; this enum is only the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub enum Permission {
    #[serde(rename = "knowledge.read")]
    KnowledgeRead,
    #[serde(rename = "knowledge.write")]
    KnowledgeWrite,
    #[serde(rename = "model.read")]
    ModelRead,
    #[serde(rename = "model.write")]
    ModelWrite,
    #[serde(rename = "agent.invoke")]
    AgentInvoke,
    #[serde(rename = "analytics.view")]
    AnalyticsView,
    #[serde(rename = "content.review")]
    ContentReview,
    #[serde(rename = "api_key.manage")]
    ApiKeyManage,
    #[serde(rename = "identity.manage")]
    IdentityManage,
    #[serde(rename = "audit.view")]
    AuditView,
}

impl Permission {
    /// Every permission the platform knows about.
    pub const ALL: &'static [Permission] = &[
        Permission::KnowledgeRead,
        Permission::KnowledgeWrite,
        Permission::ModelRead,
        Permission::ModelWrite,
        Permission::AgentInvoke,
        Permission::AnalyticsView,
        Permission::ContentReview,
        Permission::ApiKeyManage,
        Permission::IdentityManage,
        Permission::AuditView,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::KnowledgeRead => "knowledge.read",
            Permission::KnowledgeWrite => "knowledge.write",
            Permission::ModelRead => "model.read",
            Permission::ModelWrite => "model.write",
            Permission::AgentInvoke => "agent.invoke",
            Permission::AnalyticsView => "analytics.view",
            Permission::ContentReview => "content.review",
            Permission::ApiKeyManage => "api_key.manage",
            Permission::IdentityManage => "identity.manage",
            Permission::AuditView => "audit.view",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
