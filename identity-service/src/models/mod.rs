pub mod api_key;
pub mod audit;
pub mod capability_request;
pub mod identity;
pub mod permission;
pub mod review;
pub mod token_family;

pub use api_key::{ApiKey, ApiKeyResponse, ApiKeyStatus, RateCeiling};
pub use audit::{AuditEntry, AuditQuery, AuthMethod, ClientMeta};
pub use capability_request::{
    CapabilityRequest, CapabilityRequestResponse, RequestKind, RequestStatus,
};
pub use identity::{Actor, BaseRole, Capability, Identity, IdentityResponse, IdentityStatus};
pub use permission::Permission;
pub use review::{ReviewRecord, ReviewStatus};
pub use token_family::TokenFamily;
