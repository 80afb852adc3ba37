//! Membership Type Definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permissions::TierPermissions;

/// The binding of an external identity to one seat and one permission
/// set, scoped to one top-level organization.
///
/// Identities are opaque strings supplied by the chat transport; the core
/// never assumes a particular format. Returned as value copies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub identity: String,
    /// Root node id of the organization this assignment belongs to.
    pub org_id: Uuid,
    /// The node within that organization's tree the identity is seated at.
    pub node_id: Uuid,
    pub permissions: TierPermissions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
