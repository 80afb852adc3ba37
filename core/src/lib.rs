//! Muster Core
//!
//! In-process core for guild community management: a forest of named
//! guild trees, a membership directory seating chat identities in those
//! trees, and a tiered bitmask authorization model evaluated from the
//! relative position of actor and target. Chat transport, command
//! dispatch, and character-record storage live outside this crate and
//! drive it through the types re-exported here.

pub mod config;
pub mod error;
pub mod membership;
pub mod permissions;
pub mod snapshot;
pub mod tree;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use membership::{Assignment, MembershipDirectory};
pub use permissions::{Authorizer, Capability, Tier, TierPermissions};
pub use snapshot::{export, import, Snapshot, SnapshotError, SNAPSHOT_VERSION};
pub use tree::{AttributeDef, AttributeKind, AttributeValue, Guild, GuildTree, NodeRelation};
