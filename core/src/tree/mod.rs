//! Guild tree storage and structural operations.

pub mod attributes;
pub mod store;
pub mod types;

pub use attributes::{AttributeDef, AttributeKind, AttributeValue};
pub use store::GuildTree;
pub use types::{Guild, NodeRelation};
