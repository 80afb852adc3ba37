//! Tiered permission model.
//!
//! Capabilities are granted relative to where an assignment is seated:
//! - Sub: the seat and its descendants
//! - OneUp: the seat's parent subtree
//! - Guild: anywhere in the same tree

pub mod engine;
pub mod resolver;
pub mod tiers;

pub use engine::Authorizer;
pub use resolver::{classify, is_authorized};
pub use tiers::{Capability, Tier, TierPermissions};
