//! Membership directory: identity-to-seat assignments per organization.

pub mod directory;
pub mod types;

pub use directory::MembershipDirectory;
pub use types::Assignment;
