//! Host-side member storage
//!
//! A reference collaborator for the instancing core: it owns member state,
//! answers [`MemberSource`](crate::instancing::MemberSource) queries, and
//! forwards lifecycle notifications produced by each member's tracker.

pub mod members;

pub use members::{MemberChanges, MemberState, SceneMembers};
