//! Specialized collection types

pub use slotmap::{SlotMap, SecondaryMap};

slotmap::new_key_type! {
    /// Stable handle for a member owned by a host-side store
    pub struct MemberKey;
}

/// Handle-based map using slot map for stable member references
pub type MemberMap<T> = SlotMap<MemberKey, T>;
