//! Slot Registry
//!
//! Pure bookkeeping for the instance buffer: member ↔ slot mapping, the set
//! of slots pending removal, and the ordered live list that compaction uses.
//! The registry knows nothing about rendering.
//!
//! # Invariants
//!
//! - `ordered.len()` is the member count, and `ordered[i]` owns slot `i`
//! - `slots[ordered[i]] == i` for every live position
//! - a pending-removal slot still belongs to its old member until it is
//!   compacted away or reused by an add
//!
//! Removal is lazy: [`SlotRegistry::mark_removed`] only records the slot, and
//! the [`RemovalCompactor`](super::RemovalCompactor) closes every gap in one
//! pass per tick.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use super::error::{InstancingError, InstancingResult};

/// Identity of an externally owned member
///
/// Any small copyable key works: entity ids, slotmap keys, plain integers.
pub trait MemberId: Copy + Eq + Hash + Debug {}

impl<T: Copy + Eq + Hash + Debug> MemberId for T {}

/// How an add obtained its slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAssignment {
    /// Appended at the end of the live range
    Appended(usize),
    /// Took over a slot pending removal
    Reused(usize),
    /// Member was pending removal itself; the removal was cancelled
    Restored(usize),
}

impl SlotAssignment {
    /// Slot index the member now owns
    pub fn slot(self) -> usize {
        match self {
            Self::Appended(slot) | Self::Reused(slot) | Self::Restored(slot) => slot,
        }
    }
}

/// Member ↔ slot bookkeeping with deferred removal
#[derive(Debug)]
pub struct SlotRegistry<M: MemberId> {
    /// Soft ceiling on live slots
    pub(super) capacity: usize,
    /// Members in slot order
    pub(super) ordered: Vec<M>,
    /// Indexed lookup from member to slot
    pub(super) slots: HashMap<M, usize>,
    /// Slots whose member was removed but not yet compacted
    pub(super) pending_removal: BTreeSet<usize>,
    /// Members whose transform must be recomputed next frame
    pub(super) needs_refresh: HashSet<M>,
}

impl<M: MemberId> SlotRegistry<M> {
    /// Create an empty registry
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ordered: Vec::with_capacity(capacity),
            slots: HashMap::with_capacity(capacity),
            pending_removal: BTreeSet::new(),
            needs_refresh: HashSet::new(),
        }
    }
    
    /// Assign a slot to a member
    ///
    /// Pending-removal slots are reused first, smallest index first, so the
    /// live range stays dense without forcing a compaction. Capacity is
    /// checked before anything is mutated.
    pub fn add(&mut self, member: M) -> InstancingResult<SlotAssignment> {
        if let Some(&slot) = self.slots.get(&member) {
            if self.pending_removal.remove(&slot) {
                self.needs_refresh.insert(member);
                log::debug!("Member {:?} re-added before compaction, keeping slot {}", member, slot);
                return Ok(SlotAssignment::Restored(slot));
            }
            
            return Err(InstancingError::DuplicateMember {
                member: format!("{:?}", member),
                slot,
            });
        }
        
        if let Some(slot) = self.pending_removal.pop_first() {
            let previous = self.ordered[slot];
            self.slots.remove(&previous);
            self.needs_refresh.remove(&previous);
            
            self.ordered[slot] = member;
            self.slots.insert(member, slot);
            self.needs_refresh.insert(member);
            log::debug!("Member {:?} reusing slot {} from removed member {:?}", member, slot, previous);
            return Ok(SlotAssignment::Reused(slot));
        }
        
        if self.ordered.len() >= self.capacity {
            return Err(InstancingError::CapacityExceeded {
                member: format!("{:?}", member),
                capacity: self.capacity,
            });
        }
        
        let slot = self.ordered.len();
        self.ordered.push(member);
        self.slots.insert(member, slot);
        self.needs_refresh.insert(member);
        Ok(SlotAssignment::Appended(slot))
    }
    
    /// Queue a member's slot for removal at the next compaction
    ///
    /// Removing a member that is already pending is a no-op.
    pub fn mark_removed(&mut self, member: M) -> InstancingResult<usize> {
        let slot = self.find_slot_for(member, "remove")?;
        
        if !self.pending_removal.insert(slot) {
            log::debug!("Member {:?} already pending removal at slot {}", member, slot);
        }
        self.needs_refresh.remove(&member);
        Ok(slot)
    }
    
    /// Flag a member for transform refresh; duplicate marks collapse
    pub fn mark_modified(&mut self, member: M) -> InstancingResult<usize> {
        let slot = self.find_slot_for(member, "modify")?;
        self.needs_refresh.insert(member);
        Ok(slot)
    }
    
    /// Slot owned by a member
    ///
    /// A miss means a lifecycle notification arrived out of order, so it is
    /// an error rather than `None`.
    pub fn find_slot(&self, member: M) -> InstancingResult<usize> {
        self.find_slot_for(member, "lookup")
    }
    
    fn find_slot_for(&self, member: M, operation: &'static str) -> InstancingResult<usize> {
        self.slots.get(&member).copied().ok_or_else(|| InstancingError::UnknownMember {
            member: format!("{:?}", member),
            operation,
        })
    }
    
    /// Slot owned by a member, without treating a miss as an error
    pub fn slot_of(&self, member: M) -> Option<usize> {
        self.slots.get(&member).copied()
    }
    
    /// Member occupying a slot
    pub fn member_at(&self, slot: usize) -> Option<M> {
        self.ordered.get(slot).copied()
    }
    
    /// Members in slot order, including ones pending removal
    pub fn ordered_members(&self) -> &[M] {
        &self.ordered
    }
    
    /// Number of occupied slots, including ones pending removal
    pub fn members(&self) -> usize {
        self.ordered.len()
    }
    
    /// Configured ceiling on live slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    
    /// Whether a slot is waiting for compaction
    pub fn is_pending_removal(&self, slot: usize) -> bool {
        self.pending_removal.contains(&slot)
    }
    
    /// Pending-removal slots in ascending order
    pub fn pending_removals(&self) -> impl Iterator<Item = usize> + '_ {
        self.pending_removal.iter().copied()
    }
    
    /// Whether any removal waits for compaction
    pub fn has_pending_removals(&self) -> bool {
        !self.pending_removal.is_empty()
    }
    
    /// Whether a member is flagged for refresh
    pub fn needs_refresh(&self, member: M) -> bool {
        self.needs_refresh.contains(&member)
    }
    
    /// Take the refresh working set, leaving it empty
    pub fn take_needs_refresh(&mut self) -> HashSet<M> {
        std::mem::take(&mut self.needs_refresh)
    }
    
    /// Change the capacity, dropping members beyond it
    ///
    /// Returns the members that no longer fit, in slot order.
    pub fn set_capacity(&mut self, capacity: usize) -> Vec<M> {
        self.capacity = capacity;
        if self.ordered.len() <= capacity {
            return Vec::new();
        }
        
        let dropped = self.ordered.split_off(capacity);
        for member in &dropped {
            self.slots.remove(member);
            self.needs_refresh.remove(member);
        }
        self.pending_removal.retain(|&slot| slot < capacity);
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    fn registry_with(capacity: usize, members: &[u32]) -> SlotRegistry<u32> {
        let mut registry = SlotRegistry::new(capacity);
        for &member in members {
            registry.add(member).expect("add within capacity");
        }
        registry
    }
    
    #[test]
    fn test_append_assigns_sequential_slots() {
        let registry = registry_with(4, &[10, 20, 30]);
        assert_eq!(registry.members(), 3);
        assert_eq!(registry.find_slot(10), Ok(0));
        assert_eq!(registry.find_slot(30), Ok(2));
        assert_eq!(registry.ordered_members(), &[10, 20, 30]);
        assert!(registry.needs_refresh(20));
    }
    
    #[test]
    fn test_capacity_exceeded_leaves_state_untouched() {
        let mut registry = registry_with(2, &[1, 2]);
        let result = registry.add(3);
        
        assert!(matches!(result, Err(InstancingError::CapacityExceeded { capacity: 2, .. })));
        assert_eq!(registry.members(), 2);
        assert_eq!(registry.slot_of(3), None);
        assert!(!registry.needs_refresh(3));
    }
    
    #[test]
    fn test_remove_is_deferred() {
        let mut registry = registry_with(4, &[1, 2, 3]);
        assert_eq!(registry.mark_removed(2), Ok(1));
        
        assert_eq!(registry.members(), 3);
        assert_eq!(registry.find_slot(2), Ok(1));
        assert!(registry.is_pending_removal(1));
    }
    
    #[test]
    fn test_double_remove_is_noop() {
        let mut registry = registry_with(4, &[1, 2]);
        registry.mark_removed(1).unwrap();
        registry.mark_removed(1).unwrap();
        assert_eq!(registry.pending_removals().collect::<Vec<_>>(), vec![0]);
    }
    
    #[test]
    fn test_add_reuses_smallest_pending_slot() {
        let mut registry = registry_with(3, &[1, 2, 3]);
        registry.mark_removed(3).unwrap();
        registry.mark_removed(2).unwrap();
        
        assert_eq!(registry.add(4), Ok(SlotAssignment::Reused(1)));
        assert_eq!(registry.ordered_members(), &[1, 4, 3]);
        assert_eq!(registry.slot_of(2), None);
        assert_eq!(registry.pending_removals().collect::<Vec<_>>(), vec![2]);
    }
    
    #[test]
    fn test_reuse_works_at_full_capacity() {
        let mut registry = registry_with(2, &[1, 2]);
        registry.mark_removed(1).unwrap();
        assert_eq!(registry.add(3), Ok(SlotAssignment::Reused(0)));
    }
    
    #[test]
    fn test_readd_cancels_pending_removal() {
        let mut registry = registry_with(4, &[1, 2]);
        registry.mark_removed(2).unwrap();
        
        assert_eq!(registry.add(2), Ok(SlotAssignment::Restored(1)));
        assert!(!registry.has_pending_removals());
        assert!(registry.needs_refresh(2));
    }
    
    #[test]
    fn test_duplicate_add_rejected() {
        let mut registry = registry_with(4, &[1]);
        assert_eq!(
            registry.add(1),
            Err(InstancingError::DuplicateMember { member: "1".into(), slot: 0 })
        );
        assert_eq!(registry.members(), 1);
    }
    
    #[test]
    fn test_unknown_member_reported() {
        let mut registry = registry_with(4, &[1]);
        assert!(matches!(registry.mark_modified(9), Err(InstancingError::UnknownMember { operation: "modify", .. })));
        assert!(matches!(registry.mark_removed(9), Err(InstancingError::UnknownMember { operation: "remove", .. })));
        assert!(registry.find_slot(9).is_err());
    }
    
    #[test]
    fn test_modified_marks_collapse() {
        let mut registry = registry_with(4, &[1, 2]);
        registry.take_needs_refresh();
        registry.mark_modified(2).unwrap();
        registry.mark_modified(2).unwrap();
        
        let refresh = registry.take_needs_refresh();
        assert_eq!(refresh.len(), 1);
        assert!(refresh.contains(&2));
        assert!(registry.take_needs_refresh().is_empty());
    }
    
    #[test]
    fn test_set_capacity_drops_tail() {
        let mut registry = registry_with(4, &[1, 2, 3, 4]);
        registry.mark_removed(4).unwrap();
        
        let dropped = registry.set_capacity(2);
        assert_eq!(dropped, vec![3, 4]);
        assert_eq!(registry.members(), 2);
        assert_eq!(registry.slot_of(3), None);
        assert!(!registry.has_pending_removals());
    }
}
