//! Deferred Removal Compactor
//!
//! Applies every removal recorded since the last tick in a single forward
//! pass over the live range. Survivors shift down to fill gaps in every
//! component buffer, their relative order is preserved, and the ordered
//! live list invariant holds again afterwards. Removing members one at a
//! time would make whole-scene teardown O(n²); batching keeps it O(n).

use super::buffer_store::BufferStore;
use super::error::InstancingResult;
use super::registry::{MemberId, SlotRegistry};

/// Statistics for compaction passes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    /// Passes that removed at least one member
    pub passes: u64,
    /// Members removed across all passes
    pub removed: u64,
    /// Members moved to a lower slot across all passes
    pub relocated: u64,
}

/// Outcome of one compaction pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionReport<M> {
    /// Members dropped by this pass, in former slot order
    pub removed: Vec<M>,
    /// Number of survivors copied to a lower slot
    pub relocated: usize,
    /// Live member count after the pass
    pub members: usize,
}

impl<M> CompactionReport<M> {
    fn unchanged(members: usize) -> Self {
        Self { removed: Vec::new(), relocated: 0, members }
    }
}

/// Batched gap removal for the slot registry and buffer store
#[derive(Debug, Default)]
pub struct RemovalCompactor {
    stats: CompactionStats,
    verbose: bool,
}

impl RemovalCompactor {
    /// Create a compactor; `verbose` logs each removal and move at info level
    pub fn new(verbose: bool) -> Self {
        Self {
            stats: CompactionStats::default(),
            verbose,
        }
    }
    
    /// Run one pass if any removal is pending
    ///
    /// With no pending removals this is a no-op, so running it twice in a
    /// row leaves state unchanged. Without a buffer store only the
    /// bookkeeping is compacted.
    pub fn run<M: MemberId>(
        &mut self,
        registry: &mut SlotRegistry<M>,
        mut store: Option<&mut BufferStore>,
    ) -> InstancingResult<CompactionReport<M>> {
        let members = registry.ordered.len();
        if registry.pending_removal.is_empty() {
            return Ok(CompactionReport::unchanged(members));
        }
        
        let level = if self.verbose { log::Level::Info } else { log::Level::Debug };
        let mut pending = std::mem::take(&mut registry.pending_removal).into_iter().peekable();
        let mut removed = Vec::with_capacity(pending.len());
        let mut relocated = 0;
        
        for source in 0..members {
            let dest = source - removed.len();
            let member = registry.ordered[source];
            
            if pending.next_if_eq(&source).is_some() {
                log::log!(level, "Removing member {:?} at slot {}", member, source);
                registry.slots.remove(&member);
                registry.needs_refresh.remove(&member);
                removed.push(member);
                continue;
            }
            
            if dest != source {
                registry.ordered[dest] = member;
                registry.slots.insert(member, dest);
                if let Some(store) = store.as_deref_mut() {
                    store.copy_slot(source, dest)?;
                }
                relocated += 1;
                log::log!(level, "Moved member {:?} from slot {} to {}", member, source, dest);
            }
        }
        
        let remaining = members - removed.len();
        registry.ordered.truncate(remaining);
        if let Some(store) = store {
            store.set_active_count(remaining);
        }
        
        self.stats.passes += 1;
        self.stats.removed += removed.len() as u64;
        self.stats.relocated += relocated as u64;
        log::debug!("Compaction removed {} members, relocated {}, {} remain", removed.len(), relocated, remaining);
        
        Ok(CompactionReport { removed, relocated, members: remaining })
    }
    
    /// Cumulative statistics
    pub fn stats(&self) -> CompactionStats {
        self.stats
    }
}
