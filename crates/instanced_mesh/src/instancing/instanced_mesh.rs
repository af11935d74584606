//! Instanced Mesh aggregate
//!
//! Owns the slot registry, compactor, buffer store and frame resolver for
//! one shared geometry, and is the single entry point collaborators talk to.
//!
//! # Frame Sequence
//!
//! ```text
//! notify_added / notify_modified / notify_removed   (any time, any order)
//!         ↓
//! tick()            - apply batched removals once
//!         ↓
//! resolve_frame()   - pre-render, after scene transforms are final
//!         ↓
//! renderer reads store(): transform_bytes / color_bytes / active_count
//! ```
//!
//! Notifications that arrive before [`InstancedMesh::build`] has created the
//! buffer store are queued and replayed exactly once, in order, right after.
//! No operation here unwinds: failures are reported through
//! [`Diagnostics`] and the offending notification is dropped.

use log::Level;

use crate::config::{Config, ConfigError};
use crate::foundation::math::{Color, Mat4};
use super::buffer_store::{BufferStore, ResizeOutcome};
use super::compactor::{CompactionReport, RemovalCompactor};
use super::config::InstancedMeshConfig;
use super::decompose::{decompose, DecomposeOptions, MeshDescription};
use super::error::{Diagnostics, InstancingError, InstancingResult};
use super::events::{MemberEvent, ReadinessGate};
use super::member::MemberSource;
use super::registry::{MemberId, SlotAssignment, SlotRegistry};
use super::resolver::{FrameResolver, ResolveStats};

/// Dense instance buffer mirroring a changing set of members
#[derive(Debug)]
pub struct InstancedMesh<M: MemberId> {
    config: InstancedMeshConfig,
    material_filter: Option<Vec<usize>>,
    registry: SlotRegistry<M>,
    compactor: RemovalCompactor,
    resolver: FrameResolver,
    store: Option<BufferStore>,
    gate: ReadinessGate<M>,
    diagnostics: Diagnostics,
}

impl<M: MemberId> InstancedMesh<M> {
    /// Create an aggregate; buffers are allocated later by [`Self::build`]
    pub fn new(config: InstancedMeshConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        
        log::info!(
            "Created InstancedMesh (capacity {}, {:?} frame, {:?} updates, decompose {})",
            config.capacity, config.frame_of_reference, config.update_mode, config.decompose
        );
        
        Ok(Self {
            registry: SlotRegistry::new(config.capacity),
            compactor: RemovalCompactor::new(config.debug),
            resolver: FrameResolver::new(config.frame_of_reference, config.update_mode),
            store: None,
            gate: ReadinessGate::new(),
            diagnostics: Diagnostics::new(),
            material_filter: None,
            config,
        })
    }
    
    /// Restrict decomposition to the given material indices
    pub fn with_material_filter(mut self, filter: Vec<usize>) -> Self {
        self.material_filter = Some(filter);
        self
    }
    
    fn bookkeeping_level(&self) -> Level {
        if self.config.debug { Level::Info } else { Level::Debug }
    }
    
    /// Create the buffer store from the source geometry
    ///
    /// The first call opens the readiness gate and replays queued
    /// notifications. A later call rebuilds the components and marks every
    /// live member for refresh.
    pub fn build(&mut self, mesh: &MeshDescription) {
        let options = DecomposeOptions {
            decompose: self.config.decompose,
            drain_color: self.config.drain_color,
            material_filter: self.material_filter.clone(),
        };
        let decomposition = decompose(mesh, &options);
        for warning in decomposition.warnings {
            self.diagnostics.report(warning);
        }
        
        let mut store = BufferStore::new(
            decomposition.components,
            self.registry.capacity(),
            self.config.instance_colors,
            self.config.culling,
        );
        store.set_active_count(self.registry.members());
        
        if self.store.replace(store).is_some() {
            log::info!("Rebuilt buffers for '{}' with {} live members", mesh.name, self.registry.members());
            let live: Vec<M> = self.registry.ordered_members().to_vec();
            for member in live {
                let _ = self.registry.mark_modified(member);
            }
        }
        
        let queued = self.gate.open();
        if !queued.is_empty() {
            log::info!("Buffers for '{}' ready, replaying {} queued notifications", mesh.name, queued.len());
        }
        for event in queued {
            self.apply(event);
        }
    }
    
    /// Whether the buffer store exists
    pub fn is_ready(&self) -> bool {
        self.store.is_some()
    }
    
    /// Report a member that should be rendered
    pub fn notify_added(&mut self, member: M) {
        self.dispatch(MemberEvent::Added(member));
    }
    
    /// Report a change to a member's transform or colors
    pub fn notify_modified(&mut self, member: M) {
        self.dispatch(MemberEvent::Modified(member));
    }
    
    /// Report a member that should no longer be rendered
    pub fn notify_removed(&mut self, member: M) {
        self.dispatch(MemberEvent::Removed(member));
    }
    
    /// Single entry point for lifecycle notifications
    pub fn dispatch(&mut self, event: MemberEvent<M>) {
        if let Some(event) = self.gate.admit(event) {
            self.apply(event);
        }
    }
    
    fn apply(&mut self, event: MemberEvent<M>) {
        let level = self.bookkeeping_level();
        
        let result = match event {
            MemberEvent::Added(member) => self.registry.add(member).map(|assignment| {
                if let Some(store) = &mut self.store {
                    store.set_active_count(self.registry.members());
                }
                match assignment {
                    SlotAssignment::Appended(slot) => log::log!(level, "Added member {:?} at slot {}", member, slot),
                    SlotAssignment::Reused(slot) => log::log!(level, "Added member {:?} into freed slot {}", member, slot),
                    SlotAssignment::Restored(slot) => log::log!(level, "Restored member {:?} at slot {}", member, slot),
                }
            }),
            MemberEvent::Modified(member) => self.registry.mark_modified(member).map(|slot| {
                log::log!(level, "Modifying member {:?} at slot {}", member, slot);
            }),
            MemberEvent::Removed(member) => self.registry.mark_removed(member).map(|slot| {
                log::log!(level, "Member {:?} at slot {} queued for removal", member, slot);
            }),
        };
        
        if let Err(error) = result {
            self.diagnostics.report(error);
        }
    }
    
    /// Apply pending removals; the single compaction point per tick
    pub fn tick(&mut self) -> CompactionReport<M> {
        match self.compactor.run(&mut self.registry, self.store.as_mut()) {
            Ok(report) => report,
            Err(error) => {
                self.diagnostics.report(error);
                CompactionReport {
                    removed: Vec::new(),
                    relocated: 0,
                    members: self.registry.members(),
                }
            }
        }
    }
    
    /// Recompute slot data before rendering
    ///
    /// Removals still pending are compacted first so slot indices are stable.
    /// `parent_world` is only read in world frame-of-reference mode.
    pub fn resolve_frame<S>(&mut self, source: &S, parent_world: &Mat4) -> ResolveStats
    where
        S: MemberSource<M> + ?Sized,
    {
        if self.store.is_none() {
            return ResolveStats::default();
        }
        if self.registry.has_pending_removals() {
            self.tick();
        }
        
        let Some(store) = self.store.as_mut() else {
            return ResolveStats::default();
        };
        match self.resolver.resolve(&mut self.registry, store, source, parent_world) {
            Ok(stats) => stats,
            Err(error) => {
                self.diagnostics.report(error);
                ResolveStats::default()
            }
        }
    }
    
    /// Change capacity, copying live entries into new storage
    ///
    /// Shrinking below the member count drops the tail members; that data
    /// loss is reported as [`InstancingError::CapacityTruncated`].
    pub fn resize(&mut self, capacity: usize) -> ResizeOutcome {
        let members = self.registry.members();
        if capacity == 0 {
            self.diagnostics.report(InstancingError::InvalidCapacity { requested: capacity });
            return ResizeOutcome { retained: members, dropped: 0 };
        }
        
        let outcome = match &mut self.store {
            Some(store) => store.resize(capacity, members),
            None => {
                let retained = members.min(capacity);
                ResizeOutcome { retained, dropped: members - retained }
            }
        };
        
        let dropped = self.registry.set_capacity(capacity);
        debug_assert_eq!(dropped.len(), outcome.dropped);
        self.config.capacity = capacity;
        
        if outcome.dropped > 0 {
            self.diagnostics.report(InstancingError::CapacityTruncated {
                capacity,
                dropped: outcome.dropped,
            });
        }
        outcome
    }
    
    /// Slot owned by a member
    pub fn find_slot(&self, member: M) -> InstancingResult<usize> {
        self.registry.find_slot(member)
    }
    
    /// Read back a slot's transform for one component
    pub fn slot_transform(&self, component: usize, slot: usize) -> InstancingResult<Mat4> {
        self.ready_store()?.read_transform(component, slot)
    }
    
    /// Read back a slot's color for one component
    pub fn slot_color(&self, component: usize, slot: usize) -> InstancingResult<Option<Color>> {
        self.ready_store()?.read_color(component, slot)
    }
    
    fn ready_store(&self) -> InstancingResult<&BufferStore> {
        self.store.as_ref().ok_or(InstancingError::NotReady)
    }
    
    /// Buffer store, once built
    pub fn store(&self) -> Option<&BufferStore> {
        self.store.as_ref()
    }
    
    /// Mutable buffer store, e.g. to clear upload flags after a GPU copy
    pub fn store_mut(&mut self) -> Option<&mut BufferStore> {
        self.store.as_mut()
    }
    
    /// Slot bookkeeping
    pub fn registry(&self) -> &SlotRegistry<M> {
        &self.registry
    }
    
    /// Occupied slots, including ones pending removal
    pub fn members(&self) -> usize {
        self.registry.members()
    }
    
    /// Current capacity
    pub fn capacity(&self) -> usize {
        self.registry.capacity()
    }
    
    /// Active configuration
    pub fn config(&self) -> &InstancedMeshConfig {
        &self.config
    }
    
    /// Notifications waiting for the buffer store
    pub fn queued_notifications(&self) -> usize {
        self.gate.queued_len()
    }
    
    /// Compaction counters
    pub fn compactor(&self) -> &RemovalCompactor {
        &self.compactor
    }
    
    /// Reported conditions not yet drained
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
    
    /// Take every reported condition
    pub fn drain_diagnostics(&mut self) -> Vec<InstancingError> {
        self.diagnostics.drain()
    }
}
