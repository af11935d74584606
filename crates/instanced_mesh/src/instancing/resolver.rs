//! Frame Resolver
//!
//! Runs once before each render pass, after member transforms for the frame
//! are final and after compaction, so slot indices are stable. For every
//! member that needs an update it writes, per component:
//!
//! ```text
//! slot transform = frame_of_reference(member) * component.offset
//! slot color     = member override[material_index] | component.original_color | untouched
//! ```
//!
//! In world mode the member's world matrix is first brought into aggregate
//! space with the inverse of the parent's world matrix, refreshed every frame
//! because the parent may itself be animated.

use crate::foundation::math::Mat4;
use super::buffer_store::BufferStore;
use super::config::{FrameOfReference, UpdateMode};
use super::error::InstancingResult;
use super::member::MemberSource;
use super::registry::{MemberId, SlotRegistry};

/// Counters for one resolve pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveStats {
    /// Members whose slots were rewritten
    pub members_resolved: usize,
    /// Transform entries written across all components
    pub transforms_written: usize,
    /// Color entries written across all components
    pub colors_written: usize,
    /// Members the source could not provide a transform for
    pub members_missing: usize,
}

/// Per-frame slot transform and color computation
#[derive(Debug)]
pub struct FrameResolver {
    frame_of_reference: FrameOfReference,
    update_mode: UpdateMode,
    /// Cached inverse of the parent's world matrix
    parent_inverse: Mat4,
    /// Working matrix; never aliases stored entries
    scratch: Mat4,
}

impl FrameResolver {
    /// Create a resolver for the given modes
    pub fn new(frame_of_reference: FrameOfReference, update_mode: UpdateMode) -> Self {
        Self {
            frame_of_reference,
            update_mode,
            parent_inverse: Mat4::identity(),
            scratch: Mat4::identity(),
        }
    }
    
    /// Active update mode
    pub fn update_mode(&self) -> UpdateMode {
        self.update_mode
    }
    
    /// Active frame of reference
    pub fn frame_of_reference(&self) -> FrameOfReference {
        self.frame_of_reference
    }
    
    /// Cache the inverse of the parent's world matrix
    ///
    /// A singular parent matrix keeps the previous inverse and returns false.
    pub fn refresh_parent_inverse(&mut self, parent_world: &Mat4) -> bool {
        match parent_world.try_inverse() {
            Some(inverse) => {
                self.parent_inverse = inverse;
                true
            }
            None => {
                log::warn!("Parent world transform is singular; keeping previous inverse");
                false
            }
        }
    }
    
    /// Cached parent inverse
    pub fn parent_inverse(&self) -> &Mat4 {
        &self.parent_inverse
    }
    
    /// Recompute slots for this frame
    pub fn resolve<M, S>(
        &mut self,
        registry: &mut SlotRegistry<M>,
        store: &mut BufferStore,
        source: &S,
        parent_world: &Mat4,
    ) -> InstancingResult<ResolveStats>
    where
        M: MemberId,
        S: MemberSource<M> + ?Sized,
    {
        if self.frame_of_reference == FrameOfReference::World {
            self.refresh_parent_inverse(parent_world);
        }
        
        let mut stats = ResolveStats::default();
        let refresh = registry.take_needs_refresh();
        
        match self.update_mode {
            UpdateMode::Auto => {
                for (slot, &member) in registry.ordered_members().iter().enumerate() {
                    if !registry.is_pending_removal(slot) {
                        self.resolve_member(member, slot, store, source, &mut stats)?;
                    }
                }
            }
            UpdateMode::Manual => {
                for member in refresh {
                    let Some(slot) = registry.slot_of(member) else {
                        continue;
                    };
                    if registry.is_pending_removal(slot) {
                        continue;
                    }
                    if !self.resolve_member(member, slot, store, source, &mut stats)? {
                        // Retried next frame until the source can supply it
                        registry.needs_refresh.insert(member);
                    }
                }
            }
        }
        
        store.set_active_count(registry.members());
        Ok(stats)
    }
    
    fn member_transform<M, S>(&self, member: M, source: &S) -> Option<Mat4>
    where
        M: MemberId,
        S: MemberSource<M> + ?Sized,
    {
        match self.frame_of_reference {
            FrameOfReference::Local => source.local_transform(member),
            FrameOfReference::World => source
                .world_transform(member)
                .map(|world| self.parent_inverse * world),
        }
    }
    
    fn resolve_member<M, S>(
        &mut self,
        member: M,
        slot: usize,
        store: &mut BufferStore,
        source: &S,
        stats: &mut ResolveStats,
    ) -> InstancingResult<bool>
    where
        M: MemberId,
        S: MemberSource<M> + ?Sized,
    {
        let Some(base) = self.member_transform(member, source) else {
            log::warn!("No transform available for member {:?} at slot {}", member, slot);
            stats.members_missing += 1;
            return Ok(false);
        };
        let overrides = source.override_colors(member).unwrap_or(&[]);
        
        for index in 0..store.component_count() {
            let component = store.buffers()[index].component();
            let color = component
                .material_index
                .and_then(|material| overrides.get(material).copied())
                .or(component.original_color);
            
            self.scratch = base * component.offset;
            store.write(index, slot, &self.scratch, color.as_ref())?;
            
            stats.transforms_written += 1;
            if color.is_some() && store.buffers()[index].has_colors() {
                stats.colors_written += 1;
            }
        }
        
        stats.members_resolved += 1;
        Ok(true)
    }
}
