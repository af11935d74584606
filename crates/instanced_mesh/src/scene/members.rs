//! Slotmap-backed member store

use bitflags::bitflags;

use crate::foundation::collections::{MemberKey, MemberMap};
use crate::foundation::math::{Color, Mat4, Transform};
use crate::instancing::{InstancedMesh, MemberEvent, MemberSource, MemberTracker};

bitflags! {
    /// State that changed since the last sync
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MemberChanges: u8 {
        /// Local transform changed
        const TRANSFORM = 1 << 0;
        /// Visibility changed
        const VISIBILITY = 1 << 1;
        /// Override colors changed
        const COLORS = 1 << 2;
        /// Parent world transform changed
        const PARENT = 1 << 3;
    }
}

/// Spatial and color state of one member
#[derive(Debug, Clone, PartialEq)]
pub struct MemberState {
    /// Transform relative to the parent
    pub transform: Transform,
    /// World transform of the member's parent
    pub parent_world: Mat4,
    /// Hidden members are not rendered
    pub visible: bool,
    /// Override colors indexed by material index
    pub colors: Vec<Color>,
}

impl Default for MemberState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            parent_world: Mat4::identity(),
            visible: true,
            colors: Vec::new(),
        }
    }
}

impl MemberState {
    /// Visible member at the given transform
    pub fn at(transform: Transform) -> Self {
        Self {
            transform,
            ..Self::default()
        }
    }
    
    /// Set override colors
    pub fn with_colors(mut self, colors: Vec<Color>) -> Self {
        self.colors = colors;
        self
    }
    
    /// Set the parent's world transform
    pub fn with_parent(mut self, parent_world: Mat4) -> Self {
        self.parent_world = parent_world;
        self
    }
}

#[derive(Debug)]
struct Entry {
    state: MemberState,
    tracker: MemberTracker<MemberKey>,
    changes: MemberChanges,
}

/// Member store that drives an [`InstancedMesh`]
#[derive(Debug, Default)]
pub struct SceneMembers {
    members: MemberMap<Entry>,
    outbox: Vec<MemberEvent<MemberKey>>,
}

impl SceneMembers {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Add a member; it is announced on the next sync if visible
    pub fn spawn(&mut self, state: MemberState) -> MemberKey {
        self.members.insert_with_key(|key| Entry {
            state,
            tracker: MemberTracker::new(key),
            changes: MemberChanges::all(),
        })
    }
    
    /// Remove a member; returns false if it did not exist
    pub fn despawn(&mut self, key: MemberKey) -> bool {
        match self.members.remove(key) {
            Some(mut entry) => {
                if let Some(event) = entry.tracker.detach() {
                    self.outbox.push(event);
                }
                true
            }
            None => false,
        }
    }
    
    fn update(&mut self, key: MemberKey, change: MemberChanges, apply: impl FnOnce(&mut MemberState)) -> bool {
        match self.members.get_mut(key) {
            Some(entry) => {
                apply(&mut entry.state);
                entry.changes |= change;
                true
            }
            None => false,
        }
    }
    
    /// Replace a member's local transform
    pub fn set_transform(&mut self, key: MemberKey, transform: Transform) -> bool {
        self.update(key, MemberChanges::TRANSFORM, |state| state.transform = transform)
    }
    
    /// Show or hide a member
    pub fn set_visible(&mut self, key: MemberKey, visible: bool) -> bool {
        self.update(key, MemberChanges::VISIBILITY, |state| state.visible = visible)
    }
    
    /// Replace a member's override colors
    pub fn set_colors(&mut self, key: MemberKey, colors: Vec<Color>) -> bool {
        self.update(key, MemberChanges::COLORS, |state| state.colors = colors)
    }
    
    /// Replace the world transform of a member's parent
    pub fn set_parent_world(&mut self, key: MemberKey, parent_world: Mat4) -> bool {
        self.update(key, MemberChanges::PARENT, |state| state.parent_world = parent_world)
    }
    
    /// Current state of a member
    pub fn state(&self, key: MemberKey) -> Option<&MemberState> {
        self.members.get(key).map(|entry| &entry.state)
    }
    
    /// Pending changes of a member
    pub fn changes(&self, key: MemberKey) -> MemberChanges {
        self.members.get(key).map_or(MemberChanges::empty(), |entry| entry.changes)
    }
    
    /// Number of stored members, visible or not
    pub fn len(&self) -> usize {
        self.members.len()
    }
    
    /// Whether no member is stored
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
    
    /// Forward every pending change to the mesh as notifications
    ///
    /// Returns the number of notifications sent.
    pub fn sync(&mut self, mesh: &mut InstancedMesh<MemberKey>) -> usize {
        let mut sent = self.outbox.len();
        for event in self.outbox.drain(..) {
            mesh.dispatch(event);
        }
        
        for (_, entry) in self.members.iter_mut() {
            if entry.changes.is_empty() {
                continue;
            }
            
            let matrix = entry.state.transform.to_matrix();
            let event = entry.tracker.observe(entry.state.visible, &matrix).or_else(|| {
                let restyled = entry.changes.intersects(MemberChanges::COLORS | MemberChanges::PARENT);
                (restyled && entry.tracker.is_announced()).then(|| MemberEvent::Modified(entry.tracker.member()))
            });
            entry.changes = MemberChanges::empty();
            
            if let Some(event) = event {
                mesh.dispatch(event);
                sent += 1;
            }
        }
        sent
    }
}

impl MemberSource<MemberKey> for SceneMembers {
    fn local_transform(&self, member: MemberKey) -> Option<Mat4> {
        self.state(member).map(|state| state.transform.to_matrix())
    }
    
    fn world_transform(&self, member: MemberKey) -> Option<Mat4> {
        self.state(member).map(|state| state.parent_world * state.transform.to_matrix())
    }
    
    fn override_colors(&self, member: MemberKey) -> Option<&[Color]> {
        self.state(member)
            .filter(|state| !state.colors.is_empty())
            .map(|state| state.colors.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::instancing::{Geometry, InstancedMeshConfig, MaterialDesc, MeshDescription, MeshPart};
    
    fn mesh() -> InstancedMesh<MemberKey> {
        let mut mesh = InstancedMesh::new(InstancedMeshConfig::new(8)).unwrap();
        let geometry = Geometry::new(vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], vec![0, 1, 2]);
        mesh.build(&MeshDescription::new(
            "tri",
            vec![MeshPart::new("tri", geometry, vec![MaterialDesc::new("plain", None)])],
        ));
        mesh
    }
    
    #[test]
    fn test_spawn_announces_on_sync() {
        let mut scene = SceneMembers::new();
        let mut mesh = mesh();
        let key = scene.spawn(MemberState::at(Transform::from_position(Vec3::new(1.0, 0.0, 0.0))));
        
        assert_eq!(scene.sync(&mut mesh), 1);
        assert_eq!(mesh.find_slot(key), Ok(0));
        assert_eq!(scene.sync(&mut mesh), 0);
    }
    
    #[test]
    fn test_hidden_spawn_waits_for_visibility() {
        let mut scene = SceneMembers::new();
        let mut mesh = mesh();
        let key = scene.spawn(MemberState { visible: false, ..MemberState::default() });
        
        scene.sync(&mut mesh);
        assert!(mesh.find_slot(key).is_err());
        
        scene.set_visible(key, true);
        scene.sync(&mut mesh);
        assert_eq!(mesh.find_slot(key), Ok(0));
    }
    
    #[test]
    fn test_color_change_is_modification() {
        let mut scene = SceneMembers::new();
        let mut mesh = InstancedMesh::new(
            InstancedMeshConfig::new(4).with_update_mode(crate::instancing::UpdateMode::Manual),
        ).unwrap();
        let key = scene.spawn(MemberState::default());
        scene.sync(&mut mesh);
        
        scene.set_colors(key, vec![Color::new(1.0, 0.0, 0.0)]);
        assert!(scene.changes(key).contains(MemberChanges::COLORS));
        assert_eq!(scene.sync(&mut mesh), 1);
        assert!(scene.changes(key).is_empty());
        assert_eq!(scene.override_colors(key), Some(&[Color::new(1.0, 0.0, 0.0)][..]));
    }
    
    #[test]
    fn test_despawn_sends_removal() {
        let mut scene = SceneMembers::new();
        let mut mesh = mesh();
        let first = scene.spawn(MemberState::default());
        let second = scene.spawn(MemberState::default());
        scene.sync(&mut mesh);
        
        assert!(scene.despawn(first));
        assert!(!scene.despawn(first));
        assert_eq!(scene.sync(&mut mesh), 1);
        
        mesh.tick();
        assert_eq!(mesh.members(), 1);
        assert_eq!(mesh.find_slot(second), Ok(0));
        assert_eq!(scene.len(), 1);
    }
    
    #[test]
    fn test_world_transform_includes_parent() {
        let mut scene = SceneMembers::new();
        let parent = Mat4::new_translation(&Vec3::new(0.0, 10.0, 0.0));
        let key = scene.spawn(MemberState::at(Transform::from_position(Vec3::new(1.0, 0.0, 0.0))).with_parent(parent));
        
        let world = scene.world_transform(key).unwrap();
        assert_eq!(world, Mat4::new_translation(&Vec3::new(1.0, 10.0, 0.0)));
    }
}
