//! Buffer Store
//!
//! Owns the fixed-capacity backing arrays: one transform array per geometry
//! component, plus an optional color array. All components share slot
//! indices, so slot `i` of every array belongs to the same member.
//!
//! # Memory Layout
//!
//! ```text
//! component 0: [T0 T1 T2 .. T(members-1) | stale .. T(capacity-1)]
//!              [C0 C1 C2 .. C(members-1) | stale .. C(capacity-1)]   (optional)
//! component 1: [T0 T1 T2 .. ]
//! ```
//!
//! Entries past the active count keep stale data; the active count is the
//! draw cutoff, so they are never rendered.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{Color, Mat4};
use super::config::CullingSphere;
use super::decompose::Component;
use super::error::{InstancingError, InstancingResult};

/// Per-slot transform entry, column-major 4x4
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceTransform {
    /// Matrix columns
    pub columns: [[f32; 4]; 4],
}

impl InstanceTransform {
    /// Identity transform entry
    pub fn identity() -> Self {
        Self::from(Mat4::identity())
    }
    
    /// Convert back to a matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from(self.columns)
    }
}

impl From<Mat4> for InstanceTransform {
    fn from(matrix: Mat4) -> Self {
        Self { columns: matrix.into() }
    }
}

/// Per-slot RGB color entry
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceColor {
    /// Linear RGB
    pub rgb: [f32; 3],
}

impl InstanceColor {
    /// Multiplicative identity, leaves the material color unchanged
    pub const WHITE: Self = Self { rgb: [1.0, 1.0, 1.0] };
    
    /// Convert to a color vector
    pub fn to_color(&self) -> Color {
        Color::new(self.rgb[0], self.rgb[1], self.rgb[2])
    }
}

impl From<Color> for InstanceColor {
    fn from(color: Color) -> Self {
        Self { rgb: [color.x, color.y, color.z] }
    }
}

/// Backing arrays for one component
#[derive(Debug)]
pub struct ComponentBuffer {
    component: Component,
    transforms: Vec<InstanceTransform>,
    colors: Option<Vec<InstanceColor>>,
    active_count: usize,
    needs_upload: bool,
}

impl ComponentBuffer {
    fn new(component: Component, capacity: usize, with_colors: bool) -> Self {
        Self {
            component,
            transforms: vec![InstanceTransform::identity(); capacity],
            colors: with_colors.then(|| vec![InstanceColor::WHITE; capacity]),
            active_count: 0,
            needs_upload: true,
        }
    }
    
    /// Component this buffer renders
    pub fn component(&self) -> &Component {
        &self.component
    }
    
    /// Whether this component carries per-slot colors
    pub fn has_colors(&self) -> bool {
        self.colors.is_some()
    }
    
    /// Number of slots drawn
    pub fn active_count(&self) -> usize {
        self.active_count
    }
    
    fn copy_slot(&mut self, source: usize, dest: usize) {
        self.transforms[dest] = self.transforms[source];
        if let Some(colors) = &mut self.colors {
            colors[dest] = colors[source];
        }
    }
    
    fn resize(&mut self, capacity: usize, retained: usize) {
        let mut transforms = Vec::with_capacity(capacity);
        transforms.extend_from_slice(&self.transforms[..retained]);
        transforms.resize(capacity, InstanceTransform::identity());
        self.transforms = transforms;
        
        if let Some(old) = &self.colors {
            let mut colors = Vec::with_capacity(capacity);
            colors.extend_from_slice(&old[..retained]);
            colors.resize(capacity, InstanceColor::WHITE);
            self.colors = Some(colors);
        }
        
        self.active_count = self.active_count.min(retained);
        self.needs_upload = true;
    }
}

/// Result of a capacity change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeOutcome {
    /// Entries copied into the new storage
    pub retained: usize,
    /// Live entries that did not fit
    pub dropped: usize,
}

/// Fixed-capacity per-component instance storage
#[derive(Debug)]
pub struct BufferStore {
    buffers: Vec<ComponentBuffer>,
    capacity: usize,
    bounds: Option<CullingSphere>,
}

impl BufferStore {
    /// Allocate storage for every component
    pub fn new(
        components: Vec<Component>,
        capacity: usize,
        with_colors: bool,
        bounds: Option<CullingSphere>,
    ) -> Self {
        let buffers: Vec<_> = components
            .into_iter()
            .map(|component| ComponentBuffer::new(component, capacity, with_colors))
            .collect();
        
        log::info!(
            "Created BufferStore with {} components x {} slots (colors: {})",
            buffers.len(), capacity, with_colors
        );
        
        Self { buffers, capacity, bounds }
    }
    
    /// Slots per component
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    
    /// Number of components
    pub fn component_count(&self) -> usize {
        self.buffers.len()
    }
    
    /// Component buffers in order
    pub fn buffers(&self) -> &[ComponentBuffer] {
        &self.buffers
    }
    
    fn buffer(&self, component: usize) -> InstancingResult<&ComponentBuffer> {
        self.buffers.get(component).ok_or(InstancingError::ComponentOutOfRange {
            component,
            count: self.buffers.len(),
        })
    }
    
    fn check_slot(&self, slot: usize) -> InstancingResult<()> {
        if slot < self.capacity {
            Ok(())
        } else {
            Err(InstancingError::SlotOutOfRange { slot, capacity: self.capacity })
        }
    }
    
    /// Overwrite one slot of one component
    ///
    /// A color is ignored when the component has no color buffer; `None`
    /// leaves the stored color untouched.
    pub fn write(
        &mut self,
        component: usize,
        slot: usize,
        transform: &Mat4,
        color: Option<&Color>,
    ) -> InstancingResult<()> {
        self.check_slot(slot)?;
        let count = self.buffers.len();
        let buffer = self.buffers
            .get_mut(component)
            .ok_or(InstancingError::ComponentOutOfRange { component, count })?;
        
        buffer.transforms[slot] = InstanceTransform::from(*transform);
        if let (Some(colors), Some(color)) = (&mut buffer.colors, color) {
            colors[slot] = InstanceColor::from(*color);
        }
        buffer.needs_upload = true;
        Ok(())
    }
    
    /// Read back a slot's transform
    pub fn read_transform(&self, component: usize, slot: usize) -> InstancingResult<Mat4> {
        self.check_slot(slot)?;
        Ok(self.buffer(component)?.transforms[slot].to_matrix())
    }
    
    /// Read back a slot's color, `None` if the component has no colors
    pub fn read_color(&self, component: usize, slot: usize) -> InstancingResult<Option<Color>> {
        self.check_slot(slot)?;
        Ok(self.buffer(component)?
            .colors
            .as_ref()
            .map(|colors| colors[slot].to_color()))
    }
    
    /// Copy every component's entry from one slot to another
    pub fn copy_slot(&mut self, source: usize, dest: usize) -> InstancingResult<()> {
        self.check_slot(source)?;
        self.check_slot(dest)?;
        for buffer in &mut self.buffers {
            buffer.copy_slot(source, dest);
            buffer.needs_upload = true;
        }
        Ok(())
    }
    
    /// Set the draw cutoff on every component
    pub fn set_active_count(&mut self, count: usize) {
        let count = count.min(self.capacity);
        for buffer in &mut self.buffers {
            if buffer.active_count != count {
                buffer.active_count = count;
                buffer.needs_upload = true;
            }
        }
    }
    
    /// Current draw cutoff
    pub fn active_count(&self) -> usize {
        self.buffers.first().map_or(0, ComponentBuffer::active_count)
    }
    
    /// Reallocate every component to a new capacity
    ///
    /// Entries `[0, members)` are copied exactly. When the new capacity is
    /// smaller than `members`, the tail is dropped and reported in the
    /// outcome; the caller must clamp its own bookkeeping.
    pub fn resize(&mut self, capacity: usize, members: usize) -> ResizeOutcome {
        let retained = members.min(capacity);
        for buffer in &mut self.buffers {
            buffer.resize(capacity, retained);
        }
        
        log::info!("Resized BufferStore from {} to {} slots ({} retained)", self.capacity, capacity, retained);
        self.capacity = capacity;
        
        ResizeOutcome {
            retained,
            dropped: members - retained,
        }
    }
    
    /// Active transform entries of one component as raw bytes for upload
    pub fn transform_bytes(&self, component: usize) -> InstancingResult<&[u8]> {
        let buffer = self.buffer(component)?;
        Ok(bytemuck::cast_slice(&buffer.transforms[..buffer.active_count]))
    }
    
    /// Active color entries of one component as raw bytes, if it has colors
    pub fn color_bytes(&self, component: usize) -> InstancingResult<Option<&[u8]>> {
        let buffer = self.buffer(component)?;
        Ok(buffer
            .colors
            .as_ref()
            .map(|colors| bytemuck::cast_slice(&colors[..buffer.active_count])))
    }
    
    /// Whether a component changed since the last upload, clearing the flag
    pub fn take_needs_upload(&mut self, component: usize) -> bool {
        self.buffers
            .get_mut(component)
            .map_or(false, |buffer| std::mem::take(&mut buffer.needs_upload))
    }
    
    /// Culling volume, if configured
    pub fn bounding_sphere(&self) -> Option<&CullingSphere> {
        self.bounds.as_ref()
    }
    
    /// Whether the renderer may frustum-cull this aggregate
    pub fn frustum_culled(&self) -> bool {
        self.bounds.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4Ext, Vec3};
    use crate::instancing::decompose::Component;
    
    fn store(components: usize, capacity: usize) -> BufferStore {
        let components = (0..components)
            .map(|index| Component::whole(format!("part-{index}"), Mat4::identity()))
            .collect();
        BufferStore::new(components, capacity, true, None)
    }
    
    #[test]
    fn test_write_and_read_back() {
        let mut store = store(2, 4);
        let transform = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let red = Color::new(1.0, 0.0, 0.0);
        
        store.write(1, 2, &transform, Some(&red)).unwrap();
        assert_eq!(store.read_transform(1, 2).unwrap(), transform);
        assert_eq!(store.read_color(1, 2).unwrap(), Some(red));
        assert_eq!(store.read_transform(0, 2).unwrap(), Mat4::identity());
    }
    
    #[test]
    fn test_write_without_color_keeps_previous() {
        let mut store = store(1, 2);
        let green = Color::new(0.0, 1.0, 0.0);
        store.write(0, 0, &Mat4::identity(), Some(&green)).unwrap();
        store.write(0, 0, &Mat4::rotation_y(1.0), None).unwrap();
        assert_eq!(store.read_color(0, 0).unwrap(), Some(green));
    }
    
    #[test]
    fn test_out_of_range_rejected() {
        let mut store = store(1, 2);
        assert_eq!(
            store.write(0, 2, &Mat4::identity(), None),
            Err(InstancingError::SlotOutOfRange { slot: 2, capacity: 2 })
        );
        assert_eq!(
            store.read_transform(3, 0),
            Err(InstancingError::ComponentOutOfRange { component: 3, count: 1 })
        );
    }
    
    #[test]
    fn test_copy_slot_moves_all_components() {
        let mut store = store(2, 3);
        let moved = Mat4::new_translation(&Vec3::new(5.0, 0.0, 0.0));
        store.write(0, 2, &moved, Some(&Color::new(0.2, 0.4, 0.6))).unwrap();
        store.write(1, 2, &moved, None).unwrap();
        
        store.copy_slot(2, 0).unwrap();
        assert_eq!(store.read_transform(0, 0).unwrap(), moved);
        assert_eq!(store.read_transform(1, 0).unwrap(), moved);
        assert_eq!(store.read_color(0, 0).unwrap(), Some(Color::new(0.2, 0.4, 0.6)));
    }
    
    #[test]
    fn test_resize_preserves_live_bytes() {
        let mut store = store(2, 4);
        for slot in 0..3 {
            let transform = Mat4::rotation_y(slot as f32 * 0.3) * Mat4::new_scaling(1.5);
            let color = Color::new(0.1 * slot as f32, 0.5, 0.9);
            store.write(0, slot, &transform, Some(&color)).unwrap();
            store.write(1, slot, &transform, Some(&color)).unwrap();
        }
        store.set_active_count(3);
        
        let transforms_before = store.transform_bytes(0).unwrap().to_vec();
        let colors_before = store.color_bytes(1).unwrap().unwrap().to_vec();
        
        let outcome = store.resize(8, 3);
        assert_eq!(outcome, ResizeOutcome { retained: 3, dropped: 0 });
        assert_eq!(store.capacity(), 8);
        assert_eq!(store.transform_bytes(0).unwrap(), transforms_before.as_slice());
        assert_eq!(store.color_bytes(1).unwrap().unwrap(), colors_before.as_slice());
    }
    
    #[test]
    fn test_shrink_drops_tail() {
        let mut store = store(1, 4);
        store.set_active_count(4);
        let outcome = store.resize(2, 4);
        
        assert_eq!(outcome, ResizeOutcome { retained: 2, dropped: 2 });
        assert_eq!(store.active_count(), 2);
        assert!(store.read_transform(0, 3).is_err());
    }
    
    #[test]
    fn test_upload_flag() {
        let mut store = store(1, 2);
        assert!(store.take_needs_upload(0));
        assert!(!store.take_needs_upload(0));
        
        store.write(0, 1, &Mat4::identity(), None).unwrap();
        assert!(store.take_needs_upload(0));
    }
    
    #[test]
    fn test_without_colors() {
        let components = vec![Component::whole("plain", Mat4::identity())];
        let mut store = BufferStore::new(components, 2, false, Some(CullingSphere { center: [0.0; 3], radius: 10.0 }));
        
        store.write(0, 0, &Mat4::identity(), Some(&Color::new(1.0, 0.0, 0.0))).unwrap();
        assert_eq!(store.read_color(0, 0).unwrap(), None);
        assert_eq!(store.color_bytes(0).unwrap(), None);
        assert!(store.frustum_culled());
        assert_eq!(store.bounding_sphere().map(|sphere| sphere.radius), Some(10.0));
    }
}
