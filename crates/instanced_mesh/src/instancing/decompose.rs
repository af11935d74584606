//! Geometry decomposition
//!
//! One-time setup step that turns a source mesh description into the list
//! of [`Component`]s rendered for every member slot. A multi-part asset
//! yields one component per part; with decomposition enabled, each part is
//! further split into one component per distinct material index, so every
//! material can be recolored per member.
//!
//! Splitting a material without draining its baked color makes per-member
//! color meaningless: the baked color tints every member identically. That
//! case is reported as [`InstancingError::AmbiguousColorDecomposition`] and
//! decomposition proceeds anyway. The same warning covers draining a whole
//! multi-material part: only material 0 is drained, the others keep their
//! baked colors.

use std::collections::BTreeSet;

use crate::foundation::math::{Color, Mat4};
use super::error::InstancingError;

/// Index range of a geometry drawn with one material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryGroup {
    /// First index in the index buffer
    pub start: usize,
    /// Number of indices
    pub count: usize,
    /// Material used by this range
    pub material_index: usize,
}

/// Indexed triangle geometry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    /// Vertex positions
    pub positions: Vec<[f32; 3]>,
    /// Triangle indices into `positions`
    pub indices: Vec<u32>,
    /// Material ranges; empty means the whole index buffer uses material 0
    pub groups: Vec<GeometryGroup>,
}

impl Geometry {
    /// Create a geometry with a single material
    pub fn new(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self { positions, indices, groups: Vec::new() }
    }
    
    /// Add a material range
    pub fn with_group(mut self, start: usize, count: usize, material_index: usize) -> Self {
        self.groups.push(GeometryGroup { start, count, material_index });
        self
    }
    
    /// Whether anything would be drawn
    pub fn is_renderable(&self) -> bool {
        !self.positions.is_empty() && !self.indices.is_empty()
    }
    
    /// Material ranges, treating an ungrouped geometry as one material-0 range
    fn effective_groups(&self) -> Vec<GeometryGroup> {
        if self.groups.is_empty() {
            vec![GeometryGroup { start: 0, count: self.indices.len(), material_index: 0 }]
        } else {
            self.groups.clone()
        }
    }
    
    /// Sub-geometry containing only the ranges accepted by `keep`
    fn extract(&self, keep: impl Fn(usize) -> bool) -> Self {
        let mut indices = Vec::new();
        for group in self.effective_groups() {
            if !keep(group.material_index) {
                continue;
            }
            let end = (group.start + group.count).min(self.indices.len());
            let start = group.start.min(end);
            indices.extend_from_slice(&self.indices[start..end]);
        }
        
        Self {
            positions: self.positions.clone(),
            indices,
            groups: Vec::new(),
        }
    }
}

/// Material as described by the source asset
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDesc {
    /// Material name, used in diagnostics
    pub name: String,
    /// Baked base color; `None` renders white
    pub color: Option<Color>,
}

impl MaterialDesc {
    /// Create a named material
    pub fn new(name: impl Into<String>, color: Option<Color>) -> Self {
        Self { name: name.into(), color }
    }
}

/// One geometry node of a source asset
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPart {
    /// Node name
    pub name: String,
    /// Node geometry
    pub geometry: Geometry,
    /// Materials indexed by the geometry's group material indices
    pub materials: Vec<MaterialDesc>,
    /// Pose of this part relative to the member's own frame
    pub offset: Mat4,
}

impl MeshPart {
    /// Create a part at the member origin
    pub fn new(name: impl Into<String>, geometry: Geometry, materials: Vec<MaterialDesc>) -> Self {
        Self {
            name: name.into(),
            geometry,
            materials,
            offset: Mat4::identity(),
        }
    }
    
    /// Set the part's offset transform
    pub fn with_offset(mut self, offset: Mat4) -> Self {
        self.offset = offset;
        self
    }
}

/// Source geometry/material graph for one aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct MeshDescription {
    /// Asset name, used in diagnostics
    pub name: String,
    /// Geometry nodes
    pub parts: Vec<MeshPart>,
}

impl MeshDescription {
    /// Create a description from its parts
    pub fn new(name: impl Into<String>, parts: Vec<MeshPart>) -> Self {
        Self { name: name.into(), parts }
    }
}

/// One geometry+material pair sharing the member's slot index
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Name for diagnostics
    pub name: String,
    /// Geometry drawn for each slot
    pub geometry: Geometry,
    /// Materials drawn with the geometry
    pub materials: Vec<MaterialDesc>,
    /// Member color index used for overrides; `None` disables recoloring
    pub material_index: Option<usize>,
    /// Pose relative to the member's frame
    pub offset: Mat4,
    /// Fallback slot color when the member supplies no override
    pub original_color: Option<Color>,
}

impl Component {
    /// Component covering a whole member with no geometry attached yet
    pub fn whole(name: impl Into<String>, offset: Mat4) -> Self {
        Self {
            name: name.into(),
            geometry: Geometry::default(),
            materials: Vec::new(),
            material_index: Some(0),
            offset,
            original_color: None,
        }
    }
}

/// Options controlling decomposition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecomposeOptions {
    /// Split each part per material index
    pub decompose: bool,
    /// Move baked material colors into the per-slot color fallback
    pub drain_color: bool,
    /// Material indices to split out; others stay together, unrecolorable
    pub material_filter: Option<Vec<usize>>,
}

/// Components built from a mesh description plus any setup warnings
#[derive(Debug, Default)]
pub struct Decomposition {
    /// Components in draw order
    pub components: Vec<Component>,
    /// Conditions to report
    pub warnings: Vec<InstancingError>,
}

fn drain(material: &mut MaterialDesc) -> Option<Color> {
    material.color.take()
}

/// Build the component list for a mesh
pub fn decompose(mesh: &MeshDescription, options: &DecomposeOptions) -> Decomposition {
    let mut result = Decomposition::default();
    
    for part in &mesh.parts {
        if !part.geometry.is_renderable() {
            log::debug!("Skipping part '{}' of '{}': no geometry", part.name, mesh.name);
            continue;
        }
        
        if options.decompose {
            split_part(part, options, &mut result);
        } else {
            let mut materials = part.materials.clone();
            let original_color = if options.drain_color {
                // One color slot per member: only material 0 can be drained
                for material in materials.iter().skip(1).filter(|material| material.color.is_some()) {
                    result.warnings.push(InstancingError::AmbiguousColorDecomposition {
                        material: material.name.clone(),
                    });
                }
                materials.first_mut().and_then(drain)
            } else {
                None
            };
            
            result.components.push(Component {
                name: part.name.clone(),
                geometry: part.geometry.clone(),
                materials,
                material_index: Some(0),
                offset: part.offset,
                original_color,
            });
        }
    }
    
    if result.components.is_empty() {
        result.warnings.push(InstancingError::MissingRenderableComponent {
            mesh: mesh.name.clone(),
        });
    }
    
    log::debug!("Decomposed '{}' into {} components", mesh.name, result.components.len());
    result
}

fn split_part(part: &MeshPart, options: &DecomposeOptions, result: &mut Decomposition) {
    let selected = |index: usize| {
        options
            .material_filter
            .as_ref()
            .map_or(true, |filter| filter.contains(&index))
    };
    
    let material_indices: BTreeSet<usize> = part
        .geometry
        .effective_groups()
        .iter()
        .map(|group| group.material_index)
        .collect();
    
    for &index in material_indices.iter().filter(|&&index| selected(index)) {
        let mut material = part
            .materials
            .get(index)
            .cloned()
            .unwrap_or_else(|| MaterialDesc::new(format!("{}-material-{}", part.name, index), None));
        
        let original_color = if options.drain_color {
            drain(&mut material)
        } else {
            if material.color.is_some() {
                result.warnings.push(InstancingError::AmbiguousColorDecomposition {
                    material: material.name.clone(),
                });
            }
            None
        };
        
        result.components.push(Component {
            name: format!("{}/{}", part.name, material.name),
            geometry: part.geometry.extract(|group_index| group_index == index),
            materials: vec![material],
            material_index: Some(index),
            offset: part.offset,
            original_color,
        });
    }
    
    let unselected: Vec<usize> = material_indices
        .iter()
        .copied()
        .filter(|&index| !selected(index))
        .collect();
    if !unselected.is_empty() {
        result.components.push(Component {
            name: format!("{}/shared", part.name),
            geometry: part.geometry.extract(|group_index| unselected.contains(&group_index)),
            materials: part.materials.clone(),
            material_index: None,
            offset: part.offset,
            original_color: None,
        });
    }
}
