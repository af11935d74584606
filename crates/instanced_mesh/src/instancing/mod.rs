//! Instancing core
//!
//! Keeps a dense, fixed-capacity instance buffer in step with a changing set
//! of members. Built bottom-up:
//!
//! ```text
//! InstancedMesh
//!         ├── SlotRegistry      (member ↔ slot, pending removals, refresh set)
//!         ├── RemovalCompactor  (one gap-closing pass per tick)
//!         ├── BufferStore       (per-component transform/color arrays)
//!         └── FrameResolver     (member ⊗ component offset, colors)
//! ```

pub mod config;
pub mod error;
pub mod registry;
pub mod compactor;
pub mod buffer_store;
pub mod decompose;
pub mod resolver;
pub mod events;
pub mod member;
pub mod instanced_mesh;

#[cfg(test)]
mod tests;

pub use config::{CullingSphere, FrameOfReference, InstancedMeshConfig, UpdateMode};
pub use error::{Diagnostics, InstancingError, InstancingResult};
pub use registry::{MemberId, SlotAssignment, SlotRegistry};
pub use compactor::{CompactionReport, CompactionStats, RemovalCompactor};
pub use buffer_store::{BufferStore, ComponentBuffer, InstanceColor, InstanceTransform, ResizeOutcome};
pub use decompose::{Component, DecomposeOptions, Geometry, MaterialDesc, MeshDescription, MeshPart};
pub use resolver::{FrameResolver, ResolveStats};
pub use events::{MemberEvent, ReadinessGate};
pub use member::{MemberSource, MemberTracker};
pub use instanced_mesh::InstancedMesh;
