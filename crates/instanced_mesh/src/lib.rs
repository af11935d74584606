//! # Instanced Mesh
//!
//! Renders many copies of one mesh through a single dense instance buffer,
//! keeping that buffer in step as members come and go.
//!
//! ## Features
//!
//! - **Stable slots**: Each member owns one slot until it is removed
//! - **Batched removal**: Removals are deferred and compacted once per tick
//! - **Decomposition**: Multi-material meshes split into per-material components
//! - **Frames of reference**: Instances in the aggregate's local space or world space
//! - **Readiness gating**: Notifications sent before buffers exist are replayed once
//!
//! ## Quick Start
//!
//! ```rust
//! use instanced_mesh::prelude::*;
//!
//! instanced_mesh::foundation::logging::init();
//!
//! let mut scene = SceneMembers::new();
//! let mut mesh = InstancedMesh::new(InstancedMeshConfig::new(64))?;
//!
//! let geometry = Geometry::new(vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], vec![0, 1, 2]);
//! let part = MeshPart::new("rock", geometry, vec![MaterialDesc::new("stone", None)]);
//! mesh.build(&MeshDescription::new("rock", vec![part]));
//!
//! let rock = scene.spawn(MemberState::at(Transform::from_position(Vec3::new(2.0, 0.0, 0.0))));
//! scene.sync(&mut mesh);
//! mesh.tick();
//! mesh.resolve_frame(&scene, &Mat4::identity());
//!
//! assert_eq!(mesh.find_slot(rock), Ok(0));
//! # Ok::<(), instanced_mesh::config::ConfigError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod instancing;
pub mod scene;

/// Common imports for hosts driving an [`instancing::InstancedMesh`]
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, ConfigFormat},
        foundation::math::{Color, Mat4, Quat, Transform, Vec3},
        instancing::{
            FrameOfReference, Geometry, InstancedMesh, InstancedMeshConfig, InstancingError,
            MaterialDesc, MemberEvent, MemberSource, MeshDescription, MeshPart, UpdateMode,
        },
        scene::{MemberState, SceneMembers},
    };
}
