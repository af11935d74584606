//! End-to-end tests driving [`InstancedMesh`](super::InstancedMesh) through
//! whole notification, compaction, and resolve cycles.
