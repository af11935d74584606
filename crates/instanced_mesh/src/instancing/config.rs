//! # Instanced Mesh Configuration
//!
//! Strongly-typed options for one instanced mesh aggregate. Every field has
//! an explicit default, so partial TOML/RON documents are accepted, and the
//! whole struct is validated once when the aggregate is constructed.

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};

/// Default maximum number of live members
pub const DEFAULT_CAPACITY: usize = 100;

/// How a member's transform relates to the aggregate's coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameOfReference {
    /// Member transforms are already relative to the aggregate
    #[default]
    Local,
    /// Member world transforms are converted into aggregate space each frame
    World,
}

/// Which slots the frame resolver recomputes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Recompute every live slot every frame
    #[default]
    Auto,
    /// Recompute only members reported as modified since the last frame
    Manual,
}

/// Bounding sphere enclosing every member, used for frustum culling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CullingSphere {
    /// Sphere center in aggregate space
    pub center: [f32; 3],
    /// Sphere radius, must be positive
    pub radius: f32,
}

/// Configuration for an [`InstancedMesh`](super::InstancedMesh)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstancedMeshConfig {
    /// Hard ceiling on live members
    pub capacity: usize,
    /// Local or world transform handling
    pub frame_of_reference: FrameOfReference,
    /// Auto or manual slot resolution
    pub update_mode: UpdateMode,
    /// Split multi-material geometry so each material can be recolored per member
    pub decompose: bool,
    /// Move baked material colors into the per-member color buffer
    pub drain_color: bool,
    /// Allocate per-slot color buffers
    pub instance_colors: bool,
    /// Optional culling volume; without one the aggregate is never culled
    pub culling: Option<CullingSphere>,
    /// Log per-member bookkeeping at info level
    pub debug: bool,
}

impl Default for InstancedMeshConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            frame_of_reference: FrameOfReference::Local,
            update_mode: UpdateMode::Auto,
            decompose: false,
            drain_color: false,
            instance_colors: true,
            culling: None,
            debug: false,
        }
    }
}

impl InstancedMeshConfig {
    /// Create a configuration with the given capacity and defaults elsewhere
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }
    
    /// Set the frame of reference
    pub fn with_frame_of_reference(mut self, frame: FrameOfReference) -> Self {
        self.frame_of_reference = frame;
        self
    }
    
    /// Set the update mode
    pub fn with_update_mode(mut self, mode: UpdateMode) -> Self {
        self.update_mode = mode;
        self
    }
    
    /// Enable or disable material decomposition
    pub fn with_decompose(mut self, enabled: bool) -> Self {
        self.decompose = enabled;
        self
    }
    
    /// Enable or disable draining baked material colors
    pub fn with_drain_color(mut self, enabled: bool) -> Self {
        self.drain_color = enabled;
        self
    }
    
    /// Enable or disable per-slot color buffers
    pub fn with_instance_colors(mut self, enabled: bool) -> Self {
        self.instance_colors = enabled;
        self
    }
    
    /// Set a culling sphere
    pub fn with_culling(mut self, center: [f32; 3], radius: f32) -> Self {
        self.culling = Some(CullingSphere { center, radius });
        self
    }
    
    /// Enable verbose per-member logging
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }
}

impl Config for InstancedMeshConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("capacity must be at least 1".to_string()));
        }
        
        if let Some(sphere) = &self.culling {
            if !sphere.radius.is_finite() || sphere.radius <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "culling radius must be positive and finite, got {}", sphere.radius
                )));
            }
        }
        
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;
    
    #[test]
    fn test_defaults() {
        let config = InstancedMeshConfig::default();
        assert_eq!(config.capacity, 100);
        assert_eq!(config.frame_of_reference, FrameOfReference::Local);
        assert_eq!(config.update_mode, UpdateMode::Auto);
        assert!(!config.decompose);
        assert!(config.instance_colors);
        assert!(config.culling.is_none());
        assert!(config.validate().is_ok());
    }
    
    #[test]
    fn test_zero_capacity_rejected() {
        let config = InstancedMeshConfig::new(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
    
    #[test]
    fn test_bad_culling_radius_rejected() {
        let config = InstancedMeshConfig::new(10).with_culling([0.0; 3], -1.0);
        assert!(config.validate().is_err());
    }
    
    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = InstancedMeshConfig::parse(
            "capacity = 500\nframe_of_reference = \"world\"\nupdate_mode = \"manual\"\n",
            ConfigFormat::Toml,
        ).expect("valid toml");
        
        assert_eq!(config.capacity, 500);
        assert_eq!(config.frame_of_reference, FrameOfReference::World);
        assert_eq!(config.update_mode, UpdateMode::Manual);
        assert!(!config.decompose);
    }
    
    #[test]
    fn test_ron_round_trip() {
        let config = InstancedMeshConfig::new(64)
            .with_decompose(true)
            .with_drain_color(true)
            .with_culling([1.0, 2.0, 3.0], 50.0);
        
        let text = config.to_string_as(ConfigFormat::Ron).expect("serialize");
        let parsed = InstancedMeshConfig::parse(&text, ConfigFormat::Ron).expect("parse");
        assert_eq!(parsed, config);
    }
    
    #[test]
    fn test_parse_validates() {
        let result = InstancedMeshConfig::parse("capacity = 0", ConfigFormat::Toml);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
    
    #[test]
    fn test_unknown_extension() {
        assert!(matches!(
            ConfigFormat::from_path("mesh.json"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
