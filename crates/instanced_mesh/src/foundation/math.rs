//! Math utilities and types
//!
//! Provides the fundamental math types used by instance transforms.

pub use nalgebra::{
    Vector3,
    Matrix4,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Linear RGB color, one channel per component
pub type Color = Vec3;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,
    
    /// Rotation quaternion
    pub rotation: Quat,
    
    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }
    
    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
    
    /// Create a transform from position, rotation and scale
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self { position, rotation, scale }
    }
    
    /// Set a uniform scale factor
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }
    
    /// Compose into a transformation matrix: translation * rotation * scale
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Math utility functions
pub mod utils {
    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Create a rotation matrix around the X axis
    fn rotation_x(angle: f32) -> Mat4;
    
    /// Create a rotation matrix around the Y axis (yaw)
    fn rotation_y(angle: f32) -> Mat4;
    
    /// Create a rotation matrix around the Z axis
    fn rotation_z(angle: f32) -> Mat4;
    
    /// Translation column of an affine matrix
    fn translation(&self) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn rotation_x(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::x_axis(), angle)
    }
    
    fn rotation_y(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::y_axis(), angle)
    }
    
    fn rotation_z(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::z_axis(), angle)
    }
    
    fn translation(&self) -> Vec3 {
        Vec3::new(self.m14, self.m24, self.m34)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    
    const EPSILON: f32 = 1e-6;
    
    #[test]
    fn test_transform_identity_matrix() {
        assert_relative_eq!(Transform::identity().to_matrix(), Mat4::identity(), epsilon = EPSILON);
    }
    
    #[test]
    fn test_compose_applies_scale_then_rotation_then_translation() {
        let transform = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_axis_angle(&Vec3::y_axis(), utils::deg_to_rad(90.0)),
            Vec3::new(2.0, 2.0, 2.0),
        );
        
        // +X scaled to length 2, yawed onto -Z, then translated
        let point = transform.to_matrix().transform_point(&nalgebra::Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(point.coords, Vec3::new(1.0, 2.0, 1.0), epsilon = 1e-5);
        assert_relative_eq!(transform.to_matrix().translation(), Vec3::new(1.0, 2.0, 3.0), epsilon = EPSILON);
    }
    
    #[test]
    fn test_rotation_y_matches_quaternion() {
        let angle = utils::deg_to_rad(37.0);
        let from_quat = Quat::from_axis_angle(&Vec3::y_axis(), angle).to_homogeneous();
        assert_relative_eq!(Mat4::rotation_y(angle), from_quat, epsilon = EPSILON);
    }
}
