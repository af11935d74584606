//! Member-facing collaborator interfaces
//!
//! [`MemberSource`] is how the frame resolver reads each member's current
//! spatial state and override colors. [`MemberTracker`] is the member-side
//! half of the protocol: it watches one member's visibility and matrix and
//! turns changes into [`MemberEvent`]s for the aggregate.

use crate::foundation::math::{Color, Mat4};
use super::events::MemberEvent;
use super::registry::MemberId;

/// Read access to member state owned by the host
pub trait MemberSource<M: MemberId> {
    /// Member transform relative to the aggregate's own space
    fn local_transform(&self, member: M) -> Option<Mat4>;
    
    /// Member transform in world space
    fn world_transform(&self, member: M) -> Option<Mat4>;
    
    /// Override colors indexed by material index
    fn override_colors(&self, member: M) -> Option<&[Color]> {
        let _ = member;
        None
    }
}

/// Change detector for one member
#[derive(Debug, Clone)]
pub struct MemberTracker<M> {
    member: M,
    added: bool,
    visible: bool,
    matrix: Mat4,
}

impl<M: MemberId> MemberTracker<M> {
    /// Start tracking a member that has not been announced yet
    pub fn new(member: M) -> Self {
        Self {
            member,
            added: false,
            visible: false,
            matrix: Mat4::identity(),
        }
    }
    
    /// Member being tracked
    pub fn member(&self) -> M {
        self.member
    }
    
    /// Whether the aggregate currently knows about this member
    pub fn is_announced(&self) -> bool {
        self.added && self.visible
    }
    
    /// Compare current state with the last observation
    ///
    /// Becoming visible announces the member, becoming hidden removes it,
    /// and a matrix change while visible is a modification.
    pub fn observe(&mut self, visible: bool, matrix: &Mat4) -> Option<MemberEvent<M>> {
        let event = match (self.is_announced(), visible) {
            (false, true) => {
                self.added = true;
                Some(MemberEvent::Added(self.member))
            }
            (true, false) => Some(MemberEvent::Removed(self.member)),
            (true, true) if self.matrix != *matrix => Some(MemberEvent::Modified(self.member)),
            _ => None,
        };
        
        self.visible = visible;
        self.matrix = *matrix;
        event
    }
    
    /// Stop tracking; removes the member if it was announced
    pub fn detach(&mut self) -> Option<MemberEvent<M>> {
        let event = self.is_announced().then_some(MemberEvent::Removed(self.member));
        self.added = false;
        self.visible = false;
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    
    #[test]
    fn test_visibility_transitions() {
        let mut tracker = MemberTracker::new(3u32);
        let matrix = Mat4::identity();
        
        assert_eq!(tracker.observe(false, &matrix), None);
        assert_eq!(tracker.observe(true, &matrix), Some(MemberEvent::Added(3)));
        assert_eq!(tracker.observe(true, &matrix), None);
        assert_eq!(tracker.observe(false, &matrix), Some(MemberEvent::Removed(3)));
        assert_eq!(tracker.observe(true, &matrix), Some(MemberEvent::Added(3)));
    }
    
    #[test]
    fn test_matrix_change_is_modification() {
        let mut tracker = MemberTracker::new(1u32);
        tracker.observe(true, &Mat4::identity());
        
        let moved = Mat4::new_translation(&Vec3::new(0.0, 0.0, 2.0));
        assert_eq!(tracker.observe(true, &moved), Some(MemberEvent::Modified(1)));
        assert_eq!(tracker.observe(true, &moved), None);
    }
    
    #[test]
    fn test_hidden_moves_are_silent() {
        let mut tracker = MemberTracker::new(1u32);
        tracker.observe(true, &Mat4::identity());
        tracker.observe(false, &Mat4::identity());
        
        let moved = Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(tracker.observe(false, &moved), None);
    }
    
    #[test]
    fn test_detach() {
        let mut tracker = MemberTracker::new(1u32);
        assert_eq!(tracker.detach(), None);
        
        tracker.observe(true, &Mat4::identity());
        assert_eq!(tracker.detach(), Some(MemberEvent::Removed(1)));
        assert_eq!(tracker.detach(), None);
    }
}
