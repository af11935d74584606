//! Instancing error taxonomy and the diagnostic channel
//!
//! Nothing in this subsystem is fatal. Operations return
//! `Result<_, InstancingError>` internally, and the aggregate routes every
//! error into [`Diagnostics`] instead of unwinding the caller.

use std::collections::VecDeque;

use log::Level;
use thiserror::Error;

/// Maximum number of undrained diagnostics kept before the oldest is dropped
pub const MAX_PENDING_DIAGNOSTICS: usize = 256;

/// Errors reported by the instancing core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstancingError {
    /// Add rejected because every slot is live
    #[error("Member {member} not added: exceeded configured capacity of {capacity}")]
    CapacityExceeded {
        /// Debug rendering of the rejected member
        member: String,
        /// Configured capacity at the time of the add
        capacity: usize,
    },
    
    /// Notification for a member that is not tracked
    #[error("Member {member} not found for {operation}")]
    UnknownMember {
        /// Debug rendering of the member
        member: String,
        /// Which notification referenced it
        operation: &'static str,
    },
    
    /// Add for a member that already owns a live slot
    #[error("Member {member} already live at slot {slot}")]
    DuplicateMember {
        /// Debug rendering of the member
        member: String,
        /// Slot the member already owns
        slot: usize,
    },
    
    /// Setup produced no geometry components
    #[error("Mesh '{mesh}' has no renderable geometry components")]
    MissingRenderableComponent {
        /// Name of the mesh description
        mesh: String,
    },
    
    /// Decomposition requested while baked material colors were kept
    #[error("Material '{material}' keeps its baked color; per-member colors cannot replace it")]
    AmbiguousColorDecomposition {
        /// Name of the material still carrying a baked color
        material: String,
    },
    
    /// Slot index outside the buffer store
    #[error("Slot {slot} out of range for capacity {capacity}")]
    SlotOutOfRange {
        /// Requested slot
        slot: usize,
        /// Current capacity
        capacity: usize,
    },
    
    /// Component index outside the buffer store
    #[error("Component {component} out of range ({count} components)")]
    ComponentOutOfRange {
        /// Requested component
        component: usize,
        /// Number of components in the store
        count: usize,
    },
    
    /// Buffer store has not been built yet
    #[error("Instance buffers not built yet")]
    NotReady,
    
    /// Resize request that cannot be honored
    #[error("Ignoring resize to capacity {requested}")]
    InvalidCapacity {
        /// Requested capacity
        requested: usize,
    },
    
    /// Resize below the live member count dropped instances
    #[error("Resize to capacity {capacity} dropped {dropped} live members")]
    CapacityTruncated {
        /// New capacity
        capacity: usize,
        /// Number of live members discarded
        dropped: usize,
    },
}

impl InstancingError {
    /// Log level this error is reported at
    pub fn severity(&self) -> Level {
        match self {
            Self::UnknownMember { .. } => Level::Error,
            Self::DuplicateMember { .. } => Level::Debug,
            Self::CapacityExceeded { .. }
            | Self::MissingRenderableComponent { .. }
            | Self::AmbiguousColorDecomposition { .. }
            | Self::SlotOutOfRange { .. }
            | Self::ComponentOutOfRange { .. }
            | Self::NotReady
            | Self::InvalidCapacity { .. }
            | Self::CapacityTruncated { .. } => Level::Warn,
        }
    }
}

/// Result type for instancing operations
pub type InstancingResult<T> = Result<T, InstancingError>;

/// Bounded queue of reported conditions
///
/// Each report is logged immediately and kept until the host drains it.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pending: VecDeque<InstancingError>,
    total_reported: u64,
}

impl Diagnostics {
    /// Create an empty channel
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Log and record a condition
    pub fn report(&mut self, error: InstancingError) {
        log::log!(error.severity(), "{}", error);
        
        if self.pending.len() == MAX_PENDING_DIAGNOSTICS {
            self.pending.pop_front();
        }
        self.pending.push_back(error);
        self.total_reported += 1;
    }
    
    /// Take every undrained diagnostic, oldest first
    pub fn drain(&mut self) -> Vec<InstancingError> {
        self.pending.drain(..).collect()
    }
    
    /// Undrained diagnostics
    pub fn pending(&self) -> impl Iterator<Item = &InstancingError> {
        self.pending.iter()
    }
    
    /// Total number of reports since creation, drained or not
    pub fn total_reported(&self) -> u64 {
        self.total_reported
    }
}
