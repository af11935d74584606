//! Member lifecycle notifications
//!
//! Collaborators report lifecycle changes as a typed [`MemberEvent`]
//! consumed through a single dispatch function. Until the buffer store
//! exists, events wait in a [`ReadinessGate`] and are replayed exactly once,
//! in arrival order, as soon as it does.

use super::registry::MemberId;

/// Lifecycle notification for one member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberEvent<M> {
    /// Member should be rendered
    Added(M),
    /// Member's transform or colors changed
    Modified(M),
    /// Member should no longer be rendered
    Removed(M),
}

impl<M: MemberId> MemberEvent<M> {
    /// Member the event refers to
    pub fn member(&self) -> M {
        match *self {
            Self::Added(member) | Self::Modified(member) | Self::Removed(member) => member,
        }
    }
    
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Modified(_) => "modified",
            Self::Removed(_) => "removed",
        }
    }
}

/// Holds events that arrive before the buffer store is ready
#[derive(Debug)]
pub struct ReadinessGate<M> {
    ready: bool,
    queued: Vec<MemberEvent<M>>,
}

impl<M> Default for ReadinessGate<M> {
    fn default() -> Self {
        Self {
            ready: false,
            queued: Vec::new(),
        }
    }
}

impl<M: MemberId> ReadinessGate<M> {
    /// Create a closed gate
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Whether events pass straight through
    pub fn is_ready(&self) -> bool {
        self.ready
    }
    
    /// Queue an event while closed; returns it back when open
    pub fn admit(&mut self, event: MemberEvent<M>) -> Option<MemberEvent<M>> {
        if self.ready {
            Some(event)
        } else {
            log::debug!("Queueing {} event for {:?} until buffers are ready", event.kind(), event.member());
            self.queued.push(event);
            None
        }
    }
    
    /// Open the gate, handing back the queued events in arrival order
    ///
    /// The queue is replaced, not merged, so each event is replayed once.
    pub fn open(&mut self) -> Vec<MemberEvent<M>> {
        self.ready = true;
        std::mem::take(&mut self.queued)
    }
    
    /// Number of events waiting
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_gate_queues_until_open() {
        let mut gate = ReadinessGate::new();
        assert_eq!(gate.admit(MemberEvent::Added(1u32)), None);
        assert_eq!(gate.admit(MemberEvent::Removed(1u32)), None);
        assert_eq!(gate.queued_len(), 2);
        
        let replay = gate.open();
        assert_eq!(replay, vec![MemberEvent::Added(1), MemberEvent::Removed(1)]);
        assert_eq!(gate.queued_len(), 0);
        assert!(gate.open().is_empty());
        
        assert_eq!(gate.admit(MemberEvent::Modified(2)), Some(MemberEvent::Modified(2)));
    }
    
    #[test]
    fn test_event_accessors() {
        let event = MemberEvent::Modified(7u32);
        assert_eq!(event.member(), 7);
        assert_eq!(event.kind(), "modified");
    }
}
