use engine_core::pool::{TransformHandle, handle::TransformOutcome};
use futures::future::join_all;
use model::core::identifiers::ChunkIndex;
use std::fmt;
use tracing::trace;

pub mod assembler;

pub use assembler::{ChunkAssembler, ChunkOutcome, ChunkReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Filling,
    AwaitingCompletion,
    Committing,
    Committed,
    Failed,
}

impl ChunkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkState::Filling => "Filling",
            ChunkState::AwaitingCompletion => "AwaitingCompletion",
            ChunkState::Committing => "Committing",
            ChunkState::Committed => "Committed",
            ChunkState::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChunkState::Committed | ChunkState::Failed)
    }
}

impl fmt::Display for ChunkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Up to `capacity` in-flight transforms, each pinned to the slot it was read into.
#[derive(Debug)]
pub struct Chunk {
    index: ChunkIndex,
    capacity: usize,
    handles: Vec<TransformHandle>,
    state: ChunkState,
}

impl Chunk {
    pub fn new(index: ChunkIndex, capacity: usize) -> Self {
        Self {
            index,
            capacity,
            handles: Vec::with_capacity(capacity),
            state: ChunkState::Filling,
        }
    }

    pub fn index(&self) -> ChunkIndex {
        self.index
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.handles.len() >= self.capacity
    }

    /// Slot the next pushed handle will occupy.
    pub fn next_slot(&self) -> usize {
        self.handles.len()
    }

    pub fn push(&mut self, handle: TransformHandle) {
        debug_assert_eq!(self.state, ChunkState::Filling);
        debug_assert_eq!(handle.slot(), self.handles.len());
        self.handles.push(handle);
    }

    /// Waits for every handle to reach a terminal state. Outcomes come back in
    /// slot order, whatever order the workers finished in.
    pub async fn await_completion(&mut self) -> Vec<TransformOutcome> {
        self.transition(ChunkState::AwaitingCompletion);
        let handles = std::mem::take(&mut self.handles);
        join_all(handles.into_iter().map(TransformHandle::wait)).await
    }

    pub(crate) fn transition(&mut self, next: ChunkState) {
        trace!(chunk = %self.index, from = %self.state, to = %next, "Chunk state change");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{error::TransformError, pool::handle};
    use model::records::record::Record;

    #[tokio::test]
    async fn outcomes_follow_slots_not_completion_order() {
        let mut chunk = Chunk::new(ChunkIndex::new(0), 3);
        let mut completers = Vec::new();
        for slot in 0..3 {
            let (completer, handle) = handle::channel(slot, slot as i64 + 1);
            chunk.push(handle);
            completers.push(completer);
        }
        assert!(chunk.is_full());

        // Complete back to front.
        for completer in completers.into_iter().rev() {
            let id = completer.record_id();
            let outcome = if id == 2 {
                Err(TransformError::failed(id, "bad"))
            } else {
                Ok(Record::new(id, "R", "N"))
            };
            completer.complete(outcome);
        }

        let outcomes = chunk.await_completion().await;
        assert_eq!(chunk.state(), ChunkState::AwaitingCompletion);
        assert_eq!(outcomes[0].as_ref().unwrap().id, 1);
        assert!(outcomes[1].is_err());
        assert_eq!(outcomes[2].as_ref().unwrap().id, 3);
    }

    #[test]
    fn terminal_states() {
        assert!(ChunkState::Committed.is_terminal());
        assert!(ChunkState::Failed.is_terminal());
        assert!(!ChunkState::Committing.is_terminal());
    }
}
