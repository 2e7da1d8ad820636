//! Fixed ring of snapshots for preemptive frames

use crate::rollback::events::PreemptError;

use super::SerializedState;

/// `frames` snapshots of the same instance, oldest at `start_ptr`
#[derive(Debug)]
pub struct SnapshotRing {
    buffers: Vec<SerializedState>,
    start_ptr: usize,
    replay_ptr: usize,
}

impl SnapshotRing {
    /// Allocate `frames` buffers of `state_size` bytes each
    pub fn allocate(frames: usize, state_size: usize) -> Result<Self, PreemptError> {
        if state_size == 0 {
            return Err(PreemptError::NoSavestates);
        }
        if frames == 0 {
            return Err(PreemptError::AllocationFailed);
        }

        let mut buffers = Vec::new();
        buffers
            .try_reserve_exact(frames)
            .map_err(|_| PreemptError::AllocationFailed)?;
        for _ in 0..frames {
            let buffer =
                SerializedState::try_with_size(state_size).ok_or(PreemptError::AllocationFailed)?;
            buffers.push(buffer);
        }

        Ok(Self {
            buffers,
            start_ptr: 0,
            replay_ptr: 0,
        })
    }

    pub fn frames(&self) -> usize {
        self.buffers.len()
    }

    pub fn state_size(&self) -> usize {
        self.buffers.first().map_or(0, SerializedState::len)
    }

    /// Slot holding the oldest snapshot
    pub fn start_ptr(&self) -> usize {
        self.start_ptr
    }

    pub fn replay_ptr(&self) -> usize {
        self.replay_ptr
    }

    /// Ring successor of `ptr`
    #[inline]
    pub fn next(&self, ptr: usize) -> usize {
        (ptr + 1) % self.buffers.len()
    }

    /// The oldest snapshot becomes the newest
    pub fn advance_start(&mut self) {
        self.start_ptr = self.next(self.start_ptr);
    }

    pub fn set_replay_ptr(&mut self, ptr: usize) {
        self.replay_ptr = ptr % self.buffers.len();
    }

    pub fn advance_replay(&mut self) {
        self.replay_ptr = self.next(self.replay_ptr);
    }

    pub fn buffer(&self, slot: usize) -> &[u8] {
        self.buffers[slot].as_slice()
    }

    pub fn buffer_mut(&mut self, slot: usize) -> &mut [u8] {
        self.buffers[slot].as_mut_slice()
    }

    pub fn snapshot(&self, slot: usize) -> &SerializedState {
        &self.buffers[slot]
    }
}
