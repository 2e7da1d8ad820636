//! Input dirtiness tracking

/// Decides whether speculative replay has to be recomputed
///
/// Two independent reasons exist: live input differed from the shadow
/// (`input_dirty`), or the frontend skipped frames and nothing recorded
/// can be trusted (`force_dirty`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyInputTracker {
    input_dirty: bool,
    force_dirty: bool,
    last_frame_count: u64,
    /// Discontinuities seen by [`Self::observe_frame`] since the last reset
    frame_jumps: u32,
}

impl Default for DirtyInputTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DirtyInputTracker {
    /// A fresh tracker forces a resync on first use
    pub fn new() -> Self {
        Self {
            input_dirty: false,
            force_dirty: true,
            last_frame_count: 0,
            frame_jumps: 0,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.input_dirty = true;
    }

    pub fn set_input_dirty(&mut self, dirty: bool) {
        self.input_dirty = dirty;
    }

    pub fn is_input_dirty(&self) -> bool {
        self.input_dirty
    }

    pub fn clear_input_dirty(&mut self) {
        self.input_dirty = false;
    }

    /// Distrust everything recorded so far
    pub fn force_resync(&mut self) {
        self.force_dirty = true;
    }

    pub fn clear_force(&mut self) {
        self.force_dirty = false;
    }

    /// Whether a discontinuity or session (re)start requires a resync
    pub fn must_resync(&self) -> bool {
        self.force_dirty
    }

    /// Whether the speculative timeline must be recomputed this frame
    pub fn replay_needed(&self) -> bool {
        self.input_dirty || self.force_dirty
    }

    /// Record the frontend frame counter
    ///
    /// Returns true (and forces a resync) when the counter did not advance
    /// by exactly one since the previous call.
    pub fn observe_frame(&mut self, frame_count: u64) -> bool {
        let jumped = frame_count != self.last_frame_count.wrapping_add(1);
        if jumped {
            self.force_dirty = true;
            self.frame_jumps = self.frame_jumps.saturating_add(1);
        }
        self.last_frame_count = frame_count;
        jumped
    }

    pub fn last_frame_count(&self) -> u64 {
        self.last_frame_count
    }

    /// How many frame counter jumps forced a resync
    pub fn frame_jumps(&self) -> u32 {
        self.frame_jumps
    }

    /// Back to the state of a freshly loaded game
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
