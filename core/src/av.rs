//! Audio/video suppression
//!
//! Speculative and corrective steps still run the full simulation, but
//! their video frames and audio samples must never reach the user. The
//! output paths consult these flags; [`AvGate`] applies them on behalf of
//! the frontend's callback set.

use bitflags::bitflags;

use crate::system::{CoreCallbacks, VideoFrame};

bitflags! {
    /// Video output flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VideoFlags: u8 {
        /// Frames are presented
        const ACTIVE = 1 << 0;
        /// Video was active when the run-ahead session was created
        const RUNAHEAD_IS_ACTIVE = 1 << 1;
    }
}

bitflags! {
    /// Audio output flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AudioFlags: u8 {
        /// Samples are discarded
        const SUSPENDED = 1 << 0;
        /// Samples are discarded and the driver must not even block on them
        const HARD_DISABLE = 1 << 1;
    }
}

/// Current AV suppression state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvState {
    pub video: VideoFlags,
    pub audio: AudioFlags,
}

impl Default for AvState {
    fn default() -> Self {
        Self::new()
    }
}

impl AvState {
    /// Video active, audio live
    pub fn new() -> Self {
        Self {
            video: VideoFlags::ACTIVE | VideoFlags::RUNAHEAD_IS_ACTIVE,
            audio: AudioFlags::empty(),
        }
    }

    /// Whether video frames are currently presented
    pub fn video_active(&self) -> bool {
        self.video.contains(VideoFlags::ACTIVE)
    }

    /// Whether audio samples are currently emitted
    pub fn audio_enabled(&self) -> bool {
        !self
            .audio
            .intersects(AudioFlags::SUSPENDED | AudioFlags::HARD_DISABLE)
    }

    /// Remember whether video is active as the value later restores return to
    pub fn capture_video_state(&mut self) {
        let active = self.video.contains(VideoFlags::ACTIVE);
        self.video.set(VideoFlags::RUNAHEAD_IS_ACTIVE, active);
    }

    /// Forget the captured video state (video counts as active again)
    pub fn reset_video_state(&mut self) {
        self.video.insert(VideoFlags::RUNAHEAD_IS_ACTIVE);
    }

    pub fn suspend_video(&mut self) {
        self.video.remove(VideoFlags::ACTIVE);
    }

    /// Return video to the state captured by [`capture_video_state`](Self::capture_video_state)
    pub fn restore_video(&mut self) {
        let active = self.video.contains(VideoFlags::RUNAHEAD_IS_ACTIVE);
        self.video.set(VideoFlags::ACTIVE, active);
    }

    /// Force video back on regardless of the captured state
    pub fn enable_video(&mut self) {
        self.video.insert(VideoFlags::ACTIVE);
    }

    pub fn suspend_audio(&mut self) {
        self.audio.insert(AudioFlags::SUSPENDED);
    }

    pub fn hard_disable_audio(&mut self) {
        self.audio.insert(AudioFlags::SUSPENDED | AudioFlags::HARD_DISABLE);
    }

    pub fn resume_audio(&mut self) {
        self.audio
            .remove(AudioFlags::SUSPENDED | AudioFlags::HARD_DISABLE);
    }

    /// Suspend both video and audio
    pub fn suspend_all(&mut self) {
        self.suspend_video();
        self.suspend_audio();
    }
}

/// Callback decorator that drops video/audio while suppressed
///
/// Input queries pass straight through to the wrapped callbacks.
pub struct AvGate<'a> {
    av: &'a AvState,
    inner: &'a mut dyn CoreCallbacks,
}

impl<'a> AvGate<'a> {
    pub fn new(av: &'a AvState, inner: &'a mut dyn CoreCallbacks) -> Self {
        Self { av, inner }
    }
}

impl CoreCallbacks for AvGate<'_> {
    fn input_poll(&mut self) {
        self.inner.input_poll();
    }

    fn input_state(&mut self, port: u32, device: u32, index: u32, id: u32) -> i16 {
        self.inner.input_state(port, device, index, id)
    }

    fn video_refresh(&mut self, frame: &VideoFrame<'_>) {
        if self.av.video_active() {
            self.inner.video_refresh(frame);
        }
    }

    fn audio_sample(&mut self, left: i16, right: i16) {
        if self.av.audio_enabled() {
            self.inner.audio_sample(left, right);
        }
    }

    fn audio_sample_batch(&mut self, samples: &[i16]) -> usize {
        if self.av.audio_enabled() {
            self.inner.audio_sample_batch(samples)
        } else {
            // Discarded samples still count as consumed
            samples.len() / 2
        }
    }
}
