//! Callbacks a core invokes while running one step

/// One video frame emitted by a core
#[derive(Debug, Clone, Copy)]
pub struct VideoFrame<'a> {
    /// Pixel data, `None` when the core asks to repeat the previous frame
    pub data: Option<&'a [u8]>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row
    pub pitch: usize,
}

impl<'a> VideoFrame<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32, pitch: usize) -> Self {
        Self {
            data: Some(data),
            width,
            height,
            pitch,
        }
    }

    /// Frame that repeats the previously presented image
    pub fn dupe(width: u32, height: u32) -> Self {
        Self {
            data: None,
            width,
            height,
            pitch: 0,
        }
    }
}

/// The callback set a core drives during [`SimulationCore::run`]
///
/// Rollback decorators implement this trait too and wrap the frontend's own
/// implementation, so interception is composition rather than pointer swapping.
///
/// [`SimulationCore::run`]: super::SimulationCore::run
pub trait CoreCallbacks {
    /// Latch the current state of all input devices
    fn input_poll(&mut self);

    /// Query one input value
    fn input_state(&mut self, port: u32, device: u32, index: u32, id: u32) -> i16;

    /// Present a video frame
    fn video_refresh(&mut self, frame: &VideoFrame<'_>);

    /// Emit a single stereo sample
    fn audio_sample(&mut self, left: i16, right: i16);

    /// Emit interleaved stereo samples, returns the number of frames consumed
    fn audio_sample_batch(&mut self, samples: &[i16]) -> usize;
}

impl<T: CoreCallbacks + ?Sized> CoreCallbacks for &mut T {
    fn input_poll(&mut self) {
        (**self).input_poll()
    }

    fn input_state(&mut self, port: u32, device: u32, index: u32, id: u32) -> i16 {
        (**self).input_state(port, device, index, id)
    }

    fn video_refresh(&mut self, frame: &VideoFrame<'_>) {
        (**self).video_refresh(frame)
    }

    fn audio_sample(&mut self, left: i16, right: i16) {
        (**self).audio_sample(left, right)
    }

    fn audio_sample_batch(&mut self, samples: &[i16]) -> usize {
        (**self).audio_sample_batch(samples)
    }
}

/// Callback set that discards everything and reads all input as neutral
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCallbacks;

impl CoreCallbacks for NullCallbacks {
    fn input_poll(&mut self) {}

    fn input_state(&mut self, _port: u32, _device: u32, _index: u32, _id: u32) -> i16 {
        0
    }

    fn video_refresh(&mut self, _frame: &VideoFrame<'_>) {}

    fn audio_sample(&mut self, _left: i16, _right: i16) {}

    fn audio_sample_batch(&mut self, samples: &[i16]) -> usize {
        samples.len() / 2
    }
}
