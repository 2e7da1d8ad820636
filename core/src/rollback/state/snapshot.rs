//! Serialized core state

use xxhash_rust::xxh3::xxh3_64;

/// One complete snapshot of a simulation core
///
/// The buffer is sized once from `serialize_size` and reused for every
/// save into the slot that owns it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SerializedState {
    data: Vec<u8>,
}

impl SerializedState {
    /// Zero-filled buffer of `size` bytes
    pub fn with_size(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    /// Zero-filled buffer, reporting allocation failure instead of aborting
    pub fn try_with_size(size: usize) -> Option<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(size).ok()?;
        data.resize(size, 0);
        Some(Self { data })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// xxHash3 of the snapshot bytes
    pub fn checksum(&self) -> u64 {
        xxh3_64(&self.data)
    }
}

impl std::fmt::Debug for SerializedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializedState")
            .field("len", &self.data.len())
            .field("checksum", &format_args!("{:#018x}", self.checksum()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_size_is_zeroed() {
        let state = SerializedState::with_size(16);
        assert_eq!(state.len(), 16);
        assert!(state.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_zero_size_is_degenerate_but_usable() {
        let mut state = SerializedState::with_size(0);
        assert!(state.is_empty());
        assert!(state.as_mut_slice().is_empty());
    }

    #[test]
    fn test_checksum_tracks_contents() {
        let mut a = SerializedState::with_size(8);
        let b = SerializedState::with_size(8);
        assert_eq!(a.checksum(), b.checksum());

        a.as_mut_slice()[3] = 0xAA;
        assert_ne!(a.checksum(), b.checksum());
    }

    #[test]
    fn test_try_with_size() {
        let state = SerializedState::try_with_size(32).unwrap();
        assert_eq!(state.len(), 32);
    }
}
