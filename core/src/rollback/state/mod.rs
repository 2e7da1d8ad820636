//! Snapshot storage
//!
//! Run-ahead keeps its snapshots in a [`SnapshotList`]; preemptive frames
//! use a fixed [`SnapshotRing`] of the same [`SerializedState`] buffers.

mod list;
mod ring;
mod snapshot;

pub use list::SlotList;
pub use ring::SnapshotRing;
pub use snapshot::SerializedState;

/// Slot list of serialized snapshots
pub type SnapshotList = SlotList<SerializedState>;

impl SnapshotList {
    /// List holding one zeroed `state_size` slot, or `None` when that
    /// buffer cannot be allocated
    ///
    /// Slots constructed later that fail to allocate come out empty, so a
    /// save into them fails instead of aborting.
    pub fn allocate(capacity: usize, state_size: usize) -> Option<Self> {
        let first = SerializedState::try_with_size(state_size)?;
        let mut list = SlotList::with_constructor(capacity, move || {
            SerializedState::try_with_size(state_size).unwrap_or_default()
        });
        list.resize(1, false);
        list.set(0, first);
        Some(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_list_slots_are_sized() {
        let mut list = SnapshotList::allocate(16, 12).unwrap();
        assert_eq!(list.len(), 1);
        let slot = list.get_mut(0).unwrap();
        assert_eq!(slot.len(), 12);
        slot.as_mut_slice()[0] = 1;
        assert_eq!(list.get(0).unwrap().as_slice()[0], 1);
    }

    #[test]
    fn test_snapshot_list_grows_with_sized_slots() {
        let mut list = SnapshotList::allocate(1, 4).unwrap();
        assert_eq!(list.add_element().unwrap().len(), 4);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_oversized_snapshot_list_is_refused() {
        assert!(SnapshotList::allocate(16, usize::MAX).is_none());
    }
}
