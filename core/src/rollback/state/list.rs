//! Growable slot list with a constructor/destructor pair

/// Ordered list of lazily constructed slots
///
/// Backing storage only ever grows (to `max(new_size, capacity * 2)`), so
/// the frequent shrink-to-1 / grow-back cycles of a rollback session do not
/// churn the allocator. Shrinking runs the destructor on every constructed
/// slot past the new size and leaves the slot empty.
pub struct SlotList<T> {
    /// One entry per unit of capacity, `None` when unconstructed
    slots: Vec<Option<T>>,
    size: usize,
    constructor: Box<dyn FnMut() -> T>,
    destructor: Box<dyn FnMut(T)>,
}

impl<T> SlotList<T> {
    /// Create an empty list with `capacity` unconstructed slots
    pub fn create(
        capacity: usize,
        constructor: impl FnMut() -> T + 'static,
        destructor: impl FnMut(T) + 'static,
    ) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            size: 0,
            constructor: Box::new(constructor),
            destructor: Box::new(destructor),
        }
    }

    /// Create a list whose elements are simply dropped
    pub fn with_constructor(capacity: usize, constructor: impl FnMut() -> T + 'static) -> Self
    where
        T: 'static,
    {
        Self::create(capacity, constructor, drop)
    }

    /// Change the logical size
    ///
    /// Growing constructs the new slots only when `run_constructor` is set,
    /// otherwise they stay empty for the caller to fill.
    pub fn resize(&mut self, new_size: usize, run_constructor: bool) {
        let old_size = self.size;
        if new_size == old_size {
            return;
        }

        let capacity = self.slots.len();
        if new_size > capacity {
            let new_capacity = new_size.max(capacity * 2);
            log::debug!("SlotList growing from {} to {} slots", capacity, new_capacity);
            self.slots.resize_with(new_capacity, || None);
        }

        if new_size < old_size {
            for slot in &mut self.slots[new_size..old_size] {
                if let Some(element) = slot.take() {
                    (self.destructor)(element);
                }
            }
        } else {
            for i in old_size..new_size {
                self.slots[i] = if run_constructor {
                    Some((self.constructor)())
                } else {
                    None
                };
            }
        }

        self.size = new_size;
    }

    /// Append one constructed slot and return it
    pub fn add_element(&mut self) -> Option<&mut T> {
        let index = self.size;
        self.resize(index + 1, true);
        self.slots[index].as_mut()
    }

    /// Destroy every element, keeping the backing storage
    pub fn destroy(&mut self) {
        self.resize(0, false);
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        if index < self.size {
            self.slots[index].as_ref()
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index < self.size {
            self.slots[index].as_mut()
        } else {
            None
        }
    }

    /// Fill an empty slot below the logical size
    pub fn set(&mut self, index: usize, element: T) -> bool {
        if index >= self.size {
            return false;
        }
        if let Some(old) = self.slots[index].replace(element) {
            (self.destructor)(old);
        }
        true
    }

    /// Constructed elements below the logical size
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots[..self.size].iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots[..self.size].iter_mut().flatten()
    }

    /// Logical size
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of slots the backing storage holds
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl<T> Drop for SlotList<T> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<T> std::fmt::Debug for SlotList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotList")
            .field("size", &self.size)
            .field("capacity", &self.slots.len())
            .finish()
    }
}
