//! Fixed-capacity containers.
//!
//! [`SatSlots`] is an arena holding per-satellite state for a bounded number
//! of satellites, and [`Ring`] is a FIFO ring buffer. Both are backed by
//! generic arrays sized by the [`StaticStorage`](crate::storage::StaticStorage)
//! types, so they never allocate.

use crate::storage::StaticStorageTypenum;
use crate::Svn;
use generic_array::GenericArray;

#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
struct Slot<T> {
    svn: Option<Svn>,
    last_used: u64,
    value: T,
}

/// Per-satellite arena.
///
/// Each slot holds the state of one satellite. A satellite that is not
/// present takes an empty slot or, if there are none, the least recently
/// used slot, whose state is evicted.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SatSlots<T, N: StaticStorageTypenum> {
    slots: GenericArray<Slot<T>, N>,
    clock: u64,
}

impl<T: Default, N: StaticStorageTypenum> SatSlots<T, N> {
    /// Creates an arena with all the slots empty.
    pub fn new() -> SatSlots<T, N> {
        SatSlots {
            slots: GenericArray::default(),
            clock: 0,
        }
    }

    /// Returns the state of a satellite, if it has a slot.
    pub fn get(&self, svn: Svn) -> Option<&T> {
        self.slots
            .iter()
            .find(|s| s.svn == Some(svn))
            .map(|s| &s.value)
    }

    /// Returns the state of a satellite, assigning a slot to it if needed.
    ///
    /// A newly assigned slot holds the default state. The second element of
    /// the tuple is the satellite that has been evicted to make room, if
    /// any. Returns `None` only if the arena has no slots.
    pub fn get_or_assign(&mut self, svn: Svn) -> Option<(&mut T, Option<Svn>)> {
        self.clock += 1;
        let clock = self.clock;
        let slot = self.slots.iter_mut().max_by_key(|s| match s.svn {
            Some(s) if s == svn => u64::MAX,
            None => u64::MAX - 1,
            // least recently used is preferred
            _ => u64::MAX - 2 - s.last_used,
        })?;
        let evicted = match slot.svn {
            Some(s) if s == svn => None,
            other => {
                slot.value = T::default();
                slot.svn = Some(svn);
                other
            }
        };
        if let Some(evicted) = evicted {
            log::warn!("evicted state of {evicted} to make room for {svn}");
        }
        slot.last_used = clock;
        Some((&mut slot.value, evicted))
    }

    /// Removes the state of a satellite, freeing its slot.
    pub fn remove(&mut self, svn: Svn) {
        for slot in self.slots.iter_mut().filter(|s| s.svn == Some(svn)) {
            slot.svn = None;
            slot.value = T::default();
        }
    }

    /// Removes the state of all the satellites.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.svn = None;
            slot.value = T::default();
        }
    }

    /// Iterates over the satellites that have a slot, and their states.
    pub fn iter(&self) -> impl Iterator<Item = (Svn, &T)> {
        self.slots
            .iter()
            .filter_map(|s| s.svn.map(|svn| (svn, &s.value)))
    }
}

impl<T: Default, N: StaticStorageTypenum> Default for SatSlots<T, N> {
    fn default() -> SatSlots<T, N> {
        SatSlots::new()
    }
}

/// FIFO ring buffer.
///
/// When the ring is full, pushing a new item evicts the oldest one. Items
/// can also be removed from any position with [`Ring::retain`].
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Ring<T, N: StaticStorageTypenum> {
    items: GenericArray<Option<T>, N>,
    write_pointer: usize,
}

impl<T, N: StaticStorageTypenum> Ring<T, N> {
    /// Creates an empty ring.
    pub fn new() -> Ring<T, N> {
        Ring {
            items: GenericArray::default(),
            write_pointer: 0,
        }
    }

    /// Pushes an item, returning the item evicted to make room for it.
    pub fn push(&mut self, item: T) -> Option<T> {
        if N::USIZE == 0 {
            return Some(item);
        }
        let evicted = self.items[self.write_pointer].replace(item);
        self.write_pointer = (self.write_pointer + 1) % N::USIZE;
        evicted
    }

    /// Iterates over the items, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let (newer, older) = self.items.split_at(self.write_pointer);
        older.iter().chain(newer.iter()).flatten()
    }

    /// Iterates mutably over the items, oldest first.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        let (newer, older) = self.items.split_at_mut(self.write_pointer);
        older.iter_mut().chain(newer.iter_mut()).flatten()
    }

    /// Keeps only the items for which `f` returns `true`, visiting them
    /// oldest first.
    pub fn retain(&mut self, mut f: impl FnMut(&mut T) -> bool) {
        let (newer, older) = self.items.split_at_mut(self.write_pointer);
        for item in older.iter_mut().chain(newer.iter_mut()) {
            let keep = match item {
                Some(x) => f(x),
                None => true,
            };
            if !keep {
                *item = None;
            }
        }
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.items.iter().filter(|x| x.is_some()).count()
    }

    /// Returns `true` if the ring has no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all the items.
    pub fn clear(&mut self) {
        for item in self.items.iter_mut() {
            *item = None;
        }
    }
}

impl<T, N: StaticStorageTypenum> Default for Ring<T, N> {
    fn default() -> Ring<T, N> {
        Ring::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use typenum::{U2, U3};

    fn svn(n: u8) -> Svn {
        Svn::try_from(n).unwrap()
    }

    #[test]
    fn slot_assignment() {
        let mut slots = SatSlots::<u32, U2>::new();
        let (a, evicted) = slots.get_or_assign(svn(1)).unwrap();
        assert_eq!(evicted, None);
        *a = 10;
        let (b, evicted) = slots.get_or_assign(svn(2)).unwrap();
        assert_eq!(evicted, None);
        *b = 20;
        // E01 is used again, so E02 becomes the least recently used
        assert_eq!(slots.get_or_assign(svn(1)).unwrap(), (&mut 10, None));
        let (c, evicted) = slots.get_or_assign(svn(3)).unwrap();
        assert_eq!(evicted, Some(svn(2)));
        assert_eq!(*c, 0);
        assert_eq!(slots.get(svn(2)), None);
        assert_eq!(slots.get(svn(1)), Some(&10));
        slots.remove(svn(1));
        assert_eq!(slots.get(svn(1)), None);
        assert_eq!(slots.iter().count(), 1);
    }

    #[test]
    fn ring_fifo() {
        let mut ring = Ring::<u32, U3>::new();
        assert!(ring.is_empty());
        for j in 0..3 {
            assert_eq!(ring.push(j), None);
        }
        assert_eq!(ring.push(3), Some(0));
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), [1, 2, 3]);
        ring.retain(|&mut x| x != 2);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), [1, 3]);
        assert_eq!(ring.len(), 2);
        // the oldest position is overwritten first
        assert_eq!(ring.push(4), Some(1));
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), [3, 4]);
        ring.clear();
        assert!(ring.is_empty());
    }
}
