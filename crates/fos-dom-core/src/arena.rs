//! Generational Arena
//!
//! Slot storage for every object the tree hands out a handle to. A slot
//! carries a generation counter that is bumped when its value is removed,
//! so a handle to a destroyed object never resolves to whatever reuses the
//! slot later.

use crate::{DomException, DomResult};

/// Arena key: slot index plus the generation it was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Key {
    index: u32,
    generation: u32,
}

impl Key {
    #[inline]
    pub(crate) fn index(self) -> u32 {
        self.index
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generational slot arena with free-slot recycling
#[derive(Debug)]
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Store a value. Storage is reserved before anything is written, so a
    /// failed allocation leaves the arena untouched.
    pub(crate) fn insert(&mut self, value: T) -> DomResult<Key> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            self.len += 1;
            return Ok(Key { index, generation: slot.generation });
        }

        self.slots
            .try_reserve(1)
            .map_err(|_| DomException::OutOfMemory)?;
        self.free
            .try_reserve(self.slots.len() + 1 - self.free.len())
            .map_err(|_| DomException::OutOfMemory)?;

        let index = u32::try_from(self.slots.len()).map_err(|_| DomException::OutOfMemory)?;
        self.slots.push(Slot { generation: 0, value: Some(value) });
        self.len += 1;
        Ok(Key { index, generation: 0 })
    }

    #[inline]
    pub(crate) fn get(&self, key: Key) -> Option<&T> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    #[inline]
    pub(crate) fn contains(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    /// Remove a value, retiring the key
    pub(crate) fn remove(&mut self, key: Key) -> Option<T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        // Capacity for every slot index was reserved on insert.
        self.free.push(key.index);
        self.len -= 1;
        Some(value)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Live keys in slot order
    pub(crate) fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|_| Key {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Key, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    Key {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut arena = Arena::new();
        let key = arena.insert("a").unwrap();
        assert_eq!(arena.get(key), Some(&"a"));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.remove(key), Some("a"));
        assert_eq!(arena.get(key), None);
        assert_eq!(arena.len(), 0);
    }

    #[test]
    fn test_stale_key_does_not_alias_reused_slot() {
        let mut arena = Arena::new();
        let old = arena.insert(1).unwrap();
        arena.remove(old);
        let new = arena.insert(2).unwrap();

        assert_eq!(old.index(), new.index());
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.get(new), Some(&2));
        assert_eq!(arena.remove(old), None);
    }

    #[test]
    fn test_keys_skip_vacant_slots() {
        let mut arena = Arena::new();
        let a = arena.insert('a').unwrap();
        let b = arena.insert('b').unwrap();
        let c = arena.insert('c').unwrap();
        arena.remove(b);

        let keys: Vec<_> = arena.keys().collect();
        assert_eq!(keys, vec![a, c]);
    }
}
