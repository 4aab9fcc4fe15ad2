//! Eviction cache of devices that failed to expose the battery service.
//!
//! A fixed ring of slots with a circular write cursor. Insertion always
//! overwrites the slot under the cursor, so eviction follows insertion order
//! and lookups never refresh an entry.

use crate::core::address::DeviceAddress;

/// Slot count used when no capacity is configured.
pub const DEFAULT_BLACKLIST_CAPACITY: usize = 20;

#[derive(Debug, Clone)]
pub struct EvictionCache {
    slots: Vec<Option<DeviceAddress>>,
    cursor: usize,
}

impl EvictionCache {
    /// Creates an empty cache. `capacity` is clamped to at least one slot.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn contains(&self, address: &DeviceAddress) -> bool {
        self.slots.iter().flatten().any(|entry| entry == address)
    }

    /// Writes `address` at the cursor and advances it, wrapping at capacity.
    pub fn insert(&mut self, address: DeviceAddress) {
        self.slots[self.cursor] = Some(address);
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    /// Occupied entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceAddress> {
        self.slots.iter().flatten()
    }
}

impl Default for EvictionCache {
    fn default() -> Self {
        Self::new(DEFAULT_BLACKLIST_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u16) -> DeviceAddress {
        let [hi, lo] = n.to_be_bytes();
        DeviceAddress::new([0xC0, 0xFF, 0xEE, 0x00, hi, lo])
    }

    #[test]
    fn empty_cache_contains_nothing() {
        let cache = EvictionCache::default();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 20);
        assert!(!cache.contains(&addr(1)));
        assert!(!cache.contains(&DeviceAddress::default()));
    }

    #[test]
    fn contains_after_insert() {
        let mut cache = EvictionCache::default();
        cache.insert(addr(7));
        assert!(cache.contains(&addr(7)));
        assert!(!cache.contains(&addr(8)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn twenty_first_insert_evicts_the_first() {
        let mut cache = EvictionCache::new(20);
        for n in 0..21 {
            cache.insert(addr(n));
        }
        assert!(!cache.contains(&addr(0)));
        for n in 1..21 {
            assert!(cache.contains(&addr(n)), "address {n} should survive");
        }
        assert_eq!(cache.len(), 20);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut cache = EvictionCache::new(5);
        for n in 0..137 {
            cache.insert(addr(n));
            assert!(cache.len() <= cache.capacity());
        }
        assert_eq!(cache.len(), 5);
    }

    #[test]
    fn entry_survives_exactly_capacity_minus_one_later_inserts() {
        let capacity = 8;
        let mut cache = EvictionCache::new(capacity);
        cache.insert(addr(1000));
        for n in 0..(capacity as u16 - 1) {
            cache.insert(addr(n));
            assert!(cache.contains(&addr(1000)));
        }
        cache.insert(addr(999));
        assert!(!cache.contains(&addr(1000)));
    }

    #[test]
    fn lookups_do_not_refresh_entries() {
        let mut cache = EvictionCache::new(3);
        cache.insert(addr(1));
        cache.insert(addr(2));
        cache.insert(addr(3));
        assert!(cache.contains(&addr(1)));
        cache.insert(addr(4));
        assert!(!cache.contains(&addr(1)));
        assert!(cache.contains(&addr(2)));
    }

    #[test]
    fn duplicate_inserts_occupy_separate_slots() {
        let mut cache = EvictionCache::new(3);
        cache.insert(addr(1));
        cache.insert(addr(1));
        cache.insert(addr(2));
        cache.insert(addr(3));
        // One copy of addr(1) was overwritten, the other remains.
        assert!(cache.contains(&addr(1)));
        cache.insert(addr(4));
        assert!(!cache.contains(&addr(1)));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut cache = EvictionCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert(addr(1));
        cache.insert(addr(2));
        assert!(!cache.contains(&addr(1)));
        assert!(cache.contains(&addr(2)));
    }
}
