use std::{mem, num::NonZeroUsize};

use log::{debug, warn};
use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::xxh3_64;

use crate::{
    error::{ModelErr, Result},
    features::Weight,
};

/// Outcome of a `ScoresCache::lookup`.
#[derive(Debug)]
pub enum CacheSlot<'a> {
    /// The scores computed for the same feature sequence earlier in this epoch.
    Hit(&'a [Weight]),
    /// A fresh slot now registered under the sequence, the caller must fill it.
    Miss(&'a mut [Weight]),
    /// The cache is full. The buffer is shared scratch space that the next
    /// full lookup overwrites, the caller must fill it.
    Full(&'a mut [Weight]),
}

/// A fixed-capacity cache from feature sequences to score vectors.
///
/// Slots are handed out in order until `max_size` distinct sequences are
/// cached, nothing is evicted afterwards. `flush` reclaims every slot.
#[derive(Debug)]
pub struct ScoresCache {
    scores_size: usize,
    max_size: usize,
    arrays: Box<[Weight]>,
    overflow: Box<[Weight]>,
    index: FxHashMap<u64, usize>,
    next: usize,
    n_hit: u64,
    n_total: u64,
}

/// Hashes the raw bytes of a feature sequence, order sensitive.
pub fn hash_features(features: &[u64]) -> u64 {
    xxh3_64(bytemuck::cast_slice(features))
}

fn zeroed(len: usize) -> Result<Box<[Weight]>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| ModelErr::Allocation {
            what: "score cache",
        })?;
    buf.resize(len, 0.);
    Ok(buf.into_boxed_slice())
}

impl ScoresCache {
    /// Creates a new `ScoresCache` with every slot preallocated.
    ///
    /// # Arguments
    /// * `scores_size` - The length of every score vector.
    /// * `max_size` - The amount of slots.
    pub fn new(scores_size: usize, max_size: NonZeroUsize) -> Result<Self> {
        let max_size = max_size.get();
        let len = scores_size
            .checked_mul(max_size)
            .ok_or(ModelErr::Allocation {
                what: "score cache",
            })?;

        Ok(Self {
            scores_size,
            max_size,
            arrays: zeroed(len)?,
            overflow: zeroed(scores_size)?,
            index: FxHashMap::default(),
            next: 0,
            n_hit: 0,
            n_total: 0,
        })
    }

    /// Looks up the scores of a feature sequence.
    ///
    /// # Arguments
    /// * `features` - The active feature ids exactly as they will be scored.
    pub fn lookup(&mut self, features: &[u64]) -> CacheSlot<'_> {
        let hashed = hash_features(features);
        self.n_total += 1;

        if let Some(&slot) = self.index.get(&hashed) {
            self.n_hit += 1;
            return CacheSlot::Hit(self.slot(slot));
        }

        if self.next == self.max_size {
            return CacheSlot::Full(&mut self.overflow);
        }

        let slot = self.next;
        self.next += 1;
        self.index.insert(hashed, slot);

        if self.next == self.max_size {
            warn!(
                "score cache is full with {} entries, further misses won't be cached",
                self.max_size
            );
        }

        let start = slot * self.scores_size;
        CacheSlot::Miss(&mut self.arrays[start..start + self.scores_size])
    }

    fn slot(&self, slot: usize) -> &[Weight] {
        let start = slot * self.scores_size;
        &self.arrays[start..start + self.scores_size]
    }

    /// Forgets every cached sequence and resets the counters.
    pub fn flush(&mut self) {
        debug!(
            "flushing score cache: entries={} hits={} lookups={}",
            self.index.len(),
            self.n_hit,
            self.n_total
        );

        self.index.clear();
        self.next = 0;
        self.n_hit = 0;
        self.n_total = 0;
    }

    /// Returns the ratio of lookups that were hits since the last flush.
    pub fn utilization(&self) -> f64 {
        if self.n_total == 0 {
            return 0.;
        }

        self.n_hit as f64 / self.n_total as f64
    }

    pub fn hits(&self) -> u64 {
        self.n_hit
    }

    pub fn lookups(&self) -> u64 {
        self.n_total
    }

    pub fn len(&self) -> usize {
        self.next
    }

    pub fn is_empty(&self) -> bool {
        self.next == 0
    }

    pub fn is_full(&self) -> bool {
        self.next == self.max_size
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Bytes reserved by the slot pool, the overflow buffer and the index.
    pub fn memory_bytes(&self) -> usize {
        (self.arrays.len() + self.overflow.len()) * mem::size_of::<Weight>()
            + self.index.capacity() * (mem::size_of::<(u64, usize)>() + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(scores_size: usize, max_size: usize) -> ScoresCache {
        ScoresCache::new(scores_size, NonZeroUsize::new(max_size).unwrap()).unwrap()
    }

    #[test]
    fn test_miss_then_hit() {
        let mut cache = cache(3, 4);

        match cache.lookup(&[1, 2]) {
            CacheSlot::Miss(scores) => scores.copy_from_slice(&[1., 2., 3.]),
            other => panic!("expected a miss, got {other:?}"),
        }

        match cache.lookup(&[1, 2]) {
            CacheSlot::Hit(scores) => assert_eq!(scores, [1., 2., 3.]),
            other => panic!("expected a hit, got {other:?}"),
        }

        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.lookups(), 2);
        assert_eq!(cache.utilization(), 0.5);
    }

    #[test]
    fn test_key_is_order_sensitive() {
        assert_ne!(hash_features(&[1, 2]), hash_features(&[2, 1]));

        let mut cache = cache(1, 4);
        cache.lookup(&[1, 2]);
        assert!(matches!(cache.lookup(&[2, 1]), CacheSlot::Miss(_)));
    }

    #[test]
    fn test_full_cache_hands_out_overflow() {
        let mut cache = cache(2, 2);
        for seq in [[1u64], [2]] {
            if let CacheSlot::Miss(scores) = cache.lookup(&seq) {
                scores.fill(seq[0] as f32);
            }
        }
        assert!(cache.is_full());

        for _ in 0..2 {
            match cache.lookup(&[3]) {
                CacheSlot::Full(scores) => scores.fill(-1.),
                other => panic!("expected the overflow buffer, got {other:?}"),
            }
        }

        match cache.lookup(&[1]) {
            CacheSlot::Hit(scores) => assert_eq!(scores, [1., 1.]),
            other => panic!("expected a hit, got {other:?}"),
        }
        match cache.lookup(&[2]) {
            CacheSlot::Hit(scores) => assert_eq!(scores, [2., 2.]),
            other => panic!("expected a hit, got {other:?}"),
        }
    }

    #[test]
    fn test_flush_reclaims_slots() {
        let mut cache = cache(1, 1);
        cache.lookup(&[7]);
        cache.lookup(&[7]);
        assert!(cache.is_full());

        cache.flush();
        assert!(cache.is_empty());
        assert_eq!(cache.lookups(), 0);
        assert_eq!(cache.utilization(), 0.);
        assert!(matches!(cache.lookup(&[7]), CacheSlot::Miss(_)));
    }
}
