// src/materials/material_cache.rs
//
// Bounded material cache keyed by (colour, opacity, depth bias).
//
// Eviction is strict FIFO: lookups go through `peek`, which never touches the
// recency list, so the `LruCache` order stays insertion order and `pop_lru`
// always yields the oldest inserted entry.
//
// There is no reference counting. An evicted material may still be attached to
// a live scene node; it is marked disposed and the GPU layer stops uploading
// it. Materials are cheap to recreate and the cap is large relative to the
// number of distinct colours a session normally uses.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::colour::Colour;

use super::{Material, MaterialRef};

/// Normalized `colour|opacity|bias` key, both numbers rounded to 3 decimals.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialKey(String);

impl MaterialKey {
    pub fn new(colour: &Colour, opacity: f32, depth_bias: f32) -> Self {
        Self(format!(
            "{}|{:.3}|{:.3}",
            colour.as_hex(),
            round3(opacity.clamp(0.0, 1.0)),
            round3(depth_bias)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn round3(v: f32) -> f32 {
    let r = (v * 1000.0).round() / 1000.0;
    // -0.0 and 0.0 must produce the same key
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaterialCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub disposal_failures: u64,
}

pub struct MaterialCache {
    entries: LruCache<MaterialKey, MaterialRef>,
    stats: MaterialCacheStats,
}

impl MaterialCache {
    pub fn new(max_materials: usize) -> Self {
        let cap = NonZeroUsize::new(max_materials).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(cap),
            stats: MaterialCacheStats::default(),
        }
    }

    /// Return the cached material for the tuple or build one with `factory`.
    pub fn get_or_create<F>(
        &mut self,
        colour: &Colour,
        opacity: f32,
        depth_bias: f32,
        factory: F,
    ) -> MaterialRef
    where
        F: FnOnce() -> Material,
    {
        let key = MaterialKey::new(colour, opacity, depth_bias);
        if let Some(existing) = self.entries.peek(&key) {
            self.stats.hits += 1;
            return existing.clone();
        }

        self.stats.misses += 1;
        if self.entries.len() >= self.capacity() {
            if let Some((old_key, old)) = self.entries.pop_lru() {
                self.stats.evictions += 1;
                log::debug!("evicting material {} ({:?})", old_key.as_str(), old.id());
                self.dispose_one(&old);
            }
        }

        let material = MaterialRef::new(factory());
        self.entries.push(key, material.clone());
        material
    }

    /// The default factory: a flat material for exactly the keyed tuple.
    pub fn get_or_create_flat(&mut self, colour: &Colour, opacity: f32, depth_bias: f32) -> MaterialRef {
        let c = colour.clone();
        self.get_or_create(colour, opacity, depth_bias, move || Material::new(c, opacity, depth_bias))
    }

    pub fn contains(&self, key: &MaterialKey) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn stats(&self) -> MaterialCacheStats {
        self.stats
    }

    /// Keys oldest first.
    pub fn keys(&self) -> Vec<MaterialKey> {
        self.entries.iter().rev().map(|(k, _)| k.clone()).collect()
    }

    /// Cached materials oldest first.
    pub fn materials(&self) -> impl Iterator<Item = &MaterialRef> {
        self.entries.iter().rev().map(|(_, v)| v)
    }

    /// Release every entry. The cache is usable afterwards.
    pub fn dispose(&mut self) {
        let mut released = 0usize;
        while let Some((_, material)) = self.entries.pop_lru() {
            self.dispose_one(&material);
            released += 1;
        }
        log::info!("material cache disposed ({} materials)", released);
    }

    fn dispose_one(&mut self, material: &Material) {
        // Best effort: a failed disposal must not abort the draw that triggered it.
        if let Err(e) = material.dispose() {
            self.stats.disposal_failures += 1;
            log::warn!("material disposal failed: {}", e);
        }
    }
}

impl Drop for MaterialCache {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            self.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colour(i: usize) -> Colour {
        Colour::parse(&format!("#{:06x}", i)).unwrap()
    }

    #[test]
    fn same_tuple_shares_one_material() {
        let mut cache = MaterialCache::new(4);
        let a = cache.get_or_create_flat(&colour(1), 1.0, 0.0);
        let b = cache.get_or_create_flat(&colour(1), 1.0004, 0.0);
        assert!(std::sync::Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn bound_holds_and_oldest_keys_go_first() {
        let max = 8;
        let extra = 3;
        let mut cache = MaterialCache::new(max);
        let mut created = Vec::new();
        for i in 0..max + extra {
            created.push(cache.get_or_create_flat(&colour(i), 1.0, 0.0));
            assert!(cache.len() <= max);
        }
        assert_eq!(cache.len(), max);
        for i in 0..extra {
            assert!(!cache.contains(&MaterialKey::new(&colour(i), 1.0, 0.0)));
            assert!(created[i].is_disposed());
        }
        for i in extra..max + extra {
            assert!(cache.contains(&MaterialKey::new(&colour(i), 1.0, 0.0)));
            assert!(!created[i].is_disposed());
        }
        assert_eq!(cache.stats().evictions, extra as u64);
    }

    #[test]
    fn hits_do_not_reorder_eviction() {
        let mut cache = MaterialCache::new(2);
        cache.get_or_create_flat(&colour(1), 1.0, 0.0);
        cache.get_or_create_flat(&colour(2), 1.0, 0.0);
        // A hit on the oldest entry must not save it from eviction.
        cache.get_or_create_flat(&colour(1), 1.0, 0.0);
        cache.get_or_create_flat(&colour(3), 1.0, 0.0);
        assert!(!cache.contains(&MaterialKey::new(&colour(1), 1.0, 0.0)));
        assert_eq!(
            cache.keys(),
            vec![
                MaterialKey::new(&colour(2), 1.0, 0.0),
                MaterialKey::new(&colour(3), 1.0, 0.0)
            ]
        );
    }

    #[test]
    fn disposal_failure_is_swallowed_and_counted() {
        let mut cache = MaterialCache::new(1);
        let first = cache.get_or_create_flat(&colour(1), 1.0, 0.0);
        first.dispose().unwrap();
        let second = cache.get_or_create_flat(&colour(2), 1.0, 0.0);
        assert!(!second.is_disposed());
        assert_eq!(cache.stats().disposal_failures, 1);
    }

    #[test]
    fn dispose_releases_everything() {
        let mut cache = MaterialCache::new(4);
        let a = cache.get_or_create_flat(&colour(1), 1.0, 0.0);
        let b = cache.get_or_create_flat(&colour(2), 0.5, 1.0);
        cache.dispose();
        assert!(cache.is_empty());
        assert!(a.is_disposed() && b.is_disposed());
    }

    #[test]
    fn key_rounds_and_normalizes() {
        let k = MaterialKey::new(&colour(0xff), 0.12345, -0.0);
        assert_eq!(k.as_str(), "#0000ff|0.123|0.000");
    }
}
