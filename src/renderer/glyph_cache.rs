use std::borrow::Cow;
use std::collections::HashMap;
use std::num::NonZeroUsize;

use crate::glyph_id::GlyphId;

#[derive(Default, Clone, Copy)]
struct LruNode {
    newer: Option<usize>,
    older: Option<usize>,
}

/// Fixed number of equally sized coverage slots with LRU eviction.
struct VecAtlas {
    capacity: usize,
    block_size: usize,
    data: Vec<u8>,

    nodes: Vec<LruNode>,
    head: Option<usize>,
    tail: Option<usize>,
    slots: HashMap<GlyphId, usize, fxhash::FxBuildHasher>,
    empties: Vec<usize>,
    keys: Vec<Option<GlyphId>>,
}

impl VecAtlas {
    fn new(capacity: NonZeroUsize, block_size: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        let block_size = block_size.get();

        Self {
            capacity,
            block_size,
            data: vec![0; capacity * block_size],
            nodes: vec![LruNode::default(); capacity],
            head: None,
            tail: None,
            slots: HashMap::with_capacity_and_hasher(capacity, fxhash::FxBuildHasher::default()),
            empties: (0..capacity).collect(),
            keys: vec![None; capacity],
        }
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.empties = (0..self.capacity).collect();
        self.keys.fill(None);
        self.nodes.fill(LruNode::default());
        self.head = None;
        self.tail = None;
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns the whole block stored for `key`, filling it with `f` on a miss.
    fn get_or_insert_with(&mut self, key: GlyphId, f: impl FnOnce() -> Vec<u8>) -> &[u8] {
        let slot = match self.slots.get(&key).copied() {
            Some(slot) => {
                self.detach(slot);
                self.attach_to_head(slot, key);
                slot
            }
            None => {
                let slot = self.take_slot();
                self.attach_to_head(slot, key);

                let coverage = f();
                let from = slot * self.block_size;
                let len = coverage.len().min(self.block_size);
                self.data[from..from + len].copy_from_slice(&coverage[..len]);
                slot
            }
        };

        let from = slot * self.block_size;
        &self.data[from..from + self.block_size]
    }

    /// Pops a free slot, evicting the least recently used entry when full.
    fn take_slot(&mut self) -> usize {
        if let Some(slot) = self.empties.pop() {
            return slot;
        }

        // capacity is non-zero, so a full atlas always has a tail
        let slot = self.tail.unwrap_or(0);
        self.detach(slot);
        if let Some(old_key) = self.keys[slot].take() {
            self.slots.remove(&old_key);
        }
        slot
    }

    fn attach_to_head(&mut self, slot: usize, key: GlyphId) {
        self.nodes[slot] = LruNode {
            newer: None,
            older: self.head,
        };
        if let Some(old_head) = self.head {
            self.nodes[old_head].newer = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }

        self.slots.insert(key, slot);
        self.keys[slot] = Some(key);
    }

    fn detach(&mut self, slot: usize) {
        let LruNode { newer, older } = self.nodes[slot];

        match newer {
            Some(newer) => self.nodes[newer].older = older,
            None => self.head = older,
        }
        match older {
            Some(older) => self.nodes[older].newer = newer,
            None => self.tail = newer,
        }

        self.nodes[slot] = LruNode::default();
    }
}

/// Rasterized coverage of one glyph.
pub struct GlyphCacheItem<'a> {
    pub metrics: fontdue::Metrics,
    /// Row-major coverage, `metrics.width * metrics.height` bytes.
    pub data: Cow<'a, [u8]>,
}

/// Coverage cache made of several [`VecAtlas`] buckets of increasing block size.
///
/// A glyph goes into the smallest bucket whose block fits its bitmap. Glyphs
/// bigger than every bucket are rasterized on each request.
pub struct GlyphCache {
    /// must be sorted by block size
    caches: Vec<VecAtlas>,
}

impl GlyphCache {
    /// `blocksize_capacity` lists `(block size in bytes, slot count)` pairs.
    pub fn new(blocksize_capacity: &[(NonZeroUsize, NonZeroUsize)]) -> Self {
        let mut sorted = blocksize_capacity.to_vec();
        sorted.sort_by_key(|(block_size, _)| *block_size);

        let caches = sorted
            .into_iter()
            .map(|(block_size, capacity)| VecAtlas::new(capacity, block_size))
            .collect();

        Self { caches }
    }

    pub fn clear(&mut self) {
        for cache in &mut self.caches {
            cache.clear();
        }
    }

    /// Number of glyphs currently cached across all buckets.
    pub fn len(&self) -> usize {
        self.caches.iter().map(VecAtlas::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the coverage of `glyph_id` rendered with `font`.
    ///
    /// Empty glyphs (spaces, control characters) yield `None`.
    pub fn get(&mut self, glyph_id: GlyphId, font: &fontdue::Font) -> Option<GlyphCacheItem<'_>> {
        let glyph_index = glyph_id.glyph_index();
        let font_size = glyph_id.font_size();

        let metrics = font.metrics_indexed(glyph_index, font_size);
        if metrics.width == 0 || metrics.height == 0 {
            return None;
        }
        let glyph_bitmap_size = metrics.width * metrics.height;

        let Some(cache) = self
            .caches
            .iter_mut()
            .find(|cache| cache.block_size >= glyph_bitmap_size)
        else {
            log::warn!(
                "glyph {glyph_index} at {font_size}px ({glyph_bitmap_size} bytes) exceeds every cache bucket"
            );
            let (metrics, coverage) = font.rasterize_indexed(glyph_index, font_size);
            return Some(GlyphCacheItem {
                metrics,
                data: Cow::Owned(coverage),
            });
        };

        let data = cache.get_or_insert_with(glyph_id, || {
            font.rasterize_indexed(glyph_index, font_size).1
        });

        Some(GlyphCacheItem {
            metrics,
            data: Cow::Borrowed(&data[..glyph_bitmap_size]),
        })
    }
}
