//! MFT vector + LRU cache (C8).
//!
//! Grounded on `formatters/src/ntfs/reader.rs::NtfsReader::initialize_mft`
//! for the two-phase bootstrap (read record 0 directly, then derive the
//! vector from its own `$DATA` runlist) and on
//! `original_source/libfsntfs/libfsntfs_volume.c`'s
//! `libfsntfs_volume_open_read` for the cache-capacity convention: the
//! upstream `#else` branch sizes the cache to the vector's element
//! count, while a disabled `#ifdef TODO` branch wants a small fixed
//! cap. `CacheConfig` exposes both as explicit constructors rather than
//! a compile-time choice.
//!
//! Unlike the teacher's `mft_cache: HashMap` in `NtfsReader` (which
//! fills up and never evicts despite a `max_cache_sectors` comment
//! suggesting otherwise), this is a real LRU: once at capacity, the
//! least-recently-touched entry is dropped to make room.

use std::collections::{HashMap, VecDeque};

use ntfs_core::{ByteReader, NtfsError, Result};

use crate::cluster_stream::ClusterStream;
use crate::data_runs::Extent;
use crate::mft::MftEntry;

/// Default bounded capacity suggested by spec §9, used when the caller
/// doesn't need every record resident at once.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    capacity: usize,
}

impl CacheConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity: capacity.max(1) }
    }

    pub fn default_bounded() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Mirrors the upstream `#else` branch: capacity equal to the total
    /// number of elements in the vector, so nothing is ever evicted.
    pub fn unbounded_for(entry_count: u64) -> Self {
        Self::with_capacity(entry_count.max(1) as usize)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Maps MFT record indices to their byte offset on the volume, backed
/// by MFT record 0's own `$DATA` runlist.
#[derive(Debug, Clone)]
pub struct MftVector {
    extents: Vec<Extent>,
    record_size: u32,
    cluster_size: u32,
    entry_count: u64,
}

impl MftVector {
    pub fn new(extents: Vec<Extent>, record_size: u32, cluster_size: u32) -> Result<Self> {
        if record_size == 0 || cluster_size == 0 {
            return Err(NtfsError::InvalidArgument(
                "record size and cluster size must be non-zero".into(),
            ));
        }
        let total_bytes: u64 = extents.iter().map(|e| e.length * cluster_size as u64).sum();
        let entry_count = total_bytes / record_size as u64;
        Ok(Self {
            extents,
            record_size,
            cluster_size,
            entry_count,
        })
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn record_size(&self) -> u32 {
        self.record_size
    }

    /// Read the raw (not-yet-fixed-up) bytes of MFT record `index`.
    pub fn read_record_bytes(&self, reader: &dyn ByteReader, index: u64) -> Result<Vec<u8>> {
        if index >= self.entry_count {
            return Err(NtfsError::NotFound(format!(
                "MFT index {index} exceeds vector length {}",
                self.entry_count
            )));
        }
        let total_len = self.entry_count * self.record_size as u64;
        let stream = ClusterStream::new(
            reader,
            self.extents.clone(),
            self.cluster_size as u64,
            total_len,
            total_len,
            0,
        );
        let mut buf = vec![0u8; self.record_size as usize];
        let logical_offset = index * self.record_size as u64;
        let n = stream.read_at(logical_offset, &mut buf)?;
        if n != buf.len() {
            return Err(NtfsError::OutOfBounds(format!(
                "short read for MFT record {index}"
            )));
        }
        Ok(buf)
    }
}

/// LRU cache of folded [`MftEntry`] values, keyed by MFT index.
pub struct MftCache {
    config: CacheConfig,
    entries: HashMap<u64, MftEntry>,
    recency: VecDeque<u64>,
}

impl MftCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, index: u64) -> bool {
        self.entries.contains_key(&index)
    }

    /// Fetch `index`, loading it with `loader` on a miss. A corrupt
    /// record's error is returned without being cached or poisoning
    /// other entries (spec §7).
    pub fn get_or_load(
        &mut self,
        index: u64,
        loader: impl FnOnce() -> Result<MftEntry>,
    ) -> Result<&MftEntry> {
        if self.entries.contains_key(&index) {
            self.touch(index);
        } else {
            let entry = loader()?;
            self.insert(index, entry);
        }
        Ok(self.entries.get(&index).expect("just inserted or touched"))
    }

    fn touch(&mut self, index: u64) {
        if let Some(pos) = self.recency.iter().position(|&i| i == index) {
            self.recency.remove(pos);
        }
        self.recency.push_front(index);
    }

    fn insert(&mut self, index: u64, entry: MftEntry) {
        if self.entries.len() >= self.config.capacity {
            if let Some(evicted) = self.recency.pop_back() {
                self.entries.remove(&evicted);
            }
        }
        self.entries.insert(index, entry);
        self.recency.push_front(index);
    }
}
