//! Volume orchestration: open/bootstrap, system-record validation, and
//! the public façade tying C2–C10 together.
//!
//! Grounded on `formatters/src/ntfs/reader.rs::NtfsReader::new`/
//! `initialize_mft` for the two-phase bootstrap (boot sector, then MFT
//! record 0's own `$DATA` runlist), generalised from the teacher's
//! "direct record reads only, subdirectories unimplemented" reader into
//! full path resolution and directory enumeration via C9/C10. The
//! single-lock-plus-abort-flag concurrency model is grounded on
//! `libfsntfs_volume_signal_abort` in `original_source` (spec §5).

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Mutex;

use ntfs_core::{ByteReader, NtfsError, Result};

use crate::attributes::{AttributeBody, AttributeForm};
use crate::boot_sector::BootParameters;
use crate::cache::{CacheConfig, MftCache, MftVector};
use crate::cluster_stream::ClusterStream;
use crate::collation::UpCaseTable;
use crate::fixup::apply_fixup;
use crate::index::{self, DirectoryEntry, IndexBuffer, IndexRoot};
use crate::mft::{self, MftEntry, MftRecord};
use crate::path_resolver::{self, DirectoryLookup};
use crate::structures::{
    FileReference, ATTR_TYPE_DATA, ATTR_TYPE_INDEX_ALLOCATION, ATTR_TYPE_INDEX_ROOT,
    ATTR_TYPE_VOLUME_NAME, MFT_RECORD_BITMAP, MFT_RECORD_ROOT, MFT_RECORD_UPCASE, MFT_RECORD_VOLUME,
};

struct VolumeInner {
    reader: Box<dyn ByteReader>,
    boot: BootParameters,
    mft_vector: MftVector,
    cache: MftCache,
    upcase: UpCaseTable,
}

impl VolumeInner {
    fn read_raw_mft_record(&self, index: u64) -> Result<MftRecord> {
        let bytes = self.mft_vector.read_record_bytes(self.reader.as_ref(), index)?;
        mft::parse_raw_record(bytes, self.boot.bytes_per_sector as u64)
    }

    /// Read and parse MFT record `index`, folding in any `$ATTRIBUTE_LIST`
    /// extensions, without touching the cache.
    fn build_folded_entry(&self, index: u64) -> Result<MftEntry> {
        let base_record = self.read_raw_mft_record(index)?;

        if let Some(bytes) = mft::attribute_list_is_resident(&base_record) {
            let bytes = bytes.to_vec();
            return mft::fold(index, base_record, Some(&bytes), |ext| {
                self.read_raw_mft_record(ext)
            });
        }

        if mft::has_non_resident_attribute_list(&base_record) {
            let attr = mft::attribute_list_attribute(&base_record)
                .expect("has_non_resident_attribute_list just confirmed presence");
            let info = attr.non_resident_info().ok_or_else(|| {
                NtfsError::MalformedAttribute("$ATTRIBUTE_LIST flagged non-resident but has no runlist".into())
            })?;
            let stream = ClusterStream::new(
                self.reader.as_ref(),
                info.extents.clone(),
                self.boot.cluster_size() as u64,
                info.data_size,
                info.initialized_size,
                info.compression_unit,
            );
            let mut bytes = vec![0u8; info.data_size as usize];
            stream.read_at(0, &mut bytes)?;
            return mft::fold(index, base_record, Some(&bytes), |ext| {
                self.read_raw_mft_record(ext)
            });
        }

        mft::fold(index, base_record, None, |_| {
            unreachable!("no attribute list present, extension reader should not run")
        })
    }

    fn read_folded_entry(&mut self, index: u64) -> Result<MftEntry> {
        if self.cache.contains(index) {
            return self
                .cache
                .get_or_load(index, || unreachable!())
                .map(|e| e.clone());
        }
        let entry = self.build_folded_entry(index)?;
        self.cache
            .get_or_load(index, || Ok(entry))
            .map(|e| e.clone())
    }

    /// Read the full content of an entry's unnamed `$DATA` attribute.
    fn read_unnamed_data(&self, entry: &MftEntry) -> Result<Vec<u8>> {
        let attr = entry
            .attributes
            .iter()
            .find(|a| a.type_code == ATTR_TYPE_DATA && a.name.is_none())
            .ok_or_else(|| NtfsError::NotFound("no unnamed $DATA attribute".into()))?;

        match &attr.form {
            AttributeForm::Resident(AttributeBody::Data(bytes)) => Ok(bytes.clone()),
            AttributeForm::Resident(_) => Err(NtfsError::MalformedAttribute(
                "$DATA attribute decoded to an unexpected body".into(),
            )),
            AttributeForm::NonResident(info) => {
                let stream = ClusterStream::new(
                    self.reader.as_ref(),
                    info.extents.clone(),
                    self.boot.cluster_size() as u64,
                    info.data_size,
                    info.initialized_size,
                    info.compression_unit,
                );
                let mut bytes = vec![0u8; info.data_size as usize];
                stream.read_at(0, &mut bytes)?;
                Ok(bytes)
            }
        }
    }

    fn index_root_of(&self, entry: &MftEntry) -> Result<IndexRoot> {
        let attr = entry
            .attributes
            .iter()
            .find(|a| a.type_code == ATTR_TYPE_INDEX_ROOT)
            .ok_or_else(|| NtfsError::NotFound("directory has no $INDEX_ROOT".into()))?;
        match &attr.form {
            AttributeForm::Resident(AttributeBody::IndexRoot(bytes)) => index::parse_index_root(bytes),
            _ => Err(NtfsError::MalformedAttribute(
                "$INDEX_ROOT is not resident".into(),
            )),
        }
    }

    /// Load one `"INDX"` buffer at logical VCN `vcn` (cluster-granular,
    /// per NTFS convention regardless of `index_block_size`).
    fn load_index_buffer(&self, entry: &MftEntry, vcn: u64) -> Result<IndexBuffer> {
        let attr = entry
            .attributes
            .iter()
            .find(|a| a.type_code == ATTR_TYPE_INDEX_ALLOCATION)
            .ok_or_else(|| {
                NtfsError::MalformedAttribute(
                    "directory node references a subnode but has no $INDEX_ALLOCATION".into(),
                )
            })?;
        let info = attr.non_resident_info().ok_or_else(|| {
            NtfsError::MalformedAttribute("$INDEX_ALLOCATION is resident".into())
        })?;
        let root = self.index_root_of(entry)?;

        let stream = ClusterStream::new(
            self.reader.as_ref(),
            info.extents.clone(),
            self.boot.cluster_size() as u64,
            info.data_size,
            info.initialized_size,
            info.compression_unit,
        );
        let block_size = root.index_block_size as usize;
        let byte_offset = vcn * self.boot.cluster_size() as u64;
        let mut buf = vec![0u8; block_size];
        stream.read_at(byte_offset, &mut buf)?;
        index::parse_index_buffer(buf, self.boot.bytes_per_sector as usize)
    }
}

/// A read-only, opened NTFS volume. Internally single-threaded: every
/// access takes the same lock, and `signal_abort` can be called from any
/// thread to make the next lock-holding operation return `Aborted`
/// (spec §5 — cooperative, not preemptive).
pub struct Volume {
    inner: Mutex<VolumeInner>,
    abort: AtomicBool,
}

impl Volume {
    /// Open a volume image, bootstrapping the MFT vector and validating
    /// the well-known system records (spec's control-flow summary).
    pub fn open(reader: Box<dyn ByteReader>) -> Result<Self> {
        Self::open_with_cache(reader, CacheConfig::default_bounded())
    }

    pub fn open_with_cache(reader: Box<dyn ByteReader>, cache_config: CacheConfig) -> Result<Self> {
        let boot_bytes = reader.read_at(0, 512)?;
        let boot = BootParameters::parse(&boot_bytes)?;

        let mut mft_record_0_bytes = reader.read_at(boot.mft_offset(), boot.mft_record_size as usize)?;
        let usa_offset = crate::byteutil::u16_at(&mft_record_0_bytes, 4)?;
        let usa_count = crate::byteutil::u16_at(&mft_record_0_bytes, 6)?;
        if usa_count > 0 {
            apply_fixup(
                &mut mft_record_0_bytes,
                usa_offset,
                usa_count,
                boot.bytes_per_sector as usize,
            )?;
        }
        let mft_record_0 = mft::parse_raw_record(mft_record_0_bytes, boot.bytes_per_sector as u64)?;
        if !mft_record_0.in_use {
            return Err(NtfsError::MalformedAttribute(
                "MFT record 0 is not marked in-use".into(),
            ));
        }
        let data_attr = mft_record_0
            .attributes
            .iter()
            .find(|a| a.type_code == ATTR_TYPE_DATA)
            .ok_or_else(|| NtfsError::MalformedAttribute("MFT record 0 has no $DATA attribute".into()))?;
        let mft_info = data_attr.non_resident_info().ok_or_else(|| {
            NtfsError::MalformedAttribute("$MFT's own $DATA attribute is resident".into())
        })?;

        let mft_vector = MftVector::new(mft_info.extents.clone(), boot.mft_record_size, boot.cluster_size())?;

        let mut inner = VolumeInner {
            reader,
            boot,
            mft_vector,
            cache: MftCache::new(cache_config),
            upcase: UpCaseTable::unavailable(),
        };

        // Validate the well-known system records exist and parse cleanly.
        let volume_entry = inner.read_folded_entry(MFT_RECORD_VOLUME)?;
        let _ = volume_entry;
        let root_entry = inner.read_folded_entry(MFT_RECORD_ROOT)?;
        if !root_entry.is_directory {
            return Err(NtfsError::MalformedAttribute(
                "root MFT record is not flagged as a directory".into(),
            ));
        }
        let bitmap_entry = inner.read_folded_entry(MFT_RECORD_BITMAP)?;
        let _ = inner.read_unnamed_data(&bitmap_entry)?; // read and discard, per spec

        let upcase_entry = inner.read_folded_entry(MFT_RECORD_UPCASE)?;
        match inner.read_unnamed_data(&upcase_entry) {
            Ok(bytes) => inner.upcase = UpCaseTable::from_bytes(&bytes),
            Err(_) => inner.upcase = UpCaseTable::unavailable(),
        }

        Ok(Self {
            inner: Mutex::new(inner),
            abort: AtomicBool::new(false),
        })
    }

    /// Request that the next lock-acquiring operation abort.
    pub fn signal_abort(&self) {
        self.abort.store(true, AtomicOrdering::SeqCst);
    }

    fn check_abort(&self) -> Result<()> {
        if self.abort.load(AtomicOrdering::SeqCst) {
            return Err(NtfsError::Aborted);
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VolumeInner>> {
        self.check_abort()?;
        self.inner
            .lock()
            .map_err(|_| NtfsError::Internal("volume lock poisoned".into()))
    }

    pub fn root_reference(&self) -> FileReference {
        FileReference::new(MFT_RECORD_ROOT, 0)
    }

    /// The volume label from `$Volume`'s (MFT index 3) `$VOLUME_NAME`
    /// attribute, or `None` if the attribute is absent (a legally empty
    /// label, not an error).
    pub fn volume_name(&self) -> Result<Option<String>> {
        let mut inner = self.lock()?;
        let entry = inner.read_folded_entry(MFT_RECORD_VOLUME)?;
        Ok(entry.attributes.iter().find_map(|a| match &a.form {
            AttributeForm::Resident(AttributeBody::VolumeName(name)) if a.type_code == ATTR_TYPE_VOLUME_NAME => {
                Some(name.clone())
            }
            _ => None,
        }))
    }

    /// Fetch a fully-folded entry by MFT index, through the cache.
    pub fn entry(&self, reference: FileReference) -> Result<MftEntry> {
        let mut inner = self.lock()?;
        inner.read_folded_entry(reference.index())
    }

    pub fn resolve_path(&self, path: &str) -> Result<Option<FileReference>> {
        let root = self.root_reference();
        let mut lookup = VolumeDirLookup { volume: self };
        path_resolver::resolve_path(path, root, &mut lookup)
    }

    pub fn enumerate_directory(&self, reference: FileReference) -> Result<Vec<DirectoryEntry>> {
        let mut inner = self.lock()?;
        let entry = inner.read_folded_entry(reference.index())?;
        if !entry.is_directory {
            return Err(NtfsError::InvalidArgument(format!(
                "MFT index {} is not a directory",
                reference.index()
            )));
        }
        let root = inner.index_root_of(&entry)?;
        index::enumerate(&root, |vcn| inner.load_index_buffer(&entry, vcn))
    }

    /// Read up to `buf.len()` bytes of `reference`'s unnamed `$DATA`
    /// attribute starting at `offset`.
    pub fn read_at(&self, reference: FileReference, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.lock()?;
        let entry = inner.read_folded_entry(reference.index())?;
        let attr = entry
            .attributes
            .iter()
            .find(|a| a.type_code == ATTR_TYPE_DATA && a.name.is_none())
            .ok_or_else(|| NtfsError::NotFound("no unnamed $DATA attribute".into()))?;

        match &attr.form {
            AttributeForm::Resident(AttributeBody::Data(bytes)) => {
                if offset >= bytes.len() as u64 {
                    return Ok(0);
                }
                let start = offset as usize;
                let n = buf.len().min(bytes.len() - start);
                buf[..n].copy_from_slice(&bytes[start..start + n]);
                Ok(n)
            }
            AttributeForm::Resident(_) => Err(NtfsError::MalformedAttribute(
                "$DATA attribute decoded to an unexpected body".into(),
            )),
            AttributeForm::NonResident(info) => {
                let stream = ClusterStream::new(
                    inner.reader.as_ref(),
                    info.extents.clone(),
                    inner.boot.cluster_size() as u64,
                    info.data_size,
                    info.initialized_size,
                    info.compression_unit,
                );
                stream.read_at(offset, buf)
            }
        }
    }

    pub fn attribute_list_names(&self, reference: FileReference) -> Result<Vec<Option<String>>> {
        let mut inner = self.lock()?;
        let entry = inner.read_folded_entry(reference.index())?;
        Ok(entry
            .attributes
            .iter()
            .filter(|a| a.type_code == ATTR_TYPE_DATA)
            .map(|a| a.name.clone())
            .collect())
    }

    pub fn is_directory(&self, reference: FileReference) -> Result<bool> {
        let mut inner = self.lock()?;
        Ok(inner.read_folded_entry(reference.index())?.is_directory)
    }

    /// Look up one name under `directory` via C9's B+-tree lookup,
    /// without resolving a full path. Used by [`crate::file_entry`] for
    /// by-name sub-entry access.
    pub fn lookup_child(&self, directory: FileReference, name: &str) -> Result<Option<FileReference>> {
        let mut inner = self.lock()?;
        let entry = inner.read_folded_entry(directory.index())?;
        let root = inner.index_root_of(&entry)?;
        index::lookup(&root, &inner.upcase, name, |vcn| inner.load_index_buffer(&entry, vcn))
    }
}

/// Adapts a [`Volume`] to the [`DirectoryLookup`] trait path resolution
/// needs, resolving each segment via C9's B+-tree lookup.
struct VolumeDirLookup<'v> {
    volume: &'v Volume,
}

impl DirectoryLookup for VolumeDirLookup<'_> {
    fn is_directory(&mut self, index: u64) -> Result<bool> {
        self.volume.is_directory(FileReference::new(index, 0))
    }

    fn lookup_child(&mut self, directory_index: u64, name: &str) -> Result<Option<FileReference>> {
        self.volume.lookup_child(FileReference::new(directory_index, 0), name)
    }
}
