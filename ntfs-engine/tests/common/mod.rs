//! Byte-builder toolkit for the integration suite.
//!
//! Integration tests under `tests/` compile as a separate crate from
//! `ntfs-engine` and cannot see its `pub(crate)` unit-test helpers
//! (`crate::volume::tests::build_minimal_volume` and friends), so this
//! module re-derives the same kind of synthetic-image builders,
//! generalised to parameterized attribute IDs, multi-extent runlists,
//! and optional USA/USN fixup so the scenarios in `scenarios.rs` can
//! exercise C3 (fixup), C5 (data runs) and C6 (attribute-list folding)
//! directly instead of only the always-resident, always-fixup-free
//! shapes the library's own unit tests use.

#![allow(dead_code)]

pub const ATTR_TYPE_STANDARD_INFORMATION: u32 = 0x10;
pub const ATTR_TYPE_ATTRIBUTE_LIST: u32 = 0x20;
pub const ATTR_TYPE_FILE_NAME: u32 = 0x30;
pub const ATTR_TYPE_VOLUME_NAME: u32 = 0x60;
pub const ATTR_TYPE_DATA: u32 = 0x80;
pub const ATTR_TYPE_INDEX_ROOT: u32 = 0x90;
pub const ATTR_TYPE_INDEX_ALLOCATION: u32 = 0xA0;

pub const FILE_NAME_WIN32: u8 = 0x01;
pub const INDEX_ENTRY_NODE: u16 = 0x01;
pub const INDEX_ENTRY_END: u16 = 0x02;

const RESERVED_CLUSTERS: u64 = 4; // LCN 0-3 hold the boot sector and padding.

fn utf16le(name: &str) -> Vec<u8> {
    name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

/// A run-length/LCN-delta pair in a data-run list. `lcn: None` encodes a
/// sparse run (no offset field, per the data-runs header's `offset_size
/// == 0` convention).
#[derive(Clone, Copy)]
pub struct RunSpec {
    pub length: u64,
    pub lcn: Option<u64>,
}

/// Encode a data-run list, always using fixed 4-byte length/offset
/// fields regardless of magnitude — the decoder handles any byte width,
/// and fixed width keeps this encoder simple.
pub fn encode_runlist(runs: &[RunSpec]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut prev_lcn: i64 = 0;
    for run in runs {
        let length_bytes = (run.length as u32).to_le_bytes();
        match run.lcn {
            None => {
                out.push(0x04); // length_size=4, offset_size=0 (sparse)
                out.extend_from_slice(&length_bytes);
            }
            Some(lcn) => {
                let delta = lcn as i64 - prev_lcn;
                out.push(0x44); // length_size=4, offset_size=4
                out.extend_from_slice(&length_bytes);
                out.extend_from_slice(&(delta as i32).to_le_bytes());
                prev_lcn = lcn as i64;
            }
        }
    }
    out.push(0x00);
    out
}

/// Stamps a USA/USN fixup array into `block` in place: snapshots each
/// sector's trailing 2 bytes into the array, then overwrites them with
/// the USN, and writes `usa_offset`/`usa_count` into the header fields
/// at byte offsets 4/6 (shared by MFT records and `"INDX"` buffers).
pub fn protect_with_fixup(block: &mut [u8], usa_offset: usize, sector_size: usize) {
    let sectors = block.len() / sector_size;
    let usa_count = (sectors + 1) as u16;
    block[4..6].copy_from_slice(&(usa_offset as u16).to_le_bytes());
    block[6..8].copy_from_slice(&usa_count.to_le_bytes());

    let usn: [u8; 2] = [0x01, 0x00];
    let mut usa = vec![0u8; usa_count as usize * 2];
    usa[0] = usn[0];
    usa[1] = usn[1];
    for i in 0..sectors {
        let trailer = (i + 1) * sector_size - 2;
        usa[(i + 1) * 2] = block[trailer];
        usa[(i + 1) * 2 + 1] = block[trailer + 1];
        block[trailer] = usn[0];
        block[trailer + 1] = usn[1];
    }
    block[usa_offset..usa_offset + usa.len()].copy_from_slice(&usa);
}

/// Corrupts one sector's trailing 2 bytes so they no longer match the
/// stored USN, without touching the USA array — simulates a torn write
/// that [`crate::fixup::apply_fixup`] must reject.
pub fn corrupt_sector_trailer(block: &mut [u8], sector_index: usize, sector_size: usize) {
    let trailer = (sector_index + 1) * sector_size - 2;
    block[trailer] = block[trailer].wrapping_add(1);
}

/// Builds one MFT record. `attrs` is the concatenated bytes of every
/// attribute record; an `0xFFFFFFFF` end marker is appended
/// automatically. `usa_offset`, if non-zero, causes the record to be
/// protected with a real USA/USN fixup instead of `usa_count = 0`.
pub fn mft_record_bytes(
    record_size: usize,
    sector_size: usize,
    record_number: u32,
    in_use: bool,
    is_directory: bool,
    base_file_reference: u64,
    attrs: &[u8],
    with_fixup: bool,
) -> Vec<u8> {
    let mut data = vec![0u8; record_size];
    data[0..4].copy_from_slice(b"FILE");
    data[0x10..0x12].copy_from_slice(&1u16.to_le_bytes()); // sequence_number
    data[0x12..0x14].copy_from_slice(&1u16.to_le_bytes()); // link_count

    let mut flags = 0u16;
    if in_use {
        flags |= 0x0001;
    }
    if is_directory {
        flags |= 0x0002;
    }
    data[0x14..0x16].copy_from_slice(&56u16.to_le_bytes()); // attrs_offset
    data[0x16..0x18].copy_from_slice(&flags.to_le_bytes());
    data[0x20..0x28].copy_from_slice(&base_file_reference.to_le_bytes());
    data[0x28..0x2A].copy_from_slice(&1u16.to_le_bytes()); // next_attribute_id
    data[0x2C..0x30].copy_from_slice(&record_number.to_le_bytes());

    let mut body = attrs.to_vec();
    body.extend_from_slice(&0xFFFFFFFFu32.to_le_bytes());
    let bytes_used = 56 + body.len();
    assert!(bytes_used <= record_size, "attributes overflow the record");
    data[0x18..0x1C].copy_from_slice(&(bytes_used as u32).to_le_bytes());
    data[56..56 + body.len()].copy_from_slice(&body);

    if with_fixup {
        protect_with_fixup(&mut data, 0x30, sector_size);
    }
    data
}

/// A generic resident attribute: header + raw value bytes, with a
/// caller-chosen `attribute_id` (needed so `$ATTRIBUTE_LIST` entries can
/// address specific attributes across base/extension records).
pub fn resident_attr(type_code: u32, attribute_id: u16, name: Option<&str>, value: &[u8]) -> Vec<u8> {
    let name_bytes = name.map(utf16le).unwrap_or_default();
    const FIXED_HEADER_LEN: usize = 24;
    let name_offset = FIXED_HEADER_LEN;
    let value_offset = FIXED_HEADER_LEN + name_bytes.len();

    let mut attr = Vec::new();
    attr.extend_from_slice(&type_code.to_le_bytes());
    attr.extend_from_slice(&0u32.to_le_bytes()); // record_length, patched below
    attr.push(0); // resident
    attr.push((name_bytes.len() / 2) as u8);
    attr.extend_from_slice(&(name_offset as u16).to_le_bytes());
    attr.extend_from_slice(&0u16.to_le_bytes()); // flags
    attr.extend_from_slice(&attribute_id.to_le_bytes());
    attr.extend_from_slice(&(value.len() as u32).to_le_bytes()); // value_length
    attr.extend_from_slice(&(value_offset as u16).to_le_bytes());
    attr.push(0); // indexed flag
    attr.push(0); // padding
    attr.extend_from_slice(&name_bytes);
    attr.extend_from_slice(value);
    while attr.len() % 8 != 0 {
        attr.push(0);
    }
    let len = attr.len() as u32;
    attr[4..8].copy_from_slice(&len.to_le_bytes());
    attr
}

/// A generic non-resident attribute with an arbitrary multi-extent
/// runlist. `cluster_size` is needed to compute `allocated_size` as
/// `sum(run.length) * cluster_size`, per the spec's sizing invariant.
#[allow(clippy::too_many_arguments)]
pub fn non_resident_attr(
    type_code: u32,
    attribute_id: u16,
    name: Option<&str>,
    runs: &[RunSpec],
    cluster_size: u64,
    compression_unit: u16,
    data_size: u64,
    initialized_size: u64,
) -> Vec<u8> {
    let name_bytes = name.map(utf16le).unwrap_or_default();
    const FIXED_HEADER_LEN: usize = 64;
    let data_runs_offset = FIXED_HEADER_LEN + name_bytes.len();
    let runlist = encode_runlist(runs);
    let total_clusters: u64 = runs.iter().map(|r| r.length).sum();
    let allocated_size = total_clusters * cluster_size;
    let last_vcn = total_clusters.saturating_sub(1);

    let mut attr = Vec::new();
    attr.extend_from_slice(&type_code.to_le_bytes());
    attr.extend_from_slice(&0u32.to_le_bytes()); // record_length, patched below
    attr.push(1); // non-resident
    attr.push((name_bytes.len() / 2) as u8);
    attr.extend_from_slice(&(FIXED_HEADER_LEN as u16).to_le_bytes()); // name_offset
    attr.extend_from_slice(&0u16.to_le_bytes()); // flags
    attr.extend_from_slice(&attribute_id.to_le_bytes());
    attr.extend_from_slice(&0u64.to_le_bytes()); // first_vcn
    attr.extend_from_slice(&last_vcn.to_le_bytes());
    attr.extend_from_slice(&(data_runs_offset as u16).to_le_bytes());
    attr.extend_from_slice(&compression_unit.to_le_bytes());
    attr.extend_from_slice(&[0u8; 4]); // padding
    attr.extend_from_slice(&allocated_size.to_le_bytes());
    attr.extend_from_slice(&data_size.to_le_bytes());
    attr.extend_from_slice(&initialized_size.to_le_bytes());
    debug_assert_eq!(attr.len(), FIXED_HEADER_LEN);
    attr.extend_from_slice(&name_bytes);
    attr.extend_from_slice(&runlist);
    while attr.len() % 8 != 0 {
        attr.push(0);
    }
    let len = attr.len() as u32;
    attr[4..8].copy_from_slice(&len.to_le_bytes());
    attr
}

/// One `$ATTRIBUTE_LIST` entry (§4.3's folding key).
pub fn attribute_list_entry(
    attribute_type: u32,
    name: Option<&str>,
    starting_vcn: u64,
    base_file_reference: u64,
    attribute_id: u16,
) -> Vec<u8> {
    let name_bytes = name.map(utf16le).unwrap_or_default();
    const FIXED_LEN: usize = 26;
    let record_length = FIXED_LEN + name_bytes.len();
    let mut entry = vec![0u8; record_length];
    entry[0..4].copy_from_slice(&attribute_type.to_le_bytes());
    entry[4..6].copy_from_slice(&(record_length as u16).to_le_bytes());
    entry[6] = (name_bytes.len() / 2) as u8;
    entry[7] = FIXED_LEN as u8;
    entry[8..16].copy_from_slice(&starting_vcn.to_le_bytes());
    entry[16..24].copy_from_slice(&base_file_reference.to_le_bytes());
    entry[24..26].copy_from_slice(&attribute_id.to_le_bytes());
    entry[FIXED_LEN..].copy_from_slice(&name_bytes);
    entry
}

/// A `$FILE_NAME` value blob, embeddable both as an MFT `$FILE_NAME`
/// attribute's resident value and as an index entry's key.
pub fn file_name_value(parent: u64, name: &str, file_attributes: u32, data_size: u64) -> Vec<u8> {
    let mut value = vec![0u8; 66];
    value[0..8].copy_from_slice(&parent.to_le_bytes());
    value[40..48].copy_from_slice(&data_size.to_le_bytes()); // allocated_size
    value[48..56].copy_from_slice(&data_size.to_le_bytes());
    value[56..60].copy_from_slice(&file_attributes.to_le_bytes());
    let name_bytes = utf16le(name);
    value[64] = (name_bytes.len() / 2) as u8;
    value[65] = FILE_NAME_WIN32;
    value.extend_from_slice(&name_bytes);
    value
}

/// One index entry carrying a `$FILE_NAME` value key, optionally with a
/// subnode VCN (the trailing 8 bytes NTFS appends when `INDEX_ENTRY_NODE`
/// is set).
pub fn index_value_entry(mft_ref: u64, key: &[u8], child_vcn: Option<u64>) -> Vec<u8> {
    let base_len = 16 + key.len();
    let padded_key_len = (key.len() + 7) / 8 * 8;
    let entry_len = match child_vcn {
        Some(_) => 16 + padded_key_len + 8,
        None => base_len,
    };
    let mut flags = 0u16;
    if child_vcn.is_some() {
        flags |= INDEX_ENTRY_NODE;
    }
    let mut entry = vec![0u8; entry_len];
    entry[0..8].copy_from_slice(&mft_ref.to_le_bytes());
    entry[8..10].copy_from_slice(&(entry_len as u16).to_le_bytes());
    entry[10..12].copy_from_slice(&(key.len() as u16).to_le_bytes());
    entry[12..14].copy_from_slice(&flags.to_le_bytes());
    entry[16..16 + key.len()].copy_from_slice(key);
    if let Some(vcn) = child_vcn {
        let len = entry.len();
        entry[len - 8..].copy_from_slice(&vcn.to_le_bytes());
    }
    entry
}

/// The index's terminating entry, optionally with a subnode VCN (the
/// "everything greater" child).
pub fn index_end_entry(child_vcn: Option<u64>) -> Vec<u8> {
    let mut flags = INDEX_ENTRY_END;
    if child_vcn.is_some() {
        flags |= INDEX_ENTRY_NODE;
    }
    let entry_len = if child_vcn.is_some() { 24 } else { 16 };
    let mut entry = vec![0u8; entry_len];
    entry[8..10].copy_from_slice(&(entry_len as u16).to_le_bytes());
    entry[12..14].copy_from_slice(&flags.to_le_bytes());
    if let Some(vcn) = child_vcn {
        let len = entry.len();
        entry[len - 8..].copy_from_slice(&vcn.to_le_bytes());
    }
    entry
}

/// Wraps a flat, already-ordered blob of index entries as a resident
/// `$INDEX_ROOT` attribute's value.
pub fn index_root_value(attribute_type: u32, index_block_size: u32, entries_blob: &[u8]) -> Vec<u8> {
    let mut value = vec![0u8; 16];
    value[0..4].copy_from_slice(&attribute_type.to_le_bytes());
    value[4..8].copy_from_slice(&1u32.to_le_bytes()); // collation: COLLATION_FILE_NAME
    value[8..12].copy_from_slice(&index_block_size.to_le_bytes());
    const ENTRIES_OFFSET: u32 = 16;
    let index_length = ENTRIES_OFFSET + entries_blob.len() as u32;
    value.extend_from_slice(&ENTRIES_OFFSET.to_le_bytes());
    value.extend_from_slice(&index_length.to_le_bytes());
    value.extend_from_slice(&index_length.to_le_bytes()); // allocated_size
    value.extend_from_slice(&0u32.to_le_bytes()); // flags
    value.extend_from_slice(entries_blob);
    value
}

/// One `"INDX"` buffer (an `$INDEX_ALLOCATION` block), fixed up with a
/// real USA/USN round trip so the multi-buffer scenarios exercise C3
/// the same way a real directory would.
pub fn indx_buffer_bytes(vcn: u64, entries_blob: &[u8], block_size: usize, sector_size: usize) -> Vec<u8> {
    let mut data = vec![0u8; block_size];
    data[0..4].copy_from_slice(b"INDX");
    data[0x10..0x18].copy_from_slice(&vcn.to_le_bytes());

    const HEADER_START: usize = 24;
    let usa_offset = HEADER_START + 16; // right after the 16-byte IndexHeader
    let sectors = block_size / sector_size;
    let usa_len = (sectors + 1) * 2;
    let entries_offset = (usa_offset + usa_len) - HEADER_START;
    let index_length = entries_offset + entries_blob.len();

    data[HEADER_START..HEADER_START + 4].copy_from_slice(&(entries_offset as u32).to_le_bytes());
    data[HEADER_START + 4..HEADER_START + 8].copy_from_slice(&(index_length as u32).to_le_bytes());
    data[HEADER_START + 8..HEADER_START + 12].copy_from_slice(&(index_length as u32).to_le_bytes());

    let entries_start = HEADER_START + entries_offset;
    data[entries_start..entries_start + entries_blob.len()].copy_from_slice(entries_blob);

    protect_with_fixup(&mut data, usa_offset, sector_size);
    data
}

/// Accumulates whole clusters and stitches them behind a boot sector
/// into one flat image, the same layout `volume::tests::ImageBuilder`
/// uses: LCN 0-3 reserved for the boot sector, pushed clusters start at
/// LCN 4.
pub struct ImageBuilder {
    pub cluster_size: u32,
    clusters: Vec<Vec<u8>>,
}

impl ImageBuilder {
    pub fn new(cluster_size: u32) -> Self {
        Self { cluster_size, clusters: Vec::new() }
    }

    /// Appends `data` (padded/truncated to a whole number of clusters)
    /// and returns the LCN of its first cluster.
    pub fn push_clusters(&mut self, mut data: Vec<u8>) -> u64 {
        let cluster_size = self.cluster_size as usize;
        let padded = ((data.len() + cluster_size - 1) / cluster_size) * cluster_size;
        data.resize(padded, 0);
        let start_lcn = RESERVED_CLUSTERS + self.clusters.len() as u64;
        for chunk in data.chunks(cluster_size) {
            self.clusters.push(chunk.to_vec());
        }
        start_lcn
    }

    /// Lays out the 16 reserved MFT records (filling any index the
    /// caller didn't supply with an empty, in-use, non-directory
    /// record) as one contiguous run, pushes it as the first cluster
    /// range, and returns the builder plus that run's starting LCN —
    /// the same fixed-size-record layout
    /// `volume::tests::build_minimal_volume` uses, generalised to a
    /// caller-supplied record set. `extra_records` are appended
    /// immediately after record 15 (e.g. ordinary file/directory
    /// records living past the reserved range).
    pub fn with_mft(
        cluster_size: u32,
        record_size: u32,
        mut records: std::collections::BTreeMap<u32, Vec<u8>>,
        extra_records: Vec<Vec<u8>>,
        sector_size: usize,
    ) -> (Self, u64) {
        const RESERVED_COUNT: u32 = 16;
        for n in 0..RESERVED_COUNT {
            records
                .entry(n)
                .or_insert_with(|| mft_record_bytes(record_size as usize, sector_size, n, true, false, 0, &[], false));
        }
        let mut all_records: Vec<Vec<u8>> = (0..RESERVED_COUNT).map(|n| records.remove(&n).unwrap()).collect();
        all_records.extend(extra_records);

        let mut mft_data = Vec::new();
        for record in &all_records {
            mft_data.extend_from_slice(record);
        }

        let mut builder = Self::new(cluster_size);
        let mft_lcn = builder.push_clusters(mft_data);
        (builder, mft_lcn)
    }

    pub fn finish(self, mft_lcn: u64, mft_record_size: u32) -> Vec<u8> {
        let mut data = vec![0u8; RESERVED_CLUSTERS as usize * self.cluster_size as usize];
        let mut boot = vec![0u8; 512];
        boot[3..11].copy_from_slice(b"NTFS    ");
        boot[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
        boot[0x0D] = (self.cluster_size / 512) as u8;
        boot[0x28..0x30].copy_from_slice(&100_000u64.to_le_bytes());
        boot[0x30..0x38].copy_from_slice(&mft_lcn.to_le_bytes());
        assert_eq!(
            mft_record_size % self.cluster_size,
            0,
            "test images keep the MFT record size a whole multiple of the cluster size"
        );
        boot[0x40] = (mft_record_size / self.cluster_size) as u8; // clusters per MFT record
        boot[0x44] = 1; // clusters per index buffer
        boot[0x48..0x50].copy_from_slice(&0x1234u64.to_le_bytes());
        boot[0x1FE] = 0x55;
        boot[0x1FF] = 0xAA;
        data[..512].copy_from_slice(&boot);

        for cluster in self.clusters {
            data.extend_from_slice(&cluster);
        }
        data
    }
}
