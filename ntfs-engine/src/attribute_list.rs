//! `$ATTRIBUTE_LIST` decoding (feeds the folding step of C6).
//!
//! Grounded on `formatters/src/ntfs/attribute_list.rs`'s entry layout
//! and `group_attributes_by_type`/`get_referenced_mft_records` helpers,
//! decoded with the safe `byteutil` readers and keeping the full
//! 64-bit base-record reference (sequence number included) so the
//! base-record self-reference check in C6 can actually catch a stale
//! reference rather than just an index collision.

use std::collections::BTreeMap;

use ntfs_core::{NtfsError, Result};

use crate::byteutil::{u16_at, u32_at, u64_at, u8_at, utf16le_to_string};
use crate::structures::FileReference;

#[derive(Debug, Clone)]
pub struct AttributeListEntry {
    pub attribute_type: u32,
    pub name: Option<String>,
    pub starting_vcn: u64,
    pub base_file_reference: FileReference,
    pub attribute_id: u16,
}

/// Parse a (resident or non-resident, already-assembled) `$ATTRIBUTE_LIST` body.
pub fn parse_attribute_list(data: &[u8]) -> Result<Vec<AttributeListEntry>> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while offset + 26 <= data.len() {
        let attribute_type = u32_at(data, offset)?;
        let record_length = u16_at(data, offset + 4)? as usize;
        if record_length == 0 {
            return Err(NtfsError::InconsistentAttributeList(
                "attribute-list entry has zero length".into(),
            ));
        }
        if offset + record_length > data.len() {
            return Err(NtfsError::InconsistentAttributeList(
                "attribute-list entry extends beyond buffer".into(),
            ));
        }

        let name_length = u8_at(data, offset + 6)? as usize;
        let name_offset = u8_at(data, offset + 7)? as usize;
        let starting_vcn = u64_at(data, offset + 8)?;
        let base_file_reference = FileReference::from(u64_at(data, offset + 16)?);
        let attribute_id = u16_at(data, offset + 24)?;

        let name = if name_length > 0 {
            let start = offset + name_offset;
            let end = start + name_length * 2;
            if end > data.len() {
                return Err(NtfsError::InconsistentAttributeList(
                    "attribute-list entry name extends beyond buffer".into(),
                ));
            }
            Some(utf16le_to_string(&data[start..end]))
        } else {
            None
        };

        entries.push(AttributeListEntry {
            attribute_type,
            name,
            starting_vcn,
            base_file_reference,
            attribute_id,
        });

        offset += record_length;
    }

    Ok(entries)
}

/// Collation order for folding: type, then name, then starting VCN.
pub fn sort_for_folding(entries: &mut [AttributeListEntry]) {
    entries.sort_by(|a, b| {
        a.attribute_type
            .cmp(&b.attribute_type)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.starting_vcn.cmp(&b.starting_vcn))
    });
}

/// Every distinct MFT record index referenced by the list (including the
/// base), in ascending order.
pub fn referenced_record_indices(entries: &[AttributeListEntry]) -> Vec<u64> {
    let mut indices: BTreeMap<u64, ()> = BTreeMap::new();
    for entry in entries {
        indices.insert(entry.base_file_reference.index(), ());
    }
    indices.into_keys().collect()
}
