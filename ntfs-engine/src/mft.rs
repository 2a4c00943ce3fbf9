//! MFT record parsing and attribute-list folding (C6).
//!
//! Grounded on `formatters/src/ntfs/mft.rs`'s `MftRecord::parse`/
//! `parse_attributes`, reworked around the safe attribute decoder and
//! generalised from "flat attribute chain" to the spec's full
//! base-record + N-extension-record fold (§4.3), which the teacher's
//! `MftRecord` never performs — it only exposes `get_attribute_list_entries`
//! and leaves the merge to the (incomplete) caller.

use std::collections::HashMap;

use ntfs_core::{NtfsError, Result};

use crate::attribute_list::{self, AttributeListEntry};
use crate::attributes::{parse_attribute, Attribute, AttributeBody, AttributeForm};
use crate::byteutil::{u16_at, u32_at, u64_at};
use crate::fixup::apply_fixup;
use crate::structures::{
    FileReference, ATTR_TYPE_ATTRIBUTE_LIST, MFT_RECORD_BAD_SIGNATURE, MFT_RECORD_IN_USE,
    MFT_RECORD_IS_DIRECTORY, MFT_RECORD_SIGNATURE,
};

/// A single MFT record, fixed up and attribute-chain-walked, but not
/// yet folded with any `$ATTRIBUTE_LIST` extension records.
#[derive(Debug, Clone)]
pub struct MftRecord {
    pub mft_record_number: u32,
    pub sequence_number: u16,
    pub link_count: u16,
    pub in_use: bool,
    pub is_directory: bool,
    pub base_file_reference: FileReference,
    pub next_attribute_id: u16,
    pub attributes: Vec<Attribute>,
}

/// Parse and fix up a single raw MFT record. Does not fold in
/// `$ATTRIBUTE_LIST` extensions; see [`fold`].
pub fn parse_raw_record(mut data: Vec<u8>, sector_size: u64) -> Result<MftRecord> {
    if data.len() < 48 {
        return Err(NtfsError::MalformedAttribute(
            "MFT record smaller than fixed header".into(),
        ));
    }

    let signature = data[0..4].to_vec();
    if signature == MFT_RECORD_BAD_SIGNATURE {
        return Err(NtfsError::FixupMismatch(
            "record carries \"BAAD\" signature".into(),
        ));
    }
    if signature != MFT_RECORD_SIGNATURE {
        return Err(NtfsError::MalformedAttribute(format!(
            "unrecognised MFT record signature {signature:?}"
        )));
    }

    let usa_offset = u16_at(&data, 4)?;
    let usa_count = u16_at(&data, 6)?;
    if usa_count > 0 {
        apply_fixup(&mut data, usa_offset, usa_count, sector_size as usize)?;
    }

    let sequence_number = u16_at(&data, 0x10)?;
    let link_count = u16_at(&data, 0x12)?;
    let attrs_offset = u16_at(&data, 0x14)? as usize;
    let flags = u16_at(&data, 0x16)?;
    let bytes_used = (u32_at(&data, 0x18)? as usize).min(data.len());
    let base_file_reference = FileReference::from(u64_at(&data, 0x20)?);
    let next_attribute_id = u16_at(&data, 0x28)?;
    let mft_record_number = u32_at(&data, 0x2C)?;

    let mut attributes = Vec::new();
    let mut offset = attrs_offset;
    while offset + 4 <= bytes_used {
        match parse_attribute(&data, offset)? {
            None => break,
            Some(attr) => {
                offset += attr.record_length as usize;
                attributes.push(attr);
            }
        }
    }

    Ok(MftRecord {
        mft_record_number,
        sequence_number,
        link_count,
        in_use: flags & MFT_RECORD_IN_USE != 0,
        is_directory: flags & MFT_RECORD_IS_DIRECTORY != 0,
        base_file_reference,
        next_attribute_id,
        attributes,
    })
}

/// A fully folded MFT entry: the base record's attributes plus anything
/// pulled in from `$ATTRIBUTE_LIST` extension records.
#[derive(Debug, Clone)]
pub struct MftEntry {
    pub index: u64,
    pub sequence_number: u16,
    pub link_count: u16,
    pub in_use: bool,
    pub is_directory: bool,
    pub attributes: Vec<Attribute>,
}

impl MftEntry {
    fn from_base(index: u64, base: MftRecord) -> Self {
        Self {
            index,
            sequence_number: base.sequence_number,
            link_count: base.link_count,
            in_use: base.in_use,
            is_directory: base.is_directory,
            attributes: base.attributes,
        }
    }

    pub fn attribute(&self, type_code: u32) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.type_code == type_code)
    }

    pub fn attributes_of(&self, type_code: u32) -> impl Iterator<Item = &Attribute> + Clone {
        self.attributes.iter().filter(move |a| a.type_code == type_code)
    }
}

/// Find the raw bytes of this record's own `$ATTRIBUTE_LIST` attribute,
/// if present. Resident bodies are returned directly; non-resident
/// bodies return `None` here and must be resolved by the caller (which
/// owns the byte reader) via [`fold`]'s `list_bytes` parameter.
pub fn attribute_list_is_resident(record: &MftRecord) -> Option<&[u8]> {
    record.attributes.iter().find_map(|a| {
        if a.type_code != ATTR_TYPE_ATTRIBUTE_LIST {
            return None;
        }
        match &a.form {
            AttributeForm::Resident(AttributeBody::Raw(bytes)) => Some(bytes.as_slice()),
            _ => None,
        }
    })
}

pub fn has_non_resident_attribute_list(record: &MftRecord) -> bool {
    record
        .attributes
        .iter()
        .any(|a| a.type_code == ATTR_TYPE_ATTRIBUTE_LIST && a.is_non_resident())
}

pub fn attribute_list_attribute(record: &MftRecord) -> Option<&Attribute> {
    record.attributes.iter().find(|a| a.type_code == ATTR_TYPE_ATTRIBUTE_LIST)
}

/// Fold a base record with its `$ATTRIBUTE_LIST` extensions (spec §4.3).
///
/// `list_bytes` is `None` when the base record carries no
/// `$ATTRIBUTE_LIST` attribute at all (the common case: one record is
/// the whole file). `read_extension` loads and fixes up any other MFT
/// record referenced by the list, by index.
pub fn fold(
    base_index: u64,
    base_record: MftRecord,
    list_bytes: Option<&[u8]>,
    mut read_extension: impl FnMut(u64) -> Result<MftRecord>,
) -> Result<MftEntry> {
    let list_bytes = match list_bytes {
        None => return Ok(MftEntry::from_base(base_index, base_record)),
        Some(bytes) => bytes,
    };

    let mut entries: Vec<AttributeListEntry> = attribute_list::parse_attribute_list(list_bytes)?;
    attribute_list::sort_for_folding(&mut entries);

    let mut folded = Vec::with_capacity(entries.len());
    let mut extension_cache: HashMap<u64, MftRecord> = HashMap::new();

    for entry in &entries {
        let record_index = entry.base_file_reference.index();

        let attr = if record_index == base_index {
            base_record
                .attributes
                .iter()
                .find(|a| a.attribute_id == entry.attribute_id)
        } else {
            if !extension_cache.contains_key(&record_index) {
                let ext = read_extension(record_index)?;
                if ext.base_file_reference.index() != base_index {
                    return Err(NtfsError::InconsistentAttributeList(format!(
                        "extension record {record_index} points back to {} instead of base {base_index}",
                        ext.base_file_reference.index()
                    )));
                }
                extension_cache.insert(record_index, ext);
            }
            extension_cache
                .get(&record_index)
                .unwrap()
                .attributes
                .iter()
                .find(|a| a.attribute_id == entry.attribute_id)
        };

        match attr {
            Some(attr) => folded.push(attr.clone()),
            None => {
                return Err(NtfsError::InconsistentAttributeList(format!(
                    "attribute-list entry (type 0x{:X}, id {}) not found in record {record_index}",
                    entry.attribute_type, entry.attribute_id
                )))
            }
        }
    }

    Ok(MftEntry {
        index: base_index,
        sequence_number: base_record.sequence_number,
        link_count: base_record.link_count,
        in_use: base_record.in_use,
        is_directory: base_record.is_directory,
        attributes: folded,
    })
}
