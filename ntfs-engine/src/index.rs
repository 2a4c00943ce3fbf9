//! `$INDEX_ROOT` / `$INDEX_ALLOCATION` B+-tree walker (C9).
//!
//! Grounded on `filesystems/src/families/ntfs/ntfs/index.rs`'s
//! `IndexHeader`/`IndexRoot`/`IndexEntryHeader` layouts, generalised
//! from a flat "scan one buffer, bail on first end marker" reader into
//! the spec's recursive in-order traversal and binary-descent lookup
//! over VCN-addressed children, with per-buffer `"INDX"` fixup via C3.

use std::cmp::Ordering;

use ntfs_core::{NtfsError, Result};

use crate::attributes::{self, FileNameAttrBody};
use crate::byteutil::{u16_at, u32_at, u64_at};
use crate::collation::UpCaseTable;
use crate::fixup::apply_fixup;
use crate::structures::{
    FileReference, FILE_ATTRIBUTE_DIRECTORY, INDEX_BUFFER_SIGNATURE, INDEX_ENTRY_END,
    INDEX_ENTRY_NODE,
};

#[derive(Debug, Clone)]
pub struct IndexNodeEntry {
    pub file_reference: Option<FileReference>,
    pub key: Option<FileNameAttrBody>,
    pub child_vcn: Option<u64>,
}

impl IndexNodeEntry {
    fn is_value(&self) -> bool {
        self.file_reference.is_some() && self.key.is_some()
    }
}

/// Parse the flat, already-collation-ordered stream of index entries
/// that follows an `IndexHeader` (in `$INDEX_ROOT` or one `"INDX"` buffer).
fn parse_index_entries(data: &[u8]) -> Result<Vec<IndexNodeEntry>> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while offset + 16 <= data.len() {
        let mft_reference = u64_at(data, offset)?;
        let entry_length = u16_at(data, offset + 8)? as usize;
        let key_length = u16_at(data, offset + 10)? as usize;
        let flags = u16_at(data, offset + 12)?;

        if entry_length < 16 || offset + entry_length > data.len() {
            return Err(NtfsError::MalformedAttribute(format!(
                "index entry at {offset} has invalid length {entry_length}"
            )));
        }

        let is_end = flags & INDEX_ENTRY_END != 0;
        let has_subnode = flags & INDEX_ENTRY_NODE != 0;

        let child_vcn = if has_subnode {
            let vcn_offset = offset + entry_length - 8;
            Some(u64_at(data, vcn_offset)?)
        } else {
            None
        };

        let (file_reference, key) = if is_end {
            (None, None)
        } else {
            let key_start = offset + 16;
            let key_end = key_start + key_length;
            if key_end > data.len() {
                return Err(NtfsError::MalformedAttribute(
                    "index entry key extends beyond node".into(),
                ));
            }
            let key = attributes::parse_file_name(&data[key_start..key_end])?;
            (Some(FileReference::from(mft_reference)), Some(key))
        };

        entries.push(IndexNodeEntry {
            file_reference,
            key,
            child_vcn,
        });

        if is_end {
            break;
        }
        offset += entry_length;
    }

    Ok(entries)
}

#[derive(Debug, Clone)]
pub struct IndexRoot {
    pub attribute_type: u32,
    pub collation_rule: u32,
    pub index_block_size: u32,
    pub entries: Vec<IndexNodeEntry>,
}

/// `$INDEX_ROOT` is 16 bytes of root fields followed by an `IndexHeader`.
pub fn parse_index_root(data: &[u8]) -> Result<IndexRoot> {
    if data.len() < 32 {
        return Err(NtfsError::MalformedAttribute(
            "$INDEX_ROOT smaller than fixed header".into(),
        ));
    }
    let attribute_type = u32_at(data, 0)?;
    let collation_rule = u32_at(data, 4)?;
    let index_block_size = u32_at(data, 8)?;

    const HEADER_START: usize = 16;
    let entries_offset = u32_at(data, HEADER_START)? as usize;
    let index_length = u32_at(data, HEADER_START + 4)? as usize;

    let start = HEADER_START + entries_offset;
    let end = HEADER_START + index_length;
    let slice = data
        .get(start..end)
        .ok_or_else(|| NtfsError::MalformedAttribute("$INDEX_ROOT entries out of bounds".into()))?;

    Ok(IndexRoot {
        attribute_type,
        collation_rule,
        index_block_size,
        entries: parse_index_entries(slice)?,
    })
}

#[derive(Debug, Clone)]
pub struct IndexBuffer {
    pub vcn: u64,
    pub entries: Vec<IndexNodeEntry>,
}

/// Parse and fix up one fixed-size `"INDX"` index buffer.
pub fn parse_index_buffer(mut data: Vec<u8>, sector_size: usize) -> Result<IndexBuffer> {
    if data.len() < 24 || &data[0..4] != INDEX_BUFFER_SIGNATURE {
        return Err(NtfsError::MalformedAttribute(
            "index buffer missing \"INDX\" signature".into(),
        ));
    }
    let usa_offset = u16_at(&data, 4)?;
    let usa_count = u16_at(&data, 6)?;
    if usa_count > 0 {
        apply_fixup(&mut data, usa_offset, usa_count, sector_size)?;
    }
    let vcn = u64_at(&data, 0x10)?;

    const HEADER_START: usize = 24;
    let entries_offset = u32_at(&data, HEADER_START)? as usize;
    let index_length = u32_at(&data, HEADER_START + 4)? as usize;

    let start = HEADER_START + entries_offset;
    let end = HEADER_START + index_length;
    let slice = data
        .get(start..end)
        .ok_or_else(|| NtfsError::MalformedAttribute("index buffer entries out of bounds".into()))?;

    Ok(IndexBuffer {
        vcn,
        entries: parse_index_entries(slice)?,
    })
}

#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub file_reference: FileReference,
    pub name: String,
    pub is_directory: bool,
    pub allocated_size: u64,
    pub data_size: u64,
    pub file_attributes: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub mft_modification_time: u64,
    pub access_time: u64,
}

impl From<&FileNameAttrBody> for DirectoryEntry {
    fn from(key: &FileNameAttrBody) -> Self {
        Self {
            file_reference: FileReference(0), // overwritten by caller with the entry's own reference
            name: key.name.clone(),
            is_directory: key.file_attributes & FILE_ATTRIBUTE_DIRECTORY != 0,
            allocated_size: key.allocated_size,
            data_size: key.data_size,
            file_attributes: key.file_attributes,
            creation_time: key.creation_time,
            modification_time: key.modification_time,
            mft_modification_time: key.mft_modification_time,
            access_time: key.access_time,
        }
    }
}

/// In-order traversal yielding every WIN32/POSIX/WIN32&DOS-namespace
/// entry in collation order (spec §4.6).
pub fn enumerate(
    root: &IndexRoot,
    mut load_buffer: impl FnMut(u64) -> Result<IndexBuffer>,
) -> Result<Vec<DirectoryEntry>> {
    let mut out = Vec::new();
    enumerate_node(&root.entries, &mut load_buffer, &mut out)?;
    Ok(out)
}

fn enumerate_node(
    entries: &[IndexNodeEntry],
    load_buffer: &mut impl FnMut(u64) -> Result<IndexBuffer>,
    out: &mut Vec<DirectoryEntry>,
) -> Result<()> {
    for entry in entries {
        if let Some(vcn) = entry.child_vcn {
            let buffer = load_buffer(vcn)?;
            enumerate_node(&buffer.entries, load_buffer, out)?;
        }
        if entry.is_value() {
            let key = entry.key.as_ref().unwrap();
            if key.namespace.is_primary() {
                let mut value = DirectoryEntry::from(key);
                value.file_reference = entry.file_reference.unwrap();
                out.push(value);
            }
        }
    }
    Ok(())
}

/// Binary-descent lookup by exact name. Returns `Ok(None)` when the name
/// is absent — not found is not an error (spec §4.7).
pub fn lookup(
    root: &IndexRoot,
    collation: &UpCaseTable,
    target: &str,
    mut load_buffer: impl FnMut(u64) -> Result<IndexBuffer>,
) -> Result<Option<FileReference>> {
    lookup_node(&root.entries, collation, target, &mut load_buffer)
}

fn lookup_node(
    entries: &[IndexNodeEntry],
    collation: &UpCaseTable,
    target: &str,
    load_buffer: &mut impl FnMut(u64) -> Result<IndexBuffer>,
) -> Result<Option<FileReference>> {
    for entry in entries {
        let Some(key) = &entry.key else {
            // The end entry: descend into the "infinity" right child if present.
            return match entry.child_vcn {
                Some(vcn) => {
                    let buffer = load_buffer(vcn)?;
                    lookup_node(&buffer.entries, collation, target, load_buffer)
                }
                None => Ok(None),
            };
        };

        match collation.compare_str(target, &key.name) {
            Ordering::Equal => {
                if key.namespace.is_primary() {
                    return Ok(entry.file_reference);
                }
                // DOS-only alias collides on name; keep scanning for the
                // primary-namespace entry that should sit beside it.
                continue;
            }
            Ordering::Less => {
                return match entry.child_vcn {
                    Some(vcn) => {
                        let buffer = load_buffer(vcn)?;
                        lookup_node(&buffer.entries, collation, target, load_buffer)
                    }
                    None => Ok(None),
                };
            }
            Ordering::Greater => continue,
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::FILE_NAME_WIN32;

    fn file_name_key(parent: u64, name: &str, namespace: u8) -> Vec<u8> {
        let mut key = vec![0u8; 66];
        key[0..8].copy_from_slice(&parent.to_le_bytes());
        let name_utf16: Vec<u8> = name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        key[64] = (name_utf16.len() / 2) as u8;
        key[65] = namespace;
        key.extend_from_slice(&name_utf16);
        key
    }

    fn value_entry(mft_ref: u64, key: &[u8], has_subnode: bool, child_vcn: u64) -> Vec<u8> {
        let mut flags = 0u16;
        if has_subnode {
            flags |= INDEX_ENTRY_NODE;
        }
        let base_len = 16 + key.len();
        let padded_key_len = (key.len() + 7) / 8 * 8;
        let entry_len = if has_subnode {
            16 + padded_key_len + 8
        } else {
            base_len
        };
        let mut entry = vec![0u8; entry_len];
        entry[0..8].copy_from_slice(&mft_ref.to_le_bytes());
        entry[8..10].copy_from_slice(&(entry_len as u16).to_le_bytes());
        entry[10..12].copy_from_slice(&(key.len() as u16).to_le_bytes());
        entry[12..14].copy_from_slice(&flags.to_le_bytes());
        entry[16..16 + key.len()].copy_from_slice(key);
        if has_subnode {
            entry[entry_len - 8..].copy_from_slice(&child_vcn.to_le_bytes());
        }
        entry
    }

    fn end_entry(has_subnode: bool, child_vcn: u64) -> Vec<u8> {
        let mut flags = INDEX_ENTRY_END;
        if has_subnode {
            flags |= INDEX_ENTRY_NODE;
        }
        let entry_len = if has_subnode { 24 } else { 16 };
        let mut entry = vec![0u8; entry_len];
        entry[8..10].copy_from_slice(&(entry_len as u16).to_le_bytes());
        entry[12..14].copy_from_slice(&flags.to_le_bytes());
        if has_subnode {
            entry[entry_len - 8..].copy_from_slice(&child_vcn.to_le_bytes());
        }
        entry
    }

    fn wrap_as_index_root(entries_blob: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; 16];
        data[0..4].copy_from_slice(&0x30u32.to_le_bytes()); // FILE_NAME
        data[4..8].copy_from_slice(&1u32.to_le_bytes()); // collation
        data[8..12].copy_from_slice(&4096u32.to_le_bytes());
        // IndexHeader: entries start right after these 16 header bytes.
        const ENTRIES_OFFSET: u32 = 16;
        let index_length = ENTRIES_OFFSET + entries_blob.len() as u32;
        data.extend_from_slice(&ENTRIES_OFFSET.to_le_bytes()); // entries_offset (relative to header start)
        data.extend_from_slice(&index_length.to_le_bytes()); // index_length is measured from the header start too
        data.extend_from_slice(&index_length.to_le_bytes()); // allocated_size
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(entries_blob);
        data
    }

    #[test]
    fn parses_and_enumerates_flat_root() {
        let key_a = file_name_key(5, "alpha", FILE_NAME_WIN32);
        let key_b = file_name_key(5, "beta", FILE_NAME_WIN32);
        let mut blob = value_entry(10, &key_a, false, 0);
        blob.extend(value_entry(11, &key_b, false, 0));
        blob.extend(end_entry(false, 0));

        let root_data = wrap_as_index_root(&blob);
        let root = parse_index_root(&root_data).unwrap();
        let entries = enumerate(&root, |_| unreachable!()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "alpha");
        assert_eq!(entries[1].name, "beta");
    }

    #[test]
    fn lookup_finds_exact_match() {
        let key_a = file_name_key(5, "alpha", FILE_NAME_WIN32);
        let mut blob = value_entry(10, &key_a, false, 0);
        blob.extend(end_entry(false, 0));
        let root = parse_index_root(&wrap_as_index_root(&blob)).unwrap();

        let collation = UpCaseTable::unavailable();
        let found = lookup(&root, &collation, "ALPHA", |_| unreachable!()).unwrap();
        assert_eq!(found.unwrap().index(), 10);
    }

    #[test]
    fn lookup_missing_name_returns_none_not_error() {
        let key_a = file_name_key(5, "alpha", FILE_NAME_WIN32);
        let mut blob = value_entry(10, &key_a, false, 0);
        blob.extend(end_entry(false, 0));
        let root = parse_index_root(&wrap_as_index_root(&blob)).unwrap();

        let collation = UpCaseTable::unavailable();
        let found = lookup(&root, &collation, "zzz", |_| unreachable!()).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn lookup_descends_into_child_buffer() {
        let key_mid = file_name_key(5, "m", FILE_NAME_WIN32);
        let mut blob = value_entry(10, &key_mid, true, 7);
        blob.extend(end_entry(false, 0));
        let root = parse_index_root(&wrap_as_index_root(&blob)).unwrap();

        let key_child = file_name_key(5, "a", FILE_NAME_WIN32);
        let mut child_blob = value_entry(20, &key_child, false, 0);
        child_blob.extend(end_entry(false, 0));
        let child_entries = parse_index_entries(&child_blob).unwrap();

        let collation = UpCaseTable::unavailable();
        let found = lookup(&root, &collation, "a", |vcn| {
            assert_eq!(vcn, 7);
            Ok(IndexBuffer { vcn, entries: child_entries.clone() })
        })
        .unwrap();
        assert_eq!(found.unwrap().index(), 20);
    }
}
