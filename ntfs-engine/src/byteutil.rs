//! Small little-endian field readers.
//!
//! The teacher reaches for `unsafe { ptr::read_unaligned(...) }` over
//! `#[repr(C, packed)]` structs when decoding on-disk layouts
//! (`formatters/src/ntfs/structures.rs`). Volume images are attacker-
//! controlled input, not memory the process owns, so this crate decodes
//! every field explicitly with `from_le_bytes` instead — the same
//! technique the teacher already uses for the parts it builds field by
//! field (`data_runs.rs::read_le_bytes`, the USA offset/count reads in
//! `index.rs::parse_index_allocation`), just applied everywhere.

use ntfs_core::{NtfsError, Result};

pub fn u16_at(data: &[u8], offset: usize) -> Result<u16> {
    let b = get(data, offset, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

pub fn u32_at(data: &[u8], offset: usize) -> Result<u32> {
    let b = get(data, offset, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub fn u64_at(data: &[u8], offset: usize) -> Result<u64> {
    let b = get(data, offset, 8)?;
    Ok(u64::from_le_bytes(b.try_into().unwrap()))
}

pub fn i8_at(data: &[u8], offset: usize) -> Result<i8> {
    let b = get(data, offset, 1)?;
    Ok(b[0] as i8)
}

pub fn u8_at(data: &[u8], offset: usize) -> Result<u8> {
    Ok(get(data, offset, 1)?[0])
}

fn get(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    data.get(offset..offset + len).ok_or_else(|| {
        NtfsError::OutOfBounds(format!(
            "field at {offset}..{} exceeds buffer of {} bytes",
            offset + len,
            data.len()
        ))
    })
}

/// Decode a UTF-16LE byte span into a `String`, lossily substituting
/// unpaired surrogates rather than failing the whole parse.
pub fn utf16le_to_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}
