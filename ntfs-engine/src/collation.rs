//! NTFS file-name collation (§4.6).
//!
//! Not present in the teacher (`path_resolver.rs` does ASCII
//! case-folding only); grounded on the spec's description of the
//! `$UpCase` table and generalised from the teacher's ASCII fallback
//! (`filesystems/src/families/ntfs/ntfs/path_resolver.rs`), which
//! becomes the degraded path here when `$UpCase` is unavailable.

use std::cmp::Ordering;

use log::warn;

/// 65536-entry uppercase mapping read from the volume's `$UpCase` data
/// stream (MFT record 10). Falls back to ASCII-only folding if the
/// table could not be read.
#[derive(Debug, Clone)]
pub struct UpCaseTable {
    table: Option<Vec<u16>>,
}

impl UpCaseTable {
    /// Build from a raw `$UpCase` byte stream (128 KiB of little-endian
    /// `u16` entries, one per UTF-16 code unit below 0x10000).
    pub fn from_bytes(data: &[u8]) -> Self {
        if data.len() < 128 * 1024 {
            warn!(
                "$UpCase stream is {} bytes, expected 131072; falling back to ASCII case-folding",
                data.len()
            );
            return Self { table: None };
        }
        let table: Vec<u16> = data
            .chunks_exact(2)
            .take(65536)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        Self { table: Some(table) }
    }

    pub fn unavailable() -> Self {
        Self { table: None }
    }

    fn upper(&self, unit: u16) -> u16 {
        match &self.table {
            Some(table) => table[unit as usize],
            None => ascii_upper(unit),
        }
    }

    /// Compare two UTF-16 code-unit sequences under NTFS collation:
    /// unsigned comparison after case-folding both sides. Code units
    /// beyond the table's domain (>= 0x10000 is impossible for a single
    /// `u16`; surrogate halves fold to themselves) compare as-is.
    pub fn compare(&self, a: &[u16], b: &[u16]) -> Ordering {
        for (&x, &y) in a.iter().zip(b.iter()) {
            let ux = self.upper(x);
            let uy = self.upper(y);
            match ux.cmp(&uy) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        a.len().cmp(&b.len())
    }

    pub fn compare_str(&self, a: &str, b: &str) -> Ordering {
        let au: Vec<u16> = a.encode_utf16().collect();
        let bu: Vec<u16> = b.encode_utf16().collect();
        self.compare(&au, &bu)
    }

    pub fn equal_str(&self, a: &str, b: &str) -> bool {
        self.compare_str(a, b) == Ordering::Equal
    }
}

fn ascii_upper(unit: u16) -> u16 {
    if (b'a' as u16..=b'z' as u16).contains(&unit) {
        unit - 0x20
    } else {
        unit
    }
}
