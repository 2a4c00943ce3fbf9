//! Update Sequence Array (USA/USN) fixup applier (C3).
//!
//! Grounded on `formatters/src/ntfs/mft.rs::apply_fixup`, generalised to
//! a caller-supplied sector size so the same routine serves both MFT
//! records (always 512-byte sectors) and `"INDX"` index buffers (which
//! use the volume's bytes-per-sector).

use log::trace;
use ntfs_core::{NtfsError, Result};

/// Validate and restore the sectors of a fixup-protected block in place.
///
/// Checked invariants (spec §4.1): the USA offset lies inside the block;
/// `usa_count == sectors + 1`; `sectors * sector_size == block.len()`.
pub fn apply_fixup(block: &mut [u8], usa_offset: u16, usa_count: u16, sector_size: usize) -> Result<()> {
    let usa_offset = usa_offset as usize;
    let usa_count = usa_count as usize;

    if sector_size == 0 || block.len() % sector_size != 0 {
        return Err(NtfsError::FixupMismatch(format!(
            "block size {} is not a multiple of sector size {sector_size}",
            block.len()
        )));
    }
    let sectors = block.len() / sector_size;
    if usa_count != sectors + 1 {
        return Err(NtfsError::FixupMismatch(format!(
            "USA count {usa_count} does not match sectors+1 ({})",
            sectors + 1
        )));
    }

    let usa_len = usa_count * 2;
    if usa_offset + usa_len > block.len() {
        return Err(NtfsError::FixupMismatch(
            "USA extends beyond block".into(),
        ));
    }

    let usn = [block[usa_offset], block[usa_offset + 1]];
    trace!("applying fixup, usn={:02X}{:02X}", usn[0], usn[1]);

    for i in 0..sectors {
        let usa_value_offset = usa_offset + (i + 1) * 2;
        let usa_value = [block[usa_value_offset], block[usa_value_offset + 1]];

        let trailer_offset = (i + 1) * sector_size - 2;
        if block[trailer_offset] != usn[0] || block[trailer_offset + 1] != usn[1] {
            return Err(NtfsError::FixupMismatch(format!(
                "sector {i} trailer {:02X}{:02X} does not match USN {:02X}{:02X}",
                block[trailer_offset],
                block[trailer_offset + 1],
                usn[0],
                usn[1]
            )));
        }

        block[trailer_offset] = usa_value[0];
        block[trailer_offset + 1] = usa_value[1];
    }

    Ok(())
}
