//! NTFS boot sector parsing (C2).
//!
//! Grounded on `formatters/src/ntfs/boot_sector.rs` and `structures.rs`'s
//! `NtfsBootSector::validate`/`bytes_per_cluster`/`mft_record_size`.

use ntfs_core::{NtfsError, Result};

use crate::byteutil::{i8_at, u16_at, u64_at, u8_at};
use crate::structures::NTFS_OEM_ID;

/// Parsed, validated boot-sector parameters. Immutable for the life of
/// an open volume.
#[derive(Debug, Clone, Copy)]
pub struct BootParameters {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub total_sectors: u64,
    pub mft_lcn: u64,
    pub mftmirr_lcn: u64,
    pub mft_record_size: u32,
    pub index_buffer_size: u32,
    pub volume_serial: u64,
}

impl BootParameters {
    /// Parse and validate a 512-byte boot sector.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 512 {
            return Err(NtfsError::MalformedBootSector(format!(
                "boot sector is only {} bytes, need 512",
                data.len()
            )));
        }

        let signature = u16_at(data, 0x1FE)?;
        if signature != 0xAA55 {
            return Err(NtfsError::MalformedBootSector(format!(
                "bad boot signature 0x{signature:04X}"
            )));
        }

        let oem_id = &data[3..11];
        if oem_id != NTFS_OEM_ID {
            return Err(NtfsError::MalformedBootSector(
                "OEM id is not \"NTFS    \"".into(),
            ));
        }

        let bytes_per_sector = u16_at(data, 0x0B)?;
        if !matches!(bytes_per_sector, 512 | 1024 | 2048 | 4096) {
            return Err(NtfsError::MalformedBootSector(format!(
                "implausible bytes-per-sector {bytes_per_sector}"
            )));
        }

        let sectors_per_cluster = u8_at(data, 0x0D)?;
        if sectors_per_cluster == 0 || !sectors_per_cluster.is_power_of_two() {
            return Err(NtfsError::MalformedBootSector(format!(
                "sectors-per-cluster {sectors_per_cluster} is not a power of two"
            )));
        }

        let cluster_size = bytes_per_sector as u32 * sectors_per_cluster as u32;
        if !cluster_size.is_power_of_two() || cluster_size < 512 {
            return Err(NtfsError::MalformedBootSector(format!(
                "cluster size {cluster_size} must be a power of two >= 512"
            )));
        }

        let total_sectors = u64_at(data, 0x28)?;
        let mft_lcn = u64_at(data, 0x30)?;
        let mftmirr_lcn = u64_at(data, 0x38)?;
        let clusters_per_mft_record = i8_at(data, 0x40)?;
        let clusters_per_index_buffer = i8_at(data, 0x44)?;
        let volume_serial = u64_at(data, 0x48)?;

        let mft_record_size = decode_record_size(clusters_per_mft_record, cluster_size)?;
        if !mft_record_size.is_power_of_two() {
            return Err(NtfsError::MalformedBootSector(format!(
                "MFT entry size {mft_record_size} is not a power of two"
            )));
        }
        let index_buffer_size = decode_record_size(clusters_per_index_buffer, cluster_size)?;

        let params = Self {
            bytes_per_sector,
            sectors_per_cluster,
            total_sectors,
            mft_lcn,
            mftmirr_lcn,
            mft_record_size,
            index_buffer_size,
            volume_serial,
        };

        let volume_size = params.volume_size();
        if params.mft_offset() >= volume_size {
            return Err(NtfsError::MalformedBootSector(format!(
                "MFT offset {} exceeds volume size {volume_size}",
                params.mft_offset()
            )));
        }

        Ok(params)
    }

    pub fn cluster_size(&self) -> u32 {
        self.bytes_per_sector as u32 * self.sectors_per_cluster as u32
    }

    pub fn mft_offset(&self) -> u64 {
        self.mft_lcn * self.cluster_size() as u64
    }

    pub fn mftmirr_offset(&self) -> u64 {
        self.mftmirr_lcn * self.cluster_size() as u64
    }

    pub fn volume_size(&self) -> u64 {
        self.total_sectors * self.bytes_per_sector as u64
    }
}

/// Shared convention for the MFT-entry-size and index-buffer-size fields:
/// a positive value is clusters-per-block; a negative value `-n` means
/// `1 << n` bytes.
fn decode_record_size(raw: i8, cluster_size: u32) -> Result<u32> {
    if raw > 0 {
        Ok(raw as u32 * cluster_size)
    } else if raw < 0 {
        let shift = (-(raw as i32)) as u32;
        if shift >= 32 {
            return Err(NtfsError::MalformedBootSector(format!(
                "record-size shift {shift} is implausible"
            )));
        }
        Ok(1u32 << shift)
    } else {
        Err(NtfsError::MalformedBootSector(
            "record-size field is zero".into(),
        ))
    }
}
