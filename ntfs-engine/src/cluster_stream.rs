//! Seekable, sparse-aware byte stream over a non-resident attribute's
//! runlist (C7).
//!
//! Grounded on `filesystems/src/ntfs/sparse.rs`'s sparse/allocated
//! split, generalised from its "gather everything into one `Vec`"
//! approach into a true seek/read stream that never reads clusters it
//! doesn't need to, per spec §4.4.

use std::cmp::Ordering;
use std::io::SeekFrom;

use ntfs_core::{ByteReader, NtfsError, Result};

use crate::data_runs::Extent;

pub struct ClusterStream<'r> {
    reader: &'r dyn ByteReader,
    extents: Vec<Extent>,
    cluster_size: u64,
    data_size: u64,
    initialized_size: u64,
    compression_unit: u16,
    position: u64,
}

impl<'r> ClusterStream<'r> {
    pub fn new(
        reader: &'r dyn ByteReader,
        extents: Vec<Extent>,
        cluster_size: u64,
        data_size: u64,
        initialized_size: u64,
        compression_unit: u16,
    ) -> Self {
        Self {
            reader,
            extents,
            cluster_size,
            data_size,
            initialized_size,
            compression_unit,
            position: 0,
        }
    }

    pub fn len(&self) -> u64 {
        self.data_size
    }

    pub fn is_empty(&self) -> bool {
        self.data_size == 0
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_compressed(&self) -> bool {
        self.compression_unit != 0
    }

    pub fn seek(&mut self, whence: SeekFrom) -> Result<u64> {
        let new_pos = match whence {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::End(delta) => self.data_size as i128 + delta as i128,
            SeekFrom::Current(delta) => self.position as i128 + delta as i128,
        };
        if new_pos < 0 {
            return Err(NtfsError::InvalidArgument(
                "seek before start of stream".into(),
            ));
        }
        self.position = new_pos as u64;
        Ok(self.position)
    }

    /// Read up to `buf.len()` bytes starting at the current position and
    /// advance it. Short reads occur only at end of stream.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.read_at(self.position, buf)?;
        self.position += n as u64;
        Ok(n)
    }

    /// Stateless read at an absolute logical offset.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if self.compression_unit != 0 {
            return Err(NtfsError::UnsupportedFeature(
                "reading compressed $DATA is not supported".into(),
            ));
        }
        if offset >= self.data_size || buf.is_empty() {
            return Ok(0);
        }

        let to_read = buf.len().min((self.data_size - offset) as usize);
        let mut done = 0usize;

        while done < to_read {
            let cur = offset + done as u64;

            if cur >= self.initialized_size {
                buf[done..to_read].fill(0);
                done = to_read;
                break;
            }

            let vcn = cur / self.cluster_size;
            let intra = cur % self.cluster_size;

            let extent = self.extent_for_vcn(vcn)?;
            let extent_remaining_bytes = (extent.vcn_end() - vcn) * self.cluster_size - intra;
            let before_uninitialized = self.initialized_size - cur;
            let chunk = (to_read - done)
                .min(extent_remaining_bytes as usize)
                .min(before_uninitialized as usize);

            if extent.is_sparse() {
                buf[done..done + chunk].fill(0);
            } else {
                let lcn = extent.lcn.expect("checked non-sparse above");
                let byte_offset = (lcn + (vcn - extent.vcn_start)) * self.cluster_size + intra;
                self.reader
                    .read_exact_at(byte_offset, &mut buf[done..done + chunk])?;
            }

            done += chunk;
        }

        Ok(done)
    }

    fn extent_for_vcn(&self, vcn: u64) -> Result<&Extent> {
        self.extents
            .binary_search_by(|e| {
                if vcn < e.vcn_start {
                    Ordering::Greater
                } else if vcn >= e.vcn_end() {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            })
            .map(|i| &self.extents[i])
            .map_err(|_| {
                NtfsError::CorruptRunlist(format!(
                    "no runlist extent covers VCN {vcn}, but it is within initialized_size"
                ))
            })
    }
}
