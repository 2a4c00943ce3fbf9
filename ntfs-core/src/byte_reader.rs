use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Mutex;

use crate::error::{NtfsError, Result};

/// Random-access read contract for the volume image or backing device.
///
/// Implementations are expected to be internally serialisable: a caller
/// that issues concurrent `read` calls must not observe interleaved seeks.
/// This crate never writes through it.
pub trait ByteReader: Send + Sync {
    /// Total size of the backing image, in bytes.
    fn size(&self) -> Result<u64>;

    /// Read `buf.len()` bytes starting at `offset`, returning the number of
    /// bytes actually read. A short read is only permitted at end of file.
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Read exactly `buf.len()` bytes, failing with `OutOfBounds` on a
    /// short read that is not explained by end of file.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let n = self.read(offset, buf)?;
        if n != buf.len() {
            return Err(NtfsError::OutOfBounds(format!(
                "short read at offset {offset}: expected {} bytes, got {n}",
                buf.len()
            )));
        }
        Ok(())
    }

    /// Convenience: read and return an owned buffer of `len` bytes.
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }
}

/// File-backed reader over a raw volume image.
///
/// Unlike the teacher's `AlignedDeviceReader`, this performs no sector
/// caching: C1 is specified to cache nothing, and reads are served
/// directly via `pread`-style positioned reads guarded by a mutex so a
/// single `File` handle can be shared across readers.
pub struct FileByteReader {
    file: Mutex<File>,
    size: u64,
}

impl FileByteReader {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            size,
        })
    }

    pub fn from_file(file: File) -> Result<Self> {
        let size = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            size,
        })
    }
}

impl ByteReader for FileByteReader {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| NtfsError::Internal("byte reader lock poisoned".into()))?;
        file.seek(SeekFrom::Start(offset))?;
        let mut total = 0;
        while total < buf.len() {
            match file.read(&mut buf[total..])? {
                0 => break,
                n => total += n,
            }
        }
        Ok(total)
    }
}

/// In-memory reader, used by tests and by callers that have already
/// mapped or loaded the image into memory.
pub struct SliceByteReader {
    data: Vec<u8>,
}

impl SliceByteReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl ByteReader for SliceByteReader {
    fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let offset = offset as usize;
        if offset >= self.data.len() {
            return Ok(0);
        }
        let available = &self.data[offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }
}
