//! Per-file public surface (C11).
//!
//! Grounded on `reader.rs`'s `NtfsReader`/`FilesystemReader` read
//! surface (`list_directory`/`read_file`, both hardcoded to a couple of
//! system paths), generalised into resolve-then-read over any entry,
//! and on `libfsntfs_file_entry.h`'s fuller surface (times, DOS
//! attribute flags, name, sub-entries, alternate data streams,
//! `read`/`seek`) per spec §4.8. A `FileEntry` borrows its folded MFT
//! entry from the volume's cache and is immutable after construction
//! (spec §5) apart from the stream cursor used by `read`/`seek`.

use std::io::SeekFrom;

use ntfs_core::Result;

use crate::attributes::{AttributeBody, AttributeForm, FileNameAttrBody, StandardInformationAttr};
use crate::index::DirectoryEntry;
use crate::mft::MftEntry;
use crate::structures::{
    FileNameNamespace, FileReference, ATTR_TYPE_DATA, ATTR_TYPE_FILE_NAME,
    ATTR_TYPE_STANDARD_INFORMATION,
};
use crate::volume::Volume;

/// The four FILETIME fields carried by `$STANDARD_INFORMATION`
/// (100ns intervals since 1601-01-01, per spec §3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryTimes {
    pub creation_time: u64,
    pub modification_time: u64,
    pub mft_modification_time: u64,
    pub access_time: u64,
}

impl From<&StandardInformationAttr> for EntryTimes {
    fn from(si: &StandardInformationAttr) -> Self {
        Self {
            creation_time: si.creation_time,
            modification_time: si.modification_time,
            mft_modification_time: si.mft_modification_time,
            access_time: si.access_time,
        }
    }
}

/// One `$DATA` stream attached to an entry: unnamed ("default") or one
/// of its alternate (named) siblings.
#[derive(Debug, Clone)]
pub struct DataStream {
    pub name: Option<String>,
    pub size: u64,
}

/// An opaque view over one attribute: its type and (for named
/// attributes such as alternate data streams) its name, without
/// exposing the decoder's internal body representation.
#[derive(Debug, Clone)]
pub struct AttributeView {
    pub type_code: u32,
    pub name: Option<String>,
}

fn data_stream_size(form: &AttributeForm) -> u64 {
    match form {
        AttributeForm::Resident(AttributeBody::Data(bytes)) => bytes.len() as u64,
        AttributeForm::Resident(_) => 0,
        AttributeForm::NonResident(info) => info.data_size,
    }
}

fn preferred_file_name(entry: &MftEntry) -> Option<&FileNameAttrBody> {
    let mut names = entry.attributes_of(ATTR_TYPE_FILE_NAME).filter_map(|a| match &a.form {
        AttributeForm::Resident(AttributeBody::FileName(name)) => Some(name),
        _ => None,
    });
    // WIN32 (or WIN32&DOS, which is also the long name) beats POSIX;
    // DOS-only short names are never preferred (spec §4.6/§4.8).
    names
        .clone()
        .find(|n| matches!(n.namespace, FileNameNamespace::Win32 | FileNameNamespace::Win32AndDos))
        .or_else(|| names.find(|n| n.namespace == FileNameNamespace::Posix))
}

/// Public view of one file or directory entry.
///
/// Construct via [`Volume::entry`] + [`FileEntry::new`], or through
/// [`Volume::resolve_path`]/[`FileEntry::sub_entry_by_name`], which also
/// attach the name the entry was *reached by* (preferred over the
/// entry's own preferred `$FILE_NAME` per spec §4.8).
pub struct FileEntry<'v> {
    volume: &'v Volume,
    reference: FileReference,
    entry: MftEntry,
    reached_by_name: Option<String>,
    position: u64,
}

impl<'v> FileEntry<'v> {
    pub fn new(volume: &'v Volume, reference: FileReference) -> Result<Self> {
        let entry = volume.entry(reference)?;
        Ok(Self {
            volume,
            reference,
            entry,
            reached_by_name: None,
            position: 0,
        })
    }

    fn with_reached_by_name(mut self, name: String) -> Self {
        self.reached_by_name = Some(name);
        self
    }

    pub fn reference(&self) -> FileReference {
        self.reference
    }

    pub fn is_directory(&self) -> bool {
        self.entry.is_directory
    }

    /// Name from the directory entry this was reached through, if any;
    /// otherwise the preferred `$FILE_NAME` (WIN32/WIN32&DOS over POSIX,
    /// never a DOS-only short name) carried by the entry itself.
    pub fn name(&self) -> Option<&str> {
        if let Some(name) = &self.reached_by_name {
            return Some(name.as_str());
        }
        preferred_file_name(&self.entry).map(|n| n.name.as_str())
    }

    pub fn times(&self) -> Option<EntryTimes> {
        self.entry.attribute(ATTR_TYPE_STANDARD_INFORMATION).and_then(|a| match &a.form {
            AttributeForm::Resident(AttributeBody::StandardInformation(si)) => Some(EntryTimes::from(si)),
            _ => None,
        })
    }

    /// DOS file-attribute flags (`FILE_ATTRIBUTE_*`) from
    /// `$STANDARD_INFORMATION`, falling back to the preferred
    /// `$FILE_NAME`'s copy when the former is absent.
    pub fn file_attributes(&self) -> u32 {
        if let Some(a) = self.entry.attribute(ATTR_TYPE_STANDARD_INFORMATION) {
            if let AttributeForm::Resident(AttributeBody::StandardInformation(si)) = &a.form {
                return si.file_attributes;
            }
        }
        preferred_file_name(&self.entry).map(|n| n.file_attributes).unwrap_or(0)
    }

    pub fn attribute_count(&self) -> usize {
        self.entry.attributes.len()
    }

    pub fn attributes(&self) -> Vec<AttributeView> {
        self.entry
            .attributes
            .iter()
            .map(|a| AttributeView {
                type_code: a.type_code,
                name: a.name.clone(),
            })
            .collect()
    }

    /// True iff the entry has an unnamed `$DATA` attribute (spec §4.8).
    pub fn has_default_data_stream(&self) -> bool {
        self.default_data_attr().is_some()
    }

    fn default_data_attr(&self) -> Option<&crate::attributes::Attribute> {
        self.entry
            .attributes
            .iter()
            .find(|a| a.type_code == ATTR_TYPE_DATA && a.name.is_none())
    }

    /// Size of the default (unnamed) `$DATA` stream, 0 if absent.
    pub fn size(&self) -> u64 {
        self.default_data_attr().map(|a| data_stream_size(&a.form)).unwrap_or(0)
    }

    /// Every alternate (named) `$DATA` stream on this entry.
    pub fn alternate_data_streams(&self) -> Vec<DataStream> {
        self.entry
            .attributes
            .iter()
            .filter(|a| a.type_code == ATTR_TYPE_DATA && a.name.is_some())
            .map(|a| DataStream {
                name: a.name.clone(),
                size: data_stream_size(&a.form),
            })
            .collect()
    }

    pub fn data_stream_by_name(&self, name: &str) -> Option<DataStream> {
        self.alternate_data_streams().into_iter().find(|s| s.name.as_deref() == Some(name))
    }

    pub fn data_stream_by_index(&self, index: usize) -> Option<DataStream> {
        self.alternate_data_streams().into_iter().nth(index)
    }

    /// Directory children, in collation order (directories only).
    pub fn sub_entries(&self) -> Result<Vec<DirectoryEntry>> {
        self.volume.enumerate_directory(self.reference)
    }

    pub fn sub_entry_count(&self) -> Result<usize> {
        Ok(self.sub_entries()?.len())
    }

    pub fn sub_entry_by_index(&self, index: usize) -> Result<Option<DirectoryEntry>> {
        Ok(self.sub_entries()?.into_iter().nth(index))
    }

    /// Open a child by name via C9's B+-tree lookup (not a linear scan
    /// of [`sub_entries`]).
    pub fn sub_entry_by_name(&self, name: &str) -> Result<Option<FileEntry<'v>>> {
        match self.volume.lookup_child(self.reference, name)? {
            Some(child_ref) => {
                let child = FileEntry::new(self.volume, child_ref)?.with_reached_by_name(name.to_string());
                Ok(Some(child))
            }
            None => Ok(None),
        }
    }

    /// Current cursor position for [`read`](Self::read)/[`seek`](Self::seek).
    pub fn offset(&self) -> u64 {
        self.position
    }

    pub fn seek(&mut self, whence: SeekFrom) -> Result<u64> {
        let size = self.size();
        let new_pos = match whence {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::End(delta) => size as i128 + delta as i128,
            SeekFrom::Current(delta) => self.position as i128 + delta as i128,
        };
        if new_pos < 0 {
            return Err(ntfs_core::NtfsError::InvalidArgument(
                "seek before start of stream".into(),
            ));
        }
        self.position = new_pos as u64;
        Ok(self.position)
    }

    /// Read from the default data stream at the current cursor,
    /// advancing it by the number of bytes actually read.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.volume.read_at(self.reference, self.position, buf)?;
        self.position += n as u64;
        Ok(n)
    }

    /// Stateless read from the default data stream at an absolute offset.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.volume.read_at(self.reference, offset, buf)
    }
}
