//! Read-only NTFS metadata engine.
//!
//! Layered bottom-up per spec §2/§3: fixup application and raw
//! structure decoding (`boot_sector`, `fixup`, `data_runs`,
//! `attributes`, `attribute_list`, `structures`, `byteutil`), MFT
//! record parsing and attribute-list folding (`mft`), NTFS collation
//! (`collation`), cluster-block streaming (`cluster_stream`), the MFT
//! vector and cache (`cache`), the directory B+-tree walker (`index`),
//! case-insensitive path resolution (`path_resolver`), and finally
//! the orchestration layer and public façade (`volume`, `file_entry`).
//!
//! Everything below `volume`/`file_entry` is pure parsing, taking
//! already-read byte slices and loader closures rather than touching a
//! [`ntfs_core::ByteReader`] directly — the same layering the teacher
//! uses between `moses-core`'s device trait and its filesystem parsers.

pub mod attribute_list;
pub mod attributes;
pub mod boot_sector;
pub mod byteutil;
pub mod cache;
pub mod cluster_stream;
pub mod collation;
pub mod data_runs;
pub mod file_entry;
pub mod fixup;
pub mod index;
pub mod mft;
pub mod path_resolver;
pub mod structures;
pub mod volume;

pub use cache::CacheConfig;
pub use file_entry::{AttributeView, DataStream, EntryTimes, FileEntry};
pub use index::DirectoryEntry;
pub use structures::FileReference;
pub use volume::Volume;

pub use ntfs_core::{ByteReader, FileByteReader, NtfsError, Result, SliceByteReader};
