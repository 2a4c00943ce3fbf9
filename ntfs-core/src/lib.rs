pub mod byte_reader;
pub mod error;

pub use byte_reader::{ByteReader, FileByteReader, SliceByteReader};
pub use error::{NtfsError, Result};
