//! Attribute header/body decoder (C4).
//!
//! Grounded on `formatters/src/ntfs/attributes.rs`'s resident/non-resident
//! split, decoded here with the safe `byteutil` readers instead of
//! `unsafe` struct casts, and with typed bodies for `$VOLUME_INFORMATION`
//! and `$OBJECT_ID` (the teacher leaves these as `Unknown`).

use ntfs_core::{NtfsError, Result};

use crate::byteutil::{u16_at, u32_at, u64_at, u8_at, utf16le_to_string};
use crate::data_runs::{decode_runlist, validate_runlist, Extent};
use crate::structures::{
    ATTR_FLAG_COMPRESSED, ATTR_FLAG_ENCRYPTED, ATTR_FLAG_SPARSE, ATTR_TYPE_ATTRIBUTE_LIST,
    ATTR_TYPE_BITMAP, ATTR_TYPE_DATA, ATTR_TYPE_END, ATTR_TYPE_FILE_NAME,
    ATTR_TYPE_INDEX_ROOT, ATTR_TYPE_OBJECT_ID, ATTR_TYPE_REPARSE_POINT, ATTR_TYPE_STANDARD_INFORMATION,
    ATTR_TYPE_VOLUME_INFORMATION, ATTR_TYPE_VOLUME_NAME, FileNameNamespace,
};

#[derive(Debug, Clone)]
pub struct StandardInformationAttr {
    pub creation_time: u64,
    pub modification_time: u64,
    pub mft_modification_time: u64,
    pub access_time: u64,
    pub file_attributes: u32,
}

#[derive(Debug, Clone)]
pub struct FileNameAttrBody {
    pub parent_reference: u64,
    pub creation_time: u64,
    pub modification_time: u64,
    pub mft_modification_time: u64,
    pub access_time: u64,
    pub allocated_size: u64,
    pub data_size: u64,
    pub file_attributes: u32,
    pub namespace: FileNameNamespace,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct VolumeInformationAttr {
    pub major_version: u8,
    pub minor_version: u8,
    pub flags: u16,
}

#[derive(Debug, Clone)]
pub struct ObjectIdAttr {
    pub object_id: [u8; 16],
    pub birth_volume_id: Option<[u8; 16]>,
    pub birth_object_id: Option<[u8; 16]>,
    pub domain_id: Option<[u8; 16]>,
}

/// A decoded attribute body. Non-resident `$DATA`/`$INDEX_ALLOCATION`/
/// `$BITMAP` carry no body here — their content is read through the
/// cluster-block stream (C7) over the extents in `NonResidentInfo`.
#[derive(Debug, Clone)]
pub enum AttributeBody {
    StandardInformation(StandardInformationAttr),
    FileName(FileNameAttrBody),
    VolumeName(String),
    VolumeInformation(VolumeInformationAttr),
    ObjectId(ObjectIdAttr),
    Data(Vec<u8>),
    IndexRoot(Vec<u8>),
    Bitmap(Vec<u8>),
    ReparsePoint(Vec<u8>),
    Raw(Vec<u8>),
    None,
}

#[derive(Debug, Clone)]
pub struct NonResidentInfo {
    pub first_vcn: u64,
    pub last_vcn: u64,
    pub compression_unit: u16,
    pub allocated_size: u64,
    pub data_size: u64,
    pub initialized_size: u64,
    pub extents: Vec<Extent>,
}

impl NonResidentInfo {
    pub fn is_compressed(&self) -> bool {
        self.compression_unit != 0
    }
}

#[derive(Debug, Clone)]
pub enum AttributeForm {
    Resident(AttributeBody),
    NonResident(NonResidentInfo),
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub type_code: u32,
    pub name: Option<String>,
    pub flags: u16,
    pub attribute_id: u16,
    pub record_length: u32,
    pub form: AttributeForm,
}

impl Attribute {
    pub fn is_non_resident(&self) -> bool {
        matches!(self.form, AttributeForm::NonResident(_))
    }

    pub fn is_sparse(&self) -> bool {
        self.flags & ATTR_FLAG_SPARSE != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & ATTR_FLAG_COMPRESSED != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & ATTR_FLAG_ENCRYPTED != 0
    }

    pub fn non_resident_info(&self) -> Option<&NonResidentInfo> {
        match &self.form {
            AttributeForm::NonResident(info) => Some(info),
            AttributeForm::Resident(_) => None,
        }
    }
}

/// Parse one attribute at `offset` in an MFT record's byte buffer.
/// Returns `Ok(None)` at the sentinel/end marker.
pub fn parse_attribute(data: &[u8], offset: usize) -> Result<Option<Attribute>> {
    if offset + 16 > data.len() {
        return Err(NtfsError::MalformedAttribute(
            "attribute header extends beyond record".into(),
        ));
    }

    let type_code = u32_at(data, offset)?;
    if type_code == ATTR_TYPE_END {
        return Ok(None);
    }
    let record_length = u32_at(data, offset + 4)?;
    if record_length == 0 {
        return Err(NtfsError::MalformedAttribute(
            "attribute record length is zero".into(),
        ));
    }
    if offset + record_length as usize > data.len() {
        return Err(NtfsError::MalformedAttribute(format!(
            "attribute at {offset} declares length {record_length} beyond record bounds"
        )));
    }

    let non_resident = u8_at(data, offset + 8)? != 0;
    let name_length = u8_at(data, offset + 9)? as usize;
    let name_offset = u16_at(data, offset + 0x0A)? as usize;
    let flags = u16_at(data, offset + 0x0C)?;
    let attribute_id = u16_at(data, offset + 0x0E)?;

    let name = if name_length > 0 {
        let start = offset + name_offset;
        let end = start + name_length * 2;
        if end > data.len() {
            return Err(NtfsError::MalformedAttribute(
                "attribute name extends beyond record".into(),
            ));
        }
        Some(utf16le_to_string(&data[start..end]))
    } else {
        None
    };

    let form = if non_resident {
        AttributeForm::NonResident(parse_non_resident_form(data, offset)?)
    } else {
        AttributeForm::Resident(parse_resident_body(data, offset, type_code)?)
    };

    Ok(Some(Attribute {
        type_code,
        name,
        flags,
        attribute_id,
        record_length,
        form,
    }))
}

fn parse_resident_body(data: &[u8], offset: usize, type_code: u32) -> Result<AttributeBody> {
    let value_length = u32_at(data, offset + 0x10)? as usize;
    let value_offset = u16_at(data, offset + 0x14)? as usize;

    let start = offset + value_offset;
    let end = start + value_length;
    if end > data.len() {
        return Err(NtfsError::MalformedAttribute(
            "resident attribute value extends beyond record".into(),
        ));
    }
    let value = &data[start..end];

    Ok(match type_code {
        ATTR_TYPE_STANDARD_INFORMATION => {
            AttributeBody::StandardInformation(parse_standard_information(value)?)
        }
        ATTR_TYPE_FILE_NAME => AttributeBody::FileName(parse_file_name(value)?),
        ATTR_TYPE_VOLUME_NAME => AttributeBody::VolumeName(utf16le_to_string(value)),
        ATTR_TYPE_VOLUME_INFORMATION => {
            AttributeBody::VolumeInformation(parse_volume_information(value)?)
        }
        ATTR_TYPE_OBJECT_ID => AttributeBody::ObjectId(parse_object_id(value)?),
        ATTR_TYPE_DATA => AttributeBody::Data(value.to_vec()),
        ATTR_TYPE_INDEX_ROOT => AttributeBody::IndexRoot(value.to_vec()),
        ATTR_TYPE_BITMAP => AttributeBody::Bitmap(value.to_vec()),
        ATTR_TYPE_REPARSE_POINT => AttributeBody::ReparsePoint(value.to_vec()),
        ATTR_TYPE_ATTRIBUTE_LIST => AttributeBody::Raw(value.to_vec()),
        _ => AttributeBody::Raw(value.to_vec()),
    })
}

fn parse_non_resident_form(data: &[u8], offset: usize) -> Result<NonResidentInfo> {
    let first_vcn = u64_at(data, offset + 0x10)?;
    let last_vcn = u64_at(data, offset + 0x18)?;
    let data_runs_offset = u16_at(data, offset + 0x20)? as usize;
    let compression_unit = u16_at(data, offset + 0x22)?;
    let allocated_size = u64_at(data, offset + 0x28)?;
    let data_size = u64_at(data, offset + 0x30)?;
    let initialized_size = u64_at(data, offset + 0x38)?;

    let record_length = u32_at(data, offset + 4)? as usize;
    let runs_start = offset + data_runs_offset;
    if runs_start > offset + record_length {
        return Err(NtfsError::MalformedAttribute(
            "data-run offset beyond attribute bounds".into(),
        ));
    }
    let runs_end = offset + record_length;
    let runs_data = data
        .get(runs_start..runs_end)
        .ok_or_else(|| NtfsError::MalformedAttribute("data runs extend beyond record".into()))?;

    let extents = decode_runlist(runs_data, first_vcn)?;
    validate_runlist(&extents, first_vcn, last_vcn)?;

    Ok(NonResidentInfo {
        first_vcn,
        last_vcn,
        compression_unit,
        allocated_size,
        data_size,
        initialized_size,
        extents,
    })
}

fn parse_standard_information(value: &[u8]) -> Result<StandardInformationAttr> {
    if value.len() < 48 {
        return Err(NtfsError::MalformedAttribute(
            "$STANDARD_INFORMATION too small".into(),
        ));
    }
    Ok(StandardInformationAttr {
        creation_time: u64_at(value, 0)?,
        modification_time: u64_at(value, 8)?,
        mft_modification_time: u64_at(value, 16)?,
        access_time: u64_at(value, 24)?,
        file_attributes: u32_at(value, 32)?,
    })
}

pub(crate) fn parse_file_name(value: &[u8]) -> Result<FileNameAttrBody> {
    if value.len() < 66 {
        return Err(NtfsError::MalformedAttribute("$FILE_NAME too small".into()));
    }
    let name_length_chars = u8_at(value, 64)? as usize;
    let namespace_raw = u8_at(value, 65)?;
    let namespace = FileNameNamespace::from_raw(namespace_raw).ok_or_else(|| {
        NtfsError::MalformedAttribute(format!("unknown file-name namespace {namespace_raw}"))
    })?;
    let name_start = 66;
    let name_end = name_start + name_length_chars * 2;
    if name_end > value.len() {
        return Err(NtfsError::MalformedAttribute(
            "$FILE_NAME name extends beyond attribute value".into(),
        ));
    }

    Ok(FileNameAttrBody {
        parent_reference: u64_at(value, 0)?,
        creation_time: u64_at(value, 8)?,
        modification_time: u64_at(value, 16)?,
        mft_modification_time: u64_at(value, 24)?,
        access_time: u64_at(value, 32)?,
        allocated_size: u64_at(value, 40)?,
        data_size: u64_at(value, 48)?,
        file_attributes: u32_at(value, 56)?,
        namespace,
        name: utf16le_to_string(&value[name_start..name_end]),
    })
}

fn parse_volume_information(value: &[u8]) -> Result<VolumeInformationAttr> {
    if value.len() < 12 {
        return Err(NtfsError::MalformedAttribute(
            "$VOLUME_INFORMATION too small".into(),
        ));
    }
    Ok(VolumeInformationAttr {
        major_version: u8_at(value, 8)?,
        minor_version: u8_at(value, 9)?,
        flags: u16_at(value, 10)?,
    })
}

fn parse_object_id(value: &[u8]) -> Result<ObjectIdAttr> {
    if value.len() < 16 {
        return Err(NtfsError::MalformedAttribute("$OBJECT_ID too small".into()));
    }
    let guid = |offset: usize| -> Option<[u8; 16]> {
        value.get(offset..offset + 16).map(|s| s.try_into().unwrap())
    };
    Ok(ObjectIdAttr {
        object_id: guid(0).unwrap(),
        birth_volume_id: guid(16),
        birth_object_id: guid(32),
        domain_id: guid(48),
    })
}
