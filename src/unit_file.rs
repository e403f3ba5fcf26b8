//! Binary unit files
//!
//! The compact on-disk form of a [`Unit`], next to the serde JSON form.
//! Everything is little-endian; strings are a `u32` byte length followed by
//! UTF-8.
//!
//! ```text
//! file header     magic u32 | minor u16 | major u16 | file length u32 | first section u32
//! section header  header length u32 | section length u32 | next offset u32 | type u16 | reserved u16
//! string section  string*
//! function section
//!   header        header size u32 | function size u32 | code length u32 | flags u32
//!                 | context variable count u32 | local variable count u32
//!   body          name | context variable name* | code
//! ```
//!
//! Section and function lengths include their own headers. A next offset of
//! 0 ends the section chain. The entry function carries flag bit 0; a unit
//! with no flagged function enters at 0.

use crate::error::UnitFileError;
use crate::function::{Prototype, Unit};
use tracing::trace;

/// "GLaD", little-endian
pub const UNIT_MAGIC: u32 = 0x4461_4c47;

const VERSION_MAJOR: u16 = 1;
const VERSION_MINOR: u16 = 0;

const FILE_HEADER_SIZE: usize = 16;
const SECTION_HEADER_SIZE: usize = 16;
const FUNCTION_HEADER_SIZE: usize = 24;

const FUNCTION_SECTION: u16 = 0x0001;
const STRING_SECTION: u16 = 0x0002;

const FLAG_ENTRY: u32 = 0b1;

pub type UnitFileResult<T> = Result<T, UnitFileError>;

/// Whether `bytes` starts with the binary unit magic
pub fn is_binary_unit(bytes: &[u8]) -> bool {
    read_u32(bytes, &mut 0).map_or(false, |magic| magic == UNIT_MAGIC)
}

/* ===================== Writing ===================== */

fn string_size(s: &str) -> usize {
    4 + s.len()
}

fn function_size(proto: &Prototype) -> usize {
    FUNCTION_HEADER_SIZE
        + string_size(&proto.name)
        + proto
            .variables_in_context
            .iter()
            .map(|name| string_size(name))
            .sum::<usize>()
        + proto.code.len()
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: usize) {
    out.extend_from_slice(&(v as u32).to_le_bytes());
}

fn put_string(out: &mut Vec<u8>, s: &str) {
    put_u32(out, s.len());
    out.extend_from_slice(s.as_bytes());
}

fn put_section_header(out: &mut Vec<u8>, body: usize, next: usize, kind: u16) {
    put_u32(out, SECTION_HEADER_SIZE);
    put_u32(out, SECTION_HEADER_SIZE + body);
    put_u32(out, next);
    put_u16(out, kind);
    put_u16(out, 0);
}

/// Encode `unit`: the string section first, then the function section
pub fn serialize(unit: &Unit) -> Vec<u8> {
    let strings_size: usize = unit.strings.iter().map(|s| string_size(s)).sum();
    let functions_size: usize = unit.prototypes.iter().map(function_size).sum();
    let function_section = FILE_HEADER_SIZE + SECTION_HEADER_SIZE + strings_size;
    let total = function_section + SECTION_HEADER_SIZE + functions_size;

    let mut out = Vec::with_capacity(total);
    put_u32(&mut out, UNIT_MAGIC as usize);
    put_u16(&mut out, VERSION_MINOR);
    put_u16(&mut out, VERSION_MAJOR);
    put_u32(&mut out, total);
    put_u32(&mut out, FILE_HEADER_SIZE);

    put_section_header(&mut out, strings_size, function_section, STRING_SECTION);
    for s in &unit.strings {
        put_string(&mut out, s);
    }

    put_section_header(&mut out, functions_size, 0, FUNCTION_SECTION);
    for (index, proto) in unit.prototypes.iter().enumerate() {
        put_u32(&mut out, FUNCTION_HEADER_SIZE);
        put_u32(&mut out, function_size(proto));
        put_u32(&mut out, proto.code.len());
        put_u32(&mut out, if index == unit.entry { FLAG_ENTRY as usize } else { 0 });
        put_u32(&mut out, proto.variables_in_context.len());
        put_u32(&mut out, proto.local_variable_size);

        put_string(&mut out, &proto.name);
        for name in &proto.variables_in_context {
            put_string(&mut out, name);
        }
        out.extend_from_slice(&proto.code);
    }

    out
}

/* ===================== Reading ===================== */

fn take<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize) -> UnitFileResult<&'a [u8]> {
    let end = cursor
        .checked_add(len)
        .filter(|&end| end <= bytes.len())
        .ok_or(UnitFileError::Truncated { offset: *cursor })?;
    let slice = &bytes[*cursor..end];
    *cursor = end;
    Ok(slice)
}

fn read_u16(bytes: &[u8], cursor: &mut usize) -> UnitFileResult<u16> {
    let b = take(bytes, cursor, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> UnitFileResult<u32> {
    let b = take(bytes, cursor, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_len(bytes: &[u8], cursor: &mut usize) -> UnitFileResult<usize> {
    read_u32(bytes, cursor).map(|v| v as usize)
}

fn read_string(bytes: &[u8], cursor: &mut usize) -> UnitFileResult<String> {
    let len = read_len(bytes, cursor)?;
    let offset = *cursor;
    let raw = take(bytes, cursor, len)?;
    String::from_utf8(raw.to_vec()).map_err(|_| UnitFileError::InvalidUtf8 { offset })
}

/// Decode a binary unit, checking every length against the input
pub fn deserialize(bytes: &[u8]) -> UnitFileResult<Unit> {
    let mut cursor = 0;

    let magic = read_u32(bytes, &mut cursor)?;
    if magic != UNIT_MAGIC {
        return Err(UnitFileError::BadMagic(magic));
    }
    let minor = read_u16(bytes, &mut cursor)?;
    let major = read_u16(bytes, &mut cursor)?;
    if (major, minor) > (VERSION_MAJOR, VERSION_MINOR) {
        return Err(UnitFileError::UnsupportedVersion { major, minor });
    }
    let file_length = read_len(bytes, &mut cursor)?;
    if file_length > bytes.len() {
        return Err(UnitFileError::Truncated { offset: bytes.len() });
    }
    let bytes = &bytes[..file_length];

    let mut unit = Unit {
        prototypes: Vec::new(),
        strings: Vec::new(),
        entry: 0,
    };

    let mut next = read_len(bytes, &mut cursor)?;
    while next > 0 && next < file_length {
        let section = next;
        let mut cursor = section;
        let header_length = read_len(bytes, &mut cursor)?;
        let section_length = read_len(bytes, &mut cursor)?;
        next = read_len(bytes, &mut cursor)?;
        let kind = read_u16(bytes, &mut cursor)?;
        if next != 0 && next <= section {
            return Err(UnitFileError::Malformed { offset: section });
        }

        let mut body_start = section;
        take(bytes, &mut body_start, header_length)?;
        let body_length = section_length
            .checked_sub(header_length)
            .ok_or(UnitFileError::Truncated { offset: section })?;
        let body = take(bytes, &mut body_start, body_length)?;

        trace!(section, kind, length = body_length, "unit section");
        match kind {
            STRING_SECTION => read_strings(body, &mut unit)?,
            FUNCTION_SECTION => read_functions(body, &mut unit)?,
            other => return Err(UnitFileError::UnknownSection(other)),
        }
    }

    Ok(unit)
}

fn read_strings(body: &[u8], unit: &mut Unit) -> UnitFileResult<()> {
    let mut cursor = 0;
    while cursor < body.len() {
        unit.strings.push(read_string(body, &mut cursor)?);
    }
    Ok(())
}

fn read_functions(body: &[u8], unit: &mut Unit) -> UnitFileResult<()> {
    let mut cursor = 0;
    while cursor < body.len() {
        let start = cursor;
        let header_size = read_len(body, &mut cursor)?;
        let size = read_len(body, &mut cursor)?;
        let code_length = read_len(body, &mut cursor)?;
        let flags = read_u32(body, &mut cursor)?;
        let variable_count = read_len(body, &mut cursor)?;
        let local_variable_size = read_len(body, &mut cursor)?;

        // later versions may append header fields
        cursor = start;
        take(body, &mut cursor, header_size)?;

        let name = read_string(body, &mut cursor)?;
        let variables_in_context = (0..variable_count)
            .map(|_| read_string(body, &mut cursor))
            .collect::<UnitFileResult<Vec<_>>>()?;
        let code = take(body, &mut cursor, code_length)?.to_vec();

        if flags & FLAG_ENTRY != 0 {
            unit.entry = unit.prototypes.len();
        }
        unit.prototypes.push(Prototype {
            name,
            code,
            local_variable_size,
            variables_in_context,
        });

        if cursor - start > size {
            return Err(UnitFileError::Malformed { offset: start });
        }
        cursor = start;
        take(body, &mut cursor, size)?;
    }
    Ok(())
}
