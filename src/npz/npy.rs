//! NPY array parsing
//!
//! An NPY member is laid out as:
//!
//! ```text
//! \x93NUMPY | major | minor | header_len (u16 LE for v1, u32 LE for v2/v3)
//! {'descr': '<i8', 'fortran_order': False, 'shape': (3,), }   (space padded, '\n')
//! raw element data
//! ```
//!
//! Only the header is interpreted here; the data section is kept as raw
//! bytes and turned into a column by the materializer.

use crate::error::{ArchiveError, ArchiveResult};
use arrow::datatypes::TimeUnit;
use regex::Regex;
use std::sync::LazyLock;

/// Magic prefix of every NPY member
pub const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

static DESCR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'descr'\s*:\s*'([^']+)'").expect("Invalid descr regex")
});

static FORTRAN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'fortran_order'\s*:\s*(True|False)").expect("Invalid fortran_order regex")
});

static SHAPE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'shape'\s*:\s*\(([^)]*)\)").expect("Invalid shape regex")
});

static TYPESTR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // byte order, kind, item size, optional datetime unit
    Regex::new(r"^([<>|=]?)([biufMSU])(\d+)(?:\[(\w+)\])?$").expect("Invalid typestr regex")
});

/// Byte order of multi-byte elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
    /// Single-byte elements (`|`)
    NotApplicable,
}

/// Element kind from the dtype typestring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeKind {
    Bool,
    Int,
    UInt,
    Float,
    DateTime,
    /// Fixed-width, null-padded byte strings (`S`)
    Bytes,
    /// Fixed-width UTF-32 strings (`U`)
    Unicode,
}

/// Parsed dtype of an NPY array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dtype {
    pub kind: DtypeKind,
    pub byte_order: ByteOrder,
    /// Size of one element in bytes
    pub item_size: usize,
    /// Unit of `datetime64` elements
    pub time_unit: Option<TimeUnit>,
}

impl Dtype {
    /// Parse a numpy typestring such as `<i8`, `|u1`, `<M8[ns]` or `<U12`.
    ///
    /// Returns `None` for anything that cannot become a flat column
    /// (structured dtypes, objects, float16, calendar datetime units).
    pub fn parse(descr: &str) -> Option<Self> {
        let caps = TYPESTR_REGEX.captures(descr)?;
        let byte_order = match caps.get(1).map(|m| m.as_str()).unwrap_or("") {
            ">" => ByteOrder::Big,
            "|" => ByteOrder::NotApplicable,
            // '<', '=' and '' are native order; numpy only writes little endian natively
            _ => ByteOrder::Little,
        };
        let width: usize = caps[3].parse().ok()?;
        let unit = caps.get(4).map(|m| m.as_str());

        let (kind, item_size, time_unit) = match (&caps[2], width, unit) {
            ("b", 1, None) => (DtypeKind::Bool, 1, None),
            ("i", 1 | 2 | 4 | 8, None) => (DtypeKind::Int, width, None),
            ("u", 1 | 2 | 4 | 8, None) => (DtypeKind::UInt, width, None),
            ("f", 4 | 8, None) => (DtypeKind::Float, width, None),
            ("M", 8, Some(unit)) => {
                let unit = match unit {
                    "s" => TimeUnit::Second,
                    "ms" => TimeUnit::Millisecond,
                    "us" => TimeUnit::Microsecond,
                    "ns" => TimeUnit::Nanosecond,
                    _ => return None,
                };
                (DtypeKind::DateTime, 8, Some(unit))
            }
            ("S", n, None) if n > 0 => (DtypeKind::Bytes, n, None),
            ("U", n, None) if n > 0 => (DtypeKind::Unicode, n.checked_mul(4)?, None),
            _ => return None,
        };

        Some(Self {
            kind,
            byte_order,
            item_size,
            time_unit,
        })
    }

    /// True for `uint8`, the element type used to carry null-terminated text
    pub fn is_byte(&self) -> bool {
        self.kind == DtypeKind::UInt && self.item_size == 1
    }
}

/// One array read out of an NPY member
#[derive(Debug, Clone)]
pub struct NpyArray {
    pub dtype: Dtype,
    pub shape: Vec<usize>,
    pub fortran_order: bool,
    data: Vec<u8>,
}

impl NpyArray {
    /// Parse an NPY member. `name` is only used for error context.
    pub fn parse(name: &str, mut bytes: Vec<u8>) -> ArchiveResult<Self> {
        if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
            return Err(ArchiveError::BadMagic { name: name.into() });
        }

        let (major, minor) = (bytes[6], bytes[7]);
        let (header_len, prefix_len) = match major {
            1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
            2 | 3 => {
                if bytes.len() < 12 {
                    return Err(header_error(name, "truncated header length"));
                }
                let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
                (len as usize, 12)
            }
            _ => {
                return Err(ArchiveError::UnsupportedVersion {
                    name: name.into(),
                    major,
                    minor,
                })
            }
        };

        let data_start = prefix_len + header_len;
        if bytes.len() < data_start {
            return Err(header_error(name, "header extends past end of member"));
        }

        // v3 headers are UTF-8, v1/v2 are latin-1; the keys we read are ASCII either way
        let header = String::from_utf8_lossy(&bytes[prefix_len..data_start]);
        let (dtype, fortran_order, shape) = parse_header(name, &header)?;

        let data = bytes.split_off(data_start);
        let expected = shape
            .iter()
            .try_fold(dtype.item_size, |acc, d| acc.checked_mul(*d))
            .ok_or_else(|| header_error(name, "shape overflows usize"))?;
        if data.len() != expected {
            return Err(ArchiveError::DataSize {
                name: name.into(),
                expected,
                found: data.len(),
            });
        }

        Ok(Self {
            dtype,
            shape,
            fortran_order,
            data,
        })
    }

    /// Number of elements (product of the shape; 1 for a 0-d array)
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw element data in file order
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

fn parse_header(name: &str, header: &str) -> ArchiveResult<(Dtype, bool, Vec<usize>)> {
    let descr = DESCR_REGEX
        .captures(header)
        .map(|c| c[1].to_string())
        .ok_or_else(|| header_error(name, "missing or structured 'descr'"))?;

    let dtype = Dtype::parse(&descr).ok_or_else(|| ArchiveError::UnsupportedDtype {
        name: name.into(),
        descr: descr.clone(),
    })?;

    let fortran_order = FORTRAN_REGEX
        .captures(header)
        .map(|c| &c[1] == "True")
        .ok_or_else(|| header_error(name, "missing 'fortran_order'"))?;

    let shape_str = SHAPE_REGEX
        .captures(header)
        .map(|c| c[1].to_string())
        .ok_or_else(|| header_error(name, "missing 'shape'"))?;

    let shape = shape_str
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            // numpy on some platforms writes dimensions as '3L'
            s.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| header_error(name, &format!("invalid dimension '{}'", s)))
        })
        .collect::<ArchiveResult<Vec<_>>>()?;

    Ok((dtype, fortran_order, shape))
}

fn header_error(name: &str, reason: &str) -> ArchiveError {
    ArchiveError::Header {
        name: name.into(),
        reason: reason.into(),
    }
}

/// Encode an NPY v1 member. Used to build fixture archives in tests.
#[cfg(test)]
pub(crate) fn encode_npy(descr: &str, shape: &[usize], data: &[u8]) -> Vec<u8> {
    let dims = match shape {
        [one] => format!("{},", one),
        dims => dims
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    };
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': ({}), }}",
        descr, dims
    );
    // Pad so that the data section starts on a 64-byte boundary
    while (10 + header.len() + 1) % 64 != 0 {
        header.push(' ');
    }
    header.push('\n');

    let mut out = Vec::with_capacity(10 + header.len() + data.len());
    out.extend_from_slice(NPY_MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_parse_numeric() {
        let dt = Dtype::parse("<i8").unwrap();
        assert_eq!(dt.kind, DtypeKind::Int);
        assert_eq!(dt.item_size, 8);
        assert_eq!(dt.byte_order, ByteOrder::Little);

        let dt = Dtype::parse(">f4").unwrap();
        assert_eq!(dt.kind, DtypeKind::Float);
        assert_eq!(dt.byte_order, ByteOrder::Big);

        assert!(Dtype::parse("|u1").unwrap().is_byte());
        assert!(!Dtype::parse("|i1").unwrap().is_byte());
        assert!(!Dtype::parse("<u2").unwrap().is_byte());
    }

    #[test]
    fn test_dtype_parse_datetime_and_strings() {
        let dt = Dtype::parse("<M8[ns]").unwrap();
        assert_eq!(dt.kind, DtypeKind::DateTime);
        assert_eq!(dt.time_unit, Some(TimeUnit::Nanosecond));

        let dt = Dtype::parse("<U5").unwrap();
        assert_eq!(dt.kind, DtypeKind::Unicode);
        assert_eq!(dt.item_size, 20);

        let dt = Dtype::parse("|S3").unwrap();
        assert_eq!(dt.kind, DtypeKind::Bytes);
        assert_eq!(dt.item_size, 3);
    }

    #[test]
    fn test_dtype_parse_rejects_unsupported() {
        assert!(Dtype::parse("|O").is_none());
        assert!(Dtype::parse("<f2").is_none());
        assert!(Dtype::parse("<M8[D]").is_none());
        assert!(Dtype::parse("<c16").is_none());
        assert!(Dtype::parse("<i3").is_none());
    }

    #[test]
    fn test_parse_roundtrip_header() {
        let data: Vec<u8> = [1i64, 2, 3].iter().flat_map(|v| v.to_le_bytes()).collect();
        let bytes = encode_npy("<i8", &[3], &data);
        let array = NpyArray::parse("id", bytes).unwrap();
        assert_eq!(array.shape, vec![3]);
        assert_eq!(array.len(), 3);
        assert!(!array.fortran_order);
        assert_eq!(array.data(), data.as_slice());
    }

    #[test]
    fn test_parse_scalar_shape() {
        let bytes = encode_npy("<f8", &[], &2.5f64.to_le_bytes());
        let array = NpyArray::parse("x", bytes).unwrap();
        assert!(array.shape.is_empty());
        assert_eq!(array.len(), 1);
    }

    #[test]
    fn test_parse_bad_magic() {
        let err = NpyArray::parse("bad", b"PK\x03\x04 not npy".to_vec()).unwrap_err();
        assert!(matches!(err, ArchiveError::BadMagic { .. }));
    }

    #[test]
    fn test_parse_unsupported_version() {
        let mut bytes = encode_npy("<i8", &[0], &[]);
        bytes[6] = 9;
        let err = NpyArray::parse("v9", bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedVersion { major: 9, .. }));
    }

    #[test]
    fn test_parse_short_data() {
        let bytes = encode_npy("<i4", &[4], &[0u8; 12]);
        let err = NpyArray::parse("short", bytes).unwrap_err();
        match err {
            ArchiveError::DataSize {
                expected, found, ..
            } => {
                assert_eq!(expected, 16);
                assert_eq!(found, 12);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_shape_overflow() {
        let bytes = encode_npy("<i8", &[usize::MAX / 2, 4], &[]);
        let err = NpyArray::parse("huge", bytes).unwrap_err();
        match err {
            ArchiveError::Header { name, .. } => assert_eq!(name, "huge"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unicode_width_overflow() {
        assert!(Dtype::parse("<U4611686018427387904").is_none());

        let bytes = encode_npy("<U4611686018427387904", &[1], &[]);
        let err = NpyArray::parse("wide", bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedDtype { name, .. } if name == "wide"));
    }

    /// Re-frame a v1 member with a u32 header length and the given major version.
    fn reframe(v1: &[u8], major: u8) -> Vec<u8> {
        let header_len = u16::from_le_bytes([v1[8], v1[9]]) as usize;
        let header = &v1[10..10 + header_len];
        let mut out = NPY_MAGIC.to_vec();
        out.extend_from_slice(&[major, 0]);
        out.extend_from_slice(&(header.len() as u32).to_le_bytes());
        out.extend_from_slice(header);
        out.extend_from_slice(&v1[10 + header_len..]);
        out
    }

    #[test]
    fn test_parse_version_2_and_3() {
        let data: Vec<u8> = [7i32, -8].iter().flat_map(|v| v.to_le_bytes()).collect();
        let v1 = encode_npy("<i4", &[2], &data);

        for major in [2, 3] {
            let array = NpyArray::parse("v", reframe(&v1, major)).unwrap();
            assert_eq!(array.shape, vec![2]);
            assert_eq!(array.dtype.item_size, 4);
            assert_eq!(array.data(), data.as_slice());
        }
    }

    #[test]
    fn test_parse_version_2_truncated_length() {
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[2, 0, 0, 0]);
        let err = NpyArray::parse("cut", bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::Header { .. }));
    }

    #[test]
    fn test_parse_object_dtype() {
        let bytes = encode_npy("|O", &[1], &[0u8; 8]);
        let err = NpyArray::parse("obj", bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedDtype { .. }));
    }
}
