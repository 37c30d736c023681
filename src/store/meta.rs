//! Chunked-array metadata: descriptor documents, dtypes, element codecs.
//!
//! The store follows the Zarr v2 key layout: a group is a key prefix holding
//! a `.zgroup` marker and optional `.zattrs` attributes, an array is
//! described by a `<name>/.zarray` JSON document, and chunk objects live at
//! `<name>/<i>.<j>...`. Only the subset the template datasets actually use is
//! read here: C-order, little-endian, uncompressed chunks.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::StoreError;

/// Key of the group marker document.
pub(crate) const GROUP_MARKER_KEY: &str = ".zgroup";
/// Key of a group's attribute document.
pub(crate) const ATTRS_KEY: &str = ".zattrs";
/// Key of an array's descriptor document.
pub(crate) const ARRAY_MARKER_KEY: &str = ".zarray";

// ---------------------------------------------------------------------------
// Array descriptor (the `.zarray` document)
// ---------------------------------------------------------------------------

/// Parsed array descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct ArrayDescriptor {
    /// Extent per axis.
    pub shape: Vec<usize>,
    /// Chunk extent per axis.
    pub chunks: Vec<usize>,
    /// Dtype string, e.g. `"<f4"`.
    pub dtype: String,
    /// Memory layout; only `"C"` is readable.
    #[serde(default)]
    pub order: Option<String>,
    /// Value read for chunks absent from the store.
    #[serde(default)]
    pub fill_value: JsonValue,
    #[serde(default)]
    pub compressor: Option<JsonValue>,
    #[serde(default)]
    pub filters: Option<JsonValue>,
    /// Separator between chunk coordinates in chunk keys (default `"."`).
    #[serde(default)]
    pub dimension_separator: Option<String>,
}

impl ArrayDescriptor {
    /// Parse and sanity-check a descriptor document.
    pub fn from_document(path: &str, document: &[u8]) -> Result<Self, StoreError> {
        let descriptor: ArrayDescriptor = serde_json::from_slice(document)
            .map_err(|e| StoreError::InvalidMetadata(format!("`{path}`: {e}")))?;

        if descriptor.shape.is_empty() || descriptor.shape.len() != descriptor.chunks.len() {
            return Err(StoreError::InvalidMetadata(format!(
                "`{path}`: shape {:?} and chunks {:?} disagree",
                descriptor.shape, descriptor.chunks
            )));
        }
        if descriptor.chunks.iter().any(|&c| c == 0) {
            return Err(StoreError::InvalidMetadata(format!(
                "`{path}`: zero-sized chunk axis"
            )));
        }
        match descriptor.order.as_deref() {
            None | Some("C") => {}
            Some(other) => {
                return Err(StoreError::UnsupportedEncoding(format!(
                    "`{path}` uses {other}-order layout"
                )));
            }
        }
        if !matches!(descriptor.compressor, None | Some(JsonValue::Null)) {
            return Err(StoreError::UnsupportedEncoding(format!(
                "`{path}` uses a compressor; only raw chunks are readable"
            )));
        }
        match &descriptor.filters {
            None | Some(JsonValue::Null) => {}
            Some(JsonValue::Array(filters)) if filters.is_empty() => {}
            Some(_) => {
                return Err(StoreError::UnsupportedEncoding(format!(
                    "`{path}` uses filters; only raw chunks are readable"
                )));
            }
        }
        match descriptor.dimension_separator.as_deref() {
            None | Some(".") | Some("/") => {}
            Some(other) => {
                return Err(StoreError::InvalidMetadata(format!(
                    "`{path}`: unknown dimension separator `{other}`"
                )));
            }
        }
        Ok(descriptor)
    }

    pub fn separator(&self) -> char {
        match self.dimension_separator.as_deref() {
            Some("/") => '/',
            _ => '.',
        }
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn chunk_element_count(&self) -> usize {
        self.chunks.iter().product()
    }
}

// ---------------------------------------------------------------------------
// Dtypes
// ---------------------------------------------------------------------------

/// Element type of an array, with its byte width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    Bool,
    Int(usize),
    UInt(usize),
    Float(usize),
    /// Fixed-width UCS-4 text of the given character count.
    Text(usize),
}

impl Dtype {
    /// Parse a NumPy-style dtype string (`"<f4"`, `"|u1"`, `"<U12"`, ...).
    ///
    /// Big-endian data is not readable on this path and is rejected rather
    /// than byte-swapped.
    pub fn parse(s: &str) -> Result<Dtype, StoreError> {
        let mut chars = s.chars();
        let (endian, code) = match (chars.next(), chars.next()) {
            (Some(e @ ('<' | '|' | '>')), Some(c)) => (e, c),
            _ => {
                return Err(StoreError::InvalidMetadata(format!("bad dtype `{s}`")));
            }
        };
        let width: usize = chars
            .as_str()
            .parse()
            .map_err(|_| StoreError::InvalidMetadata(format!("bad dtype `{s}`")))?;
        if endian == '>' && (code == 'U' || width > 1) {
            return Err(StoreError::UnsupportedEncoding(format!(
                "big-endian dtype `{s}`"
            )));
        }
        match (code, width) {
            ('b', 1) => Ok(Dtype::Bool),
            ('i', 1 | 2 | 4 | 8) => Ok(Dtype::Int(width)),
            ('u', 1 | 2 | 4 | 8) => Ok(Dtype::UInt(width)),
            ('f', 4 | 8) => Ok(Dtype::Float(width)),
            ('U', n) if n >= 1 => Ok(Dtype::Text(n)),
            _ => Err(StoreError::UnsupportedEncoding(format!("dtype `{s}`"))),
        }
    }

    /// Byte width of a single element.
    pub fn item_size(&self) -> usize {
        match *self {
            Dtype::Bool => 1,
            Dtype::Int(w) | Dtype::UInt(w) | Dtype::Float(w) => w,
            Dtype::Text(chars) => 4 * chars,
        }
    }
}

// ---------------------------------------------------------------------------
// Typed element buffers
// ---------------------------------------------------------------------------

/// Decoded elements of an array slice, in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Bool(Vec<bool>),
    Text(Vec<String>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Float32(v) => v.len(),
            ArrayData::Float64(v) => v.len(),
            ArrayData::Int(v) => v.len(),
            ArrayData::UInt(v) => v.len(),
            ArrayData::Bool(v) => v.len(),
            ArrayData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coerce numeric data to `f32`, the working precision of the analysis
    /// layer. Text data has no numeric reading and is rejected.
    pub fn into_f32(self) -> Result<Vec<f32>, StoreError> {
        match self {
            ArrayData::Float32(v) => Ok(v),
            ArrayData::Float64(v) => Ok(v.into_iter().map(|x| x as f32).collect()),
            ArrayData::Int(v) => Ok(v.into_iter().map(|x| x as f32).collect()),
            ArrayData::UInt(v) => Ok(v.into_iter().map(|x| x as f32).collect()),
            ArrayData::Bool(_) | ArrayData::Text(_) => Err(StoreError::UnsupportedEncoding(
                "expected numeric array data".into(),
            )),
        }
    }
}

/// Decode `count` raw little-endian elements into a typed buffer.
pub(crate) fn decode_elements(
    bytes: &[u8],
    dtype: Dtype,
    count: usize,
) -> Result<ArrayData, StoreError> {
    let expected = count * dtype.item_size();
    if bytes.len() != expected {
        return Err(StoreError::InvalidMetadata(format!(
            "expected {expected} data bytes, got {}",
            bytes.len()
        )));
    }
    let data = match dtype {
        Dtype::Bool => ArrayData::Bool(bytes.iter().map(|&b| b != 0).collect()),
        Dtype::Float(4) => ArrayData::Float32(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        Dtype::Float(_) => ArrayData::Float64(
            bytes
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        ),
        Dtype::Int(width) => ArrayData::Int(
            bytes
                .chunks_exact(width)
                .map(|c| match width {
                    1 => c[0] as i8 as i64,
                    2 => i16::from_le_bytes([c[0], c[1]]) as i64,
                    4 => i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as i64,
                    _ => i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]),
                })
                .collect(),
        ),
        Dtype::UInt(width) => ArrayData::UInt(
            bytes
                .chunks_exact(width)
                .map(|c| match width {
                    1 => c[0] as u64,
                    2 => u16::from_le_bytes([c[0], c[1]]) as u64,
                    4 => u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as u64,
                    _ => u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]),
                })
                .collect(),
        ),
        Dtype::Text(chars) => ArrayData::Text(
            bytes
                .chunks_exact(4 * chars)
                .map(|element| {
                    element
                        .chunks_exact(4)
                        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                        .take_while(|&code| code != 0)
                        .map(|code| char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
                        .collect::<String>()
                })
                .collect(),
        ),
    };
    Ok(data)
}

/// Encode a descriptor's fill value as one raw element.
pub(crate) fn encode_fill_value(dtype: Dtype, fill: &JsonValue) -> Result<Vec<u8>, StoreError> {
    let item = dtype.item_size();
    let bad = |fill: &JsonValue| {
        StoreError::InvalidMetadata(format!("fill value {fill} does not match dtype"))
    };
    match dtype {
        _ if fill.is_null() => Ok(vec![0u8; item]),
        Dtype::Bool => Ok(vec![u8::from(fill.as_bool().ok_or_else(|| bad(fill))?)]),
        Dtype::Float(width) => {
            // Zarr serializes non-finite fill values as strings.
            let value = match fill {
                JsonValue::String(s) => match s.as_str() {
                    "NaN" => f64::NAN,
                    "Infinity" => f64::INFINITY,
                    "-Infinity" => f64::NEG_INFINITY,
                    _ => return Err(bad(fill)),
                },
                _ => fill.as_f64().ok_or_else(|| bad(fill))?,
            };
            Ok(if width == 4 {
                (value as f32).to_le_bytes().to_vec()
            } else {
                value.to_le_bytes().to_vec()
            })
        }
        Dtype::Int(width) => {
            let value = fill.as_i64().ok_or_else(|| bad(fill))?;
            Ok(value.to_le_bytes()[..width].to_vec())
        }
        Dtype::UInt(width) => {
            let value = fill.as_u64().ok_or_else(|| bad(fill))?;
            Ok(value.to_le_bytes()[..width].to_vec())
        }
        Dtype::Text(_) => Ok(vec![0u8; item]),
    }
}

// ---------------------------------------------------------------------------
// Row-major block copy
// ---------------------------------------------------------------------------

/// Copy a rectangular region between two row-major byte buffers.
///
/// `region` gives the extent of the copied block per axis; `src_origin` /
/// `dst_origin` locate it inside buffers of shape `src_dims` / `dst_dims`.
/// All three slices share the arrays' rank, and the region must fit inside
/// both buffers. Runs along the last axis are contiguous and copied whole.
pub(crate) fn copy_region(
    src: &[u8],
    src_dims: &[usize],
    src_origin: &[usize],
    dst: &mut [u8],
    dst_dims: &[usize],
    dst_origin: &[usize],
    region: &[usize],
    item_size: usize,
) {
    let rank = region.len();
    if region.iter().any(|&r| r == 0) {
        return;
    }
    let run_len = region[rank - 1] * item_size;

    // Row-major strides, in bytes.
    let strides = |dims: &[usize]| -> Vec<usize> {
        let mut strides = vec![item_size; rank];
        for axis in (0..rank - 1).rev() {
            strides[axis] = strides[axis + 1] * dims[axis + 1];
        }
        strides
    };
    let src_strides = strides(src_dims);
    let dst_strides = strides(dst_dims);

    // Odometer over the outer axes; the last axis is the contiguous run.
    let mut cursor = vec![0usize; rank.saturating_sub(1)];
    loop {
        let mut src_offset = src_origin[rank - 1] * item_size;
        let mut dst_offset = dst_origin[rank - 1] * item_size;
        for axis in 0..rank - 1 {
            src_offset += (src_origin[axis] + cursor[axis]) * src_strides[axis];
            dst_offset += (dst_origin[axis] + cursor[axis]) * dst_strides[axis];
        }
        dst[dst_offset..dst_offset + run_len]
            .copy_from_slice(&src[src_offset..src_offset + run_len]);

        // Advance the odometer, least significant axis last.
        let mut axis = cursor.len();
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            cursor[axis] += 1;
            if cursor[axis] < region[axis] {
                break;
            }
            cursor[axis] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_common_dtypes() {
        assert_eq!(Dtype::parse("<f4").unwrap(), Dtype::Float(4));
        assert_eq!(Dtype::parse("<f8").unwrap(), Dtype::Float(8));
        assert_eq!(Dtype::parse("<i8").unwrap(), Dtype::Int(8));
        assert_eq!(Dtype::parse("|u1").unwrap(), Dtype::UInt(1));
        assert_eq!(Dtype::parse("|b1").unwrap(), Dtype::Bool);
        assert_eq!(Dtype::parse("<U12").unwrap(), Dtype::Text(12));
        assert_eq!(Dtype::parse("<U12").unwrap().item_size(), 48);
    }

    #[test]
    fn rejects_big_endian_and_garbage() {
        assert!(matches!(
            Dtype::parse(">f4"),
            Err(StoreError::UnsupportedEncoding(_))
        ));
        assert!(Dtype::parse("f4").is_err());
        assert!(Dtype::parse("<x4").is_err());
    }

    #[test]
    fn decodes_f32_elements() {
        let bytes: Vec<u8> = [1.0f32, -2.5, 0.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let data = decode_elements(&bytes, Dtype::Float(4), 3).unwrap();
        assert_eq!(data, ArrayData::Float32(vec![1.0, -2.5, 0.0]));
    }

    #[test]
    fn decodes_fixed_width_text() {
        // "CA1" and "DG" padded to 4 UCS-4 characters.
        let mut bytes = Vec::new();
        for text in ["CA1", "DG"] {
            let mut codes: Vec<u32> = text.chars().map(|c| c as u32).collect();
            codes.resize(4, 0);
            bytes.extend(codes.iter().flat_map(|c| c.to_le_bytes()));
        }
        let data = decode_elements(&bytes, Dtype::Text(4), 2).unwrap();
        assert_eq!(
            data,
            ArrayData::Text(vec!["CA1".to_string(), "DG".to_string()])
        );
    }

    #[test]
    fn decode_rejects_short_buffers() {
        assert!(decode_elements(&[0u8; 7], Dtype::Float(4), 2).is_err());
    }

    #[test]
    fn fill_value_encoding() {
        assert_eq!(
            encode_fill_value(Dtype::Float(4), &json!(1.5)).unwrap(),
            1.5f32.to_le_bytes().to_vec()
        );
        assert_eq!(
            encode_fill_value(Dtype::Int(2), &json!(-1)).unwrap(),
            vec![0xff, 0xff]
        );
        assert_eq!(
            encode_fill_value(Dtype::Float(8), &json!(null)).unwrap(),
            vec![0u8; 8]
        );
        let nan = encode_fill_value(Dtype::Float(4), &json!("NaN")).unwrap();
        assert!(f32::from_le_bytes([nan[0], nan[1], nan[2], nan[3]]).is_nan());
    }

    #[test]
    fn descriptor_rejects_compressed_arrays() {
        let document = json!({
            "zarr_format": 2,
            "shape": [4, 4],
            "chunks": [2, 2],
            "dtype": "<f4",
            "order": "C",
            "fill_value": 0.0,
            "compressor": {"id": "blosc"},
        });
        let result = ArrayDescriptor::from_document("t", document.to_string().as_bytes());
        assert!(matches!(result, Err(StoreError::UnsupportedEncoding(_))));
    }

    #[test]
    fn copy_region_moves_interior_blocks() {
        // 4x4 source of single bytes, copy the central 2x2 into a 2x2 target.
        let src: Vec<u8> = (0..16).collect();
        let mut dst = vec![0u8; 4];
        copy_region(&src, &[4, 4], &[1, 1], &mut dst, &[2, 2], &[0, 0], &[2, 2], 1);
        assert_eq!(dst, vec![5, 6, 9, 10]);
    }

    #[test]
    fn copy_region_handles_rank_one() {
        let src: Vec<u8> = (0..8).collect();
        let mut dst = vec![0u8; 3];
        copy_region(&src, &[8], &[2], &mut dst, &[3], &[0], &[3], 1);
        assert_eq!(dst, vec![2, 3, 4]);
    }
}
