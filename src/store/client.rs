//! Array store client: groups, array handles, slice fetches.
//!
//! Built on a [`StoreTransport`], this layer resolves named chunked arrays
//! and assembles slice requests from the chunk objects that cover them. No
//! retries happen here; callers own that policy.

use log::{debug, trace};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::StoreError;
use crate::store::meta::{
    ARRAY_MARKER_KEY, ATTRS_KEY, ArrayData, ArrayDescriptor, Dtype, GROUP_MARKER_KEY,
    copy_region, decode_elements, encode_fill_value,
};
use crate::store::transport::StoreTransport;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// An opened group: a store prefix plus its parsed attributes.
#[derive(Debug, Clone)]
pub struct GroupHandle {
    path: String,
    attributes: JsonMap<String, JsonValue>,
}

impl GroupHandle {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn attr(&self, name: &str) -> Option<&JsonValue> {
        self.attributes.get(name)
    }

    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).and_then(JsonValue::as_f64)
    }
}

/// A resolved array: path, descriptor, and parsed dtype.
#[derive(Debug, Clone)]
pub struct ArrayHandle {
    path: String,
    descriptor: ArrayDescriptor,
    dtype: Dtype,
}

impl ArrayHandle {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Declared extent per axis.
    pub fn shape(&self) -> &[usize] {
        &self.descriptor.shape
    }

    pub fn rank(&self) -> usize {
        self.descriptor.shape.len()
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }
}

/// Per-axis slice specifier: pick one index (collapsing the axis) or keep
/// the whole axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSpec {
    Index(usize),
    All,
}

/// A fetched slice: typed row-major data plus the collapsed shape.
#[derive(Debug, Clone)]
pub struct Slice {
    pub data: ArrayData,
    pub shape: Vec<usize>,
}

// ---------------------------------------------------------------------------
// ArrayStoreClient
// ---------------------------------------------------------------------------

/// Chunked-array reader over a byte transport.
#[derive(Debug, Clone)]
pub struct ArrayStoreClient<T> {
    transport: T,
}

impl<T: StoreTransport> ArrayStoreClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Open the group at `path` (`""` for the store root).
    ///
    /// Fails with [`StoreError::NotFound`] if the group marker is absent and
    /// with [`StoreError::Connection`] if the store cannot be reached.
    pub async fn open_group(&self, path: &str) -> Result<GroupHandle, StoreError> {
        let marker_key = join_key(path, GROUP_MARKER_KEY);
        if self.transport.get(&marker_key).await?.is_none() {
            return Err(StoreError::NotFound(path.to_string()));
        }

        let attributes = match self.transport.get(&join_key(path, ATTRS_KEY)).await? {
            None => JsonMap::new(),
            Some(document) => match serde_json::from_slice(&document) {
                Ok(JsonValue::Object(map)) => map,
                Ok(_) | Err(_) => {
                    return Err(StoreError::InvalidMetadata(format!(
                        "attributes of `{path}` are not a JSON object"
                    )));
                }
            },
        };
        debug!("opened group `{path}` ({} attributes)", attributes.len());
        Ok(GroupHandle {
            path: path.to_string(),
            attributes,
        })
    }

    /// Resolve the array named `name` inside `group`.
    pub async fn resolve(
        &self,
        group: &GroupHandle,
        name: &str,
    ) -> Result<ArrayHandle, StoreError> {
        let path = join_key(&group.path, name);
        let document = self
            .transport
            .get(&join_key(&path, ARRAY_MARKER_KEY))
            .await?
            .ok_or_else(|| StoreError::NotFound(path.clone()))?;
        let descriptor = ArrayDescriptor::from_document(&path, &document)?;
        let dtype = Dtype::parse(&descriptor.dtype)?;
        debug!(
            "resolved array `{path}`: shape {:?}, dtype {:?}",
            descriptor.shape, dtype
        );
        Ok(ArrayHandle {
            path,
            descriptor,
            dtype,
        })
    }

    /// Fetch the selection described by one [`AxisSpec`] per axis.
    ///
    /// Indexed axes are collapsed out of the returned shape; chunks the
    /// selection overlaps are fetched and assembled, with absent chunk
    /// objects read as the array's fill value.
    pub async fn fetch_slice(
        &self,
        array: &ArrayHandle,
        spec: &[AxisSpec],
    ) -> Result<Slice, StoreError> {
        let shape = &array.descriptor.shape;
        let chunks = &array.descriptor.chunks;
        let rank = shape.len();
        if spec.len() != rank {
            return Err(StoreError::SliceShape {
                path: array.path.clone(),
                rank,
                given: spec.len(),
            });
        }

        // Resolve the spec to a per-axis (start, len) window.
        let mut starts = Vec::with_capacity(rank);
        let mut lens = Vec::with_capacity(rank);
        let mut collapsed_shape = Vec::new();
        for (axis, &axis_spec) in spec.iter().enumerate() {
            match axis_spec {
                AxisSpec::Index(index) => {
                    if index >= shape[axis] {
                        return Err(StoreError::OutOfRange {
                            path: array.path.clone(),
                            axis,
                            index,
                            extent: shape[axis],
                        });
                    }
                    starts.push(index);
                    lens.push(1);
                }
                AxisSpec::All => {
                    starts.push(0);
                    lens.push(shape[axis]);
                    collapsed_shape.push(shape[axis]);
                }
            }
        }

        let item_size = array.dtype.item_size();
        let total: usize = lens.iter().product();
        if total == 0 {
            return Ok(Slice {
                data: decode_elements(&[], array.dtype, 0)?,
                shape: collapsed_shape,
            });
        }
        let fill = encode_fill_value(array.dtype, &array.descriptor.fill_value)?;
        let mut assembled = vec![0u8; total * item_size];
        for element in assembled.chunks_exact_mut(item_size) {
            element.copy_from_slice(&fill);
        }

        // Walk every chunk the window overlaps.
        let separator = array.descriptor.separator();
        let chunk_lo: Vec<usize> = starts.iter().zip(chunks).map(|(&s, &w)| s / w).collect();
        let chunk_hi: Vec<usize> = starts
            .iter()
            .zip(&lens)
            .zip(chunks)
            .map(|((&s, &l), &w)| (s + l - 1) / w)
            .collect();

        let mut coord = chunk_lo.clone();
        'chunks: loop {
            let key = chunk_key(&array.path, &coord, separator);
            trace!("assembling `{key}`");
            if let Some(bytes) = self.transport.get(&key).await? {
                let expected = array.descriptor.chunk_element_count() * item_size;
                if bytes.len() != expected {
                    return Err(StoreError::InvalidMetadata(format!(
                        "chunk `{key}` holds {} bytes, expected {expected}",
                        bytes.len()
                    )));
                }

                // Overlap between this chunk and the requested window,
                // in array coordinates.
                let chunk_origin: Vec<usize> =
                    coord.iter().zip(chunks).map(|(&c, &w)| c * w).collect();
                let lo: Vec<usize> = chunk_origin
                    .iter()
                    .zip(&starts)
                    .map(|(&o, &s)| o.max(s))
                    .collect();
                let hi: Vec<usize> = chunk_origin
                    .iter()
                    .zip(chunks)
                    .zip(starts.iter().zip(&lens))
                    .map(|((&o, &w), (&s, &l))| (o + w).min(s + l))
                    .collect();
                let region: Vec<usize> = lo.iter().zip(&hi).map(|(&a, &b)| b - a).collect();
                let src_origin: Vec<usize> = lo
                    .iter()
                    .zip(&chunk_origin)
                    .map(|(&a, &o)| a - o)
                    .collect();
                let dst_origin: Vec<usize> =
                    lo.iter().zip(&starts).map(|(&a, &s)| a - s).collect();

                copy_region(
                    &bytes,
                    chunks,
                    &src_origin,
                    &mut assembled,
                    &lens,
                    &dst_origin,
                    &region,
                    item_size,
                );
            }

            // Advance to the next overlapping chunk coordinate.
            let mut axis = rank;
            loop {
                if axis == 0 {
                    break 'chunks;
                }
                axis -= 1;
                coord[axis] += 1;
                if coord[axis] <= chunk_hi[axis] {
                    break;
                }
                coord[axis] = chunk_lo[axis];
            }
        }

        let data = decode_elements(&assembled, array.dtype, total)?;
        Ok(Slice {
            data,
            shape: collapsed_shape,
        })
    }
}

fn join_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

fn chunk_key(path: &str, coord: &[usize], separator: char) -> String {
    let name: Vec<String> = coord.iter().map(|c| c.to_string()).collect();
    let mut joined = String::new();
    for (i, part) in name.iter().enumerate() {
        if i > 0 {
            joined.push(separator);
        }
        joined.push_str(part);
    }
    format!("{path}/{joined}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStoreBuilder;
    use serde_json::json;

    fn dense_3d(units: usize, samples: usize, channels: usize) -> Vec<f32> {
        // Value encodes its coordinates, so misplaced copies are visible.
        let mut values = Vec::with_capacity(units * samples * channels);
        for u in 0..units {
            for s in 0..samples {
                for c in 0..channels {
                    values.push((u * 10_000 + s * 100 + c) as f32);
                }
            }
        }
        values
    }

    #[tokio::test]
    async fn open_group_distinguishes_missing_from_present() {
        let store = MemoryStoreBuilder::new().group("probe").build();
        let client = ArrayStoreClient::new(store);

        assert!(client.open_group("").await.is_ok());
        assert!(client.open_group("probe").await.is_ok());
        assert!(matches!(
            client.open_group("nope").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn group_attributes_are_exposed() {
        let store = MemoryStoreBuilder::new()
            .attributes("", json!({"sampling_frequency": 30000.0}))
            .build();
        let client = ArrayStoreClient::new(store);
        let root = client.open_group("").await.unwrap();
        assert_eq!(root.attr_f64("sampling_frequency"), Some(30000.0));
        assert_eq!(root.attr_f64("absent"), None);
    }

    #[tokio::test]
    async fn resolve_reports_missing_arrays() {
        let store = MemoryStoreBuilder::new().build();
        let client = ArrayStoreClient::new(store);
        let root = client.open_group("").await.unwrap();
        assert!(matches!(
            client.resolve(&root, "templates_array").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn slice_spec_rank_is_validated() {
        let store = MemoryStoreBuilder::new()
            .float32_array("t", &[2, 3], &[2, 3], &[0.0; 6])
            .build();
        let client = ArrayStoreClient::new(store);
        let root = client.open_group("").await.unwrap();
        let array = client.resolve(&root, "t").await.unwrap();

        assert!(matches!(
            client.fetch_slice(&array, &[AxisSpec::All]).await,
            Err(StoreError::SliceShape { rank: 2, given: 1, .. })
        ));
        assert!(matches!(
            client
                .fetch_slice(&array, &[AxisSpec::Index(2), AxisSpec::All])
                .await,
            Err(StoreError::OutOfRange {
                axis: 0,
                index: 2,
                extent: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn single_index_slice_collapses_the_axis() {
        let values = dense_3d(3, 4, 2);
        let store = MemoryStoreBuilder::new()
            .float32_array("t", &[3, 4, 2], &[1, 4, 2], &values)
            .build();
        let client = ArrayStoreClient::new(store);
        let root = client.open_group("").await.unwrap();
        let array = client.resolve(&root, "t").await.unwrap();

        let slice = client
            .fetch_slice(&array, &[AxisSpec::Index(2), AxisSpec::All, AxisSpec::All])
            .await
            .unwrap();
        assert_eq!(slice.shape, vec![4, 2]);
        let expected: Vec<f32> = values[2 * 8..3 * 8].to_vec();
        assert_eq!(slice.data, ArrayData::Float32(expected));
    }

    #[tokio::test]
    async fn assembly_spans_chunk_boundaries() {
        // Chunks deliberately misaligned with the slice: 3x4x2 array in
        // 2x3x2 chunks, so a unit slice crosses chunk edges on both axes.
        let values = dense_3d(3, 4, 2);
        let store = MemoryStoreBuilder::new()
            .float32_array("t", &[3, 4, 2], &[2, 3, 2], &values)
            .build();
        let client = ArrayStoreClient::new(store);
        let root = client.open_group("").await.unwrap();
        let array = client.resolve(&root, "t").await.unwrap();

        for unit in 0..3 {
            let slice = client
                .fetch_slice(&array, &[AxisSpec::Index(unit), AxisSpec::All, AxisSpec::All])
                .await
                .unwrap();
            assert_eq!(slice.shape, vec![4, 2]);
            let expected: Vec<f32> = values[unit * 8..(unit + 1) * 8].to_vec();
            assert_eq!(slice.data, ArrayData::Float32(expected), "unit {unit}");
        }
    }

    #[tokio::test]
    async fn whole_array_fetch_matches_dense_values() {
        let values = dense_3d(3, 4, 2);
        let store = MemoryStoreBuilder::new()
            .float32_array("t", &[3, 4, 2], &[2, 3, 2], &values)
            .build();
        let client = ArrayStoreClient::new(store);
        let root = client.open_group("").await.unwrap();
        let array = client.resolve(&root, "t").await.unwrap();

        let slice = client
            .fetch_slice(&array, &[AxisSpec::All, AxisSpec::All, AxisSpec::All])
            .await
            .unwrap();
        assert_eq!(slice.shape, vec![3, 4, 2]);
        assert_eq!(slice.data, ArrayData::Float32(values));
    }

    #[tokio::test]
    async fn missing_chunks_read_as_fill_value() {
        let store = MemoryStoreBuilder::new()
            .float32_array("t", &[4], &[2], &[1.0, 2.0, 3.0, 4.0])
            .without("t/1")
            .build();
        let client = ArrayStoreClient::new(store);
        let root = client.open_group("").await.unwrap();
        let array = client.resolve(&root, "t").await.unwrap();

        let slice = client.fetch_slice(&array, &[AxisSpec::All]).await.unwrap();
        assert_eq!(slice.data, ArrayData::Float32(vec![1.0, 2.0, 0.0, 0.0]));
    }

    #[tokio::test]
    async fn text_arrays_round_trip() {
        let store = MemoryStoreBuilder::new()
            .text_array("brain_area", &["CA1", "CA3", "DG"])
            .build();
        let client = ArrayStoreClient::new(store);
        let root = client.open_group("").await.unwrap();
        let array = client.resolve(&root, "brain_area").await.unwrap();

        let slice = client.fetch_slice(&array, &[AxisSpec::All]).await.unwrap();
        assert_eq!(
            slice.data,
            ArrayData::Text(vec!["CA1".into(), "CA3".into(), "DG".into()])
        );
    }
}
