//! In-memory store and a builder for synthetic datasets.
//!
//! [`MemoryTransport`] backs the test suite and the offline demo; the
//! builder writes the same key layout the remote datasets use (group
//! markers, JSON array descriptors, raw little-endian chunks), so everything
//! downstream of the transport exercises the production decode path.

use std::collections::HashMap;

use serde_json::{Value as JsonValue, json};

use crate::error::TransportError;
use crate::store::meta::{ARRAY_MARKER_KEY, ATTRS_KEY, GROUP_MARKER_KEY, copy_region};
use crate::store::transport::StoreTransport;

// ---------------------------------------------------------------------------
// MemoryTransport
// ---------------------------------------------------------------------------

/// A key → bytes map with the [`StoreTransport`] contract.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    objects: HashMap<String, Vec<u8>>,
}

impl MemoryTransport {
    pub fn insert(&mut self, key: impl Into<String>, bytes: Vec<u8>) {
        self.objects.insert(key.into(), bytes);
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<u8>> {
        self.objects.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }
}

impl StoreTransport for MemoryTransport {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.objects.get(key).cloned())
    }
}

// ---------------------------------------------------------------------------
// MemoryStoreBuilder
// ---------------------------------------------------------------------------

/// Builds a well-formed in-memory store, one group or array at a time.
///
/// The root group marker is written on construction; paths are key prefixes
/// relative to the store root (`""` is the root group).
pub struct MemoryStoreBuilder {
    transport: MemoryTransport,
}

impl MemoryStoreBuilder {
    pub fn new() -> Self {
        let mut transport = MemoryTransport::default();
        transport.insert(GROUP_MARKER_KEY, group_marker());
        Self { transport }
    }

    /// Add a sub-group at `path`.
    pub fn group(mut self, path: &str) -> Self {
        self.transport
            .insert(join(path, GROUP_MARKER_KEY), group_marker());
        self
    }

    /// Attach a JSON attribute document to the group at `path`.
    pub fn attributes(mut self, path: &str, attrs: JsonValue) -> Self {
        self.transport
            .insert(join(path, ATTRS_KEY), attrs.to_string().into_bytes());
        self
    }

    /// Add an `f32` array with an explicit chunk layout. `values` are dense
    /// row-major and split into chunk objects the way the store expects.
    pub fn float32_array(
        mut self,
        path: &str,
        shape: &[usize],
        chunks: &[usize],
        values: &[f32],
    ) -> Self {
        assert_eq!(values.len(), shape.iter().product::<usize>());
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.write_descriptor(path, shape, chunks, "<f4", json!(0.0));
        self.write_chunks(path, shape, chunks, &bytes, 4);
        self
    }

    /// Add a one-dimensional `i64` array stored as a single chunk.
    pub fn int64_array(mut self, path: &str, values: &[i64]) -> Self {
        let shape = [values.len()];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.write_descriptor(path, &shape, &shape, "<i8", json!(0));
        self.write_chunks(path, &shape, &shape, &bytes, 8);
        self
    }

    /// Add a one-dimensional fixed-width text array stored as a single
    /// chunk; the character width is the longest value.
    pub fn text_array(mut self, path: &str, values: &[&str]) -> Self {
        let width = values
            .iter()
            .map(|v| v.chars().count())
            .max()
            .unwrap_or(0)
            .max(1);
        let mut bytes = Vec::with_capacity(values.len() * 4 * width);
        for value in values {
            let mut codes: Vec<u32> = value.chars().map(|c| c as u32).collect();
            codes.resize(width, 0);
            bytes.extend(codes.iter().flat_map(|c| c.to_le_bytes()));
        }
        let shape = [values.len()];
        self.write_descriptor(path, &shape, &shape, &format!("<U{width}"), JsonValue::Null);
        self.write_chunks(path, &shape, &shape, &bytes, 4 * width);
        self
    }

    /// Drop a single key again, e.g. to simulate a missing chunk object.
    pub fn without(mut self, key: &str) -> Self {
        self.transport.remove(key);
        self
    }

    pub fn build(self) -> MemoryTransport {
        self.transport
    }

    fn write_descriptor(
        &mut self,
        path: &str,
        shape: &[usize],
        chunks: &[usize],
        dtype: &str,
        fill_value: JsonValue,
    ) {
        let descriptor = json!({
            "zarr_format": 2,
            "shape": shape,
            "chunks": chunks,
            "dtype": dtype,
            "order": "C",
            "fill_value": fill_value,
            "compressor": null,
            "filters": null,
        });
        self.transport.insert(
            join(path, ARRAY_MARKER_KEY),
            descriptor.to_string().into_bytes(),
        );
    }

    fn write_chunks(
        &mut self,
        path: &str,
        shape: &[usize],
        chunks: &[usize],
        dense: &[u8],
        item_size: usize,
    ) {
        let rank = shape.len();
        let grid: Vec<usize> = shape
            .iter()
            .zip(chunks)
            .map(|(&extent, &chunk)| extent.div_ceil(chunk))
            .collect();
        let chunk_bytes: usize = chunks.iter().product::<usize>() * item_size;

        let mut coord = vec![0usize; rank];
        loop {
            let origin: Vec<usize> = coord.iter().zip(chunks).map(|(&c, &w)| c * w).collect();
            let region: Vec<usize> = origin
                .iter()
                .zip(shape)
                .zip(chunks)
                .map(|((&o, &extent), &w)| w.min(extent - o))
                .collect();

            let mut buffer = vec![0u8; chunk_bytes];
            copy_region(
                dense,
                shape,
                &origin,
                &mut buffer,
                chunks,
                &vec![0usize; rank],
                &region,
                item_size,
            );
            let name: Vec<String> = coord.iter().map(|c| c.to_string()).collect();
            self.transport.insert(join(path, &name.join(".")), buffer);

            // Advance to the next chunk coordinate.
            let mut axis = rank;
            loop {
                if axis == 0 {
                    return;
                }
                axis -= 1;
                coord[axis] += 1;
                if coord[axis] < grid[axis] {
                    break;
                }
                coord[axis] = 0;
            }
        }
    }
}

impl Default for MemoryStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn group_marker() -> Vec<u8> {
    json!({"zarr_format": 2}).to_string().into_bytes()
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_writes_markers_and_chunks() {
        let store = MemoryStoreBuilder::new()
            .group("probe")
            .float32_array("templates_array", &[2, 3], &[1, 3], &[0.0; 6])
            .build();

        assert!(store.contains(".zgroup"));
        assert!(store.contains("probe/.zgroup"));
        assert!(store.contains("templates_array/.zarray"));
        assert!(store.contains("templates_array/0.0"));
        assert!(store.contains("templates_array/1.0"));
        assert!(!store.contains("templates_array/2.0"));

        let chunk = store.get("templates_array/0.0").await.unwrap().unwrap();
        assert_eq!(chunk.len(), 3 * 4);
    }

    #[tokio::test]
    async fn partial_edge_chunks_are_zero_padded() {
        // 1-d array of 5 elements in chunks of 4: second chunk is half real.
        let values = [1.0f32, 2.0, 3.0, 4.0, 5.0];
        let store = MemoryStoreBuilder::new()
            .float32_array("a", &[5], &[4], &values)
            .build();

        let chunk = store.get("a/1").await.unwrap().unwrap();
        assert_eq!(chunk.len(), 16);
        assert_eq!(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]), 5.0);
        assert_eq!(f32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]), 0.0);
    }
}
