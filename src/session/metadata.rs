//! One-shot per-unit metadata and probe geometry.

use std::fmt;

use crate::error::{SessionError, StoreError};
use crate::store::client::{ArrayStoreClient, AxisSpec, GroupHandle};
use crate::store::meta::ArrayData;
use crate::store::transport::StoreTransport;

// ---------------------------------------------------------------------------
// MetaValue – a single metadata cell
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value; stores differ on whether ids are
/// integers or text, so the cache keeps whatever the arrays declare.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Int(i) => fmt::Display::fmt(i, f),
            MetaValue::Float(v) => fmt::Display::fmt(v, f),
            MetaValue::Text(s) => fmt::Display::fmt(s, f),
        }
    }
}

fn meta_values(data: ArrayData) -> Vec<MetaValue> {
    match data {
        ArrayData::Float32(v) => v.into_iter().map(|x| MetaValue::Float(x as f64)).collect(),
        ArrayData::Float64(v) => v.into_iter().map(MetaValue::Float).collect(),
        ArrayData::Int(v) => v.into_iter().map(MetaValue::Int).collect(),
        ArrayData::UInt(v) => v.into_iter().map(|x| MetaValue::Int(x as i64)).collect(),
        ArrayData::Bool(v) => v.into_iter().map(|x| MetaValue::Int(i64::from(x))).collect(),
        ArrayData::Text(v) => v.into_iter().map(MetaValue::Text).collect(),
    }
}

// ---------------------------------------------------------------------------
// UnitMetadataCache
// ---------------------------------------------------------------------------

/// Per-unit metadata fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitField {
    BrainArea,
    UnitId,
    SpikesPerUnit,
}

/// Bulk-loaded parallel metadata vectors: three keyed by unit index, one by
/// channel index. Loaded once at session start, immutable afterwards; any
/// required array being absent is session-fatal.
#[derive(Debug, Clone)]
pub struct UnitMetadataCache {
    brain_area: Vec<MetaValue>,
    unit_ids: Vec<MetaValue>,
    spikes_per_unit: Vec<MetaValue>,
    channel_ids: Vec<MetaValue>,
}

impl UnitMetadataCache {
    /// Fetch all four vectors from the root group.
    pub async fn load<T: StoreTransport>(
        client: &ArrayStoreClient<T>,
        root: &GroupHandle,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            brain_area: fetch_vector(client, root, "brain_area").await?,
            unit_ids: fetch_vector(client, root, "unit_ids").await?,
            spikes_per_unit: fetch_vector(client, root, "spikes_per_unit").await?,
            channel_ids: fetch_vector(client, root, "channel_ids").await?,
        })
    }

    /// O(1) field access; `None` past the loaded extent.
    pub fn lookup(&self, field: UnitField, unit: usize) -> Option<&MetaValue> {
        let vector = match field {
            UnitField::BrainArea => &self.brain_area,
            UnitField::UnitId => &self.unit_ids,
            UnitField::SpikesPerUnit => &self.spikes_per_unit,
        };
        vector.get(unit)
    }

    pub fn channel_id(&self, channel: usize) -> Option<&MetaValue> {
        self.channel_ids.get(channel)
    }

    /// Units covered by every per-unit vector.
    pub fn unit_count(&self) -> usize {
        self.brain_area
            .len()
            .min(self.unit_ids.len())
            .min(self.spikes_per_unit.len())
    }

    pub fn channel_count(&self) -> usize {
        self.channel_ids.len()
    }
}

/// Resolve and fetch a whole 1-d array; absence becomes
/// [`SessionError::MetadataUnavailable`].
async fn fetch_vector<T: StoreTransport>(
    client: &ArrayStoreClient<T>,
    group: &GroupHandle,
    name: &str,
) -> Result<Vec<MetaValue>, SessionError> {
    let array = match client.resolve(group, name).await {
        Ok(array) => array,
        Err(StoreError::NotFound(_)) => {
            return Err(SessionError::MetadataUnavailable(name.to_string()));
        }
        Err(other) => return Err(other.into()),
    };
    let spec = vec![AxisSpec::All; array.rank()];
    let slice = client.fetch_slice(&array, &spec).await?;
    Ok(meta_values(slice.data))
}

// ---------------------------------------------------------------------------
// ProbeGeometry
// ---------------------------------------------------------------------------

/// Physical channel coordinates, parallel by channel index. Fetched once
/// from the probe sub-group and read-only thereafter.
#[derive(Debug, Clone)]
pub struct ProbeGeometry {
    x: Vec<f32>,
    y: Vec<f32>,
}

impl ProbeGeometry {
    pub async fn load<T: StoreTransport>(
        client: &ArrayStoreClient<T>,
        probe: &GroupHandle,
    ) -> Result<Self, SessionError> {
        let x = fetch_coordinates(client, probe, "x").await?;
        let y = fetch_coordinates(client, probe, "y").await?;
        if x.len() != y.len() {
            return Err(SessionError::ChannelCountMismatch {
                expected: x.len(),
                actual: y.len(),
            });
        }
        Ok(Self { x, y })
    }

    pub fn channel_count(&self) -> usize {
        self.x.len()
    }

    /// Coordinates of one channel, or `None` past the probe extent.
    pub fn position(&self, channel: usize) -> Option<(f32, f32)> {
        Some((*self.x.get(channel)?, *self.y.get(channel)?))
    }

    pub fn x(&self) -> &[f32] {
        &self.x
    }

    /// Depth axis; rows are often summarized by the y coordinate alone.
    pub fn y(&self) -> &[f32] {
        &self.y
    }
}

async fn fetch_coordinates<T: StoreTransport>(
    client: &ArrayStoreClient<T>,
    probe: &GroupHandle,
    name: &str,
) -> Result<Vec<f32>, SessionError> {
    let array = match client.resolve(probe, name).await {
        Ok(array) => array,
        Err(StoreError::NotFound(_)) => {
            return Err(SessionError::MetadataUnavailable(format!("probe/{name}")));
        }
        Err(other) => return Err(other.into()),
    };
    let slice = client.fetch_slice(&array, &[AxisSpec::All]).await?;
    Ok(slice.data.into_f32()?)
}
