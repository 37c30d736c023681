//! The browsing session: store bring-up, batch fan-out, row assembly.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use ndarray::Array2;

use crate::analysis::{peak_to_peak, select_channels};
use crate::config::SessionConfig;
use crate::error::{RowError, SessionError, StoreError};
use crate::session::metadata::{ProbeGeometry, UnitField, UnitMetadataCache};
use crate::session::pagination::PaginationController;
use crate::session::row::{RowSlot, RowState, UnitRow};
use crate::session::selection::SelectionSet;
use crate::store::client::{ArrayHandle, ArrayStoreClient, AxisSpec};
use crate::store::transport::StoreTransport;

// ---------------------------------------------------------------------------
// TemplateSession
// ---------------------------------------------------------------------------

/// A browsing session over one template store.
///
/// `connect` performs the one-shot bring-up (group attributes, probe
/// geometry, unit metadata, templates array handle) and fails fatally if any
/// of it is unavailable. Afterwards, `load_next_batch` drives incremental
/// row loading; individual row failures stay local to their row.
pub struct TemplateSession<T> {
    client: ArrayStoreClient<T>,
    config: SessionConfig,
    sampling_frequency: f64,
    templates: ArrayHandle,
    metadata: UnitMetadataCache,
    geometry: ProbeGeometry,
    pagination: PaginationController,
    selection: SelectionSet,
    rows: BTreeMap<usize, RowSlot>,
    next_generation: u64,
}

impl<T: StoreTransport> TemplateSession<T> {
    /// Open the store and load everything every row depends on.
    pub async fn connect(transport: T, config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let client = ArrayStoreClient::new(transport);

        let root = client.open_group("").await?;
        let sampling_frequency = root
            .attr_f64("sampling_frequency")
            .ok_or_else(|| SessionError::MetadataUnavailable("sampling_frequency".into()))?;

        let templates = match client.resolve(&root, "templates_array").await {
            Ok(array) => array,
            Err(StoreError::NotFound(_)) => {
                return Err(SessionError::MetadataUnavailable("templates_array".into()));
            }
            Err(other) => return Err(other.into()),
        };
        if templates.rank() != 3 {
            return Err(SessionError::BadTemplateRank(templates.rank()));
        }

        let probe = match client.open_group("probe").await {
            Ok(group) => group,
            Err(StoreError::NotFound(_)) => {
                return Err(SessionError::MetadataUnavailable("probe".into()));
            }
            Err(other) => return Err(other.into()),
        };
        let geometry = ProbeGeometry::load(&client, &probe).await?;
        let metadata = UnitMetadataCache::load(&client, &root).await?;

        let channels = templates.shape()[2];
        if geometry.channel_count() != channels {
            return Err(SessionError::ChannelCountMismatch {
                expected: channels,
                actual: geometry.channel_count(),
            });
        }
        if metadata.channel_count() != channels {
            return Err(SessionError::ChannelCountMismatch {
                expected: channels,
                actual: metadata.channel_count(),
            });
        }

        let total_units = config.total_units.unwrap_or_else(|| templates.shape()[0]);
        let pagination = PaginationController::new(config.batch_size, total_units);
        info!(
            "session ready: {total_units} units, {channels} channels, {sampling_frequency} Hz"
        );

        Ok(Self {
            client,
            config,
            sampling_frequency,
            templates,
            metadata,
            geometry,
            pagination,
            selection: SelectionSet::new(),
            rows: BTreeMap::new(),
            next_generation: 0,
        })
    }

    /// Request and load the next batch of units.
    ///
    /// Template fetches fan out concurrently (bounded by
    /// `max_in_flight`) and settle independently; a unit that fails moves
    /// its own row to `Errored` without affecting siblings. Returns the unit
    /// indices the batch covered, empty when nothing was left to load or a
    /// batch was already in flight.
    pub async fn load_next_batch(&mut self) -> Vec<usize> {
        let Some(indices) = self.pagination.begin_batch() else {
            return Vec::new();
        };
        let generation = self.next_generation;
        self.next_generation += 1;
        for &unit in &indices {
            self.rows.insert(unit, RowSlot::loading(generation));
        }
        info!(
            "loading units {}..={}",
            indices[0],
            indices[indices.len() - 1]
        );

        let client = &self.client;
        let templates = &self.templates;
        let metadata = &self.metadata;
        let geometry = &self.geometry;
        let config = &self.config;
        let mut settlements = stream::iter(indices.iter().map(|&unit| async move {
            (
                unit,
                load_unit(client, templates, metadata, geometry, config, unit).await,
            )
        }))
        .buffer_unordered(config.max_in_flight);

        while let Some((unit, outcome)) = settlements.next().await {
            if let Err(error) = &outcome {
                warn!("unit {unit} failed to load: {error}");
            }
            if let Some(slot) = self.rows.get_mut(&unit) {
                if !slot.settle(generation, outcome) {
                    debug!("discarding stale result for unit {unit}");
                }
            }
        }
        drop(settlements);

        self.pagination.settle_batch();
        indices
    }

    /// Flip a unit's membership in the selection set.
    pub fn toggle_selection(&mut self, unit: usize) {
        self.selection = self.selection.toggle(unit);
        debug!("selected units: {:?}", self.selection.snapshot());
    }

    /// Ascending snapshot of the selected unit indices.
    pub fn selected_units(&self) -> Vec<usize> {
        self.selection.snapshot()
    }

    /// Retire a row's in-flight request and forget its data, so a result
    /// settling later is discarded instead of resurrecting the row.
    pub fn unload_row(&mut self, unit: usize) {
        if let Some(slot) = self.rows.get_mut(&unit) {
            let generation = self.next_generation;
            self.next_generation += 1;
            slot.retire(generation);
        }
    }

    pub fn row(&self, unit: usize) -> Option<&RowState> {
        self.rows.get(&unit).map(|slot| &slot.state)
    }

    /// All known rows in unit order.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &RowState)> {
        self.rows.iter().map(|(&unit, slot)| (unit, &slot.state))
    }

    pub fn has_more(&self) -> bool {
        self.pagination.has_more()
    }

    pub fn pagination(&self) -> &PaginationController {
        &self.pagination
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn sampling_frequency(&self) -> f64 {
        self.sampling_frequency
    }

    pub fn geometry(&self) -> &ProbeGeometry {
        &self.geometry
    }

    pub fn metadata(&self) -> &UnitMetadataCache {
        &self.metadata
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

// ---------------------------------------------------------------------------
// Per-unit load pipeline
// ---------------------------------------------------------------------------

/// Load one unit: template slice → amplitudes → channel selection → merge
/// with metadata and geometry.
///
/// Transient connection failures on the template fetch are retried with a
/// doubling delay up to `retry_attempts`; every other failure is immediate.
async fn load_unit<T: StoreTransport>(
    client: &ArrayStoreClient<T>,
    templates: &ArrayHandle,
    metadata: &UnitMetadataCache,
    geometry: &ProbeGeometry,
    config: &SessionConfig,
    unit: usize,
) -> Result<UnitRow, RowError> {
    let spec = [AxisSpec::Index(unit), AxisSpec::All, AxisSpec::All];
    let mut attempt = 0u32;
    let slice = loop {
        match client.fetch_slice(templates, &spec).await {
            Ok(slice) => break slice,
            Err(StoreError::Connection(cause)) if attempt < config.retry_attempts => {
                attempt += 1;
                let delay = config.retry_base_delay * (1u32 << (attempt - 1));
                warn!(
                    "transient store failure for unit {unit} (attempt {attempt}): {cause}; \
                     retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error.into()),
        }
    };

    let (samples, channels) = (slice.shape[0], slice.shape[1]);
    let values = slice.data.into_f32().map_err(RowError::from)?;
    let template = Array2::from_shape_vec((samples, channels), values)
        .map_err(|e| RowError::Store(StoreError::InvalidMetadata(e.to_string())))?;

    let amplitudes = peak_to_peak(template.view())?;
    let selection = select_channels(&amplitudes, config.active_channel_threshold)?;

    let field = |field: UnitField| {
        metadata
            .lookup(field, unit)
            .cloned()
            .ok_or(RowError::MissingMetadata(unit))
    };
    let best_channel_id = metadata
        .channel_id(selection.best_channel)
        .cloned()
        .ok_or(RowError::MissingMetadata(unit))?;
    let position = geometry
        .position(selection.best_channel)
        .ok_or(RowError::MissingMetadata(unit))?;

    Ok(UnitRow {
        unit_index: unit,
        unit_id: field(UnitField::UnitId)?,
        brain_area: field(UnitField::BrainArea)?,
        spike_count: field(UnitField::SpikesPerUnit)?,
        peak_amplitude: amplitudes[selection.best_channel],
        best_channel: selection.best_channel,
        best_channel_id,
        active_channels: selection.active_channels,
        amplitudes,
        position,
        template,
    })
}
