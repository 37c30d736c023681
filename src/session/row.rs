//! Per-unit row state machine and the loaded row record.

use ndarray::Array2;

use crate::error::RowError;
use crate::session::metadata::MetaValue;

// ---------------------------------------------------------------------------
// UnitRow – everything the rendering layer needs for one unit
// ---------------------------------------------------------------------------

/// The merged result of one unit's load pipeline: template slice, amplitude
/// statistics, channel selection, and metadata.
#[derive(Debug, Clone)]
pub struct UnitRow {
    pub unit_index: usize,
    pub unit_id: MetaValue,
    pub brain_area: MetaValue,
    pub spike_count: MetaValue,
    /// Channel with the largest peak-to-peak amplitude.
    pub best_channel: usize,
    pub best_channel_id: MetaValue,
    /// Channels within the configured fraction of the best amplitude,
    /// ascending.
    pub active_channels: Vec<usize>,
    /// Peak-to-peak amplitude per channel.
    pub amplitudes: Vec<f32>,
    /// Amplitude at the best channel, in the store's units (µV).
    pub peak_amplitude: f32,
    /// Probe coordinates of the best channel; the y component is the depth.
    pub position: (f32, f32),
    /// The unit's template, samples × channels.
    pub template: Array2<f32>,
}

// ---------------------------------------------------------------------------
// Row state machine
// ---------------------------------------------------------------------------

/// Lifecycle of one unit's row: `Pending → Loading → {Loaded | Errored}`.
///
/// Errored is terminal for a given request; a later reload starts the cycle
/// over under a new generation.
#[derive(Debug)]
pub enum RowState {
    Pending,
    Loading,
    Loaded(UnitRow),
    Errored(RowError),
}

impl RowState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, RowState::Loaded(_))
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, RowState::Errored(_))
    }
}

/// A row slot in the session's indexed collection.
///
/// The generation is stamped when a request is issued; a settling fetch is
/// applied only if its generation still matches, so results for retired
/// requests are discarded instead of mutating a reused slot.
#[derive(Debug)]
pub(crate) struct RowSlot {
    pub state: RowState,
    pub generation: u64,
}

impl RowSlot {
    pub(crate) fn loading(generation: u64) -> Self {
        Self {
            state: RowState::Loading,
            generation,
        }
    }

    /// Apply a settlement; returns false (leaving the slot untouched) when
    /// the result belongs to a retired request.
    pub(crate) fn settle(&mut self, generation: u64, outcome: Result<UnitRow, RowError>) -> bool {
        if self.generation != generation {
            return false;
        }
        self.state = match outcome {
            Ok(row) => RowState::Loaded(row),
            Err(error) => RowState::Errored(error),
        };
        true
    }

    /// Retire the current request and return the slot to `Pending`.
    pub(crate) fn retire(&mut self, next_generation: u64) {
        self.generation = next_generation;
        self.state = RowState::Pending;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    #[test]
    fn matching_generation_settles_the_slot() {
        let mut slot = RowSlot::loading(4);
        assert!(slot.settle(4, Err(AnalysisError::EmptyTensor.into())));
        assert!(slot.state.is_errored());
    }

    #[test]
    fn stale_generation_is_discarded() {
        let mut slot = RowSlot::loading(4);
        slot.retire(5);
        assert!(!slot.settle(4, Err(AnalysisError::EmptyTensor.into())));
        assert!(matches!(slot.state, RowState::Pending));
    }
}
