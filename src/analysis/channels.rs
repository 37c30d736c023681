//! Best-channel and active-channel selection from an amplitude vector.

use crate::error::AnalysisError;

/// The channels a unit's signal is concentrated on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSelection {
    /// Lowest channel index achieving the maximum amplitude.
    pub best_channel: usize,
    /// Channels within the threshold fraction of the best amplitude,
    /// ascending.
    pub active_channels: Vec<usize>,
}

/// Derive the channel selection for one amplitude vector.
///
/// The best channel is the *first* index achieving the maximum, so ties
/// resolve deterministically. Active channels are those with
/// `amplitude[c] >= threshold * amplitude[best]`; the best channel is always
/// among them since the threshold cannot exceed 1.
pub fn select_channels(
    amplitude: &[f32],
    threshold: f32,
) -> Result<ChannelSelection, AnalysisError> {
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(AnalysisError::InvalidThreshold(threshold));
    }
    if amplitude.is_empty() {
        return Err(AnalysisError::EmptyAmplitudeVector);
    }

    let mut best_channel = 0;
    for (channel, &value) in amplitude.iter().enumerate() {
        if value > amplitude[best_channel] {
            best_channel = channel;
        }
    }

    let cutoff = threshold * amplitude[best_channel];
    let active_channels = amplitude
        .iter()
        .enumerate()
        .filter(|&(_, &value)| value >= cutoff)
        .map(|(channel, _)| channel)
        .collect();

    Ok(ChannelSelection {
        best_channel,
        active_channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_splits_active_channels() {
        let selection = select_channels(&[2.0, 5.0, 5.0, 1.0], 0.8).unwrap();
        assert_eq!(selection.best_channel, 1);
        assert_eq!(selection.active_channels, vec![1, 2]);
    }

    #[test]
    fn ties_resolve_to_the_lowest_index() {
        let selection = select_channels(&[3.0, 7.0, 7.0, 7.0], 1.0).unwrap();
        assert_eq!(selection.best_channel, 1);
    }

    #[test]
    fn best_channel_is_always_active() {
        let vectors: [&[f32]; 3] = [&[1.0], &[0.5, 0.1, 0.4], &[2.0, 5.0, 5.0, 1.0]];
        for amplitude in vectors {
            for threshold in [0.1, 0.5, 1.0] {
                let selection = select_channels(amplitude, threshold).unwrap();
                assert!(
                    selection.active_channels.contains(&selection.best_channel),
                    "θ={threshold} over {amplitude:?}"
                );
            }
        }
    }

    #[test]
    fn active_channels_are_ascending() {
        let selection = select_channels(&[5.0, 1.0, 4.9, 0.2, 5.0], 0.9).unwrap();
        assert_eq!(selection.active_channels, vec![0, 2, 4]);
    }

    #[test]
    fn out_of_range_thresholds_are_rejected() {
        for threshold in [0.0, -0.5, 1.01, f32::NAN] {
            assert!(matches!(
                select_channels(&[1.0, 2.0], threshold),
                Err(AnalysisError::InvalidThreshold(_))
            ));
        }
    }

    #[test]
    fn empty_vector_is_rejected() {
        assert_eq!(
            select_channels(&[], 0.5),
            Err(AnalysisError::EmptyAmplitudeVector)
        );
    }
}
