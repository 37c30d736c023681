//! Per-channel peak-to-peak amplitude of a template tensor.

use ndarray::{ArrayView2, Axis};

use crate::error::AnalysisError;

/// Compute the peak-to-peak amplitude of every channel of one template.
///
/// The input is one unit's template, shape samples × channels; the output
/// holds `max − min` over all samples, per channel. Pure: identical input
/// always yields identical output, and nothing beyond the output vector is
/// allocated.
///
/// A template with zero samples is an error rather than a silent zero
/// vector, since downstream channel selection would be meaningless.
pub fn peak_to_peak(template: ArrayView2<'_, f32>) -> Result<Vec<f32>, AnalysisError> {
    if template.nrows() == 0 {
        return Err(AnalysisError::EmptyTensor);
    }
    Ok(template
        .axis_iter(Axis(1))
        .map(|channel| {
            let mut max = f32::NEG_INFINITY;
            let mut min = f32::INFINITY;
            for &value in channel.iter() {
                if value > max {
                    max = value;
                }
                if value < min {
                    min = value;
                }
            }
            max - min
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array2, array};

    #[test]
    fn amplitude_is_max_minus_min_per_channel() {
        let template = array![[1.0f32, -3.0], [4.0, 2.0], [-2.0, 0.5]];
        let amplitudes = peak_to_peak(template.view()).unwrap();
        assert_eq!(amplitudes.len(), 2);
        assert_relative_eq!(amplitudes[0], 6.0);
        assert_relative_eq!(amplitudes[1], 5.0);
    }

    #[test]
    fn single_sample_template_has_zero_amplitude() {
        let template = array![[2.5f32, -1.0, 0.0]];
        let amplitudes = peak_to_peak(template.view()).unwrap();
        assert_eq!(amplitudes, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn repeated_calls_are_bit_identical() {
        let template = Array2::from_shape_fn((64, 8), |(s, c)| {
            ((s * 31 + c * 17) as f32 * 0.3713).sin() * 120.0
        });
        let first = peak_to_peak(template.view()).unwrap();
        let second = peak_to_peak(template.view()).unwrap();
        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn zero_samples_is_an_error() {
        let template = Array2::<f32>::zeros((0, 4));
        assert_eq!(
            peak_to_peak(template.view()),
            Err(AnalysisError::EmptyTensor)
        );
    }
}
