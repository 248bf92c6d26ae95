//! Sliding-window segmentation of `(features, time)` mel-spectrograms.

use ndarray::{s, Array3, ArrayView2, Axis};

use super::TransformError;
use crate::tensor::{TensorData, TensorError};

/// Number of full windows that fit in `time_length` frames.
///
/// Zero when the sequence is shorter than one window.
pub fn num_windows(time_length: usize, window_length: usize, stride_length: usize) -> usize {
    if time_length < window_length || stride_length == 0 {
        return 0;
    }
    1 + (time_length - window_length) / stride_length
}

/// Slices `log_mel` into windows of `window_length` frames every
/// `stride_length` frames, stacked as `(num_windows, features, window_length)`.
///
/// A stride shorter than the window overlaps consecutive windows; a longer one
/// skips frames. Trailing frames that do not fill a window are dropped.
pub fn window_segment(
    log_mel: ArrayView2<'_, TensorData>,
    window_length: usize,
    stride_length: usize,
) -> Result<Array3<TensorData>, TransformError> {
    if window_length == 0 || stride_length == 0 {
        return Err(TransformError::InvalidArgument(format!(
            "window_length ({window_length}) and stride_length ({stride_length}) must be positive"
        )));
    }

    let (features, mel_length) = log_mel.dim();
    let num_window = num_windows(mel_length, window_length, stride_length);
    if num_window == 0 {
        return Ok(Array3::zeros((0, features, window_length)));
    }

    let segments: Vec<ArrayView2<'_, TensorData>> = (0..num_window)
        .map(|i| {
            let start_time = i * stride_length;
            log_mel.slice(s![.., start_time..start_time + window_length])
        })
        .collect();

    Ok(ndarray::stack(Axis(0), &segments).map_err(TensorError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn ramp(features: usize, time: usize) -> Array2<f32> {
        Array2::from_shape_fn((features, time), |(_, t)| t as f32)
    }

    #[test]
    fn windows_follow_the_stride() {
        let log_mel = ramp(3, 10);
        let windows = window_segment(log_mel.view(), 4, 2).unwrap();
        assert_eq!(windows.dim(), (4, 3, 4));
        for i in 0..4 {
            let expected: Vec<f32> = (2 * i..2 * i + 4).map(|t| t as f32).collect();
            let row: Vec<f32> = windows.slice(s![i, 0, ..]).to_vec();
            assert_eq!(row, expected);
        }
        // last window covers [6, 10)
        assert_eq!(windows[[3, 2, 3]], 9.0);
    }

    #[test]
    fn stride_longer_than_window_leaves_gaps() {
        let windows = window_segment(ramp(1, 10).view(), 2, 4).unwrap();
        assert_eq!(windows.dim(), (3, 1, 2));
        assert_eq!(windows[[1, 0, 0]], 4.0);
        assert_eq!(windows[[2, 0, 1]], 9.0);
    }

    #[test]
    fn short_input_yields_no_windows() {
        let windows = window_segment(ramp(2, 3).view(), 4, 1).unwrap();
        assert_eq!(windows.dim(), (0, 2, 4));
        assert_eq!(num_windows(3, 4, 1), 0);
    }

    #[test]
    fn zero_window_or_stride_is_rejected() {
        let log_mel = ramp(2, 8);
        assert!(matches!(
            window_segment(log_mel.view(), 0, 1),
            Err(TransformError::InvalidArgument(_))
        ));
        assert!(matches!(
            window_segment(log_mel.view(), 2, 0),
            Err(TransformError::InvalidArgument(_))
        ));
    }
}
