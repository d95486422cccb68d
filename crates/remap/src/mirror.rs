//! In-place horizontal mirroring

use contracts::ContractError;

/// Reverse every row of a `width x height` buffer in place
///
/// # Errors
/// `ContractError::InvalidGeometryArguments` if `buffer.len()` is not
/// `width * height`.
pub fn mirror_horizontally<T>(buffer: &mut [T], width: usize, height: usize) -> Result<(), ContractError> {
    match width.checked_mul(height) {
        Some(len) if len == buffer.len() => {}
        _ => {
            return Err(ContractError::invalid_geometry(format!(
                "buffer has {} elements, {width}x{height} expected",
                buffer.len()
            )))
        }
    }

    if width == 0 {
        return Ok(());
    }
    buffer.chunks_exact_mut(width).for_each(<[T]>::reverse);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_reversed() {
        let mut buffer = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        mirror_horizontally(&mut buffer, 3, 2).unwrap();
        assert_eq!(buffer, [3.0, 2.0, 1.0, 6.0, 5.0, 4.0]);
    }

    #[test]
    fn test_mirror_is_involution() {
        let original: Vec<f32> = (0..512 * 424).map(|i| i as f32).collect();
        let mut buffer = original.clone();
        mirror_horizontally(&mut buffer, 512, 424).unwrap();
        assert_ne!(buffer, original);
        mirror_horizontally(&mut buffer, 512, 424).unwrap();
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_mirror_is_involution_for_odd_and_degenerate_sizes() {
        for (width, height) in [(1, 7), (7, 1), (3, 5), (5, 3), (1, 1), (2, 9)] {
            let original: Vec<u16> = (0..(width * height) as u16).collect();
            let mut buffer = original.clone();
            mirror_horizontally(&mut buffer, width, height).unwrap();
            if width > 1 {
                assert_ne!(buffer, original, "{width}x{height}");
            } else {
                assert_eq!(buffer, original, "{width}x{height}");
            }
            mirror_horizontally(&mut buffer, width, height).unwrap();
            assert_eq!(buffer, original, "{width}x{height}");
        }
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut buffer = vec![1u8, 2, 3, 4, 5];
        let err = mirror_horizontally(&mut buffer, 2, 2).unwrap_err();
        assert!(matches!(err, ContractError::InvalidGeometryArguments { .. }));
        assert_eq!(buffer, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_empty_buffer() {
        let mut buffer: Vec<f32> = Vec::new();
        assert!(mirror_horizontally(&mut buffer, 0, 5).is_ok());
    }
}
