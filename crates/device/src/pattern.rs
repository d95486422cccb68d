//! Deterministic test images

/// BGRX gradient; pixel `(x, y)` is `[x, y, x ^ y, 0]` (low bits)
pub fn color_pattern(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[x as u8, y as u8, (x ^ y) as u8, 0]);
        }
    }
    data
}

/// IR intensity ramp (f32 samples)
pub fn ir_pattern(width: u32, height: u32) -> Vec<f32> {
    (0..height)
        .flat_map(|y| (0..width).map(move |x| ((x + y) % 1024) as f32 * 64.0))
        .collect()
}

/// Tilted plane from 1.0 m at the top to 2.0 m at the bottom (millimeters),
/// rising by 1 mm per column so no row reads the same in both directions
///
/// The four corner pixels sit at 0.1 m, below the default minimum depth.
pub fn depth_pattern(width: u32, height: u32) -> Vec<f32> {
    let rows = height.max(2) - 1;
    let mut samples: Vec<f32> = (0..height)
        .flat_map(|y| {
            (0..width).map(move |x| 1000.0 + 1000.0 * y as f32 / rows as f32 + x as f32)
        })
        .collect();

    if width > 0 && height > 0 {
        let w = width as usize;
        let last = samples.len() - 1;
        for index in [0, w - 1, last + 1 - w, last] {
            samples[index] = 100.0;
        }
    }
    samples
}
