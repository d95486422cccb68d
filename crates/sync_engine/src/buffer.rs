//! Stable per-session frame storage.
//!
//! Five contiguous buffers sized once from the probe geometry:
//! - RGB, IR, registered and undistorted as raw bytes
//! - depth as `f32` samples
//!
//! Writes are all-or-nothing: a length mismatch is reported and the
//! destination keeps its previous contents.

use std::fmt;
use std::mem::size_of;

use contracts::{BufferKind, ContractError, SensorGeometry, StreamKind, Timestamps};

/// Pre-sized buffers plus the timestamps of the last capture
#[derive(Clone, Default, PartialEq)]
pub struct FrameBufferSet {
    geometry: Option<SensorGeometry>,
    rgb: Vec<u8>,
    ir: Vec<u8>,
    depth: Vec<f32>,
    registered: Vec<u8>,
    undistorted: Vec<u8>,
    timestamps: Timestamps,
}

impl fmt::Debug for FrameBufferSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBufferSet")
            .field("geometry", &self.geometry)
            .field("rgb_len", &self.rgb.len())
            .field("ir_len", &self.ir.len())
            .field("depth_len", &self.depth.len())
            .field("registered_len", &self.registered.len())
            .field("undistorted_len", &self.undistorted.len())
            .field("timestamps", &self.timestamps)
            .finish()
    }
}

impl FrameBufferSet {
    /// Create an unallocated buffer set
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer set allocated for `geometry`
    pub fn with_geometry(geometry: SensorGeometry) -> Result<Self, ContractError> {
        let mut buffers = Self::new();
        buffers.allocate(geometry)?;
        Ok(buffers)
    }

    /// Size all five buffers
    ///
    /// A repeated call with the same geometry is a no-op.
    ///
    /// # Errors
    /// - `ContractError::GeometryChanged` if already allocated differently
    /// - `ContractError::InvalidGeometryArguments` if depth is not 4 bytes per sample
    pub fn allocate(&mut self, geometry: SensorGeometry) -> Result<(), ContractError> {
        match self.geometry {
            Some(current) if current == geometry => return Ok(()),
            Some(_) => return Err(ContractError::GeometryChanged),
            None => {}
        }

        if geometry.depth.bytes_per_pixel as usize != size_of::<f32>() {
            return Err(ContractError::invalid_geometry(format!(
                "depth must be {} bytes per sample, got {}",
                size_of::<f32>(),
                geometry.depth.bytes_per_pixel
            )));
        }

        self.rgb = vec![0; geometry.buffer_len(BufferKind::Rgb)];
        self.ir = vec![0; geometry.buffer_len(BufferKind::Ir)];
        self.depth = vec![0.0; geometry.buffer_len(BufferKind::Depth)];
        self.registered = vec![0; geometry.buffer_len(BufferKind::Registered)];
        self.undistorted = vec![0; geometry.buffer_len(BufferKind::Undistorted)];
        self.geometry = Some(geometry);
        Ok(())
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.geometry.is_some()
    }

    /// Geometry the buffers were allocated with
    #[inline]
    pub fn geometry(&self) -> Option<&SensorGeometry> {
        self.geometry.as_ref()
    }

    /// Byte length a source payload must have for `kind`
    pub fn expected_bytes(&self, kind: BufferKind) -> Result<usize, ContractError> {
        let geometry = self.geometry.as_ref().ok_or(ContractError::NotAllocated)?;
        Ok(match kind {
            BufferKind::Depth => geometry.buffer_len(kind) * size_of::<f32>(),
            _ => geometry.buffer_len(kind),
        })
    }

    /// Validate a source payload length without writing
    pub fn check(&self, kind: BufferKind, byte_len: usize) -> Result<(), ContractError> {
        let expected = self.expected_bytes(kind)?;
        if byte_len != expected {
            return Err(ContractError::BufferSizeMismatch {
                buffer: kind,
                expected,
                actual: byte_len,
            });
        }
        Ok(())
    }

    /// Copy a raw payload into the matching buffer
    ///
    /// Depth payloads are native-endian `f32` bytes.
    pub fn write(&mut self, kind: BufferKind, src: &[u8]) -> Result<(), ContractError> {
        self.check(kind, src.len())?;
        let dst: &mut [u8] = match kind {
            BufferKind::Rgb => self.rgb.as_mut_slice(),
            BufferKind::Ir => self.ir.as_mut_slice(),
            BufferKind::Depth => bytemuck::cast_slice_mut(self.depth.as_mut_slice()),
            BufferKind::Registered => self.registered.as_mut_slice(),
            BufferKind::Undistorted => self.undistorted.as_mut_slice(),
        };
        dst.copy_from_slice(src);
        Ok(())
    }

    /// Copy depth samples
    pub fn write_depth(&mut self, src: &[f32]) -> Result<(), ContractError> {
        if !self.is_allocated() {
            return Err(ContractError::NotAllocated);
        }
        if src.len() != self.depth.len() {
            return Err(ContractError::BufferSizeMismatch {
                buffer: BufferKind::Depth,
                expected: self.depth.len(),
                actual: src.len(),
            });
        }
        self.depth.copy_from_slice(src);
        Ok(())
    }

    /// Copy a raw depth payload (samples x 4 bytes)
    #[inline]
    pub fn write_depth_bytes(&mut self, src: &[u8]) -> Result<(), ContractError> {
        self.write(BufferKind::Depth, src)
    }

    #[inline]
    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }

    #[inline]
    pub fn ir(&self) -> &[u8] {
        &self.ir
    }

    #[inline]
    pub fn depth(&self) -> &[f32] {
        &self.depth
    }

    /// Depth samples for in-place post-processing (mirroring)
    #[inline]
    pub fn depth_mut(&mut self) -> &mut [f32] {
        &mut self.depth
    }

    #[inline]
    pub fn registered(&self) -> &[u8] {
        &self.registered
    }

    #[inline]
    pub fn undistorted(&self) -> &[u8] {
        &self.undistorted
    }

    /// Undistorted depth decoded into samples
    pub fn undistorted_samples(&self) -> Vec<f32> {
        self.undistorted
            .chunks_exact(size_of::<f32>())
            .map(bytemuck::pod_read_unaligned::<f32>)
            .collect()
    }

    /// Raw bytes of any buffer
    pub fn bytes(&self, kind: BufferKind) -> &[u8] {
        match kind {
            BufferKind::Rgb => self.rgb.as_slice(),
            BufferKind::Ir => self.ir.as_slice(),
            BufferKind::Depth => bytemuck::cast_slice(self.depth.as_slice()),
            BufferKind::Registered => self.registered.as_slice(),
            BufferKind::Undistorted => self.undistorted.as_slice(),
        }
    }

    #[inline]
    pub fn record_timestamp(&mut self, kind: StreamKind, timestamp: u32) {
        self.timestamps.set(kind, timestamp);
    }

    #[inline]
    pub fn timestamp(&self, kind: StreamKind) -> u32 {
        self.timestamps.get(kind)
    }

    #[inline]
    pub fn timestamps(&self) -> Timestamps {
        self.timestamps
    }
}
