/// Readout geometry of one detector, snapshotted before every descramble pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DetectorGeometry {
    /// Unbinned sensor size as (horizontal, vertical) pixels.
    pub framesize: (i64, i64),
    /// Binning factors as (horizontal, vertical).
    pub binsize: (i64, i64),
    pub horiz_descramble_factor: i64,
    pub vert_descramble_factor: i64,
    pub num_taps: i64,
}

impl DetectorGeometry {
    /// Frame dimensions after binning, as (rows, columns).
    pub fn binned_dimensions(&self) -> (usize, usize) {
        (
            (self.framesize.1 / self.binsize.1) as usize,
            (self.framesize.0 / self.binsize.0) as usize,
        )
    }
}

/// Interleaved multi-tap sensor output, exactly as read from the detector head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<u16>,
}

impl RawFrame {
    pub fn new(rows: usize, cols: usize, data: Vec<u16>) -> Self {
        Self { rows, cols, data }
    }

    pub fn samples(&self) -> &[u16] {
        &self.data
    }

    pub fn bytes_per_pixel(&self) -> usize {
        core::mem::size_of::<u16>()
    }
}

/// Descrambled, correctly oriented image frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<u16>,
}

impl ImageFrame {
    pub fn zeroed(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    pub fn pixel(&self, row: usize, col: usize) -> u16 {
        self.data[row * self.cols + col]
    }

    pub fn bytes_per_pixel(&self) -> usize {
        core::mem::size_of::<u16>()
    }
}
