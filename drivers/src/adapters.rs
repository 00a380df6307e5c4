pub mod quadrant;
pub mod streak;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("descrambling is not implemented for {detector}")]
    NotImplemented { detector: &'static str },

    #[error("expected {expected} raw samples for a {rows}x{cols} frame, got {actual}")]
    RawLengthMismatch {
        expected: usize,
        actual: usize,
        rows: usize,
        cols: usize,
    },

    #[error("a {rows}x{cols} frame cannot be split into four sectors")]
    OddDimensions { rows: usize, cols: usize },

    #[error("streak descrambling needs a row framesize divisible by four, got {row_framesize}")]
    RowFramesize { row_framesize: usize },

    #[error(
        "a streak frame with {out_cols} output columns needs a multiple of {samples_per_line_pair} raw samples, got {actual}"
    )]
    StreakLength {
        out_cols: usize,
        samples_per_line_pair: usize,
        actual: usize,
    },

    #[error("expected {expected} lookup-table entries for {sectors} sectors, got {actual}")]
    LookupTableSize {
        expected: usize,
        actual: usize,
        sectors: usize,
    },
}

/// Per-sector linearization table, one 65536-entry map per output sector.
#[derive(Debug, Clone)]
pub struct LookupTable {
    sectors: usize,
    values: Vec<u16>,
}

impl LookupTable {
    pub fn new(sectors: usize, values: Vec<u16>) -> Result<Self, Error> {
        let expected = sectors * (u16::MAX as usize + 1);
        if values.len() != expected {
            return Err(Error::LookupTableSize {
                expected,
                actual: values.len(),
                sectors,
            });
        }
        Ok(Self { sectors, values })
    }

    pub fn sectors(&self) -> usize {
        self.sectors
    }

    pub fn get(&self, sector: usize, sample: u16) -> u16 {
        self.values[sector * (u16::MAX as usize + 1) + sample as usize]
    }
}
