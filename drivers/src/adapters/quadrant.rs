//! Descrambles four-tap quadrant readout.
//!
//! The sensor reads one pixel per tap per clock, from the four sector corners
//! inwards, so consecutive raw samples interleave all four sectors. Sample
//! order within a group of four is tap 1 (top-left sector), tap 0 (top-right),
//! tap 2 (bottom-left), tap 3 (bottom-right); the left sectors fill left to
//! right, the right sectors right to left, and the bottom sectors bottom up.

use crate::adapters;

#[derive(Debug, Clone)]
pub struct Adapter {
    rows: usize,
    cols: usize,
}

impl Adapter {
    pub fn from_dimensions(rows: usize, cols: usize) -> Result<Self, adapters::Error> {
        if rows == 0 || cols == 0 || rows % 2 != 0 || cols % 2 != 0 {
            return Err(adapters::Error::OddDimensions { rows, cols });
        }
        Ok(Self { rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn descramble(
        &self,
        raw: &aviex_types::RawFrame,
    ) -> Result<aviex_types::ImageFrame, adapters::Error> {
        self.descramble_with(raw, |_, sample| sample)
    }

    /// Descrambles and maps every sample through the per-sector lookup table.
    pub fn descramble_linearized(
        &self,
        raw: &aviex_types::RawFrame,
        table: &adapters::LookupTable,
    ) -> Result<aviex_types::ImageFrame, adapters::Error> {
        self.descramble_with(raw, |sector, sample| table.get(sector, sample))
    }

    fn descramble_with(
        &self,
        raw: &aviex_types::RawFrame,
        linearize: impl Fn(usize, u16) -> u16,
    ) -> Result<aviex_types::ImageFrame, adapters::Error> {
        let expected = self.rows * self.cols;
        if raw.data.len() != expected {
            return Err(adapters::Error::RawLengthMismatch {
                expected,
                actual: raw.data.len(),
                rows: self.rows,
                cols: self.cols,
            });
        }
        let mut image = aviex_types::ImageFrame::zeroed(self.rows, self.cols);
        let mut cursor = 0;
        for i in 0..self.rows / 2 {
            for j in 0..self.cols / 2 {
                let group = &raw.data[cursor..cursor + 4];
                cursor += 4;
                let top = i * self.cols;
                let bottom = (self.rows - 1 - i) * self.cols;
                image.data[top + j] = linearize(0, group[1]);
                image.data[top + self.cols - 1 - j] = linearize(1, group[0]);
                image.data[bottom + j] = linearize(2, group[2]);
                image.data[bottom + self.cols - 1 - j] = linearize(3, group[3]);
            }
        }
        Ok(image)
    }
}
