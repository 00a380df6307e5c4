//! Descrambles streak-camera readout.
//!
//! In streak mode only the top line pair of the sensor is exposed and shifted
//! out, through the same sixteen ports as full-frame readout; twelve of the
//! sixteen samples in each port group carry no pixel. Each group of sixteen
//! raw samples fills one column pair of an output line pair, and the output
//! line is half the row framesize wide.

use crate::adapters;

#[derive(Debug, Clone)]
pub struct Adapter {
    row_framesize: usize,
}

impl Adapter {
    pub fn from_row_framesize(row_framesize: usize) -> Result<Self, adapters::Error> {
        if row_framesize == 0 || row_framesize % 4 != 0 {
            return Err(adapters::Error::RowFramesize { row_framesize });
        }
        Ok(Self { row_framesize })
    }

    /// Output image width in pixels.
    pub fn out_cols(&self) -> usize {
        self.row_framesize / 2
    }

    fn samples_per_line_pair(&self) -> usize {
        16 * (self.out_cols() / 2)
    }

    pub fn descramble(
        &self,
        raw: &aviex_types::RawFrame,
    ) -> Result<aviex_types::ImageFrame, adapters::Error> {
        let out_cols = self.out_cols();
        let samples_per_line_pair = self.samples_per_line_pair();
        if raw.data.is_empty() || raw.data.len() % samples_per_line_pair != 0 {
            return Err(adapters::Error::StreakLength {
                out_cols,
                samples_per_line_pair,
                actual: raw.data.len(),
            });
        }
        let pairs = raw.data.len() / samples_per_line_pair;
        let mut image = aviex_types::ImageFrame::zeroed(2 * pairs, out_cols);
        let mut cursor = 0;
        for pair in 0..pairs {
            let line_0 = 2 * pair * out_cols;
            let line_1 = line_0 + out_cols;
            for j in 0..out_cols / 2 {
                let group = &raw.data[cursor..cursor + 16];
                cursor += 16;
                image.data[line_0 + j] = group[1];
                image.data[line_0 + out_cols - 1 - j] = group[0];
                image.data[line_1 + j] = group[2];
                image.data[line_1 + out_cols - 1 - j] = group[3];
            }
        }
        Ok(image)
    }
}
