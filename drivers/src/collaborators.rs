//! External collaborators consumed by the sequence configurator.
//!
//! The video-input board and the area-detector record own the frame geometry
//! outside the detector head; the configurator only reads and restores it
//! through these traits.

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("the video input rejected framesize {horizontal}x{vertical}")]
    Framesize { horizontal: i64, vertical: i64 },

    #[error("the area detector rejected binsize {horizontal}x{vertical}")]
    Binsize { horizontal: i64, vertical: i64 },
}

pub trait VideoInput {
    fn framesize(&self) -> (i64, i64);

    fn set_framesize(&mut self, horizontal: i64, vertical: i64) -> Result<(), Error>;
}

pub trait AreaDetector {
    fn binsize(&self) -> (i64, i64);

    fn set_binsize(&mut self, horizontal: i64, vertical: i64) -> Result<(), Error>;

    /// Time the detector needs to read one frame out, in seconds.
    fn detector_readout_time(&self) -> f64;
}

/// Video input backing a simulated detector.
#[derive(Debug, Clone)]
pub struct SimulatedVideoInput {
    framesize: (i64, i64),
}

impl SimulatedVideoInput {
    pub fn new(horizontal: i64, vertical: i64) -> Self {
        Self {
            framesize: (horizontal, vertical),
        }
    }
}

impl VideoInput for SimulatedVideoInput {
    fn framesize(&self) -> (i64, i64) {
        self.framesize
    }

    fn set_framesize(&mut self, horizontal: i64, vertical: i64) -> Result<(), Error> {
        if horizontal < 1 || vertical < 1 {
            return Err(Error::Framesize {
                horizontal,
                vertical,
            });
        }
        self.framesize = (horizontal, vertical);
        Ok(())
    }
}

/// Area detector backing a simulated detector.
#[derive(Debug, Clone)]
pub struct SimulatedAreaDetector {
    binsize: (i64, i64),
    readout_time: f64,
}

impl SimulatedAreaDetector {
    pub fn new(readout_time: f64) -> Self {
        Self {
            binsize: (1, 1),
            readout_time,
        }
    }
}

impl AreaDetector for SimulatedAreaDetector {
    fn binsize(&self) -> (i64, i64) {
        self.binsize
    }

    fn set_binsize(&mut self, horizontal: i64, vertical: i64) -> Result<(), Error> {
        if horizontal < 1 || vertical < 1 {
            return Err(Error::Binsize {
                horizontal,
                vertical,
            });
        }
        self.binsize = (horizontal, vertical);
        Ok(())
    }

    fn detector_readout_time(&self) -> f64 {
        self.readout_time
    }
}
