#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("timed out after {timeout:?} while accessing detector-head register {address:#06x}")]
    TimedOut {
        address: u32,
        timeout: std::time::Duration,
    },

    #[error("no response from the detector head for register {address:#06x}")]
    NoResponse { address: u32 },
}

/// Register transport to the detector head (camera-link or direct I/O).
///
/// Calls may block on the underlying link, so implementations must not be
/// shared with the acquisition-status polling path.
pub trait DetectorHead {
    fn read_register(&mut self, address: u32) -> Result<u32, Error>;

    fn write_register(&mut self, address: u32, value: u32) -> Result<(), Error>;
}

/// In-memory detector head used when no hardware is attached.
///
/// Unwritten addresses read back as zero; the register file seeds every
/// documented register with its default at open time.
#[derive(Debug, Default)]
pub struct Simulator {
    values: std::collections::HashMap<u32, u32>,
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DetectorHead for Simulator {
    fn read_register(&mut self, address: u32) -> Result<u32, Error> {
        Ok(self.values.get(&address).copied().unwrap_or(0))
    }

    fn write_register(&mut self, address: u32, value: u32) -> Result<(), Error> {
        self.values.insert(address, value);
        Ok(())
    }
}
