use crate::channel;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("register {name} ({address:#06x}) is read-only")]
    PermissionDenied { name: &'static str, address: u32 },

    #[error(
        "value {value} for register {name} ({address:#06x}) is outside the allowed range [{minimum}, {maximum}]"
    )]
    OutOfRange {
        name: &'static str,
        address: u32,
        value: u32,
        minimum: u32,
        maximum: u32,
    },

    #[error("value {value} for register {name} ({address:#06x}) must be a power of two")]
    NotPowerOfTwo {
        name: &'static str,
        address: u32,
        value: u32,
    },

    #[error("address {address:#06x} does not belong to this detector's register space")]
    UnknownAddress { address: u32 },

    #[error(transparent)]
    Channel(#[from] channel::Error),
}

/// Static description of one detector-head register.
///
/// Offsets are relative to the model's `DH_BASE` and must be contiguous
/// within a model's map.
#[derive(Debug, Clone, Copy)]
pub struct RegisterSpec {
    pub name: &'static str,
    pub offset: u32,
    pub default: u32,
    pub read_only: bool,
    pub power_of_two: bool,
    pub minimum: u32,
    pub maximum: u32,
}

#[derive(Debug, Clone)]
struct Register {
    spec: RegisterSpec,
    value: u32,
}

/// Mirror of the detector head's physical register space.
///
/// Writes are validated against the spec table before any channel traffic, so
/// a rejected write leaves both the mirror and the hardware untouched.
#[derive(Debug)]
pub struct RegisterFile {
    base: u32,
    registers: Vec<Register>,
}

impl RegisterFile {
    pub fn new(base: u32, specs: &'static [RegisterSpec]) -> Self {
        debug_assert!(specs
            .iter()
            .enumerate()
            .all(|(index, spec)| spec.offset == index as u32));
        Self {
            base,
            registers: specs
                .iter()
                .map(|spec| Register {
                    spec: *spec,
                    value: spec.default,
                })
                .collect(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn contains(&self, address: u32) -> bool {
        address >= self.base && ((address - self.base) as usize) < self.registers.len()
    }

    fn index(&self, address: u32) -> Result<usize, Error> {
        if self.contains(address) {
            Ok((address - self.base) as usize)
        } else {
            Err(Error::UnknownAddress { address })
        }
    }

    pub fn spec(&self, address: u32) -> Result<&RegisterSpec, Error> {
        Ok(&self.registers[self.index(address)?].spec)
    }

    /// Last value seen for this address, without touching the channel.
    pub fn cached(&self, address: u32) -> Result<u32, Error> {
        Ok(self.registers[self.index(address)?].value)
    }

    /// Checks a prospective write without performing it.
    pub fn validate(&self, address: u32, value: u32) -> Result<(), Error> {
        let register = &self.registers[self.index(address)?];
        let spec = &register.spec;
        if spec.read_only {
            return Err(Error::PermissionDenied {
                name: spec.name,
                address,
            });
        }
        if value < spec.minimum || value > spec.maximum {
            return Err(Error::OutOfRange {
                name: spec.name,
                address,
                value,
                minimum: spec.minimum,
                maximum: spec.maximum,
            });
        }
        if spec.power_of_two && !value.is_power_of_two() {
            return Err(Error::NotPowerOfTwo {
                name: spec.name,
                address,
                value,
            });
        }
        Ok(())
    }

    pub fn read(
        &mut self,
        address: u32,
        head: &mut dyn channel::DetectorHead,
    ) -> Result<u32, Error> {
        let index = self.index(address)?;
        let value = head.read_register(address)?;
        self.registers[index].value = value;
        Ok(value)
    }

    pub fn write(
        &mut self,
        address: u32,
        value: u32,
        head: &mut dyn channel::DetectorHead,
    ) -> Result<(), Error> {
        self.validate(address, value)?;
        let index = self.index(address)?;
        head.write_register(address, value)?;
        self.registers[index].value = value;
        Ok(())
    }

    /// Programs every register's default into the head at open time.
    ///
    /// Read-only registers are seeded too so that a simulated head reports
    /// sensible values for them.
    pub fn initialize(&mut self, head: &mut dyn channel::DetectorHead) -> Result<(), Error> {
        for index in 0..self.registers.len() {
            let address = self.base + index as u32;
            let default = self.registers[index].spec.default;
            head.write_register(address, default)?;
            self.registers[index].value = default;
        }
        Ok(())
    }
}
