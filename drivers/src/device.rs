use crate::adapters;
use crate::channel;
use crate::collaborators;
use crate::control;
use crate::registers;
use crate::sequence;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Register(#[from] registers::Error),

    #[error(transparent)]
    Control(#[from] control::Error),

    #[error(transparent)]
    Sequence(#[from] sequence::Error),

    #[error(transparent)]
    Descramble(#[from] adapters::Error),
}

/// Static wiring of one detector model, consumed by [`Core::open`].
pub struct CoreSpec {
    pub name: &'static str,
    pub base: u32,
    pub pseudo_base: u32,
    pub control: u32,
    pub registers: &'static [registers::RegisterSpec],
    pub layout: control::ControlLayout,
    pub sequence_registers: sequence::SequenceRegisters,
    pub step_size: f64,
    pub maximum_streak_lines: Option<i64>,
    pub maximum_subimage_lines: i64,
    pub geometry: aviex_types::DetectorGeometry,
}

/// Model-independent driver state shared by every detector model.
///
/// Owns the channel to the detector head, the register mirror, and the
/// sequence configurator; the per-model `Device` types wrap a `Core` and add
/// model-specific behavior on top (descrambling, lookup tables).
pub struct Core {
    name: &'static str,
    pseudo_base: u32,
    control_address: u32,
    layout: control::ControlLayout,
    head: Box<dyn channel::DetectorHead + Send>,
    video: Box<dyn collaborators::VideoInput + Send>,
    area_detector: Box<dyn collaborators::AreaDetector + Send>,
    file: registers::RegisterFile,
    configurator: sequence::Configurator,
    geometry: aviex_types::DetectorGeometry,
}

impl Core {
    pub fn open(
        spec: CoreSpec,
        mut head: Box<dyn channel::DetectorHead + Send>,
        video: Box<dyn collaborators::VideoInput + Send>,
        area_detector: Box<dyn collaborators::AreaDetector + Send>,
    ) -> Result<Self, Error> {
        let mut file = registers::RegisterFile::new(spec.base, spec.registers);
        file.initialize(head.as_mut())?;
        log::debug!(
            "{}: initialized {} registers at base {:#06x}",
            spec.name,
            file.len(),
            file.base()
        );
        Ok(Self {
            name: spec.name,
            pseudo_base: spec.pseudo_base,
            control_address: spec.control,
            layout: spec.layout,
            head,
            video,
            area_detector,
            file,
            configurator: sequence::Configurator::new(
                spec.layout,
                spec.sequence_registers,
                spec.step_size,
                spec.maximum_streak_lines,
                spec.maximum_subimage_lines,
            ),
            geometry: spec.geometry,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn geometry(&self) -> &aviex_types::DetectorGeometry {
        &self.geometry
    }

    pub fn set_geometry_binsize(&mut self, horizontal: i64, vertical: i64) {
        self.geometry.binsize = (horizontal, vertical);
    }

    /// Reads a physical register, or decodes a pseudo-register when `address`
    /// falls in the pseudo range.
    pub fn read_register(&mut self, address: u32) -> Result<u32, Error> {
        if address >= self.pseudo_base {
            let index = address - self.pseudo_base;
            let id = control::PseudoRegister::from_index(index).ok_or(
                control::Error::UnknownPseudoRegisterAddress {
                    detector: self.name,
                    index,
                },
            )?;
            self.get_pseudo_register(id)
        } else {
            Ok(self.file.read(address, self.head.as_mut())?)
        }
    }

    /// Writes a physical register, or merges a pseudo-register when `address`
    /// falls in the pseudo range.
    pub fn write_register(&mut self, address: u32, value: u32) -> Result<(), Error> {
        if address >= self.pseudo_base {
            let index = address - self.pseudo_base;
            let id = control::PseudoRegister::from_index(index).ok_or(
                control::Error::UnknownPseudoRegisterAddress {
                    detector: self.name,
                    index,
                },
            )?;
            self.set_pseudo_register(id, value)
        } else {
            Ok(self.file.write(address, value, self.head.as_mut())?)
        }
    }

    pub fn get_pseudo_register(&mut self, id: control::PseudoRegister) -> Result<u32, Error> {
        let word = self.file.read(self.control_address, self.head.as_mut())?;
        Ok(control::ControlRegister::new(word, self.layout).get(id)?)
    }

    /// Read-modify-write of one control-register field; every other bit of the
    /// control word is preserved.
    pub fn set_pseudo_register(
        &mut self,
        id: control::PseudoRegister,
        value: u32,
    ) -> Result<(), Error> {
        let word = self.file.read(self.control_address, self.head.as_mut())?;
        let mut register = control::ControlRegister::new(word, self.layout);
        register.set(id, value)?;
        if register.word() != word {
            self.file
                .write(self.control_address, register.word(), self.head.as_mut())?;
        }
        Ok(())
    }

    pub fn configure_for_sequence(
        &mut self,
        parameters: &sequence::SequenceParameters,
    ) -> Result<(), sequence::Error> {
        self.configurator.configure(
            parameters,
            &mut self.file,
            self.head.as_mut(),
            self.video.as_mut(),
            self.area_detector.as_mut(),
        )
    }

    /// Readout mode from the mirrored control word, without channel traffic.
    pub fn cached_readout_mode(&self) -> Result<control::ReadoutMode, Error> {
        let word = self.file.cached(self.control_address)?;
        Ok(self.layout.readout_mode(word)?)
    }

    pub fn cached_register(&self, address: u32) -> Result<u32, Error> {
        Ok(self.file.cached(address)?)
    }
}

pub trait Detector: Sized {
    type Configuration;
    type Error;
    type Properties;

    const PROPERTIES: Self::Properties;

    fn open(
        head: Box<dyn channel::DetectorHead + Send>,
        video: Box<dyn collaborators::VideoInput + Send>,
        area_detector: Box<dyn collaborators::AreaDetector + Send>,
        configuration: Self::Configuration,
    ) -> Result<Self, Self::Error>;

    fn name(&self) -> &'static str;

    fn geometry(&self) -> &aviex_types::DetectorGeometry;

    fn configure_for_sequence(
        &mut self,
        parameters: &sequence::SequenceParameters,
    ) -> Result<(), Self::Error>;

    fn descramble(
        &self,
        raw: &aviex_types::RawFrame,
    ) -> Result<aviex_types::ImageFrame, Self::Error>;

    fn read_register(&mut self, address: u32) -> Result<u32, Self::Error>;

    fn write_register(&mut self, address: u32, value: u32) -> Result<(), Self::Error>;

    fn get_pseudo_register(&mut self, id: control::PseudoRegister) -> Result<u32, Self::Error>;

    fn set_pseudo_register(
        &mut self,
        id: control::PseudoRegister,
        value: u32,
    ) -> Result<(), Self::Error>;
}
