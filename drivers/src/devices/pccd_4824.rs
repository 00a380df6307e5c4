//! PCCD-4824: 2048x1024 sensor, four readout ports, optional per-sector
//! linearization through a loadable lookup table.

use crate::adapters;
use crate::channel;
use crate::collaborators;
use crate::control;
use crate::device;
use crate::device::Detector;
use crate::properties;
use crate::registers;
use crate::sequence;

pub const NAME: &str = "PCCD-4824";

pub const DH_BASE: u32 = 0x0000;
pub const DH_PSEUDO_BASE: u32 = 0x0200;

pub const DH_CONTROL: u32 = DH_BASE;
pub const DH_OVERSCANNED_PIXELS_PER_LINE: u32 = DH_BASE + 1;
pub const DH_PHYSICAL_LINES_IN_SENSOR: u32 = DH_BASE + 2;
pub const DH_PHYSICAL_PIXELS_PER_LINE: u32 = DH_BASE + 3;
pub const DH_FPGA_VERSION: u32 = DH_BASE + 4;
pub const DH_FRAMES_PER_SEQUENCE: u32 = DH_BASE + 5;
pub const DH_EXPOSURE_TIME: u32 = DH_BASE + 6;
pub const DH_GAP_TIME: u32 = DH_BASE + 7;
pub const DH_INITIAL_DELAY: u32 = DH_BASE + 8;
pub const DH_READOUT_DELAY: u32 = DH_BASE + 9;
pub const DH_LINE_BINNING: u32 = DH_BASE + 10;
pub const DH_PIXEL_BINNING: u32 = DH_BASE + 11;
pub const DH_SUBFRAME_SIZE: u32 = DH_BASE + 12;
pub const DH_SUBIMAGES_PER_READ: u32 = DH_BASE + 13;
pub const DH_OFFSET_A: u32 = DH_BASE + 14;
pub const DH_OFFSET_B: u32 = DH_BASE + 15;
pub const DH_OFFSET_C: u32 = DH_BASE + 16;
pub const DH_OFFSET_D: u32 = DH_BASE + 17;

const REGISTERS: &[registers::RegisterSpec] = &[
    registers::RegisterSpec {
        name: "dh_control",
        offset: 0,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 0xFFFF,
    },
    registers::RegisterSpec {
        name: "dh_overscanned_pixels_per_line",
        offset: 1,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 0xFFFF,
    },
    registers::RegisterSpec {
        name: "dh_physical_lines_in_sensor",
        offset: 2,
        default: 1024,
        read_only: true,
        power_of_two: false,
        minimum: 0,
        maximum: 0xFFFF,
    },
    registers::RegisterSpec {
        name: "dh_physical_pixels_per_line",
        offset: 3,
        default: 2048,
        read_only: true,
        power_of_two: false,
        minimum: 0,
        maximum: 0xFFFF,
    },
    registers::RegisterSpec {
        name: "dh_fpga_version",
        offset: 4,
        default: 0x0205,
        read_only: true,
        power_of_two: false,
        minimum: 0,
        maximum: 0xFFFF,
    },
    registers::RegisterSpec {
        name: "dh_frames_per_sequence",
        offset: 5,
        default: 1,
        read_only: false,
        power_of_two: false,
        minimum: 1,
        maximum: 65535,
    },
    registers::RegisterSpec {
        name: "dh_exposure_time",
        offset: 6,
        default: 100,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 65535,
    },
    registers::RegisterSpec {
        name: "dh_gap_time",
        offset: 7,
        default: 1,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 65535,
    },
    registers::RegisterSpec {
        name: "dh_initial_delay",
        offset: 8,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 65535,
    },
    registers::RegisterSpec {
        name: "dh_readout_delay",
        offset: 9,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 65535,
    },
    registers::RegisterSpec {
        name: "dh_line_binning",
        offset: 10,
        default: 1,
        read_only: false,
        power_of_two: true,
        minimum: 1,
        maximum: 128,
    },
    registers::RegisterSpec {
        name: "dh_pixel_binning",
        offset: 11,
        default: 1,
        read_only: false,
        power_of_two: true,
        minimum: 1,
        maximum: 128,
    },
    registers::RegisterSpec {
        name: "dh_subframe_size",
        offset: 12,
        default: 512,
        read_only: false,
        power_of_two: false,
        minimum: 1,
        maximum: 512,
    },
    registers::RegisterSpec {
        name: "dh_subimages_per_read",
        offset: 13,
        default: 1,
        read_only: false,
        power_of_two: false,
        minimum: 1,
        maximum: 128,
    },
    registers::RegisterSpec {
        name: "dh_offset_a",
        offset: 14,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 0xFFFF,
    },
    registers::RegisterSpec {
        name: "dh_offset_b",
        offset: 15,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 0xFFFF,
    },
    registers::RegisterSpec {
        name: "dh_offset_c",
        offset: 16,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 0xFFFF,
    },
    registers::RegisterSpec {
        name: "dh_offset_d",
        offset: 17,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 0xFFFF,
    },
];

pub const CONTROL_LAYOUT: control::ControlLayout = control::ControlLayout {
    detector: NAME,
    test_mode: Some(control::Field {
        offset: 0,
        width: 1,
    }),
    readout_mode: control::Field {
        offset: 1,
        width: 2,
    },
    trigger_mode: Some(control::Field {
        offset: 3,
        width: 2,
    }),
    duration_trigger: control::Field {
        offset: 5,
        width: 1,
    },
    readout_speed: Some(control::Field {
        offset: 6,
        width: 1,
    }),
    offset_correction: Some(control::Field {
        offset: 7,
        width: 1,
    }),
    linearization: Some(control::Field {
        offset: 8,
        width: 1,
    }),
    dummy_frame_valid: Some(control::Field {
        offset: 9,
        width: 1,
    }),
    shutter_disable: Some(control::Field {
        offset: 10,
        width: 1,
    }),
    over_exposure_warning: None,
};

const SEQUENCE_REGISTERS: sequence::SequenceRegisters = sequence::SequenceRegisters {
    control: DH_CONTROL,
    frames_per_sequence: DH_FRAMES_PER_SEQUENCE,
    exposure_time: DH_EXPOSURE_TIME,
    gap_time: DH_GAP_TIME,
    subframe_size: DH_SUBFRAME_SIZE,
    subimages_per_read: DH_SUBIMAGES_PER_READ,
    streak_mode_lines: None,
    exposure_multiplier: None,
    gap_multiplier: None,
};

/// Number of lookup-table sectors, one per readout port.
pub const LOOKUP_TABLE_SECTORS: usize = 4;

pub const PROPERTIES: properties::Detector<Configuration> = properties::Detector {
    name: NAME,
    width: 2048,
    height: 1024,
    horiz_descramble_factor: 2,
    vert_descramble_factor: 2,
    num_taps: 4,
    pixel_clock_frequency: 40e6,
    exposure_and_gap_step_size: 0.001,
    maximum_streak_lines: None,
    maximum_subimage_lines: 1024,
    default_configuration: Configuration {
        trigger_mode: control::TriggerMode::Internal,
        readout_speed: control::ReadoutSpeed::Normal,
        offset_correction: false,
        linearization: false,
        shutter_disable: false,
        binning: (1, 1),
    },
};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Configuration {
    pub trigger_mode: control::TriggerMode,
    pub readout_speed: control::ReadoutSpeed,
    pub offset_correction: bool,
    pub linearization: bool,
    pub shutter_disable: bool,
    /// Binning factors as (pixel, line).
    pub binning: (u32, u32),
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("a linearization lookup table is already loaded")]
    LookupTableAlreadyLoaded,

    #[error("linearization is enabled but no lookup table is loaded")]
    LookupTableNotLoaded,

    #[error("the linearization lookup table must have {expected} sectors, got {actual}")]
    LookupTableSectors { expected: usize, actual: usize },

    #[error(transparent)]
    Device(#[from] device::Error),
}

pub struct Device {
    core: device::Core,
    lookup_table: Option<adapters::LookupTable>,
}

impl Device {
    pub fn simulated(configuration: Configuration) -> Result<Self, Error> {
        Self::open(
            Box::new(channel::Simulator::new()),
            Box::new(collaborators::SimulatedVideoInput::new(
                PROPERTIES.width,
                PROPERTIES.height,
            )),
            Box::new(collaborators::SimulatedAreaDetector::new(
                super::SIMULATED_READOUT_TIME,
            )),
            configuration,
        )
    }

    /// Loads the per-sector linearization table; the table can only be loaded
    /// once per session.
    pub fn load_lookup_table(&mut self, table: adapters::LookupTable) -> Result<(), Error> {
        if self.lookup_table.is_some() {
            return Err(Error::LookupTableAlreadyLoaded);
        }
        if table.sectors() != LOOKUP_TABLE_SECTORS {
            return Err(Error::LookupTableSectors {
                expected: LOOKUP_TABLE_SECTORS,
                actual: table.sectors(),
            });
        }
        self.lookup_table = Some(table);
        Ok(())
    }

    fn linearization_enabled(&self) -> Result<bool, Error> {
        let word = self.core.cached_register(DH_CONTROL)?;
        Ok(control::ControlRegister::new(word, CONTROL_LAYOUT)
            .get(control::PseudoRegister::Linearization)
            .map_err(device::Error::from)?
            != 0)
    }
}

impl device::Detector for Device {
    type Configuration = Configuration;
    type Error = Error;
    type Properties = properties::Detector<Configuration>;

    const PROPERTIES: Self::Properties = PROPERTIES;

    fn open(
        head: Box<dyn channel::DetectorHead + Send>,
        video: Box<dyn collaborators::VideoInput + Send>,
        area_detector: Box<dyn collaborators::AreaDetector + Send>,
        configuration: Self::Configuration,
    ) -> Result<Self, Self::Error> {
        let mut core = device::Core::open(
            device::CoreSpec {
                name: NAME,
                base: DH_BASE,
                pseudo_base: DH_PSEUDO_BASE,
                control: DH_CONTROL,
                registers: REGISTERS,
                layout: CONTROL_LAYOUT,
                sequence_registers: SEQUENCE_REGISTERS,
                step_size: PROPERTIES.exposure_and_gap_step_size,
                maximum_streak_lines: PROPERTIES.maximum_streak_lines,
                maximum_subimage_lines: PROPERTIES.maximum_subimage_lines,
                geometry: PROPERTIES.geometry(),
            },
            head,
            video,
            area_detector,
        )?;
        core.set_pseudo_register(
            control::PseudoRegister::TriggerMode,
            configuration.trigger_mode.bits(),
        )?;
        core.set_pseudo_register(
            control::PseudoRegister::ReadoutSpeed,
            configuration.readout_speed.bits(),
        )?;
        core.set_pseudo_register(
            control::PseudoRegister::OffsetCorrection,
            configuration.offset_correction as u32,
        )?;
        core.set_pseudo_register(
            control::PseudoRegister::Linearization,
            configuration.linearization as u32,
        )?;
        core.set_pseudo_register(
            control::PseudoRegister::ShutterDisable,
            configuration.shutter_disable as u32,
        )?;
        core.write_register(DH_PIXEL_BINNING, configuration.binning.0)?;
        core.write_register(DH_LINE_BINNING, configuration.binning.1)?;
        core.set_geometry_binsize(configuration.binning.0 as i64, configuration.binning.1 as i64);
        Ok(Self {
            core,
            lookup_table: None,
        })
    }

    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn geometry(&self) -> &aviex_types::DetectorGeometry {
        self.core.geometry()
    }

    fn configure_for_sequence(
        &mut self,
        parameters: &sequence::SequenceParameters,
    ) -> Result<(), Self::Error> {
        Ok(self
            .core
            .configure_for_sequence(parameters)
            .map_err(device::Error::Sequence)?)
    }

    /// Quadrant descramble, mapped through the lookup table when the
    /// linearization control bit is set.
    fn descramble(
        &self,
        raw: &aviex_types::RawFrame,
    ) -> Result<aviex_types::ImageFrame, Self::Error> {
        let (rows, cols) = self.core.geometry().binned_dimensions();
        let adapter = adapters::quadrant::Adapter::from_dimensions(rows, cols)
            .map_err(device::Error::Descramble)?;
        if self.linearization_enabled()? {
            let table = self
                .lookup_table
                .as_ref()
                .ok_or(Error::LookupTableNotLoaded)?;
            Ok(adapter
                .descramble_linearized(raw, table)
                .map_err(device::Error::Descramble)?)
        } else {
            Ok(adapter.descramble(raw).map_err(device::Error::Descramble)?)
        }
    }

    fn read_register(&mut self, address: u32) -> Result<u32, Self::Error> {
        Ok(self.core.read_register(address)?)
    }

    fn write_register(&mut self, address: u32, value: u32) -> Result<(), Self::Error> {
        Ok(self.core.write_register(address, value)?)
    }

    fn get_pseudo_register(&mut self, id: control::PseudoRegister) -> Result<u32, Self::Error> {
        Ok(self.core.get_pseudo_register(id)?)
    }

    fn set_pseudo_register(
        &mut self,
        id: control::PseudoRegister,
        value: u32,
    ) -> Result<(), Self::Error> {
        Ok(self.core.set_pseudo_register(id, value)?)
    }
}
