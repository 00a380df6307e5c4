//! PCCD-170170: 4096x4096 sensor, sixteen readout ports, streak-camera and
//! geometrical sequences.

use crate::adapters;
use crate::channel;
use crate::collaborators;
use crate::control;
use crate::device;
use crate::device::Detector;
use crate::properties;
use crate::registers;
use crate::sequence;

pub const NAME: &str = "PCCD-170170";

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
pub const DH_STREAK_MODE_LINES: u32 = DH_BASE + 14;
pub const DH_EXPOSURE_MULTIPLIER: u32 = DH_BASE + 15;
pub const DH_GAP_MULTIPLIER: u32 = DH_BASE + 16;
pub const DH_OFFSET_A: u32 = DH_BASE + 17;
pub const DH_OFFSET_B: u32 = DH_BASE + 18;
pub const DH_OFFSET_C: u32 = DH_BASE + 19;
pub const DH_OFFSET_D: u32 = DH_BASE + 20;

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
        default: 4096,
        read_only: true,
        power_of_two: false,
        minimum: 0,
        maximum: 0xFFFF,
    },
    registers::RegisterSpec {
        name: "dh_physical_pixels_per_line",
        offset: 3,
        default: 4096,
        read_only: true,
        power_of_two: false,
        minimum: 0,
        maximum: 0xFFFF,
    },
    registers::RegisterSpec {
        name: "dh_fpga_version",
        offset: 4,
        default: 0x0117,
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
        default: 1024,
        read_only: false,
        power_of_two: false,
        minimum: 1,
        maximum: 1024,
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
        name: "dh_streak_mode_lines",
        offset: 14,
        default: 2,
        read_only: false,
        power_of_two: false,
        minimum: 1,
        maximum: 4096,
    },
    registers::RegisterSpec {
        name: "dh_exposure_multiplier",
        offset: 15,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 65535,
    },
    registers::RegisterSpec {
        name: "dh_gap_multiplier",
        offset: 16,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 65535,
    },
    registers::RegisterSpec {
        name: "dh_offset_a",
        offset: 17,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 0xFFFF,
    },
    registers::RegisterSpec {
        name: "dh_offset_b",
        offset: 18,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 0xFFFF,
    },
    registers::RegisterSpec {
        name: "dh_offset_c",
        offset: 19,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 0xFFFF,
    },
    registers::RegisterSpec {
        name: "dh_offset_d",
        offset: 20,
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
    over_exposure_warning: Some(control::Field {
        offset: 11,
        width: 1,
    }),
};

const SEQUENCE_REGISTERS: sequence::SequenceRegisters = sequence::SequenceRegisters {
    control: DH_CONTROL,
    frames_per_sequence: DH_FRAMES_PER_SEQUENCE,
    exposure_time: DH_EXPOSURE_TIME,
    gap_time: DH_GAP_TIME,
    subframe_size: DH_SUBFRAME_SIZE,
    subimages_per_read: DH_SUBIMAGES_PER_READ,
    streak_mode_lines: Some(DH_STREAK_MODE_LINES),
    exposure_multiplier: Some(DH_EXPOSURE_MULTIPLIER),
    gap_multiplier: Some(DH_GAP_MULTIPLIER),
};

pub const PROPERTIES: properties::Detector<Configuration> = properties::Detector {
    name: NAME,
    width: 4096,
    height: 4096,
    horiz_descramble_factor: 4,
    vert_descramble_factor: 4,
    num_taps: 16,
    pixel_clock_frequency: 60e6,
    exposure_and_gap_step_size: 0.001,
    maximum_streak_lines: Some(4096),
    maximum_subimage_lines: 2048,
    default_configuration: Configuration {
        trigger_mode: control::TriggerMode::Internal,
        readout_speed: control::ReadoutSpeed::Normal,
        offset_correction: false,
        shutter_disable: false,
        binning: (1, 1),
    },
};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Configuration {
    pub trigger_mode: control::TriggerMode,
    pub readout_speed: control::ReadoutSpeed,
    pub offset_correction: bool,
    pub shutter_disable: bool,
    /// Binning factors as (pixel, line).
    pub binning: (u32, u32),
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Device(#[from] device::Error),
}

pub struct Device {
    core: device::Core,
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
            control::PseudoRegister::ShutterDisable,
            configuration.shutter_disable as u32,
        )?;
        core.write_register(DH_PIXEL_BINNING, configuration.binning.0)?;
        core.write_register(DH_LINE_BINNING, configuration.binning.1)?;
        core.set_geometry_binsize(configuration.binning.0 as i64, configuration.binning.1 as i64);
        Ok(Self { core })
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

    /// Routes the raw frame through the streak or quadrant adapter depending
    /// on the last readout mode written to the control register.
    fn descramble(
        &self,
        raw: &aviex_types::RawFrame,
    ) -> Result<aviex_types::ImageFrame, Self::Error> {
        let (rows, cols) = self.core.geometry().binned_dimensions();
        match self.core.cached_readout_mode()? {
            control::ReadoutMode::StreakCamera => {
                let adapter = adapters::streak::Adapter::from_row_framesize(cols)
                    .map_err(device::Error::Descramble)?;
                Ok(adapter.descramble(raw).map_err(device::Error::Descramble)?)
            }
            control::ReadoutMode::FullFrame | control::ReadoutMode::SubImage => {
                let adapter = adapters::quadrant::Adapter::from_dimensions(rows, cols)
                    .map_err(device::Error::Descramble)?;
                Ok(adapter.descramble(raw).map_err(device::Error::Descramble)?)
            }
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
