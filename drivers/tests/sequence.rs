use aviex_drivers::channel;
use aviex_drivers::collaborators;
use aviex_drivers::collaborators::VideoInput;
use aviex_drivers::control;
use aviex_drivers::device::Detector;
use aviex_drivers::devices::pccd_170170;
use aviex_drivers::devices::pccd_4824;
use aviex_drivers::registers;
use aviex_drivers::sequence;
use aviex_drivers::SequenceParameters;

const CONTROL: u32 = 0;
const FRAMES: u32 = 1;
const EXPOSURE: u32 = 2;
const GAP: u32 = 3;
const SUBFRAME: u32 = 4;
const SUBIMAGES: u32 = 5;
const STREAK_LINES: u32 = 6;
const EXPOSURE_MULTIPLIER: u32 = 7;
const GAP_MULTIPLIER: u32 = 8;

static SPECS: [registers::RegisterSpec; 9] = [
    registers::RegisterSpec {
        name: "control",
        offset: 0,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 0xFFFF,
    },
    registers::RegisterSpec {
        name: "frames_per_sequence",
        offset: 1,
        default: 1,
        read_only: false,
        power_of_two: false,
        minimum: 1,
        maximum: 65535,
    },
    registers::RegisterSpec {
        name: "exposure_time",
        offset: 2,
        default: 100,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 65535,
    },
    registers::RegisterSpec {
        name: "gap_time",
        offset: 3,
        default: 1,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 65535,
    },
    registers::RegisterSpec {
        name: "subframe_size",
        offset: 4,
        default: 1024,
        read_only: false,
        power_of_two: false,
        minimum: 1,
        maximum: 1024,
    },
    registers::RegisterSpec {
        name: "subimages_per_read",
        offset: 5,
        default: 1,
        read_only: false,
        power_of_two: false,
        minimum: 1,
        maximum: 128,
    },
    registers::RegisterSpec {
        name: "streak_mode_lines",
        offset: 6,
        default: 2,
        read_only: false,
        power_of_two: false,
        minimum: 1,
        maximum: 4096,
    },
    registers::RegisterSpec {
        name: "exposure_multiplier",
        offset: 7,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 65535,
    },
    registers::RegisterSpec {
        name: "gap_multiplier",
        offset: 8,
        default: 0,
        read_only: false,
        power_of_two: false,
        minimum: 0,
        maximum: 65535,
    },
];

const LAYOUT: control::ControlLayout = control::ControlLayout {
    detector: "simulated",
    test_mode: None,
    readout_mode: control::Field {
        offset: 1,
        width: 2,
    },
    trigger_mode: None,
    duration_trigger: control::Field {
        offset: 5,
        width: 1,
    },
    readout_speed: None,
    offset_correction: None,
    linearization: None,
    dummy_frame_valid: None,
    shutter_disable: None,
    over_exposure_warning: None,
};

const SEQUENCE_REGISTERS: sequence::SequenceRegisters = sequence::SequenceRegisters {
    control: CONTROL,
    frames_per_sequence: FRAMES,
    exposure_time: EXPOSURE,
    gap_time: GAP,
    subframe_size: SUBFRAME,
    subimages_per_read: SUBIMAGES,
    streak_mode_lines: Some(STREAK_LINES),
    exposure_multiplier: Some(EXPOSURE_MULTIPLIER),
    gap_multiplier: Some(GAP_MULTIPLIER),
};

struct Harness {
    file: registers::RegisterFile,
    head: channel::Simulator,
    video: collaborators::SimulatedVideoInput,
    area_detector: collaborators::SimulatedAreaDetector,
    configurator: sequence::Configurator,
}

impl Harness {
    fn new() -> Self {
        let mut file = registers::RegisterFile::new(0, &SPECS);
        let mut head = channel::Simulator::new();
        file.initialize(&mut head).unwrap();
        Self {
            file,
            head,
            video: collaborators::SimulatedVideoInput::new(4096, 4096),
            area_detector: collaborators::SimulatedAreaDetector::new(0.005),
            configurator: sequence::Configurator::new(
                LAYOUT,
                SEQUENCE_REGISTERS,
                0.001,
                Some(4096),
                2048,
            ),
        }
    }

    fn configure(&mut self, parameters: &SequenceParameters) -> Result<(), sequence::Error> {
        self.configurator.configure(
            parameters,
            &mut self.file,
            &mut self.head,
            &mut self.video,
            &mut self.area_detector,
        )
    }

    fn cached(&self, address: u32) -> u32 {
        self.file.cached(address).unwrap()
    }

    fn readout_mode_bits(&self) -> u32 {
        LAYOUT.readout_mode.extract(self.cached(CONTROL))
    }

    fn duration_trigger_bit(&self) -> u32 {
        LAYOUT.duration_trigger.extract(self.cached(CONTROL))
    }
}

#[test]
fn one_shot_converts_exposure_to_steps() {
    let mut harness = Harness::new();
    harness
        .configure(&SequenceParameters::OneShot { exposure_time: 0.5 })
        .unwrap();
    assert_eq!(harness.cached(FRAMES), 1);
    assert_eq!(harness.cached(EXPOSURE), 500);
    assert_eq!(harness.readout_mode_bits(), 0b00);
    assert_eq!(harness.duration_trigger_bit(), 0);
}

#[test]
fn multiframe_derives_the_gap_from_the_frame_time() {
    let mut harness = Harness::new();
    harness
        .configure(&SequenceParameters::Multiframe {
            num_frames: 10,
            exposure_time: 0.01,
            frame_time: 0.02,
        })
        .unwrap();
    assert_eq!(harness.cached(FRAMES), 10);
    assert_eq!(harness.cached(EXPOSURE), 10);
    // 0.02 - 0.01 - 0.005 (simulated readout) = 0.005 s = 5 steps
    assert_eq!(harness.cached(GAP), 5);
}

#[test]
fn circular_multiframe_matches_multiframe_timing() {
    let mut harness = Harness::new();
    harness
        .configure(&SequenceParameters::CircularMultiframe {
            num_frames: 10,
            exposure_time: 0.01,
            frame_time: 0.02,
        })
        .unwrap();
    assert_eq!(harness.cached(FRAMES), 10);
    assert_eq!(harness.cached(GAP), 5);
}

#[test]
fn continuous_always_uses_one_gap_step() {
    let mut harness = Harness::new();
    harness
        .configure(&SequenceParameters::Continuous { exposure_time: 0.1 })
        .unwrap();
    assert_eq!(harness.cached(EXPOSURE), 100);
    assert_eq!(harness.cached(GAP), 1);
}

#[test]
fn strobe_does_not_touch_the_gap() {
    let mut harness = Harness::new();
    harness
        .configure(&SequenceParameters::Strobe {
            num_frames: 5,
            exposure_time: 0.2,
        })
        .unwrap();
    assert_eq!(harness.cached(FRAMES), 5);
    assert_eq!(harness.cached(EXPOSURE), 200);
    assert_eq!(harness.cached(GAP), 1);
}

#[test]
fn bulb_drives_the_duration_trigger() {
    let mut harness = Harness::new();
    harness
        .configure(&SequenceParameters::Bulb { num_frames: 1 })
        .unwrap();
    assert_eq!(harness.duration_trigger_bit(), 1);
    // the exposure register is irrelevant in bulb mode and must not change
    assert_eq!(harness.cached(EXPOSURE), 100);
    harness
        .configure(&SequenceParameters::OneShot { exposure_time: 0.5 })
        .unwrap();
    assert_eq!(harness.duration_trigger_bit(), 0);
}

#[test]
fn bulb_rejects_more_than_one_frame() {
    let mut harness = Harness::new();
    let error = harness
        .configure(&SequenceParameters::Bulb { num_frames: 2 })
        .unwrap_err();
    assert!(matches!(error, sequence::Error::TooManyFrames { .. }));
    assert_eq!(error.kind(), sequence::ErrorKind::WouldExceedLimit);
}

#[test]
fn negative_gaps_are_rejected() {
    let mut harness = Harness::new();
    let error = harness
        .configure(&SequenceParameters::Multiframe {
            num_frames: 2,
            exposure_time: 0.01,
            frame_time: 0.012,
        })
        .unwrap_err();
    assert!(matches!(error, sequence::Error::NegativeGapTime { .. }));
    assert_eq!(error.kind(), sequence::ErrorKind::IllegalArgument);
}

#[test]
fn gap_steps_must_fit_the_register() {
    let mut harness = Harness::new();
    let error = harness
        .configure(&SequenceParameters::Multiframe {
            num_frames: 2,
            exposure_time: 0.0,
            frame_time: 70.0,
        })
        .unwrap_err();
    assert!(matches!(
        error,
        sequence::Error::GapStepsOutOfRange {
            gap_steps: 69995,
            ..
        }
    ));
    assert_eq!(error.kind(), sequence::ErrorKind::IllegalArgument);
    // a sub-step gap rounds down to zero steps, below the hardware minimum
    let error = harness
        .configure(&SequenceParameters::Multiframe {
            num_frames: 2,
            exposure_time: 0.01,
            frame_time: 0.0153,
        })
        .unwrap_err();
    assert!(matches!(
        error,
        sequence::Error::GapStepsOutOfRange { gap_steps: 0, .. }
    ));
}

#[test]
fn exposure_steps_must_fit_the_register() {
    let mut harness = Harness::new();
    let error = harness
        .configure(&SequenceParameters::OneShot {
            exposure_time: 100.0,
        })
        .unwrap_err();
    assert!(matches!(
        error,
        sequence::Error::ExposureStepsOutOfRange { .. }
    ));
    assert_eq!(error.kind(), sequence::ErrorKind::IllegalArgument);
    assert!(harness
        .configure(&SequenceParameters::OneShot {
            exposure_time: -0.5,
        })
        .is_err());
}

#[test]
fn geometrical_encodes_multipliers() {
    let mut harness = Harness::new();
    harness
        .configure(&SequenceParameters::Geometrical {
            num_frames: 3,
            exposure_time: 0.01,
            frame_time: 0.02,
            exposure_multiplier: 1.5,
            gap_multiplier: 1.0,
        })
        .unwrap();
    assert_eq!(harness.cached(FRAMES), 3);
    assert_eq!(harness.cached(GAP), 5);
    // (1.5 - 1) * 256 = 128
    assert_eq!(harness.cached(EXPOSURE_MULTIPLIER), 128);
    assert_eq!(harness.cached(GAP_MULTIPLIER), 0);
}

#[test]
fn multipliers_below_one_are_rejected() {
    let mut harness = Harness::new();
    let error = harness
        .configure(&SequenceParameters::Geometrical {
            num_frames: 3,
            exposure_time: 0.01,
            frame_time: 0.02,
            exposure_multiplier: 0.5,
            gap_multiplier: 1.0,
        })
        .unwrap_err();
    assert!(matches!(
        error,
        sequence::Error::MultiplierOutOfRange { encoded: -128, .. }
    ));
    assert_eq!(error.kind(), sequence::ErrorKind::IllegalArgument);
}

#[test]
fn subimage_programs_subframe_registers() {
    let mut harness = Harness::new();
    harness
        .configure(&SequenceParameters::SubImage {
            lines_per_subimage: 100.0,
            subimages_per_frame: 4.0,
            exposure_time: 0.05,
            subimage_time: 0.1,
        })
        .unwrap();
    assert_eq!(harness.readout_mode_bits(), 0b01);
    assert_eq!(harness.cached(FRAMES), 1);
    assert_eq!(harness.cached(EXPOSURE), 50);
    assert_eq!(harness.cached(GAP), 50);
    assert_eq!(harness.cached(SUBFRAME), 50);
    assert_eq!(harness.cached(SUBIMAGES), 4);
}

#[test]
fn subimage_rejects_too_many_total_lines() {
    let mut harness = Harness::new();
    let error = harness
        .configure(&SequenceParameters::SubImage {
            lines_per_subimage: 1024.0,
            subimages_per_frame: 4.0,
            exposure_time: 0.05,
            subimage_time: 0.1,
        })
        .unwrap_err();
    assert!(matches!(
        error,
        sequence::Error::TooManySubimageLines {
            total_lines: 4096,
            ..
        }
    ));
    assert_eq!(error.kind(), sequence::ErrorKind::WouldExceedLimit);
    assert_eq!(harness.readout_mode_bits(), 0b00);
}

#[test]
fn streak_saves_and_restores_the_geometry() {
    let mut harness = Harness::new();
    harness
        .configure(&SequenceParameters::StreakCamera {
            num_lines: 1000.0,
            exposure_time_per_line: 0.001,
            total_time_per_line: 0.003,
        })
        .unwrap();
    assert_eq!(harness.readout_mode_bits(), 0b10);
    assert_eq!(harness.cached(STREAK_LINES), 1000);
    assert_eq!(harness.cached(EXPOSURE), 1);
    assert_eq!(harness.cached(GAP), 2);
    assert_eq!(harness.video.framesize(), (4096, 500));
    assert_eq!(
        harness.configurator.saved_geometry(),
        Some(sequence::SavedGeometry {
            framesize: (4096, 4096),
            binsize: (1, 1),
        })
    );

    // streak to streak keeps the original saved geometry
    harness
        .configure(&SequenceParameters::StreakCamera {
            num_lines: 800.0,
            exposure_time_per_line: 0.001,
            total_time_per_line: 0.003,
        })
        .unwrap();
    assert_eq!(harness.video.framesize(), (4096, 400));
    assert_eq!(
        harness.configurator.saved_geometry().map(|saved| saved.framesize),
        Some((4096, 4096))
    );

    // leaving streak restores the saved geometry exactly once
    harness
        .configure(&SequenceParameters::OneShot { exposure_time: 0.5 })
        .unwrap();
    assert_eq!(harness.readout_mode_bits(), 0b00);
    assert_eq!(harness.video.framesize(), (4096, 4096));
    assert!(harness.configurator.saved_geometry().is_none());
}

#[test]
fn streak_to_subimage_also_restores() {
    let mut harness = Harness::new();
    harness
        .configure(&SequenceParameters::StreakCamera {
            num_lines: 1000.0,
            exposure_time_per_line: 0.001,
            total_time_per_line: 0.003,
        })
        .unwrap();
    harness
        .configure(&SequenceParameters::SubImage {
            lines_per_subimage: 100.0,
            subimages_per_frame: 4.0,
            exposure_time: 0.05,
            subimage_time: 0.1,
        })
        .unwrap();
    assert_eq!(harness.readout_mode_bits(), 0b01);
    assert_eq!(harness.video.framesize(), (4096, 4096));
    assert!(harness.configurator.saved_geometry().is_none());
}

#[test]
fn control_register_views_compare_by_word() {
    let register = control::ControlRegister::new(0, LAYOUT);
    let mut other = control::ControlRegister::new(0, LAYOUT);
    assert_eq!(register, other);
    other.set_duration_trigger(true);
    assert_ne!(register, other);
}

#[test]
fn single_line_streak_requests_fail_before_any_write() {
    let mut harness = Harness::new();
    let error = harness
        .configure(&SequenceParameters::StreakCamera {
            num_lines: 1.0,
            exposure_time_per_line: 0.001,
            total_time_per_line: 0.003,
        })
        .unwrap_err();
    assert!(matches!(
        error,
        sequence::Error::StreakLinesOutOfRange {
            num_lines: 1,
            minimum: 2,
            ..
        }
    ));
    // one output line would mean a zero-height video framesize; the request
    // must be rejected with every register, the control word, the video
    // geometry, and the saved geometry untouched
    assert_eq!(harness.cached(STREAK_LINES), 2);
    assert_eq!(harness.cached(EXPOSURE), 100);
    assert_eq!(harness.cached(FRAMES), 1);
    assert_eq!(harness.readout_mode_bits(), 0b00);
    assert_eq!(harness.video.framesize(), (4096, 4096));
    assert!(harness.configurator.saved_geometry().is_none());
}

#[test]
fn streak_lines_are_bounded() {
    let mut harness = Harness::new();
    let error = harness
        .configure(&SequenceParameters::StreakCamera {
            num_lines: 5000.0,
            exposure_time_per_line: 0.001,
            total_time_per_line: 0.003,
        })
        .unwrap_err();
    assert!(matches!(
        error,
        sequence::Error::StreakLinesOutOfRange { num_lines: 5000, .. }
    ));
    assert_eq!(error.kind(), sequence::ErrorKind::IllegalArgument);
}

#[test]
fn leaving_streak_without_saved_geometry_is_tolerated() {
    let mut harness = Harness::new();
    // force streak readout mode behind the configurator's back
    harness
        .file
        .write(CONTROL, 0b10 << 1, &mut harness.head)
        .unwrap();
    harness
        .configure(&SequenceParameters::OneShot { exposure_time: 0.5 })
        .unwrap();
    assert_eq!(harness.readout_mode_bits(), 0b00);
    assert_eq!(harness.video.framesize(), (4096, 4096));
}

#[test]
fn unknown_readout_modes_are_reported() {
    let mut harness = Harness::new();
    harness
        .file
        .write(CONTROL, 0b11 << 1, &mut harness.head)
        .unwrap();
    let error = harness
        .configure(&SequenceParameters::OneShot { exposure_time: 0.5 })
        .unwrap_err();
    assert!(matches!(
        error,
        sequence::Error::Control(control::Error::UnknownReadoutMode { bits: 0b11, .. })
    ));
    assert_eq!(error.kind(), sequence::ErrorKind::Device);
}

#[test]
fn rejected_sequences_leave_the_registers_untouched() {
    let mut harness = Harness::new();
    harness
        .configure(&SequenceParameters::OneShot { exposure_time: 0.5 })
        .unwrap();
    assert!(harness
        .configure(&SequenceParameters::Multiframe {
            num_frames: 20,
            exposure_time: 0.01,
            frame_time: 0.012,
        })
        .is_err());
    assert_eq!(harness.cached(FRAMES), 1);
    assert_eq!(harness.cached(EXPOSURE), 500);
    assert!(harness
        .configure(&SequenceParameters::SubImage {
            lines_per_subimage: 1024.0,
            subimages_per_frame: 4.0,
            exposure_time: 0.05,
            subimage_time: 0.1,
        })
        .is_err());
    assert_eq!(harness.readout_mode_bits(), 0b00);
    assert_eq!(harness.cached(SUBFRAME), 1024);
    assert_eq!(harness.cached(SUBIMAGES), 1);
}

fn sequence_error_170170(result: Result<(), pccd_170170::Error>) -> sequence::Error {
    match result {
        Err(pccd_170170::Error::Device(aviex_drivers::device::Error::Sequence(error))) => error,
        Ok(()) => panic!("expected a sequence error"),
        Err(error) => panic!("expected a sequence error, got {:?}", error),
    }
}

fn sequence_error_4824(result: Result<(), pccd_4824::Error>) -> sequence::Error {
    match result {
        Err(pccd_4824::Error::Device(aviex_drivers::device::Error::Sequence(error))) => error,
        Ok(()) => panic!("expected a sequence error"),
        Err(error) => panic!("expected a sequence error, got {:?}", error),
    }
}

#[test]
fn device_level_one_shot() {
    let mut device =
        pccd_170170::Device::simulated(pccd_170170::PROPERTIES.default_configuration.clone())
            .unwrap();
    device
        .configure_for_sequence(&SequenceParameters::OneShot { exposure_time: 0.5 })
        .unwrap();
    assert_eq!(
        device
            .read_register(pccd_170170::DH_EXPOSURE_TIME)
            .unwrap(),
        500
    );
    assert_eq!(
        device
            .get_pseudo_register(control::PseudoRegister::ReadoutMode)
            .unwrap(),
        0b00
    );
}

#[test]
fn device_level_streak_roundtrip() {
    let mut device =
        pccd_170170::Device::simulated(pccd_170170::PROPERTIES.default_configuration.clone())
            .unwrap();
    device
        .configure_for_sequence(&SequenceParameters::StreakCamera {
            num_lines: 1000.0,
            exposure_time_per_line: 0.001,
            total_time_per_line: 0.003,
        })
        .unwrap();
    assert_eq!(
        device
            .get_pseudo_register(control::PseudoRegister::ReadoutMode)
            .unwrap(),
        0b10
    );
    assert_eq!(
        device
            .read_register(pccd_170170::DH_STREAK_MODE_LINES)
            .unwrap(),
        1000
    );
    device
        .configure_for_sequence(&SequenceParameters::OneShot { exposure_time: 0.5 })
        .unwrap();
    assert_eq!(
        device
            .get_pseudo_register(control::PseudoRegister::ReadoutMode)
            .unwrap(),
        0b00
    );
}

#[test]
fn device_level_atomicity() {
    let mut device =
        pccd_170170::Device::simulated(pccd_170170::PROPERTIES.default_configuration.clone())
            .unwrap();
    let error = sequence_error_170170(device.configure_for_sequence(
        &SequenceParameters::Multiframe {
            num_frames: 20,
            exposure_time: 0.01,
            frame_time: 0.012,
        },
    ));
    assert!(matches!(error, sequence::Error::NegativeGapTime { .. }));
    assert_eq!(
        device
            .read_register(pccd_170170::DH_FRAMES_PER_SEQUENCE)
            .unwrap(),
        1
    );
}

#[test]
fn device_level_single_line_streak_is_rejected_atomically() {
    let mut device =
        pccd_170170::Device::simulated(pccd_170170::PROPERTIES.default_configuration.clone())
            .unwrap();
    let error = sequence_error_170170(device.configure_for_sequence(
        &SequenceParameters::StreakCamera {
            num_lines: 1.0,
            exposure_time_per_line: 0.001,
            total_time_per_line: 0.003,
        },
    ));
    assert!(matches!(
        error,
        sequence::Error::StreakLinesOutOfRange { .. }
    ));
    assert_eq!(
        device
            .read_register(pccd_170170::DH_STREAK_MODE_LINES)
            .unwrap(),
        2
    );
    assert_eq!(
        device
            .read_register(pccd_170170::DH_EXPOSURE_TIME)
            .unwrap(),
        100
    );
    assert_eq!(
        device
            .get_pseudo_register(control::PseudoRegister::ReadoutMode)
            .unwrap(),
        0b00
    );
}

#[test]
fn streak_and_geometrical_are_unsupported_on_the_4824() {
    let mut device =
        pccd_4824::Device::simulated(pccd_4824::PROPERTIES.default_configuration.clone()).unwrap();
    let error = sequence_error_4824(device.configure_for_sequence(
        &SequenceParameters::StreakCamera {
            num_lines: 100.0,
            exposure_time_per_line: 0.001,
            total_time_per_line: 0.003,
        },
    ));
    assert_eq!(error.kind(), sequence::ErrorKind::Unsupported);
    let error = sequence_error_4824(device.configure_for_sequence(
        &SequenceParameters::Geometrical {
            num_frames: 3,
            exposure_time: 0.01,
            frame_time: 0.02,
            exposure_multiplier: 1.5,
            gap_multiplier: 1.0,
        },
    ));
    assert_eq!(error.kind(), sequence::ErrorKind::Unsupported);
}

#[test]
fn sequence_parameters_roundtrip_through_bincode() {
    let parameters = SequenceParameters::Geometrical {
        num_frames: 3,
        exposure_time: 0.01,
        frame_time: 0.02,
        exposure_multiplier: 1.5,
        gap_multiplier: 1.0,
    };
    let data = aviex_drivers::bincode::serialize(&parameters).unwrap();
    let deserialized = SequenceParameters::deserialize_bincode(&data).unwrap();
    assert_eq!(deserialized, parameters);
    assert_eq!(
        deserialized.sequence_type(),
        aviex_drivers::SequenceType::Geometrical
    );
}
