//! Bit-packed view over the detector head's control register.
//!
//! Every pseudo-register is a named field at a fixed offset/width inside the
//! one physical control word; the placement differs between detector models
//! and is documented by each model's `CONTROL_LAYOUT`.

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PseudoRegister {
    TestMode,
    ReadoutMode,
    TriggerMode,
    DurationTrigger,
    ReadoutSpeed,
    OffsetCorrection,
    Linearization,
    DummyFrameValid,
    ShutterDisable,
    OverExposureWarning,
}

impl PseudoRegister {
    /// Offset of this pseudo-register within the model's `DH_PSEUDO_BASE`
    /// address range.
    pub fn index(self) -> u32 {
        match self {
            Self::TestMode => 0,
            Self::ReadoutMode => 1,
            Self::TriggerMode => 2,
            Self::DurationTrigger => 3,
            Self::ReadoutSpeed => 4,
            Self::OffsetCorrection => 5,
            Self::Linearization => 6,
            Self::DummyFrameValid => 7,
            Self::ShutterDisable => 8,
            Self::OverExposureWarning => 9,
        }
    }

    pub fn from_index(index: u32) -> Option<Self> {
        Some(match index {
            0 => Self::TestMode,
            1 => Self::ReadoutMode,
            2 => Self::TriggerMode,
            3 => Self::DurationTrigger,
            4 => Self::ReadoutSpeed,
            5 => Self::OffsetCorrection,
            6 => Self::Linearization,
            7 => Self::DummyFrameValid,
            8 => Self::ShutterDisable,
            9 => Self::OverExposureWarning,
            _ => return None,
        })
    }
}

impl std::fmt::Display for PseudoRegister {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::TestMode => "test_mode",
            Self::ReadoutMode => "readout_mode",
            Self::TriggerMode => "trigger_mode",
            Self::DurationTrigger => "duration_trigger",
            Self::ReadoutSpeed => "readout_speed",
            Self::OffsetCorrection => "offset_correction",
            Self::Linearization => "linearization",
            Self::DummyFrameValid => "dummy_frame_valid",
            Self::ShutterDisable => "shutter_disable",
            Self::OverExposureWarning => "over_exposure_warning",
        })
    }
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("{detector} does not implement pseudo-register {id}")]
    UnsupportedPseudoRegister {
        detector: &'static str,
        id: PseudoRegister,
    },

    #[error("{detector} has no pseudo-register at offset {index} above its pseudo base")]
    UnknownPseudoRegisterAddress { detector: &'static str, index: u32 },

    #[error("value {value} does not fit pseudo-register {id} ({width} bit wide, maximum {maximum})")]
    ValueTooWide {
        id: PseudoRegister,
        value: u32,
        width: u32,
        maximum: u32,
    },

    #[error("{detector} reports readout-mode bits {bits:#04b} that decode to no known mode")]
    UnknownReadoutMode { detector: &'static str, bits: u32 },
}

/// One field of the control register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Field {
    pub offset: u32,
    pub width: u32,
}

impl Field {
    pub const fn mask(self) -> u32 {
        (((1u64 << self.width) - 1) as u32) << self.offset
    }

    pub const fn maximum(self) -> u32 {
        ((1u64 << self.width) - 1) as u32
    }

    pub fn extract(self, word: u32) -> u32 {
        (word & self.mask()) >> self.offset
    }

    /// Clears the field in `word` and ORs `value` in, leaving every other bit
    /// of the control word unchanged.
    pub fn merge(self, word: u32, value: u32) -> u32 {
        (word & !self.mask()) | ((value << self.offset) & self.mask())
    }
}

/// Placement of every pseudo-register within one model's control register.
///
/// `readout_mode` and `duration_trigger` are mandatory because the sequence
/// configurator drives them; a `None` field means the model does not expose
/// that pseudo-register at all.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ControlLayout {
    pub detector: &'static str,
    pub test_mode: Option<Field>,
    pub readout_mode: Field,
    pub trigger_mode: Option<Field>,
    pub duration_trigger: Field,
    pub readout_speed: Option<Field>,
    pub offset_correction: Option<Field>,
    pub linearization: Option<Field>,
    pub dummy_frame_valid: Option<Field>,
    pub shutter_disable: Option<Field>,
    pub over_exposure_warning: Option<Field>,
}

impl ControlLayout {
    pub fn field(&self, id: PseudoRegister) -> Result<Field, Error> {
        match id {
            PseudoRegister::ReadoutMode => Some(self.readout_mode),
            PseudoRegister::DurationTrigger => Some(self.duration_trigger),
            PseudoRegister::TestMode => self.test_mode,
            PseudoRegister::TriggerMode => self.trigger_mode,
            PseudoRegister::ReadoutSpeed => self.readout_speed,
            PseudoRegister::OffsetCorrection => self.offset_correction,
            PseudoRegister::Linearization => self.linearization,
            PseudoRegister::DummyFrameValid => self.dummy_frame_valid,
            PseudoRegister::ShutterDisable => self.shutter_disable,
            PseudoRegister::OverExposureWarning => self.over_exposure_warning,
        }
        .ok_or(Error::UnsupportedPseudoRegister {
            detector: self.detector,
            id,
        })
    }

    pub fn readout_mode(&self, word: u32) -> Result<ReadoutMode, Error> {
        let bits = self.readout_mode.extract(word);
        ReadoutMode::from_bits(bits).ok_or(Error::UnknownReadoutMode {
            detector: self.detector,
            bits,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadoutMode {
    FullFrame,
    SubImage,
    StreakCamera,
}

impl ReadoutMode {
    pub fn bits(self) -> u32 {
        match self {
            Self::FullFrame => 0b00,
            Self::SubImage => 0b01,
            Self::StreakCamera => 0b10,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0b00 => Some(Self::FullFrame),
            0b01 => Some(Self::SubImage),
            0b10 => Some(Self::StreakCamera),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReadoutMode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::FullFrame => "full-frame",
            Self::SubImage => "sub-image",
            Self::StreakCamera => "streak-camera",
        })
    }
}

/// Value-type view over the control word; mutations never touch bits outside
/// the addressed field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ControlRegister {
    word: u32,
    layout: ControlLayout,
}

impl ControlRegister {
    pub fn new(word: u32, layout: ControlLayout) -> Self {
        Self { word, layout }
    }

    pub fn word(&self) -> u32 {
        self.word
    }

    pub fn readout_mode(&self) -> Result<ReadoutMode, Error> {
        self.layout.readout_mode(self.word)
    }

    pub fn set_readout_mode(&mut self, mode: ReadoutMode) {
        self.word = self.layout.readout_mode.merge(self.word, mode.bits());
    }

    pub fn duration_trigger(&self) -> bool {
        self.layout.duration_trigger.extract(self.word) != 0
    }

    pub fn set_duration_trigger(&mut self, enabled: bool) {
        self.word = self
            .layout
            .duration_trigger
            .merge(self.word, enabled as u32);
    }

    pub fn get(&self, id: PseudoRegister) -> Result<u32, Error> {
        Ok(self.layout.field(id)?.extract(self.word))
    }

    pub fn set(&mut self, id: PseudoRegister, value: u32) -> Result<(), Error> {
        let field = self.layout.field(id)?;
        if value > field.maximum() {
            return Err(Error::ValueTooWide {
                id,
                value,
                width: field.width,
                maximum: field.maximum(),
            });
        }
        self.word = field.merge(self.word, value);
        Ok(())
    }
}

/// Exposure trigger source, as written to the trigger-mode pseudo-register.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TriggerMode {
    Internal,
    External,
}

impl TriggerMode {
    pub fn bits(self) -> u32 {
        match self {
            Self::Internal => 0,
            Self::External => 1,
        }
    }
}

/// Readout-speed selection, as written to the readout-speed pseudo-register.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ReadoutSpeed {
    Normal,
    High,
}

impl ReadoutSpeed {
    pub fn bits(self) -> u32 {
        match self {
            Self::Normal => 0,
            Self::High => 1,
        }
    }
}
