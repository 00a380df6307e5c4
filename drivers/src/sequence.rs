//! Sequence configuration: converts physical timing requests into validated
//! register writes across the detector readout modes.
//!
//! Every derived value is validated before the first register write, so a
//! rejected sequence leaves the detector head exactly as it was.

use crate::channel;
use crate::collaborators;
use crate::control;
use crate::registers;

pub const MINIMUM_GAP_STEPS: i64 = 1;
pub const MAXIMUM_GAP_STEPS: i64 = 65535;
pub const MINIMUM_STREAK_LINES: i64 = 2;

/// Converts a time in seconds to exposure/gap register steps, rounding down.
///
/// For `step_size > 0` and `time >= 0` the result satisfies
/// `steps * step_size <= time < (steps + 1) * step_size`.
pub fn time_to_steps(time: f64, step_size: f64) -> i64 {
    (time / step_size).floor() as i64
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SequenceType {
    OneShot,
    Continuous,
    Multiframe,
    CircularMultiframe,
    Strobe,
    Bulb,
    Geometrical,
    StreakCamera,
    SubImage,
}

impl std::fmt::Display for SequenceType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::OneShot => "one-shot",
            Self::Continuous => "continuous",
            Self::Multiframe => "multiframe",
            Self::CircularMultiframe => "circular-multiframe",
            Self::Strobe => "strobe",
            Self::Bulb => "bulb",
            Self::Geometrical => "geometrical",
            Self::StreakCamera => "streak-camera",
            Self::SubImage => "sub-image",
        })
    }
}

/// One acquisition-sequence request; all times are in seconds.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SequenceParameters {
    OneShot {
        exposure_time: f64,
    },
    Continuous {
        exposure_time: f64,
    },
    Multiframe {
        num_frames: u64,
        exposure_time: f64,
        frame_time: f64,
    },
    CircularMultiframe {
        num_frames: u64,
        exposure_time: f64,
        frame_time: f64,
    },
    Strobe {
        num_frames: u64,
        exposure_time: f64,
    },
    Bulb {
        num_frames: u64,
    },
    Geometrical {
        num_frames: u64,
        exposure_time: f64,
        frame_time: f64,
        exposure_multiplier: f64,
        gap_multiplier: f64,
    },
    StreakCamera {
        num_lines: f64,
        exposure_time_per_line: f64,
        total_time_per_line: f64,
    },
    SubImage {
        lines_per_subimage: f64,
        subimages_per_frame: f64,
        exposure_time: f64,
        subimage_time: f64,
    },
}

impl SequenceParameters {
    pub fn deserialize_bincode(data: &[u8]) -> bincode::Result<SequenceParameters> {
        bincode::deserialize(data)
    }

    pub fn sequence_type(&self) -> SequenceType {
        match self {
            Self::OneShot { .. } => SequenceType::OneShot,
            Self::Continuous { .. } => SequenceType::Continuous,
            Self::Multiframe { .. } => SequenceType::Multiframe,
            Self::CircularMultiframe { .. } => SequenceType::CircularMultiframe,
            Self::Strobe { .. } => SequenceType::Strobe,
            Self::Bulb { .. } => SequenceType::Bulb,
            Self::Geometrical { .. } => SequenceType::Geometrical,
            Self::StreakCamera { .. } => SequenceType::StreakCamera,
            Self::SubImage { .. } => SequenceType::SubImage,
        }
    }
}

/// Coarse classification of configuration failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    IllegalArgument,
    WouldExceedLimit,
    Unsupported,
    Device,
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("{detector} cannot run a {sequence_type} sequence")]
    Unsupported {
        detector: &'static str,
        sequence_type: SequenceType,
    },

    #[error(
        "{detector}: {num_frames} frames requested for a {sequence_type} sequence, at most {maximum} are possible"
    )]
    TooManyFrames {
        detector: &'static str,
        sequence_type: SequenceType,
        num_frames: u64,
        maximum: u64,
    },

    #[error(
        "{detector}: {lines_per_subimage} lines x {subimages_per_frame} sub-images = {total_lines} lines, the hardware maximum is {maximum}"
    )]
    TooManySubimageLines {
        detector: &'static str,
        lines_per_subimage: f64,
        subimages_per_frame: f64,
        total_lines: i64,
        maximum: i64,
    },

    #[error(
        "{detector}: frame time {frame_time} s leaves a negative gap of {gap_time} s (exposure {exposure_time} s, readout {readout_time} s)"
    )]
    NegativeGapTime {
        detector: &'static str,
        frame_time: f64,
        exposure_time: f64,
        readout_time: f64,
        gap_time: f64,
    },

    #[error(
        "{detector}: gap time {gap_time} s is {gap_steps} steps, outside the allowed range [{minimum}, {maximum}]"
    )]
    GapStepsOutOfRange {
        detector: &'static str,
        gap_time: f64,
        gap_steps: i64,
        minimum: i64,
        maximum: i64,
    },

    #[error(
        "{detector}: exposure time {exposure_time} s is {exposure_steps} steps, outside the allowed range [0, {maximum}]"
    )]
    ExposureStepsOutOfRange {
        detector: &'static str,
        exposure_time: f64,
        exposure_steps: i64,
        maximum: i64,
    },

    #[error(
        "{detector}: {requested} streak-camera lines round to {num_lines}, outside the allowed range [{minimum}, {maximum}]"
    )]
    StreakLinesOutOfRange {
        detector: &'static str,
        requested: f64,
        num_lines: i64,
        minimum: i64,
        maximum: i64,
    },

    #[error(
        "{detector}: multiplier {multiplier} encodes to {encoded}, outside the allowed range [0, {maximum}]"
    )]
    MultiplierOutOfRange {
        detector: &'static str,
        multiplier: f64,
        encoded: i64,
        maximum: i64,
    },

    #[error(transparent)]
    Register(#[from] registers::Error),

    #[error(transparent)]
    Control(#[from] control::Error),

    #[error(transparent)]
    Collaborator(#[from] collaborators::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::TooManyFrames { .. } | Self::TooManySubimageLines { .. } => {
                ErrorKind::WouldExceedLimit
            }
            Self::NegativeGapTime { .. }
            | Self::GapStepsOutOfRange { .. }
            | Self::ExposureStepsOutOfRange { .. }
            | Self::StreakLinesOutOfRange { .. }
            | Self::MultiplierOutOfRange { .. } => ErrorKind::IllegalArgument,
            Self::Register(_) | Self::Control(_) | Self::Collaborator(_) => ErrorKind::Device,
        }
    }
}

/// Addresses of the registers the sequence configurator programs.
#[derive(Debug, Copy, Clone)]
pub struct SequenceRegisters {
    pub control: u32,
    pub frames_per_sequence: u32,
    pub exposure_time: u32,
    pub gap_time: u32,
    pub subframe_size: u32,
    pub subimages_per_read: u32,
    pub streak_mode_lines: Option<u32>,
    pub exposure_multiplier: Option<u32>,
    pub gap_multiplier: Option<u32>,
}

/// Video framesize and binning saved before entering streak-camera mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SavedGeometry {
    pub framesize: (i64, i64),
    pub binsize: (i64, i64),
}

/// Everything a validated sequence request will change, in commit order.
#[derive(Debug, Default)]
struct Plan {
    leave_streak: bool,
    save_geometry: Option<SavedGeometry>,
    writes: Vec<(u32, u32)>,
    video_framesize: Option<(i64, i64)>,
    control: Option<u32>,
}

/// State machine mapping acquisition sequences onto register writes.
#[derive(Debug)]
pub struct Configurator {
    detector: &'static str,
    layout: control::ControlLayout,
    registers: SequenceRegisters,
    step_size: f64,
    maximum_streak_lines: Option<i64>,
    maximum_subimage_lines: i64,
    saved_geometry: Option<SavedGeometry>,
}

impl Configurator {
    pub fn new(
        layout: control::ControlLayout,
        registers: SequenceRegisters,
        step_size: f64,
        maximum_streak_lines: Option<i64>,
        maximum_subimage_lines: i64,
    ) -> Self {
        Self {
            detector: layout.detector,
            layout,
            registers,
            step_size,
            maximum_streak_lines,
            maximum_subimage_lines,
            saved_geometry: None,
        }
    }

    pub fn saved_geometry(&self) -> Option<SavedGeometry> {
        self.saved_geometry
    }

    pub fn configure(
        &mut self,
        parameters: &SequenceParameters,
        file: &mut registers::RegisterFile,
        head: &mut dyn channel::DetectorHead,
        video: &mut dyn collaborators::VideoInput,
        area_detector: &mut dyn collaborators::AreaDetector,
    ) -> Result<(), Error> {
        let control_address = self.registers.control;
        let old_word = file.read(control_address, head)?;
        let mut control = control::ControlRegister::new(old_word, self.layout);
        let old_mode = control.readout_mode()?;
        control.set_duration_trigger(matches!(parameters, SequenceParameters::Bulb { .. }));

        let mut plan = Plan::default();
        match *parameters {
            SequenceParameters::OneShot { exposure_time } => self.plan_frame_based(
                FrameBased {
                    sequence_type: SequenceType::OneShot,
                    num_frames: 1,
                    exposure_time: Some(exposure_time),
                    frame_time: None,
                    fixed_gap_steps: None,
                    multipliers: None,
                },
                old_mode,
                &mut control,
                &mut plan,
                file,
                area_detector,
            )?,
            SequenceParameters::Continuous { exposure_time } => self.plan_frame_based(
                FrameBased {
                    sequence_type: SequenceType::Continuous,
                    num_frames: 1,
                    exposure_time: Some(exposure_time),
                    frame_time: None,
                    fixed_gap_steps: Some(1),
                    multipliers: None,
                },
                old_mode,
                &mut control,
                &mut plan,
                file,
                area_detector,
            )?,
            SequenceParameters::Multiframe {
                num_frames,
                exposure_time,
                frame_time,
            } => self.plan_frame_based(
                FrameBased {
                    sequence_type: SequenceType::Multiframe,
                    num_frames,
                    exposure_time: Some(exposure_time),
                    frame_time: Some(frame_time),
                    fixed_gap_steps: None,
                    multipliers: None,
                },
                old_mode,
                &mut control,
                &mut plan,
                file,
                area_detector,
            )?,
            SequenceParameters::CircularMultiframe {
                num_frames,
                exposure_time,
                frame_time,
            } => self.plan_frame_based(
                FrameBased {
                    sequence_type: SequenceType::CircularMultiframe,
                    num_frames,
                    exposure_time: Some(exposure_time),
                    frame_time: Some(frame_time),
                    fixed_gap_steps: None,
                    multipliers: None,
                },
                old_mode,
                &mut control,
                &mut plan,
                file,
                area_detector,
            )?,
            SequenceParameters::Strobe {
                num_frames,
                exposure_time,
            } => self.plan_frame_based(
                FrameBased {
                    sequence_type: SequenceType::Strobe,
                    num_frames,
                    exposure_time: Some(exposure_time),
                    frame_time: None,
                    fixed_gap_steps: None,
                    multipliers: None,
                },
                old_mode,
                &mut control,
                &mut plan,
                file,
                area_detector,
            )?,
            SequenceParameters::Bulb { num_frames } => self.plan_frame_based(
                FrameBased {
                    sequence_type: SequenceType::Bulb,
                    num_frames,
                    exposure_time: None,
                    frame_time: None,
                    fixed_gap_steps: None,
                    multipliers: None,
                },
                old_mode,
                &mut control,
                &mut plan,
                file,
                area_detector,
            )?,
            SequenceParameters::Geometrical {
                num_frames,
                exposure_time,
                frame_time,
                exposure_multiplier,
                gap_multiplier,
            } => self.plan_frame_based(
                FrameBased {
                    sequence_type: SequenceType::Geometrical,
                    num_frames,
                    exposure_time: Some(exposure_time),
                    frame_time: Some(frame_time),
                    fixed_gap_steps: None,
                    multipliers: Some((exposure_multiplier, gap_multiplier)),
                },
                old_mode,
                &mut control,
                &mut plan,
                file,
                area_detector,
            )?,
            SequenceParameters::StreakCamera {
                num_lines,
                exposure_time_per_line,
                total_time_per_line,
            } => self.plan_streak(
                num_lines,
                exposure_time_per_line,
                total_time_per_line,
                old_mode,
                &mut control,
                &mut plan,
                file,
                video,
                area_detector,
            )?,
            SequenceParameters::SubImage {
                lines_per_subimage,
                subimages_per_frame,
                exposure_time,
                subimage_time,
            } => self.plan_subimage(
                lines_per_subimage,
                subimages_per_frame,
                exposure_time,
                subimage_time,
                old_mode,
                &mut control,
                &mut plan,
                file,
            )?,
        }

        // Validate the whole plan before the first write.
        for &(address, value) in &plan.writes {
            file.validate(address, value)?;
        }
        if control.word() != old_word {
            file.validate(control_address, control.word())?;
            plan.control = Some(control.word());
        }

        self.commit(plan, file, head, video, area_detector)
    }

    fn commit(
        &mut self,
        plan: Plan,
        file: &mut registers::RegisterFile,
        head: &mut dyn channel::DetectorHead,
        video: &mut dyn collaborators::VideoInput,
        area_detector: &mut dyn collaborators::AreaDetector,
    ) -> Result<(), Error> {
        if plan.leave_streak {
            match self.saved_geometry.take() {
                Some(saved) => {
                    log::debug!(
                        "{}: restoring framesize {:?} and binsize {:?} saved before streak-camera mode",
                        self.detector,
                        saved.framesize,
                        saved.binsize
                    );
                    video.set_framesize(saved.framesize.0, saved.framesize.1)?;
                    area_detector.set_binsize(saved.binsize.0, saved.binsize.1)?;
                }
                None => log::warn!(
                    "{}: leaving streak-camera mode with no saved geometry to restore",
                    self.detector
                ),
            }
        }
        if let Some(saved) = plan.save_geometry {
            log::debug!(
                "{}: saving framesize {:?} and binsize {:?} before entering streak-camera mode",
                self.detector,
                saved.framesize,
                saved.binsize
            );
            self.saved_geometry = Some(saved);
        }
        for (address, value) in plan.writes {
            file.write(address, value, head)?;
        }
        if let Some((horizontal, vertical)) = plan.video_framesize {
            video.set_framesize(horizontal, vertical)?;
        }
        if let Some(word) = plan.control {
            file.write(self.registers.control, word, head)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_frame_based(
        &self,
        request: FrameBased,
        old_mode: control::ReadoutMode,
        control: &mut control::ControlRegister,
        plan: &mut Plan,
        file: &registers::RegisterFile,
        area_detector: &dyn collaborators::AreaDetector,
    ) -> Result<(), Error> {
        if old_mode != control::ReadoutMode::FullFrame {
            plan.leave_streak = old_mode == control::ReadoutMode::StreakCamera;
            control.set_readout_mode(control::ReadoutMode::FullFrame);
        }

        // A bulb sequence exposes for as long as the external trigger is
        // asserted; the detector head can only do that for a single frame.
        if request.sequence_type == SequenceType::Bulb && request.num_frames != 1 {
            return Err(Error::TooManyFrames {
                detector: self.detector,
                sequence_type: request.sequence_type,
                num_frames: request.num_frames,
                maximum: 1,
            });
        }
        let frames_maximum = file.spec(self.registers.frames_per_sequence)?.maximum as u64;
        if request.num_frames > frames_maximum {
            return Err(Error::TooManyFrames {
                detector: self.detector,
                sequence_type: request.sequence_type,
                num_frames: request.num_frames,
                maximum: frames_maximum,
            });
        }

        let exposure_steps = request
            .exposure_time
            .map(|time| self.exposure_steps(time, file))
            .transpose()?;
        let gap_steps = match request.fixed_gap_steps {
            Some(steps) => Some(steps),
            None => match (request.num_frames > 1, request.frame_time) {
                (true, Some(frame_time)) => {
                    let exposure_time = request.exposure_time.unwrap_or(0.0);
                    let readout_time = area_detector.detector_readout_time();
                    let gap_time = frame_time - exposure_time - readout_time;
                    if gap_time < 0.0 {
                        return Err(Error::NegativeGapTime {
                            detector: self.detector,
                            frame_time,
                            exposure_time,
                            readout_time,
                            gap_time,
                        });
                    }
                    Some(self.gap_steps(gap_time)?)
                }
                _ => None,
            },
        };

        plan.writes
            .push((self.registers.frames_per_sequence, request.num_frames as u32));
        if let Some(steps) = exposure_steps {
            plan.writes.push((self.registers.exposure_time, steps as u32));
        }
        if let Some(steps) = gap_steps {
            plan.writes.push((self.registers.gap_time, steps as u32));
        }
        if let Some((exposure_multiplier, gap_multiplier)) = request.multipliers {
            let (exposure_address, gap_address) = match (
                self.registers.exposure_multiplier,
                self.registers.gap_multiplier,
            ) {
                (Some(exposure_address), Some(gap_address)) => (exposure_address, gap_address),
                _ => {
                    return Err(Error::Unsupported {
                        detector: self.detector,
                        sequence_type: request.sequence_type,
                    })
                }
            };
            plan.writes.push((
                exposure_address,
                self.encode_multiplier(exposure_multiplier, file, exposure_address)?,
            ));
            plan.writes.push((
                gap_address,
                self.encode_multiplier(gap_multiplier, file, gap_address)?,
            ));
        }
        log::debug!(
            "{}: {} sequence planned (frames={}, exposure_steps={:?}, gap_steps={:?})",
            self.detector,
            request.sequence_type,
            request.num_frames,
            exposure_steps,
            gap_steps
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_streak(
        &self,
        num_lines: f64,
        exposure_time_per_line: f64,
        total_time_per_line: f64,
        old_mode: control::ReadoutMode,
        control: &mut control::ControlRegister,
        plan: &mut Plan,
        file: &registers::RegisterFile,
        video: &dyn collaborators::VideoInput,
        area_detector: &dyn collaborators::AreaDetector,
    ) -> Result<(), Error> {
        let (maximum, streak_address) = match (
            self.maximum_streak_lines,
            self.registers.streak_mode_lines,
        ) {
            (Some(maximum), Some(address)) => (maximum, address),
            _ => {
                return Err(Error::Unsupported {
                    detector: self.detector,
                    sequence_type: SequenceType::StreakCamera,
                })
            }
        };
        if old_mode != control::ReadoutMode::StreakCamera {
            plan.save_geometry = Some(SavedGeometry {
                framesize: video.framesize(),
                binsize: area_detector.binsize(),
            });
            control.set_readout_mode(control::ReadoutMode::StreakCamera);
        }

        // the video board reads out line pairs, so a single line would plan a
        // zero-height framesize
        let lines = num_lines.floor() as i64;
        if lines < MINIMUM_STREAK_LINES || lines > maximum {
            return Err(Error::StreakLinesOutOfRange {
                detector: self.detector,
                requested: num_lines,
                num_lines: lines,
                minimum: MINIMUM_STREAK_LINES,
                maximum,
            });
        }
        let exposure_steps = self.exposure_steps(exposure_time_per_line, file)?;
        let gap_steps = self.gap_steps(total_time_per_line - exposure_time_per_line)?;

        plan.writes.push((self.registers.frames_per_sequence, 1));
        plan.writes
            .push((self.registers.exposure_time, exposure_steps as u32));
        plan.writes.push((self.registers.gap_time, gap_steps as u32));
        plan.writes.push((streak_address, lines as u32));
        let (horizontal, _) = video.framesize();
        plan.video_framesize = Some((horizontal, lines / 2));
        log::debug!(
            "{}: streak-camera sequence planned (lines={}, exposure_steps={}, gap_steps={})",
            self.detector,
            lines,
            exposure_steps,
            gap_steps
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_subimage(
        &self,
        lines_per_subimage: f64,
        subimages_per_frame: f64,
        exposure_time: f64,
        subimage_time: f64,
        old_mode: control::ReadoutMode,
        control: &mut control::ControlRegister,
        plan: &mut Plan,
        file: &registers::RegisterFile,
    ) -> Result<(), Error> {
        let total_lines = (lines_per_subimage * subimages_per_frame).round() as i64;
        if total_lines > self.maximum_subimage_lines {
            return Err(Error::TooManySubimageLines {
                detector: self.detector,
                lines_per_subimage,
                subimages_per_frame,
                total_lines,
                maximum: self.maximum_subimage_lines,
            });
        }
        if old_mode != control::ReadoutMode::SubImage {
            plan.leave_streak = old_mode == control::ReadoutMode::StreakCamera;
            control.set_readout_mode(control::ReadoutMode::SubImage);
        }

        let exposure_steps = self.exposure_steps(exposure_time, file)?;
        let gap_steps = self.gap_steps(subimage_time - exposure_time)?;
        let subframe_size = (lines_per_subimage / 2.0).floor() as i64;
        let subimages_per_read = subimages_per_frame.floor() as i64;

        plan.writes.push((self.registers.frames_per_sequence, 1));
        plan.writes
            .push((self.registers.exposure_time, exposure_steps as u32));
        plan.writes.push((self.registers.gap_time, gap_steps as u32));
        plan.writes
            .push((self.registers.subframe_size, subframe_size as u32));
        plan.writes
            .push((self.registers.subimages_per_read, subimages_per_read as u32));
        log::debug!(
            "{}: sub-image sequence planned (subframe_size={}, subimages_per_read={}, exposure_steps={}, gap_steps={})",
            self.detector,
            subframe_size,
            subimages_per_read,
            exposure_steps,
            gap_steps
        );
        Ok(())
    }

    fn exposure_steps(&self, exposure_time: f64, file: &registers::RegisterFile) -> Result<i64, Error> {
        let steps = time_to_steps(exposure_time, self.step_size);
        let maximum = file.spec(self.registers.exposure_time)?.maximum as i64;
        if steps < 0 || steps > maximum {
            return Err(Error::ExposureStepsOutOfRange {
                detector: self.detector,
                exposure_time,
                exposure_steps: steps,
                maximum,
            });
        }
        Ok(steps)
    }

    fn gap_steps(&self, gap_time: f64) -> Result<i64, Error> {
        let steps = time_to_steps(gap_time, self.step_size);
        if !(MINIMUM_GAP_STEPS..=MAXIMUM_GAP_STEPS).contains(&steps) {
            return Err(Error::GapStepsOutOfRange {
                detector: self.detector,
                gap_time,
                gap_steps: steps,
                minimum: MINIMUM_GAP_STEPS,
                maximum: MAXIMUM_GAP_STEPS,
            });
        }
        Ok(steps)
    }

    fn encode_multiplier(
        &self,
        multiplier: f64,
        file: &registers::RegisterFile,
        address: u32,
    ) -> Result<u32, Error> {
        let encoded = ((multiplier - 1.0) * 256.0).round() as i64;
        let maximum = file.spec(address)?.maximum as i64;
        if encoded < 0 || encoded > maximum {
            return Err(Error::MultiplierOutOfRange {
                detector: self.detector,
                multiplier,
                encoded,
                maximum,
            });
        }
        Ok(encoded as u32)
    }
}

/// Common shape of every full-frame sequence request.
#[derive(Debug, Copy, Clone)]
struct FrameBased {
    sequence_type: SequenceType,
    num_frames: u64,
    exposure_time: Option<f64>,
    frame_time: Option<f64>,
    fixed_gap_steps: Option<i64>,
    multipliers: Option<(f64, f64)>,
}
