use crate::channel;
use crate::collaborators;
use crate::control;
use crate::device::Detector;
use crate::sequence;

/// Frame readout time reported by the simulated area detector, in seconds.
const SIMULATED_READOUT_TIME: f64 = 0.005;

macro_rules! register {
    ($($module:ident),+) => {
        paste::paste! {
            $(
                pub mod $module;
            )+

            #[derive(Debug, Copy, Clone, PartialEq, Eq)]
            pub enum Type {
                $(
                    [<$module:camel>],
                )+
            }

            impl std::fmt::Display for Type {
                fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    match self {
                        $(
                            Self::[<$module:camel>] => write!(formatter, stringify!($module)),
                        )+
                    }
                }
            }

            impl Type {
                pub fn name(self) -> &'static str  {
                    match self {
                        $(
                            Type::[<$module:camel>] => $module::Device::PROPERTIES.name,
                        )+
                    }
                }
            }

            #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
            #[serde(tag = "type", content = "configuration")]
            pub enum Configuration {
                $(
                    #[serde(rename = "" $module)]
                    [<$module:camel>]($module::Configuration),
                )+
            }

            impl Configuration {
                pub fn deserialize_bincode(
                    device_type: Type,
                    data: &[u8]
                ) -> bincode::Result<Configuration> {
                    match device_type {
                        $(
                            Type::[<$module:camel>] => Ok(
                                Configuration::[<$module:camel>](bincode::deserialize(data)?)
                            ),
                        )+
                    }
                }

                pub fn type_name(&self) -> &'static str {
                    match self {
                        $(
                            Configuration::[<$module:camel>](_) => Type::[<$module:camel>].name(),
                        )+
                    }
                }
            }

            pub enum Device {
                $(
                    [<$module:camel>]($module::Device),
                )+
            }

            /// Opens a detector of the type selected by `configuration` over
            /// the given channel and collaborators.
            pub fn open(
                configuration: Configuration,
                head: Box<dyn channel::DetectorHead + Send>,
                video: Box<dyn collaborators::VideoInput + Send>,
                area_detector: Box<dyn collaborators::AreaDetector + Send>,
            ) -> Result<Device, Error> {
                match configuration {
                    $(
                        Configuration::[<$module:camel>](configuration) => Ok(
                            Device::[<$module:camel>](
                                $module::Device::open(head, video, area_detector, configuration)?
                            )
                        ),
                    )+
                }
            }

            /// Opens a detector of the type selected by `configuration`
            /// against an in-memory simulated head and collaborators sized to
            /// the model's sensor.
            pub fn simulated(configuration: Configuration) -> Result<Device, Error> {
                match configuration {
                    $(
                        Configuration::[<$module:camel>](configuration) => {
                            let properties = &$module::Device::PROPERTIES;
                            Ok(Device::[<$module:camel>]($module::Device::open(
                                Box::new(channel::Simulator::default()),
                                Box::new(collaborators::SimulatedVideoInput::new(
                                    properties.width,
                                    properties.height,
                                )),
                                Box::new(collaborators::SimulatedAreaDetector::new(
                                    SIMULATED_READOUT_TIME,
                                )),
                                configuration,
                            )?))
                        }
                    )+
                }
            }

            #[derive(Debug, serde::Serialize)]
            pub enum Properties {
                $(
                    #[serde(rename = "" $module)]
                    [<$module:camel>](<$module::Device as Detector>::Properties),
                )+
            }

            impl Device {
                pub fn properties(&self) -> Properties {
                    match self {
                        $(
                            Self::[<$module:camel>](_) => Properties::[<$module:camel>]($module::Device::PROPERTIES),
                        )+
                    }
                }

                pub fn name(&self) -> &'static str {
                    match self {
                        $(
                            Self::[<$module:camel>](_) => $module::Device::PROPERTIES.name,
                        )+
                    }
                }

                pub fn geometry(&self) -> &aviex_types::DetectorGeometry {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => device.geometry(),
                        )+
                    }
                }

                pub fn configure_for_sequence(
                    &mut self,
                    parameters: &sequence::SequenceParameters,
                ) -> Result<(), Error> {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => Ok(device.configure_for_sequence(parameters)?),
                        )+
                    }
                }

                pub fn descramble(
                    &self,
                    raw: &aviex_types::RawFrame,
                ) -> Result<aviex_types::ImageFrame, Error> {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => Ok(device.descramble(raw)?),
                        )+
                    }
                }

                pub fn read_register(&mut self, address: u32) -> Result<u32, Error> {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => Ok(device.read_register(address)?),
                        )+
                    }
                }

                pub fn write_register(&mut self, address: u32, value: u32) -> Result<(), Error> {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => Ok(device.write_register(address, value)?),
                        )+
                    }
                }

                pub fn get_pseudo_register(
                    &mut self,
                    id: control::PseudoRegister,
                ) -> Result<u32, Error> {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => Ok(device.get_pseudo_register(id)?),
                        )+
                    }
                }

                pub fn set_pseudo_register(
                    &mut self,
                    id: control::PseudoRegister,
                    value: u32,
                ) -> Result<(), Error> {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => Ok(device.set_pseudo_register(id, value)?),
                        )+
                    }
                }
            }

            #[derive(Debug, PartialEq, Eq)]
            pub struct ParseTypeError {
                on: String
            }

            impl std::fmt::Display for ParseTypeError {
                fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write!(formatter, "unknown device type \"{}\"", self.on)
                }
            }

            impl std::str::FromStr for Type {
                type Err = ParseTypeError;

                fn from_str(string: &str) -> Result<Self, Self::Err> {
                    match string {
                        $(
                            stringify!($module) => paste::paste! {Ok(Self::[<$module:camel>])},
                        )+
                        _ => Err(Self::Err {on: string.to_owned()}),
                    }
                }
            }

            #[derive(thiserror::Error, Debug, Clone)]
            pub enum Error {
                $(
                    #[error(transparent)]
                    [<$module:camel>](#[from] $module::Error),
                )+
            }
        }
    };
}

register! { pccd_170170, pccd_4824, pccd_16080 }
