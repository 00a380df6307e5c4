pub mod adapters;
pub mod channel;
pub mod collaborators;
pub mod control;
pub mod device;
pub mod devices;
pub mod properties;
pub mod registers;
pub mod sequence;

pub use crate::device::Detector;
pub use crate::devices::open;
pub use crate::devices::simulated;
pub use crate::devices::Configuration;
pub use crate::devices::Device;
pub use crate::devices::Error;
pub use crate::devices::Properties;
pub use crate::devices::Type;
pub use crate::sequence::SequenceParameters;
pub use crate::sequence::SequenceType;

pub use bincode;
pub use aviex_types as types;
