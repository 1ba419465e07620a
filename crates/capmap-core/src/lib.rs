//! Core types for capability mapping
//!
//! This crate provides the vocabulary shared by every other crate in the
//! workspace: the closed canonical category sets, the tagged device expose
//! model, device identity and state, and a few helpers for loosely typed
//! device values.

mod category;
mod device;
mod expose;
pub mod value;

pub use category::{
    ChannelCategory, DataType, DeviceCategory, Permission, PropertyCategory, UnknownCategory,
};
pub use device::{DeviceInfo, StateMap};
pub use expose::{
    CompositeFeature, Expose, ExposeError, Feature, GenericExpose, GenericValue, RawExpose,
    SpecificExpose, SpecificKind,
};

/// Zigbee access bitmask
pub mod access {
    /// The value is published in the device state
    pub const STATE: u8 = 0b001;

    /// The value can be set
    pub const SET: u8 = 0b010;

    /// The value can be polled
    pub const GET: u8 = 0b100;
}

/// Transfer direction of a binding between a device value and a canonical value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    ReadOnly,
    WriteOnly,
    #[default]
    Bidirectional,
}

impl Direction {
    pub fn can_read(&self) -> bool {
        matches!(self, Direction::ReadOnly | Direction::Bidirectional)
    }

    pub fn can_write(&self) -> bool {
        matches!(self, Direction::WriteOnly | Direction::Bidirectional)
    }
}
