//! Expose to canonical channel conversion
//!
//! Takes the exposes a Zigbee2MQTT device reports and, driven by the loaded
//! mapping rules, produces canonical channels and properties together with
//! runtime bindings for translating live state and commands.

mod config_driven;
mod converter;
mod engine;
mod error;
mod mapper;
mod model;
mod runtime;
mod virtual_props;

pub use config_driven::{ConfigDrivenConverter, CONFIG_DRIVEN_KIND};
pub use converter::{
    describe, merge_channel, ConversionContext, Converter, ConverterRegistry, Handling,
};
pub use engine::MappingEngine;
pub use error::{ConvertError, ConvertResult};
pub use mapper::ExposesMapper;
pub use model::{
    display_name, permissions, resolve_identifier, MappedChannel, MappedProperty, MappingReport,
    MappingWarning, PropertyOrigin,
};
pub use runtime::RuntimeBinding;
pub use virtual_props::{VirtualPropertyResolver, VirtualPropertyValue};
