//! Canonical category vocabularies
//!
//! Device, channel and property categories, data types and permissions are
//! closed sets. Each one is generated by `category_enum!` so that parsing,
//! display and serde share a single name table.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A name that is not part of a category vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownCategory {
    /// Which vocabulary was consulted (e.g. "channel category")
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}

macro_rules! category_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every member, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical lowercase name
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownCategory;

            /// Parse a name (case-insensitive)
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownCategory {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

category_enum! {
    /// Category of a whole device
    DeviceCategory("device category") {
        Generic => "generic",
        AirConditioner => "air_conditioner",
        AirDehumidifier => "air_dehumidifier",
        AirHumidifier => "air_humidifier",
        AirPurifier => "air_purifier",
        AvReceiver => "av_receiver",
        Alarm => "alarm",
        Camera => "camera",
        Door => "door",
        Doorbell => "doorbell",
        Fan => "fan",
        GameConsole => "game_console",
        HeatingUnit => "heating_unit",
        Lighting => "lighting",
        Lock => "lock",
        Media => "media",
        Outlet => "outlet",
        Projector => "projector",
        Pump => "pump",
        RobotVacuum => "robot_vacuum",
        Sensor => "sensor",
        SetTopBox => "set_top_box",
        Speaker => "speaker",
        Sprinkler => "sprinkler",
        StreamingService => "streaming_service",
        Switcher => "switcher",
        Television => "television",
        Thermostat => "thermostat",
        Valve => "valve",
        WaterHeater => "water_heater",
        WindowCovering => "window_covering",
    }
}

category_enum! {
    /// Category of a channel (a functional group of properties)
    ChannelCategory("channel category") {
        Generic => "generic",
        AirParticulate => "air_particulate",
        AirQuality => "air_quality",
        Alarm => "alarm",
        Battery => "battery",
        Camera => "camera",
        CarbonDioxide => "carbon_dioxide",
        CarbonMonoxide => "carbon_monoxide",
        Contact => "contact",
        Cooler => "cooler",
        Dehumidifier => "dehumidifier",
        DeviceInformation => "device_information",
        Door => "door",
        Doorbell => "doorbell",
        ElectricalEnergy => "electrical_energy",
        ElectricalPower => "electrical_power",
        Fan => "fan",
        Filter => "filter",
        Flow => "flow",
        Gas => "gas",
        Heater => "heater",
        Humidifier => "humidifier",
        Humidity => "humidity",
        Illuminance => "illuminance",
        Leak => "leak",
        Light => "light",
        Lock => "lock",
        MediaInput => "media_input",
        MediaPlayback => "media_playback",
        Microphone => "microphone",
        Motion => "motion",
        NitrogenDioxide => "nitrogen_dioxide",
        Occupancy => "occupancy",
        Outlet => "outlet",
        Ozone => "ozone",
        Pressure => "pressure",
        RobotVacuum => "robot_vacuum",
        Smoke => "smoke",
        Speaker => "speaker",
        SulphurDioxide => "sulphur_dioxide",
        Switcher => "switcher",
        Television => "television",
        Temperature => "temperature",
        Thermostat => "thermostat",
        Valve => "valve",
        VolatileOrganicCompounds => "volatile_organic_compounds",
        WindowCovering => "window_covering",
    }
}

category_enum! {
    /// Canonical property vocabulary
    PropertyCategory("property category") {
        Generic => "generic",
        Active => "active",
        Album => "album",
        Angle => "angle",
        Artist => "artist",
        ArtworkUrl => "artwork_url",
        Aqi => "aqi",
        Balance => "balance",
        Bass => "bass",
        Brightness => "brightness",
        ChangeNeeded => "change_needed",
        ChildLock => "child_lock",
        ColorBlue => "color_blue",
        ColorGreen => "color_green",
        ColorRed => "color_red",
        ColorTemperature => "color_temperature",
        ColorWhite => "color_white",
        Command => "command",
        ConnectionType => "connection_type",
        Consumption => "consumption",
        CoolingThresholdTemperature => "cooling_threshold_temperature",
        Current => "current",
        Density => "density",
        DefrostActive => "defrost_active",
        Detected => "detected",
        Direction => "direction",
        Distance => "distance",
        Duration => "duration",
        Event => "event",
        Fault => "fault",
        FirmwareRevision => "firmware_revision",
        Frequency => "frequency",
        HardwareRevision => "hardware_revision",
        HeatingThresholdTemperature => "heating_threshold_temperature",
        Hue => "hue",
        Humidity => "humidity",
        InUse => "in_use",
        Infrared => "infrared",
        InputSource => "input_source",
        Level => "level",
        LifeRemaining => "life_remaining",
        LinkQuality => "link_quality",
        Locked => "locked",
        Manufacturer => "manufacturer",
        Measured => "measured",
        MediaType => "media_type",
        MistLevel => "mist_level",
        Model => "model",
        Mode => "mode",
        Mute => "mute",
        NaturalBreeze => "natural_breeze",
        Obstruction => "obstruction",
        On => "on",
        OverCurrent => "over_current",
        OverVoltage => "over_voltage",
        OverPower => "over_power",
        Pan => "pan",
        PeakLevel => "peak_level",
        Percentage => "percentage",
        Position => "position",
        Power => "power",
        Rate => "rate",
        Remaining => "remaining",
        Repeat => "repeat",
        Reset => "reset",
        RemoteKey => "remote_key",
        Saturation => "saturation",
        Siren => "siren",
        SerialNumber => "serial_number",
        Shuffle => "shuffle",
        Source => "source",
        State => "state",
        Speed => "speed",
        Status => "status",
        Swing => "swing",
        Tampered => "tampered",
        Temperature => "temperature",
        Tilt => "tilt",
        Timer => "timer",
        Title => "title",
        Treble => "treble",
        Triggered => "triggered",
        Track => "track",
        Type => "type",
        Voltage => "voltage",
        Volume => "volume",
        WarmMist => "warm_mist",
        WaterTankEmpty => "water_tank_empty",
        WaterTankFull => "water_tank_full",
        WaterTankLevel => "water_tank_level",
        Zoom => "zoom",
    }
}

category_enum! {
    /// Canonical data type of a property value
    DataType("data type") {
        Char => "char",
        Uchar => "uchar",
        Short => "short",
        Ushort => "ushort",
        Int => "int",
        Uint => "uint",
        Float => "float",
        Bool => "bool",
        String => "string",
        Enum => "enum",
        Unknown => "unknown",
    }
}

category_enum! {
    /// Access permission on a canonical property
    Permission("permission") {
        ReadOnly => "ro",
        ReadWrite => "rw",
        WriteOnly => "wo",
        EventOnly => "ev",
    }
}

impl DataType {
    /// Whether values of this type are numbers
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Char
                | DataType::Uchar
                | DataType::Short
                | DataType::Ushort
                | DataType::Int
                | DataType::Uint
                | DataType::Float
        )
    }
}

impl Permission {
    /// Whether the property can be read
    pub fn can_read(&self) -> bool {
        matches!(self, Permission::ReadOnly | Permission::ReadWrite)
    }

    /// Whether the property can be written
    pub fn can_write(&self) -> bool {
        matches!(self, Permission::WriteOnly | Permission::ReadWrite)
    }
}

impl ChannelCategory {
    /// Canonical properties every channel of this category must carry
    pub fn required_properties(&self) -> &'static [PropertyCategory] {
        use PropertyCategory as P;
        match self {
            ChannelCategory::Battery => &[P::Percentage, P::Status],
            ChannelCategory::Light => &[P::On],
            ChannelCategory::Switcher | ChannelCategory::Outlet => &[P::On],
            ChannelCategory::Lock => &[P::Locked],
            ChannelCategory::Illuminance => &[P::Density, P::Level],
            ChannelCategory::Temperature => &[P::Temperature],
            ChannelCategory::Humidity => &[P::Humidity],
            ChannelCategory::Pressure => &[P::Measured],
            ChannelCategory::Contact
            | ChannelCategory::Motion
            | ChannelCategory::Occupancy
            | ChannelCategory::Leak
            | ChannelCategory::Smoke
            | ChannelCategory::Gas
            | ChannelCategory::CarbonMonoxide => &[P::Detected],
            ChannelCategory::WindowCovering => &[P::Status, P::Position, P::Type, P::Command],
            ChannelCategory::Thermostat => &[P::Active, P::Mode],
            ChannelCategory::Heater => &[P::On, P::Status, P::Temperature],
            ChannelCategory::Cooler => &[P::On, P::Status, P::Temperature],
            ChannelCategory::Fan => &[P::On],
            ChannelCategory::ElectricalPower => &[P::Power],
            ChannelCategory::ElectricalEnergy => &[P::Consumption],
            ChannelCategory::DeviceInformation => &[P::Manufacturer, P::Model],
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(
            "HEATING_THRESHOLD_TEMPERATURE".parse::<PropertyCategory>(),
            Ok(PropertyCategory::HeatingThresholdTemperature)
        );
        assert_eq!("Light".parse::<ChannelCategory>(), Ok(ChannelCategory::Light));
        assert_eq!("rw".parse::<Permission>(), Ok(Permission::ReadWrite));
    }

    #[test]
    fn test_unknown_name() {
        let err = "flux_capacitor".parse::<ChannelCategory>().unwrap_err();
        assert_eq!(err.kind, "channel category");
        assert_eq!(err.to_string(), "unknown channel category 'flux_capacitor'");
    }

    #[test]
    fn test_serde_uses_canonical_names() {
        let json = serde_json::to_string(&DeviceCategory::WindowCovering).unwrap();
        assert_eq!(json, "\"window_covering\"");

        let parsed: DataType = serde_json::from_str("\"FLOAT\"").unwrap();
        assert_eq!(parsed, DataType::Float);
        assert!(serde_json::from_str::<DataType>("\"decimal\"").is_err());
    }

    #[test]
    fn test_all_names_round_trip() {
        for category in PropertyCategory::ALL {
            assert_eq!(category.as_str().parse::<PropertyCategory>().as_ref(), Ok(category));
        }
    }

    #[test]
    fn test_required_properties() {
        assert!(ChannelCategory::Battery
            .required_properties()
            .contains(&PropertyCategory::Status));
        assert!(ChannelCategory::Generic.required_properties().is_empty());
    }

    #[test]
    fn test_permission_flags() {
        assert!(Permission::ReadWrite.can_read());
        assert!(Permission::ReadWrite.can_write());
        assert!(!Permission::ReadOnly.can_write());
        assert!(!Permission::WriteOnly.can_read());
    }
}
