//! End-to-end mapping against the built-in rules

use capmap_core::{
    ChannelCategory, DeviceCategory, DeviceInfo, Expose, Permission, PropertyCategory, StateMap,
};
use capmap_engine::{MappingEngine, MappingWarning, PropertyOrigin};
use capmap_mapping::{LoaderConfig, PropertyFormat};
use serde_json::{json, Value};

fn engine() -> MappingEngine {
    MappingEngine::new(LoaderConfig::default()).unwrap()
}

fn exposes(value: Value) -> Vec<Expose> {
    serde_json::from_value(value).unwrap()
}

fn state(value: Value) -> StateMap {
    match value {
        Value::Object(map) => map,
        _ => panic!("state must be an object"),
    }
}

fn color_light() -> Vec<Expose> {
    exposes(json!([
        {
            "type": "light",
            "features": [
                {"type": "binary", "name": "state", "property": "state", "access": 7,
                 "value_on": "ON", "value_off": "OFF", "value_toggle": "TOGGLE"},
                {"type": "numeric", "name": "brightness", "property": "brightness", "access": 7,
                 "value_min": 0, "value_max": 254},
                {"type": "numeric", "name": "color_temp", "property": "color_temp", "access": 7,
                 "value_min": 150, "value_max": 500, "unit": "mired"},
                {"type": "composite", "name": "color_hs", "property": "color", "access": 7,
                 "features": [
                    {"type": "numeric", "name": "hue", "property": "hue", "access": 7},
                    {"type": "numeric", "name": "saturation", "property": "saturation", "access": 7}
                ]}
            ]
        },
        {"type": "numeric", "name": "linkquality", "property": "linkquality", "access": 1,
         "value_min": 0, "value_max": 255}
    ]))
}

fn thermostat() -> Vec<Expose> {
    exposes(json!([
        {
            "type": "climate",
            "features": [
                {"type": "enum", "name": "system_mode", "property": "system_mode", "access": 7,
                 "values": ["off", "heat", "auto"]},
                {"type": "enum", "name": "running_state", "property": "running_state", "access": 5,
                 "values": ["idle", "heat"]},
                {"type": "numeric", "name": "occupied_heating_setpoint",
                 "property": "occupied_heating_setpoint", "access": 7,
                 "value_min": 5, "value_max": 30, "unit": "°C"},
                {"type": "numeric", "name": "current_heating_setpoint",
                 "property": "current_heating_setpoint", "access": 7,
                 "value_min": 5, "value_max": 35, "unit": "°C"},
                {"type": "numeric", "name": "local_temperature", "property": "local_temperature",
                 "access": 5, "unit": "°C"}
            ]
        },
        {"type": "binary", "name": "child_lock", "property": "child_lock", "access": 3,
         "value_on": "LOCK", "value_off": "UNLOCK"}
    ]))
}

fn battery_sensor() -> Vec<Expose> {
    exposes(json!([
        {"type": "numeric", "name": "battery", "property": "battery", "access": 1,
         "value_min": 0, "value_max": 100, "unit": "%"},
        {"type": "numeric", "name": "temperature", "property": "temperature", "access": 1,
         "unit": "°C"}
    ]))
}

#[test]
fn test_mapping_is_idempotent() {
    let engine = engine();
    let exposes = color_light();
    let first = engine.map_exposes(&exposes, None);
    let second = engine.map_exposes(&exposes, None);
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[test]
fn test_color_light_channels() {
    let engine = engine();
    let channels = engine.map_exposes(&color_light(), None);

    let light = &channels[0];
    assert_eq!(light.identifier, "light");
    assert_eq!(light.device_category, DeviceCategory::Lighting);
    let identifiers: Vec<_> = light.properties.iter().map(|p| p.identifier.as_str()).collect();
    assert_eq!(
        identifiers,
        vec!["on", "brightness", "color_temperature", "hue", "saturation"]
    );

    // Composite sub-features are keyed off the composite's property
    let hue = light.property(PropertyCategory::Hue).unwrap();
    assert_eq!(hue.device_property, "color");
    assert_eq!(hue.sub_key.as_deref(), Some("hue"));
    assert_eq!(hue.format, Some(PropertyFormat::Range([0.0, 360.0])));

    let kelvin = light.property(PropertyCategory::ColorTemperature).unwrap();
    assert_eq!(kelvin.unit.as_deref(), Some("K"));
    assert_eq!(kelvin.min, Some(2000.0));
    assert_eq!(kelvin.max, Some(6667.0));

    assert_eq!(channels[1].category, ChannelCategory::DeviceInformation);
}

#[test]
fn test_read_write_round_trip() {
    let engine = engine();
    let exposes = color_light();

    let device = engine.transform_write(&exposes, None, "on", &json!(true));
    assert_eq!(device, json!("ON"));
    assert_eq!(engine.transform_read(&exposes, None, "state", &device), json!(true));

    let device = engine.transform_write(&exposes, None, "Brightness", &json!(50));
    assert_eq!(device, json!(127));
    assert_eq!(engine.transform_read(&exposes, None, "brightness", &device), json!(50));

    assert_eq!(
        engine.transform_write(&exposes, None, "saturation", &json!(80)),
        json!({"saturation": 80})
    );

    // Unknown keys pass through
    assert_eq!(engine.transform_read(&exposes, None, "effect", &json!("blink")), json!("blink"));
    assert_eq!(engine.transform_write(&exposes, None, "effect", &json!("blink")), json!("blink"));
}

#[test]
fn test_runtime_binding_access() {
    let engine = engine();
    let bindings = engine.runtime_mappings(&battery_sensor(), None);
    assert!(!bindings.is_empty());
    assert!(bindings.iter().all(|b| b.permissions == vec![Permission::ReadOnly]));

    let bindings = engine.runtime_mappings(&color_light(), None);
    let on = bindings.iter().find(|b| b.identifier == "on").unwrap();
    assert_eq!(on.permissions, vec![Permission::ReadWrite]);
}

#[test]
fn test_heating_setpoint_first_feature_wins() {
    let engine = engine();
    let channels = engine.map_exposes(&thermostat(), None);

    let thermostat = channels.iter().find(|c| c.identifier == "thermostat").unwrap();
    let heating: Vec<_> = thermostat
        .properties
        .iter()
        .filter(|p| p.category == PropertyCategory::HeatingThresholdTemperature)
        .collect();
    assert_eq!(heating.len(), 1);
    assert_eq!(heating[0].device_property, "occupied_heating_setpoint");
    assert_eq!(heating[0].format, Some(PropertyFormat::Range([5.0, 30.0])));

    let mode = thermostat.property(PropertyCategory::Mode).unwrap();
    assert_eq!(
        mode.format,
        Some(PropertyFormat::Values(vec![json!("off"), json!("heat"), json!("auto")]))
    );

    let active = thermostat.property(PropertyCategory::Active).unwrap();
    assert_eq!(active.permissions, vec![Permission::ReadOnly]);

    assert!(channels.iter().any(|c| c.category == ChannelCategory::Temperature));
}

#[test]
fn test_device_specific_rule_and_merge() {
    let engine = engine();
    let info = DeviceInfo::new("TS0601_thermostat", "TuYa");
    let channels = engine.map_exposes(&thermostat(), Some(&info));

    let thermostat = channels.iter().find(|c| c.identifier == "thermostat").unwrap();
    let heating = thermostat.property(PropertyCategory::HeatingThresholdTemperature).unwrap();
    assert_eq!(heating.device_property, "current_heating_setpoint");

    // The flat child lock expose joins the thermostat channel
    let lock = thermostat.property(PropertyCategory::ChildLock).unwrap();
    assert_eq!(lock.permissions, vec![Permission::ReadWrite]);
}

#[test]
fn test_battery_status_supplied_from_state() {
    let engine = engine();
    let exposes = battery_sensor();

    let state = state(json!({"battery": 15, "temperature": 21.44}));
    let report = engine.map_device(&exposes, None, &state);
    assert_eq!(report.device_category, Some(DeviceCategory::Sensor));

    let battery = report.channels.iter().find(|c| c.identifier == "battery").unwrap();
    assert_eq!(
        battery.property(PropertyCategory::Percentage).unwrap().value,
        Some(json!(15))
    );
    let status = battery.property(PropertyCategory::Status).unwrap();
    assert_eq!(status.value, Some(json!("low")));
    assert_eq!(status.device_property, "__virtual_status");
    assert!(matches!(status.origin, PropertyOrigin::Virtual { .. }));

    let temperature = report.channels.iter().find(|c| c.identifier == "temperature").unwrap();
    assert_eq!(
        temperature.property(PropertyCategory::Temperature).unwrap().value,
        Some(json!(21.4))
    );

    let report = engine.map_device(&exposes, None, &crate::state(json!({"battery": 85})));
    let battery = report.channels.iter().find(|c| c.identifier == "battery").unwrap();
    assert_eq!(battery.property(PropertyCategory::Status).unwrap().value, Some(json!("ok")));

    let report = engine.map_device(&exposes, None, &StateMap::new());
    let battery = report.channels.iter().find(|c| c.identifier == "battery").unwrap();
    assert_eq!(battery.property(PropertyCategory::Status).unwrap().value, Some(json!("ok")));
    assert!(report.warnings.is_empty());
}

#[test]
fn test_battery_low_expose_beats_virtual_status() {
    let engine = engine();
    let mut exposes = battery_sensor();
    exposes.extend(self::exposes(json!([
        {"type": "binary", "name": "battery_low", "property": "battery_low", "access": 1,
         "value_on": true, "value_off": false}
    ])));

    let state = state(json!({"battery": 85, "battery_low": true}));
    let report = engine.map_device(&exposes, None, &state);
    let battery = report.channels.iter().find(|c| c.identifier == "battery").unwrap();
    let status = battery.property(PropertyCategory::Status).unwrap();
    assert_eq!(status.device_property, "battery_low");
    assert_eq!(status.value, Some(json!("low")));
}

#[test]
fn test_cover_gets_virtual_type() {
    let engine = engine();
    let exposes = exposes(json!([
        {
            "type": "cover",
            "features": [
                {"type": "enum", "name": "state", "property": "state", "access": 7,
                 "values": ["OPEN", "CLOSE", "STOP"]},
                {"type": "numeric", "name": "position", "property": "position", "access": 7,
                 "value_min": 0, "value_max": 100}
            ]
        }
    ]));

    let state = state(json!({"state": "OPEN", "position": 100}));
    let report = engine.map_device(&exposes, None, &state);
    let cover = &report.channels[0];
    assert_eq!(cover.category, ChannelCategory::WindowCovering);

    let status = cover.property(PropertyCategory::Status).unwrap();
    assert_eq!(status.value, Some(json!("opened")));
    assert_eq!(
        status.format,
        Some(PropertyFormat::Values(vec![json!("opened"), json!("closed"), json!("stopped")]))
    );

    let command = cover.property(PropertyCategory::Command).unwrap();
    assert_eq!(command.permissions, vec![Permission::WriteOnly]);
    assert!(!command.queryable);

    let kind = cover.property(PropertyCategory::Type).unwrap();
    assert_eq!(kind.value, Some(json!("curtain")));
    assert!(report.warnings.is_empty());

    assert_eq!(
        engine.transform_write(&exposes, None, "command", &json!("close")),
        json!("CLOSE")
    );
}

#[test]
fn test_static_property_from_device_rule() {
    let engine = engine();
    let exposes = exposes(json!([
        {
            "type": "cover",
            "features": [
                {"type": "enum", "name": "state", "property": "state", "access": 7,
                 "values": ["OPEN", "CLOSE", "STOP"]},
                {"type": "numeric", "name": "position", "property": "position", "access": 7,
                 "value_min": 0, "value_max": 100}
            ]
        }
    ]));
    let info = DeviceInfo::new("E1757", "IKEA of Sweden");

    let channels = engine.map_exposes(&exposes, Some(&info));
    let kind = channels[0].property(PropertyCategory::Type).unwrap();
    assert_eq!(kind.device_property, "__static_type");
    assert_eq!(kind.value, Some(json!("roller")));
    assert_eq!(kind.permissions, vec![Permission::ReadOnly]);
}

#[test]
fn test_unmapped_expose_produces_nothing() {
    let engine = engine();
    let exposes = exposes(json!([
        {"type": "numeric", "name": "unknown_custom_prop", "property": "unknown_custom_prop",
         "access": 1}
    ]));

    assert!(engine.map_exposes(&exposes, None).is_empty());
    let report = engine.map_device(&exposes, None, &StateMap::new());
    assert!(report.channels.is_empty());
    assert!(report.device_category.is_none());
    assert!(report.warnings.is_empty());
}

#[test]
fn test_missing_required_property_is_reported() {
    let engine = engine();
    let exposes = exposes(json!([
        {"type": "numeric", "name": "linkquality", "property": "linkquality", "access": 1}
    ]));

    let report = engine.map_device(&exposes, None, &StateMap::new());
    let missing: Vec<_> = report
        .warnings
        .iter()
        .filter_map(|w| match w {
            MappingWarning::MissingRequiredProperty { property, .. } => Some(*property),
            _ => None,
        })
        .collect();
    assert_eq!(missing, vec![PropertyCategory::Manufacturer, PropertyCategory::Model]);
}
