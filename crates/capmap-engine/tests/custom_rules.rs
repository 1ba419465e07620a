//! Mapping with rules loaded from a definitions directory

use capmap_core::{Expose, PropertyCategory, StateMap};
use capmap_engine::{MappingEngine, PropertyOrigin};
use capmap_mapping::LoaderConfig;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn exposes(value: Value) -> Vec<Expose> {
    serde_json::from_value(value).unwrap()
}

const SWITCH_RULES: &str = r#"version: "1.0"
mappings:
  - name: multi_gang_switch
    match:
      expose_type: switch
    device_category: switcher
    channels:
      - identifier: "switch_{endpoint}"
        category: switch
        features:
          - device_feature: state
            transformer: boolean_on_off
            panel:
              identifier: switch
              data_type: boolean
"#;

const TANK_RULES: &str = r#"version: "1.0"
transformers:
  tenths:
    read: value / 10
    write: value * 10
mappings:
  - name: tank
    match:
      property: tank
    device_category: generic
    channels:
      - identifier: tank
        category: generic
        properties:
          - device_property: tank
            transformer: tenths
            panel:
              identifier: percentage
              data_type: float
        derived_properties:
          - identifier: level
            data_type: enum
            source_property: percentage
            derivation:
              type: threshold
              thresholds:
                - { max: 10, value: empty }
                - { min: 90, value: full }
              default: partial
"#;

fn engine(dir: &Path) -> MappingEngine {
    MappingEngine::new(LoaderConfig::default().with_definitions_dir(dir)).unwrap()
}

fn gang(endpoint: &str) -> Value {
    json!({
        "type": "switch",
        "endpoint": endpoint,
        "features": [
            {"type": "binary", "name": "state", "property": format!("state_{endpoint}"),
             "access": 7, "value_on": "ON", "value_off": "OFF", "endpoint": endpoint}
        ]
    })
}

#[test]
fn test_endpoint_templating_and_aliases() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "switch.yaml", SWITCH_RULES);
    let engine = engine(dir.path());

    let exposes = exposes(json!([gang("l1"), gang("l2")]));
    let channels = engine.map_exposes(&exposes, None);

    let identifiers: Vec<_> = channels.iter().map(|c| c.identifier.as_str()).collect();
    assert_eq!(identifiers, vec!["switch_l1", "switch_l2"]);
    assert_eq!(channels[1].endpoint.as_deref(), Some("l2"));

    // `switch` resolves to the on property of a switcher channel
    let on = channels[1].property(PropertyCategory::On).unwrap();
    assert_eq!(on.device_property, "state_l2");

    assert_eq!(
        engine.transform_read(&exposes, None, "state_l2", &json!("OFF")),
        json!(false)
    );
}

#[test]
fn test_derived_property_evaluated_from_source() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "tank.yaml", TANK_RULES);
    let engine = engine(dir.path());

    let exposes = exposes(json!([
        {"type": "numeric", "name": "tank", "property": "tank", "access": 1}
    ]));

    let mut state = StateMap::new();
    state.insert("tank".into(), json!(950));
    let report = engine.map_device(&exposes, None, &state);

    let channel = &report.channels[0];
    assert_eq!(
        channel.property(PropertyCategory::Percentage).unwrap().value,
        Some(json!(95))
    );
    let level = channel.property(PropertyCategory::Level).unwrap();
    assert_eq!(level.device_property, "__derived_level");
    assert_eq!(level.value, Some(json!("full")));
    assert!(matches!(
        &level.origin,
        PropertyOrigin::Derived { source: PropertyCategory::Percentage, name: None, .. }
    ));

    state.insert("tank".into(), json!(500));
    let report = engine.map_device(&exposes, None, &state);
    let level = report.channels[0].property(PropertyCategory::Level).unwrap();
    assert_eq!(level.value, Some(json!("partial")));
}

#[test]
fn test_reload_picks_up_new_rules() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "switch.yaml", SWITCH_RULES);
    let engine = engine(dir.path());

    let exposes = exposes(json!([
        {"type": "numeric", "name": "tank", "property": "tank", "access": 1}
    ]));
    assert!(engine.map_exposes(&exposes, None).is_empty());
    let before = engine.snapshot();

    write_file(dir.path(), "tank.yaml", TANK_RULES);
    let after = engine.reload();
    assert_eq!(after.generation(), before.generation() + 1);
    assert_eq!(engine.map_exposes(&exposes, None).len(), 1);
    assert_eq!(before.len(), 1);
}
