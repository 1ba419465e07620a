//! capmap
//!
//! Command-line front end for the capability mapping engine: validate rule
//! files, inspect rule selection and map device exposes.

use anyhow::{Context, Result};
use capmap_core::{DeviceInfo, Expose, SpecificKind, StateMap};
use capmap_engine::MappingEngine;
use capmap_mapping::{LoaderConfig, MatchQuery};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Map Zigbee2MQTT exposes to canonical channels and properties.
#[derive(Parser, Debug)]
#[command(name = "capmap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Built-in definitions directory (overrides CAPMAP_DEFINITIONS_PATH).
    #[arg(long, global = true)]
    definitions: Option<PathBuf>,

    /// User mappings directory (overrides CAPMAP_USER_MAPPINGS_PATH).
    #[arg(long, global = true)]
    user_mappings: Option<PathBuf>,

    /// Fall back to generic categories for unknown names.
    #[arg(long, global = true)]
    lenient_categories: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every tier and report per-file results.
    Validate,
    /// List loaded rules in priority order.
    List,
    /// Show which rule an expose would select.
    Match {
        /// Expose type (light, numeric, binary, ...).
        #[arg(long = "type")]
        expose_type: String,
        /// Property key of a flat expose.
        #[arg(long)]
        property: Option<String>,
        /// Feature key of a structured expose; repeatable.
        #[arg(long = "feature")]
        features: Vec<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        manufacturer: Option<String>,
    },
    /// Map a device's exposes and print the report as JSON.
    Map {
        /// Exposes array or device definition with `exposes`.
        exposes: PathBuf,
        /// Current device state as a JSON object.
        #[arg(long)]
        state: Option<PathBuf>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        manufacturer: Option<String>,
    },
    /// Translate one value through its runtime binding.
    Transform {
        exposes: PathBuf,
        /// Device key (read) or canonical identifier (write).
        #[arg(long)]
        property: String,
        /// Value as JSON.
        #[arg(long)]
        value: String,
        /// Canonical to device instead of device to canonical.
        #[arg(long)]
        write: bool,
    },
}

/// Exposes file: a bare array or a device definition
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExposesInput {
    Device {
        exposes: Vec<Expose>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default, alias = "vendor")]
        manufacturer: Option<String>,
    },
    List(Vec<Expose>),
}

impl ExposesInput {
    fn into_parts(self) -> (Vec<Expose>, Option<DeviceInfo>) {
        match self {
            ExposesInput::List(exposes) => (exposes, None),
            ExposesInput::Device {
                exposes,
                model,
                manufacturer,
            } => (exposes, device_info(model, manufacturer)),
        }
    }
}

fn device_info(model: Option<String>, manufacturer: Option<String>) -> Option<DeviceInfo> {
    (model.is_some() || manufacturer.is_some()).then(|| DeviceInfo {
        model,
        manufacturer,
        ..Default::default()
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn load_exposes(path: &Path) -> Result<(Vec<Expose>, Option<DeviceInfo>)> {
    Ok(read_json::<ExposesInput>(path)?.into_parts())
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl Cli {
    fn loader_config(&self) -> LoaderConfig {
        let mut config = LoaderConfig::from_env();
        if let Some(dir) = &self.definitions {
            config = config.with_definitions_dir(dir);
        }
        if let Some(dir) = &self.user_mappings {
            config = config.with_user_mappings_dir(dir);
        }
        if self.lenient_categories {
            config = config.with_strict_categories(false);
        }
        config
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let engine =
        MappingEngine::new(cli.loader_config()).context("failed to create mapping engine")?;
    let set = engine.snapshot();

    match cli.command {
        Command::Validate => {
            for result in set.load_results() {
                let status = if result.success { "ok" } else { "FAILED" };
                println!(
                    "{status:6} {} [{}] {} mapping(s)",
                    result.source, result.tier, result.mapping_count
                );
                for error in &result.errors {
                    println!("       error: {error}");
                }
                for warning in &result.warnings {
                    println!("       warning: {warning}");
                }
            }
            if set.has_failures() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::List => {
            for mapping in set.mappings() {
                println!(
                    "{:>5}  {:<40} {:<16} {}",
                    mapping.priority, mapping.name, mapping.tier.as_str(), mapping.source
                );
            }
        }
        Command::Match {
            expose_type,
            property,
            features,
            model,
            manufacturer,
        } => {
            let info = device_info(model, manufacturer);
            let feature_refs: Vec<&str> = features.iter().map(String::as_str).collect();
            let device_properties: Vec<&str> = property.as_deref().into_iter().collect();
            let structured = expose_type.parse::<SpecificKind>().is_ok();

            let query = MatchQuery::new(&expose_type)
                .with_property(property.as_deref())
                .with_features(structured.then_some(feature_refs.as_slice()))
                .with_device_properties(&device_properties)
                .with_device_info(info.as_ref());
            match set.find_matching_mapping(&query) {
                Some(mapping) => println!(
                    "{} (priority {}, {})",
                    mapping.name, mapping.priority, mapping.tier
                ),
                None => {
                    println!("no matching mapping");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::Map {
            exposes,
            state,
            model,
            manufacturer,
        } => {
            let (exposes, file_info) = load_exposes(&exposes)?;
            let info = device_info(model, manufacturer).or(file_info);
            let state: StateMap = match state {
                Some(path) => read_json(&path)?,
                None => StateMap::new(),
            };
            let report = engine.map_device(&exposes, info.as_ref(), &state);
            info!(
                channels = report.channels.len(),
                warnings = report.warnings.len(),
                "Mapped device"
            );
            print_json(&report)?;
        }
        Command::Transform {
            exposes,
            property,
            value,
            write,
        } => {
            let (exposes, info) = load_exposes(&exposes)?;
            let value: Value = serde_json::from_str(&value).context("--value must be JSON")?;
            let result = if write {
                engine.transform_write(&exposes, info.as_ref(), &property, &value)
            } else {
                engine.transform_read(&exposes, info.as_ref(), &property, &value)
            };
            print_json(&result)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exposes_input_shapes() {
        let list: ExposesInput = serde_json::from_value(json!([
            {"type": "numeric", "name": "battery", "property": "battery", "access": 1}
        ]))
        .unwrap();
        let (exposes, info) = list.into_parts();
        assert_eq!(exposes.len(), 1);
        assert!(info.is_none());

        let device: ExposesInput = serde_json::from_value(json!({
            "model": "TS0601_thermostat",
            "vendor": "TuYa",
            "exposes": [
                {"type": "binary", "name": "child_lock", "property": "child_lock",
                 "value_on": "LOCK", "value_off": "UNLOCK"}
            ]
        }))
        .unwrap();
        let (exposes, info) = device.into_parts();
        assert_eq!(exposes.len(), 1);
        let info = info.unwrap();
        assert_eq!(info.manufacturer.as_deref(), Some("TuYa"));
    }

    #[test]
    fn test_flags_override_environment() {
        let cli = Cli::parse_from([
            "capmap",
            "--definitions",
            "/tmp/defs",
            "--lenient-categories",
            "list",
        ]);
        let config = cli.loader_config();
        assert_eq!(config.definitions_dir, Some(PathBuf::from("/tmp/defs")));
        assert!(!config.strict_categories);
    }

    #[test]
    fn test_input_without_exposes_is_rejected() {
        assert!(serde_json::from_value::<ExposesInput>(json!({"model": "x"})).is_err());
    }
}
