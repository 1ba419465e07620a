//! Tiered mapping loader
//!
//! Mapping files are loaded in three tiers, lowest priority first:
//! - built-in generic definitions (top-level files of the definitions directory)
//! - built-in device-specific definitions (`devices/`, recursive)
//! - user definitions (the configured user directory, recursive)
//!
//! Each file is parsed, validated against the mapping schema and resolved.
//! A failing file is recorded in its [`LoadResult`] and skipped; a failing
//! mapping definition is recorded as a warning and its siblings still load.
//! The finished [`MappingSet`] is published with a single swap.

use capmap_core::ChannelCategory;
use capmap_transform::{DerivationRegistry, TransformerRegistry};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::config::LoaderConfig;
use crate::error::{MappingError, MappingResult};
use crate::file::MappingFile;
use crate::resolve::CategoryResolver;
use crate::resolved::{ResolvedMapping, Tier, VirtualPropertyDefinition};
use crate::schema::{yaml_to_json, JsonSchemaValidator, SchemaValidator};
use crate::set::{LoadResult, MappingSet};

/// Generic definitions embedded in the crate
const BUILTIN_GENERIC: &[(&str, &str)] = &[
    ("generic.yaml", include_str!("../definitions/generic.yaml")),
    (
        "virtual-properties.yaml",
        include_str!("../definitions/virtual-properties.yaml"),
    ),
];

/// Device-specific definitions embedded in the crate
const BUILTIN_DEVICES: &[(&str, &str)] = &[
    (
        "devices/ikea.yaml",
        include_str!("../definitions/devices/ikea.yaml"),
    ),
    (
        "devices/tuya.yaml",
        include_str!("../definitions/devices/tuya.yaml"),
    ),
];

/// One document to load
struct Source {
    name: String,
    tier: Tier,
    content: Result<String, String>,
}

/// Registries and rules accumulated while a set is being built
struct Accumulator {
    transformers: TransformerRegistry,
    derivations: DerivationRegistry,
    mappings: Vec<ResolvedMapping>,
    virtual_properties: IndexMap<ChannelCategory, Vec<VirtualPropertyDefinition>>,
    results: Vec<LoadResult>,
}

/// Loads mapping files and publishes the resulting [`MappingSet`]
pub struct MappingLoader {
    config: LoaderConfig,
    validator: Box<dyn SchemaValidator>,
    current: RwLock<Arc<MappingSet>>,
    generation: AtomicU64,
    /// Held from numbering a build until it is published
    publishing: Mutex<()>,
}

impl MappingLoader {
    /// Create an unloaded loader
    ///
    /// Fails when the mapping schema does not compile or a configured
    /// definitions directory does not exist.
    pub fn new(config: LoaderConfig) -> MappingResult<Self> {
        if let Some(dir) = &config.definitions_dir {
            if !dir.is_dir() {
                return Err(MappingError::DirectoryNotFound { path: dir.clone() });
            }
        }

        Ok(Self {
            config,
            validator: Box::new(JsonSchemaValidator::new()?),
            current: RwLock::new(Arc::new(MappingSet::empty())),
            generation: AtomicU64::new(0),
            publishing: Mutex::new(()),
        })
    }

    /// Replace the schema validator
    pub fn with_validator(mut self, validator: impl SchemaValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// The currently published set (generation 0 until the first load)
    pub fn current(&self) -> Arc<MappingSet> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Load every tier and publish the result
    #[instrument(skip(self))]
    pub fn load_all(&self) -> Arc<MappingSet> {
        let _publishing = self.publishing.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let set = Arc::new(self.build(generation));

        let failed = set.load_results().iter().filter(|r| !r.success).count();
        info!(
            generation,
            mappings = set.len(),
            files = set.load_results().len(),
            failed,
            "Published mapping set"
        );

        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::clone(&set);
        set
    }

    /// Rebuild from scratch and swap the published set
    pub fn reload(&self) -> Arc<MappingSet> {
        info!("Reloading mapping definitions");
        self.load_all()
    }

    /// Build a set without publishing it
    pub fn build(&self, generation: u64) -> MappingSet {
        let mut acc = Accumulator {
            transformers: TransformerRegistry::with_builtins(),
            derivations: DerivationRegistry::with_builtins(),
            mappings: Vec::new(),
            virtual_properties: IndexMap::new(),
            results: Vec::new(),
        };

        for source in self.discover(&mut acc.results) {
            let result = self.load_source(&mut acc, &source);
            if result.success {
                info!(
                    source = %result.source,
                    tier = %result.tier,
                    mappings = result.mapping_count,
                    warnings = result.warnings.len(),
                    "Loaded mapping file"
                );
                for warning in &result.warnings {
                    warn!(source = %result.source, "{}", warning);
                }
            } else {
                warn!(
                    source = %result.source,
                    errors = ?result.errors,
                    "Failed to load mapping file"
                );
            }
            acc.results.push(result);
        }

        check_transformer_references(&mut acc);

        MappingSet::new(
            acc.mappings,
            Arc::new(acc.transformers),
            Arc::new(acc.derivations),
            acc.virtual_properties,
            acc.results,
            generation,
        )
    }

    /// Every source in tier order; unreadable directories are recorded as failures
    fn discover(&self, results: &mut Vec<LoadResult>) -> Vec<Source> {
        let mut sources = Vec::new();

        match &self.config.definitions_dir {
            Some(dir) => {
                read_dir_sources(dir, false, Tier::Generic, &mut sources, results);
                let devices = dir.join("devices");
                if devices.is_dir() {
                    read_dir_sources(&devices, true, Tier::DeviceSpecific, &mut sources, results);
                }
            }
            None => {
                sources.extend(embedded(BUILTIN_GENERIC, Tier::Generic));
                sources.extend(embedded(BUILTIN_DEVICES, Tier::DeviceSpecific));
            }
        }

        if let Some(dir) = &self.config.user_mappings_dir {
            if dir.is_dir() {
                read_dir_sources(dir, true, Tier::User, &mut sources, results);
            } else {
                info!(path = %dir.display(), "User mappings directory not found, skipping");
            }
        }

        sources
    }

    fn load_source(&self, acc: &mut Accumulator, source: &Source) -> LoadResult {
        let content = match &source.content {
            Ok(content) => content,
            Err(e) => return LoadResult::failed(&source.name, source.tier, vec![e.clone()]),
        };

        let document: serde_yaml::Value = match serde_yaml::from_str(content) {
            Ok(document) => document,
            Err(e) => {
                let err = MappingError::ParseYaml {
                    source_name: source.name.clone(),
                    source: e,
                };
                return LoadResult::failed(&source.name, source.tier, vec![err.to_string()]);
            }
        };

        let document = yaml_to_json(document);
        if let Err(errors) = self.validator.validate(&document) {
            return LoadResult::failed(&source.name, source.tier, errors);
        }

        let file: MappingFile = match serde_json::from_value(document) {
            Ok(file) => file,
            Err(e) => {
                let err = MappingError::InvalidFile {
                    source_name: source.name.clone(),
                    reason: e.to_string(),
                };
                return LoadResult::failed(&source.name, source.tier, vec![err.to_string()]);
            }
        };

        let mut warnings = acc.transformers.register_all(&file.transformers);
        for (name, named) in file.derivations {
            if let Err(e) = acc.derivations.register(name, named.rule) {
                warnings.push(e.to_string());
            }
        }

        let mut resolver = CategoryResolver::new(self.config.strict_categories, &acc.derivations);
        let mut mapping_count = 0;
        for definition in &file.mappings {
            match resolver.resolve_mapping(definition, source.tier, &source.name) {
                Ok(mapping) => {
                    debug!(
                        mapping = %mapping.name,
                        priority = mapping.priority,
                        "Resolved mapping"
                    );
                    acc.mappings.push(mapping);
                    mapping_count += 1;
                }
                Err(e) => warnings.push(format!("mapping '{}' skipped: {}", definition.name, e)),
            }
            warnings.extend(resolver.take_warnings());
        }

        for (category_name, definitions) in &file.virtual_properties {
            let category = match resolver.channel_category(category_name) {
                Ok(category) => category,
                Err(e) => {
                    warnings.push(format!("virtual properties for '{category_name}' skipped: {e}"));
                    continue;
                }
            };
            for definition in definitions {
                match resolver.resolve_virtual(definition) {
                    Ok(resolved) => acc
                        .virtual_properties
                        .entry(category)
                        .or_default()
                        .push(resolved),
                    Err(e) => warnings.push(e.to_string()),
                }
            }
            warnings.extend(resolver.take_warnings());
        }

        LoadResult {
            source: source.name.clone(),
            tier: source.tier,
            success: true,
            errors: Vec::new(),
            warnings,
            mapping_count,
        }
    }
}

/// Warn about named transformers no file registered
///
/// Such bindings fall back to their inline definition or the identity at
/// conversion time.
fn check_transformer_references(acc: &mut Accumulator) {
    for mapping in &acc.mappings {
        for name in mapping.transformer_names() {
            if acc.transformers.contains(name) {
                continue;
            }
            let warning = format!(
                "mapping '{}' references unknown transformer '{}'",
                mapping.name, name
            );
            warn!(source = %mapping.source, "{}", warning);
            if let Some(result) = acc.results.iter_mut().find(|r| r.source == mapping.source) {
                result.warnings.push(warning);
            }
        }
    }
}

fn embedded(files: &[(&str, &str)], tier: Tier) -> Vec<Source> {
    files
        .iter()
        .map(|(name, content)| Source {
            name: format!("builtin:{name}"),
            tier,
            content: Ok(content.to_string()),
        })
        .collect()
}

fn read_dir_sources(
    dir: &Path,
    recursive: bool,
    tier: Tier,
    sources: &mut Vec<Source>,
    results: &mut Vec<LoadResult>,
) {
    let files = match get_yaml_files(dir, recursive) {
        Ok(files) => files,
        Err(e) => {
            results.push(LoadResult::failed(dir.display().to_string(), tier, vec![e.to_string()]));
            return;
        }
    };

    for path in files {
        let content = fs::read_to_string(&path).map_err(|e| {
            MappingError::ReadFile {
                path: path.clone(),
                source: e,
            }
            .to_string()
        });
        sources.push(Source {
            name: path.display().to_string(),
            tier,
            content,
        });
    }
}

/// YAML files in a directory, sorted by path
///
/// With `recursive`, files of subdirectories are included and the whole
/// list is sorted so discovery order never depends on the file system.
fn get_yaml_files(dir: &Path, recursive: bool) -> MappingResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(MappingError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = fs::read_dir(&current).map_err(|e| MappingError::ReadFile {
            path: current.clone(),
            source: e,
        })?;

        for path in entries.filter_map(|entry| entry.ok()).map(|entry| entry.path()) {
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if path
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false)
            {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_get_yaml_files_sorted_and_recursive() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "b.yaml", "");
        write_file(dir.path(), "a.yml", "");
        write_file(dir.path(), "notes.txt", "");
        write_file(dir.path(), "nested/c.yaml", "");

        let flat = get_yaml_files(dir.path(), false).unwrap();
        assert_eq!(flat, vec![dir.path().join("a.yml"), dir.path().join("b.yaml")]);

        let all = get_yaml_files(dir.path(), true).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2], dir.path().join("nested/c.yaml"));
    }

    #[test]
    fn test_missing_definitions_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        let config = LoaderConfig::default().with_definitions_dir(dir.path().join("missing"));
        assert!(matches!(
            MappingLoader::new(config),
            Err(MappingError::DirectoryNotFound { .. })
        ));
    }

    #[test]
    fn test_embedded_definitions_load_cleanly() {
        let loader = MappingLoader::new(LoaderConfig::default()).unwrap();
        assert_eq!(loader.current().generation(), 0);

        let set = loader.load_all();
        for result in set.load_results() {
            assert!(result.success, "{}: {:?}", result.source, result.errors);
            assert!(result.warnings.is_empty(), "{}: {:?}", result.source, result.warnings);
        }
        assert!(!set.is_empty());
        assert_eq!(set.generation(), 1);
        assert!(!set.virtual_properties(ChannelCategory::Battery).is_empty());
    }

    #[test]
    fn test_concurrent_reloads_publish_in_order() {
        let loader = MappingLoader::new(LoaderConfig::default()).unwrap();

        let mut generations: Vec<u64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| loader.reload().generation()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        generations.sort_unstable();
        assert_eq!(generations, (1..=8).collect::<Vec<_>>());
        assert_eq!(loader.current().generation(), 8);
    }

    #[test]
    fn test_empty_file_fails_schema() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "empty.yaml", "");
        let loader =
            MappingLoader::new(LoaderConfig::default().with_definitions_dir(dir.path())).unwrap();

        let set = loader.load_all();
        assert_eq!(set.load_results().len(), 1);
        assert!(!set.load_results()[0].success);
    }
}
