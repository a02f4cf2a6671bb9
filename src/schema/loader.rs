//! Definition loader
//!
//! Reads definition sets from JSON files. A file holds one set (class name to
//! class definition); a directory contributes one set per `*.json` file,
//! taken in file-name order. Unreadable or unparsable sources are fatal.

use std::fs;
use std::path::{Path, PathBuf};

use super::errors::{DefinitionError, DefinitionResult};
use super::registry::Registry;
use super::types::DefinitionSet;
use crate::observability::{log_event_with_fields, Event};

/// Accumulates definition sets before compilation.
#[derive(Debug, Default)]
pub struct DefinitionLoader {
    sets: Vec<DefinitionSet>,
}

impl DefinitionLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a definition file, or every `*.json` file in a directory.
    ///
    /// Returns the number of sets added.
    pub fn load_path(&mut self, path: &Path) -> DefinitionResult<usize> {
        let metadata = fs::metadata(path).map_err(|e| {
            DefinitionError::malformed(path.display().to_string(), format!("Failed to stat path: {}", e))
        })?;

        if !metadata.is_dir() {
            self.load_file(path)?;
            return Ok(1);
        }

        let entries = fs::read_dir(path).map_err(|e| {
            DefinitionError::malformed(
                path.display().to_string(),
                format!("Failed to read definition directory: {}", e),
            )
        })?;

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                DefinitionError::malformed(
                    path.display().to_string(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let file = entry.path();
            if file.is_file() && file.extension().map_or(false, |ext| ext == "json") {
                files.push(file);
            }
        }
        files.sort();

        for file in &files {
            self.load_file(file)?;
        }
        Ok(files.len())
    }

    fn load_file(&mut self, path: &Path) -> DefinitionResult<()> {
        let source = path.display().to_string();

        let content = fs::read_to_string(path)
            .map_err(|e| DefinitionError::malformed(&source, format!("Failed to read file: {}", e)))?;

        let set: DefinitionSet = serde_json::from_str(&content)
            .map_err(|e| DefinitionError::malformed(&source, format!("Invalid definitions: {}", e)))?;

        log_event_with_fields(
            Event::DefinitionsLoaded,
            &[("classes", &set.len().to_string()), ("source", &source)],
        );

        self.sets.push(set);
        Ok(())
    }

    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    pub fn sets(&self) -> impl Iterator<Item = &DefinitionSet> {
        self.sets.iter()
    }

    /// Compile every loaded set into one registry
    pub fn compile(&self) -> DefinitionResult<Registry> {
        Registry::compile(self.sets().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DISEASE: &str = r#"{
        "V": {"isAbstract": true, "properties": [
            {"name": "uuid", "type": "string", "mandatory": true, "nullable": false, "generated": true}
        ]},
        "Disease": {"inherits": ["V"], "expose": ["QUERY", "GET"], "properties": [
            {"name": "name", "type": "string", "mandatory": true, "nullable": false, "cast": "lowercaseNonEmpty"},
            {"name": "source", "type": "link", "linkedClass": "Source"}
        ]}
    }"#;

    const SOURCE: &str = r#"{
        "Source": {"properties": [
            {"name": "name", "type": "string"},
            {"name": "rank", "type": "long", "min": 0}
        ], "indices": [
            {"name": "Source.name", "type": "UNIQUE", "properties": ["name"]}
        ]}
    }"#;

    #[test]
    fn test_load_directory_in_name_order() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b_source.json"), SOURCE).unwrap();
        fs::write(temp_dir.path().join("a_disease.json"), DISEASE).unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let mut loader = DefinitionLoader::new();
        assert_eq!(loader.load_path(temp_dir.path()).unwrap(), 2);
        assert_eq!(loader.set_count(), 2);
        let first = loader.sets().next().unwrap();
        assert!(first.contains_key("Disease"));

        let registry = loader.compile().unwrap();
        assert!(registry.is_descendant_of("Disease", "V"));
        assert!(registry.get("Source").unwrap().property("name").unwrap().is_indexed());
    }

    #[test]
    fn test_load_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("source.json");
        fs::write(&file, SOURCE).unwrap();

        let mut loader = DefinitionLoader::new();
        assert_eq!(loader.load_path(&file).unwrap(), 1);
        assert_eq!(loader.set_count(), 1);
        assert!(loader.sets().all(|set| set.contains_key("Source")));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("broken.json");
        fs::write(&file, "{ not json").unwrap();

        let err = DefinitionLoader::new().load_path(&file).unwrap_err();
        assert_eq!(err.code(), "META_DEFINITION_MALFORMED");
    }

    #[test]
    fn test_unknown_type_tag_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("bad.json");
        fs::write(&file, r#"{"A": {"properties": [{"name": "x", "type": "decimal"}]}}"#).unwrap();

        let err = DefinitionLoader::new().load_path(&file).unwrap_err();
        assert_eq!(err.code(), "META_DEFINITION_MALFORMED");
    }

    #[test]
    fn test_missing_path() {
        let temp_dir = TempDir::new().unwrap();
        let err = DefinitionLoader::new()
            .load_path(&temp_dir.path().join("absent.json"))
            .unwrap_err();
        assert_eq!(err.code(), "META_DEFINITION_MALFORMED");
    }

    #[test]
    fn test_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = DefinitionLoader::new();
        assert_eq!(loader.load_path(temp_dir.path()).unwrap(), 0);
        assert_eq!(loader.set_count(), 0);
    }
}
