use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Brands kept when no allow-list is configured.
const DEFAULT_ALLOWED_BRANDS: &[&str] = &[
    "Nike",
    "Adidas",
    "Puma",
    "New Balance",
    "Asics",
    "Reebok",
    "Converse",
    "Vans",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowListEntry {
    pub name: String,
    /// Alternate spellings matched like the canonical name (e.g. `"Jordan"` for Nike).
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AllowListFile {
    pub brands: Vec<AllowListEntry>,
}

impl AllowListFile {
    /// Flattens names and aliases into the list the brand filter matches on.
    #[must_use]
    pub fn into_names(self) -> Vec<String> {
        self.brands
            .into_iter()
            .flat_map(|entry| std::iter::once(entry.name).chain(entry.aliases))
            .collect()
    }
}

/// Built-in allow-list.
#[must_use]
pub fn default_allow_list() -> Vec<String> {
    DEFAULT_ALLOWED_BRANDS
        .iter()
        .map(|name| (*name).to_string())
        .collect()
}

/// Load and validate the brand allow-list from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_allow_list_file(path: &Path) -> Result<AllowListFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::BrandsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: AllowListFile = serde_yaml::from_str(&content)?;

    validate_allow_list(&file)?;

    Ok(file)
}

fn validate_allow_list(file: &AllowListFile) -> Result<(), ConfigError> {
    if file.brands.is_empty() {
        return Err(ConfigError::Validation(
            "allow-list must contain at least one brand".to_string(),
        ));
    }

    let mut seen = HashSet::new();

    for entry in &file.brands {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "brand name must be non-empty".to_string(),
            ));
        }

        for alias in &entry.aliases {
            if alias.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "brand '{}' has an empty alias",
                    entry.name
                )));
            }
        }

        if !seen.insert(entry.name.trim().to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate brand name: '{}'",
                entry.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, aliases: &[&str]) -> AllowListEntry {
        AllowListEntry {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    #[test]
    fn default_allow_list_contains_adidas() {
        assert!(default_allow_list().iter().any(|b| b == "Adidas"));
    }

    #[test]
    fn into_names_includes_aliases_after_name() {
        let file = AllowListFile {
            brands: vec![entry("Nike", &["Jordan"]), entry("Asics", &[])],
        };
        assert_eq!(file.into_names(), vec!["Nike", "Jordan", "Asics"]);
    }

    #[test]
    fn validate_rejects_empty_list() {
        let file = AllowListFile { brands: vec![] };
        let err = validate_allow_list(&file).unwrap_err();
        assert!(err.to_string().contains("at least one brand"));
    }

    #[test]
    fn validate_rejects_blank_name() {
        let file = AllowListFile {
            brands: vec![entry("  ", &[])],
        };
        let err = validate_allow_list(&file).unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn validate_rejects_blank_alias() {
        let file = AllowListFile {
            brands: vec![entry("Vans", &[""])],
        };
        let err = validate_allow_list(&file).unwrap_err();
        assert!(err.to_string().contains("empty alias"));
    }

    #[test]
    fn validate_rejects_case_insensitive_duplicates() {
        let file = AllowListFile {
            brands: vec![entry("Puma", &[]), entry("PUMA", &[])],
        };
        let err = validate_allow_list(&file).unwrap_err();
        assert!(err.to_string().contains("duplicate brand name"));
    }

    #[test]
    fn load_allow_list_from_real_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
            .join("brands.yaml");
        assert!(
            path.exists(),
            "brands.yaml missing at {path:?}: required for this test"
        );
        let result = load_allow_list_file(&path);
        assert!(result.is_ok(), "failed to load brands.yaml: {result:?}");
        let names = result.unwrap().into_names();
        assert!(names.iter().any(|n| n == "Adidas"));
    }

    #[test]
    fn load_allow_list_missing_file_is_io_error() {
        let err = load_allow_list_file(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::BrandsFileIo { .. }));
    }
}
