use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::signals::PageSignals;
use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandProfile {
    pub name: String,
    pub domain: Option<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// On-disk project definition (YAML).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    pub id: String,
    pub brand: BrandProfile,
    pub market: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub competitors: Vec<String>,
    /// JSON array of [`PageSignals`], relative to the project file.
    pub page_signals_path: Option<PathBuf>,
    /// Provider names to query; empty means every available provider.
    #[serde(default)]
    pub models: Vec<String>,
}

/// Everything the pipeline needs to know about one brand project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectContext {
    pub id: String,
    pub brand: BrandProfile,
    pub market: Option<String>,
    pub categories: Vec<String>,
    pub competitors: Vec<String>,
    pub pages: Vec<PageSignals>,
    pub models: Vec<String>,
}

impl ProjectContext {
    #[must_use]
    pub fn brand_name(&self) -> &str {
        &self.brand.name
    }
}

/// Load and validate a project file, reading its page signals if referenced.
///
/// # Errors
///
/// Returns `ConfigError` if either file cannot be read or parsed, or the
/// project fails validation.
pub fn load_project(path: &Path) -> Result<ProjectContext, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: ProjectFile =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::FileParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    validate_project(&file)?;

    let pages = match &file.page_signals_path {
        Some(rel) => {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            load_page_signals(&base.join(rel))?
        }
        None => Vec::new(),
    };

    Ok(ProjectContext {
        id: file.id,
        brand: file.brand,
        market: file.market,
        categories: file.categories,
        competitors: file.competitors,
        pages,
        models: file.models,
    })
}

fn load_page_signals(path: &Path) -> Result<Vec<PageSignals>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::FileParse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn validate_project(file: &ProjectFile) -> Result<(), ConfigError> {
    if file.id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "project id must be non-empty".to_string(),
        ));
    }

    if file.brand.name.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "project '{}' has an empty brand name",
            file.id
        )));
    }

    let brand_lower = file.brand.name.to_lowercase();
    let mut seen = HashSet::new();
    for competitor in &file.competitors {
        let lower = competitor.trim().to_lowercase();
        if lower.is_empty() {
            return Err(ConfigError::Validation(format!(
                "project '{}' lists an empty competitor name",
                file.id
            )));
        }
        if lower == brand_lower {
            return Err(ConfigError::Validation(format!(
                "project '{}' lists its own brand '{}' as a competitor",
                file.id, file.brand.name
            )));
        }
        if !seen.insert(lower) {
            return Err(ConfigError::Validation(format!(
                "project '{}' lists competitor '{competitor}' twice",
                file.id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(competitors: &[&str]) -> ProjectFile {
        ProjectFile {
            id: "acme-drinks".to_string(),
            brand: BrandProfile {
                name: "Acme Sparkling".to_string(),
                domain: Some("acme.example".to_string()),
                attributes: vec!["organic".to_string()],
                keywords: Vec::new(),
            },
            market: Some("United States".to_string()),
            categories: vec!["sparkling water".to_string()],
            competitors: competitors.iter().map(|c| (*c).to_string()).collect(),
            page_signals_path: None,
            models: Vec::new(),
        }
    }

    #[test]
    fn valid_project_passes() {
        assert!(validate_project(&file(&["Fizzco", "Bubbly"])).is_ok());
    }

    #[test]
    fn duplicate_competitor_is_rejected() {
        let err = validate_project(&file(&["Fizzco", "fizzco"])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("twice")));
    }

    #[test]
    fn own_brand_as_competitor_is_rejected() {
        let err = validate_project(&file(&["ACME SPARKLING"])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("own brand")));
    }

    #[test]
    fn empty_brand_name_is_rejected() {
        let mut f = file(&[]);
        f.brand.name = "  ".to_string();
        assert!(validate_project(&f).is_err());
    }

    #[test]
    fn example_project_loads_with_page_signals() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../config/project.example.yaml");
        let project = load_project(&path).unwrap();
        assert_eq!(project.id, "acme-sparkling");
        assert_eq!(project.competitors.len(), 2);
        assert_eq!(project.pages.len(), 2);
        assert!(project.models.is_empty());
    }

    #[test]
    fn project_yaml_parses_with_defaults() {
        let yaml = r"
id: acme
brand:
  name: Acme
";
        let parsed: ProjectFile = serde_yaml::from_str(yaml).unwrap();
        assert!(parsed.competitors.is_empty());
        assert!(parsed.page_signals_path.is_none());
        assert!(parsed.brand.attributes.is_empty());
    }
}
