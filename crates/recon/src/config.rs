use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub reconcile: ReconcileOptions,
    #[serde(default)]
    pub normalize: NormalizeConfig,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// File layout. Paths are relative to `data_dir`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Glob for merged full-snapshot files consumed by historical mode.
    #[serde(default = "default_history_pattern")]
    pub history_pattern: String,
    #[serde(default = "default_tracked_list")]
    pub tracked_list: String,
    #[serde(default = "default_panel")]
    pub panel: String,
    #[serde(default = "ListFiles::sdn")]
    pub sdn: ListFiles,
    #[serde(default = "ListFiles::nsdn")]
    pub nsdn: ListFiles,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            history_pattern: default_history_pattern(),
            tracked_list: default_tracked_list(),
            panel: default_panel(),
            sdn: ListFiles::sdn(),
            nsdn: ListFiles::nsdn(),
        }
    }
}

fn default_data_dir() -> String {
    "data".into()
}

fn default_history_pattern() -> String {
    "ofac_full_*.csv".into()
}

fn default_tracked_list() -> String {
    "ofac_list.csv".into()
}

fn default_panel() -> String {
    "ofac_panel.csv".into()
}

/// The four raw tables that make up one list category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListFiles {
    pub main: String,
    pub address: String,
    pub alt: String,
    pub comments: String,
}

impl ListFiles {
    pub fn sdn() -> Self {
        Self {
            main: "sdn.csv".into(),
            address: "add.csv".into(),
            alt: "alt.csv".into(),
            comments: "sdn_comments.csv".into(),
        }
    }

    pub fn nsdn() -> Self {
        Self {
            main: "cons_prim.csv".into(),
            address: "cons_add.csv".into(),
            alt: "cons_alt.csv".into(),
            comments: "cons_comments.csv".into(),
        }
    }

    fn names(&self) -> [&str; 4] {
        [
            self.main.as_str(),
            self.address.as_str(),
            self.alt.as_str(),
            self.comments.as_str(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Reconcile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileOptions {
    /// Apply an empty snapshot even though it removes every open lifecycle.
    #[serde(default)]
    pub allow_empty_snapshot: bool,
}

// ---------------------------------------------------------------------------
// Normalize
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormalizeConfig {
    /// Canonical label -> territory-name variants folded into it.
    #[serde(default = "default_canonical")]
    pub canonical: BTreeMap<String, Vec<String>>,
    /// Country values starting with any of these are administrative placeholders.
    #[serde(default = "default_drop_prefixes")]
    pub drop_prefixes: Vec<String>,
    #[serde(default = "default_drop_values")]
    pub drop_values: Vec<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            canonical: default_canonical(),
            drop_prefixes: default_drop_prefixes(),
            drop_values: default_drop_values(),
        }
    }
}

fn default_canonical() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([(
        "West Bank and Gaza".to_string(),
        vec![
            "West Bank".to_string(),
            "Region: Gaza".to_string(),
            "Region: West Bank".to_string(),
            "Palestinian".to_string(),
        ],
    )])
}

fn default_drop_prefixes() -> Vec<String> {
    vec!["-".into(), "Region".into()]
}

fn default_drop_values() -> Vec<String> {
    vec!["undetermined".into()]
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let s = &self.sources;
        for (field, value) in [
            ("data_dir", &s.data_dir),
            ("history_pattern", &s.history_pattern),
            ("tracked_list", &s.tracked_list),
            ("panel", &s.panel),
        ] {
            if value.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!("sources.{field} is empty")));
            }
        }
        for (list, files) in [("sdn", &s.sdn), ("nsdn", &s.nsdn)] {
            if files.names().iter().any(|n| n.trim().is_empty()) {
                return Err(ReconError::ConfigValidation(format!(
                    "sources.{list}: file names must not be empty"
                )));
            }
        }

        let mut seen: HashMap<&str, &str> = HashMap::new();
        for (label, variants) in &self.normalize.canonical {
            if label.trim().is_empty() {
                return Err(ReconError::ConfigValidation(
                    "normalize.canonical: empty canonical label".into(),
                ));
            }
            for variant in variants {
                if let Some(other) = seen.insert(variant.as_str(), label.as_str()) {
                    if other != label.as_str() {
                        return Err(ReconError::ConfigValidation(format!(
                            "normalize.canonical: '{variant}' mapped to both '{other}' and '{label}'"
                        )));
                    }
                }
            }
        }

        if self.normalize.drop_prefixes.iter().any(|p| p.is_empty()) {
            return Err(ReconError::ConfigValidation(
                "normalize.drop_prefixes: empty prefix would drop every country".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
