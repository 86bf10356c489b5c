//! Country normalization for the panel view.
//!
//! Folds territory-name variants into one canonical label, then drops
//! administrative and placeholder values. Tracked lists keep their original
//! country strings; only the panel sees normalized ones.

use std::collections::HashMap;

use crate::config::NormalizeConfig;

#[derive(Debug, Clone)]
pub struct CountryNormalizer {
    canonical: HashMap<String, String>,
    drop_prefixes: Vec<String>,
    drop_values: Vec<String>,
}

impl Default for CountryNormalizer {
    fn default() -> Self {
        Self::new(&NormalizeConfig::default())
    }
}

impl CountryNormalizer {
    pub fn new(config: &NormalizeConfig) -> Self {
        let canonical = config
            .canonical
            .iter()
            .flat_map(|(label, variants)| variants.iter().map(move |v| (v.clone(), label.clone())))
            .collect();
        Self {
            canonical,
            drop_prefixes: config.drop_prefixes.clone(),
            drop_values: config.drop_values.clone(),
        }
    }

    /// Canonical label for `country`, or `None` when the value is not a country.
    ///
    /// Mapping runs first, so a variant that also matches a drop prefix
    /// (`Region: Gaza`) is kept under its canonical label.
    pub fn normalize(&self, country: &str) -> Option<String> {
        if let Some(label) = self.canonical.get(country) {
            return Some(label.clone());
        }
        if country.trim().is_empty() {
            return None;
        }
        if self.drop_prefixes.iter().any(|p| country.starts_with(p.as_str())) {
            return None;
        }
        if self.drop_values.iter().any(|v| v == country) {
            return None;
        }
        Some(country.to_string())
    }
}
