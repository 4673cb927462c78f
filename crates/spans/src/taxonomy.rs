use crate::error::{Result, TaxonomyError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Serialized form of a taxonomy: valid ids, legacy aliases and the root
/// category used when a role matches nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxonomyTable {
    pub categories: Vec<String>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    pub fallback: String,
}

/// How a role was turned into a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The role already was a valid category id.
    Direct,
    /// Found in the legacy alias table.
    Alias,
    /// Nothing matched; the fallback category was used.
    Fallback,
}

/// Static lookup table of category ids and legacy aliases.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    valid: HashSet<String>,
    aliases: HashMap<String, String>,
    folded_aliases: HashMap<String, String>,
    fallback: String,
}

impl Taxonomy {
    pub fn new<C, A, K, V>(categories: C, aliases: A, fallback: impl Into<String>) -> Result<Self>
    where
        C: IntoIterator,
        C::Item: Into<String>,
        A: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let valid: HashSet<String> = categories.into_iter().map(Into::into).collect();
        if valid.is_empty() {
            return Err(TaxonomyError::Empty);
        }

        let fallback = fallback.into();
        if !valid.contains(&fallback) {
            return Err(TaxonomyError::UnknownFallback(fallback));
        }

        let mut exact = HashMap::new();
        let mut folded = HashMap::new();
        for (alias, target) in aliases {
            let (alias, target) = (alias.into(), target.into());
            if !valid.contains(&target) {
                return Err(TaxonomyError::UnknownAliasTarget { alias, target });
            }
            folded.insert(fold(&alias), target.clone());
            exact.insert(alias, target);
        }

        Ok(Self {
            valid,
            aliases: exact,
            folded_aliases: folded,
            fallback,
        })
    }

    pub fn from_table(table: TaxonomyTable) -> Result<Self> {
        Self::new(table.categories, table.aliases, table.fallback)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let table: TaxonomyTable = serde_json::from_str(raw)?;
        Self::from_table(table)
    }

    #[must_use]
    pub fn is_valid(&self, category: &str) -> bool {
        self.valid.contains(category)
    }

    #[must_use]
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Map a service role to a category id.
    ///
    /// Valid ids pass through verbatim, then exact alias matches, then
    /// case-insensitive alias matches, then the fallback.
    #[must_use]
    pub fn resolve<'a>(&'a self, role: &str) -> (&'a str, Resolution) {
        if let Some(valid) = self.valid.get(role) {
            return (valid.as_str(), Resolution::Direct);
        }
        if let Some(target) = self.aliases.get(role) {
            return (target.as_str(), Resolution::Alias);
        }
        if let Some(target) = self.folded_aliases.get(&fold(role)) {
            return (target.as_str(), Resolution::Alias);
        }
        (self.fallback.as_str(), Resolution::Fallback)
    }
}

fn fold(raw: &str) -> String {
    raw.trim().to_lowercase()
}
