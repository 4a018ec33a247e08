use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::XrefError;
use crate::registry::Registry;

/// Relation between an element and the resources listed under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Qualifier {
    Is,
    IsEncodedBy,
    Encodes,
    IsDescribedBy,
    IsHomologTo,
    IsVersionOf,
    HasPart,
    IsPartOf,
    HasProperty,
    OccursIn,
}

impl Qualifier {
    pub const ALL: [Qualifier; 10] = [
        Qualifier::Is,
        Qualifier::IsEncodedBy,
        Qualifier::Encodes,
        Qualifier::IsDescribedBy,
        Qualifier::IsHomologTo,
        Qualifier::IsVersionOf,
        Qualifier::HasPart,
        Qualifier::IsPartOf,
        Qualifier::HasProperty,
        Qualifier::OccursIn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Qualifier::Is => "is",
            Qualifier::IsEncodedBy => "is-encoded-by",
            Qualifier::Encodes => "encodes",
            Qualifier::IsDescribedBy => "is-described-by",
            Qualifier::IsHomologTo => "is-homolog-to",
            Qualifier::IsVersionOf => "is-version-of",
            Qualifier::HasPart => "has-part",
            Qualifier::IsPartOf => "is-part-of",
            Qualifier::HasProperty => "has-property",
            Qualifier::OccursIn => "occurs-in",
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Qualifier {
    type Err = XrefError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace('_', "-");
        Qualifier::ALL
            .into_iter()
            .find(|qualifier| qualifier.as_str() == normalized)
            .ok_or_else(|| XrefError::InvalidKind(value.to_string()))
    }
}

/// Qualifier-scoped resource sets. Qualifiers without resources are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Annotation {
    terms: IndexMap<Qualifier, IndexSet<String>>,
}

impl Annotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.values().all(IndexSet::is_empty)
    }

    pub fn resources(&self, qualifier: Qualifier) -> Option<&IndexSet<String>> {
        self.terms.get(&qualifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Qualifier, &IndexSet<String>)> {
        self.terms.iter().map(|(qualifier, set)| (*qualifier, set))
    }

    pub fn resource_count(&self) -> usize {
        self.terms.values().map(IndexSet::len).sum()
    }

    /// Appends a single resource. Returns `false` if it was already present.
    pub fn add_resource(&mut self, qualifier: Qualifier, uri: impl Into<String>) -> bool {
        self.terms.entry(qualifier).or_default().insert(uri.into())
    }

    /// Replaces the qualifier's resources with `merged`, or drops the qualifier when
    /// `merged` is empty.
    pub fn apply_or_remove(&mut self, qualifier: Qualifier, merged: IndexSet<String>) {
        if merged.is_empty() {
            self.terms.shift_remove(&qualifier);
        } else {
            self.terms.insert(qualifier, merged);
        }
    }

    /// Folds `candidates` into the qualifier's resources and returns how many were new.
    pub fn merge_candidates<I, S>(&mut self, qualifier: Qualifier, candidates: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let empty = IndexSet::new();
        let existing = self.terms.get(&qualifier).unwrap_or(&empty);
        let before = existing.len();
        let merged = merge(existing, candidates);
        let added = merged.len() - before;
        self.apply_or_remove(qualifier, merged);
        added
    }
}

/// Existing entries keep their order; new candidates follow in lexicographic order.
pub fn merge<I, S>(existing: &IndexSet<String>, candidates: I) -> IndexSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let fresh: BTreeSet<String> = candidates
        .into_iter()
        .map(Into::into)
        .filter(|candidate| !existing.contains(candidate))
        .collect();
    existing.iter().cloned().chain(fresh).collect()
}

/// Rewrites every resource to its canonical identifiers.org form where the registry
/// knows one, then sorts and deduplicates each qualifier.
pub fn polish(annotation: &mut Annotation, registry: &Registry) {
    let qualifiers: Vec<Qualifier> = annotation.terms.keys().copied().collect();
    for qualifier in qualifiers {
        let Some(resources) = annotation.terms.get(&qualifier) else {
            continue;
        };
        let polished: BTreeSet<String> = resources
            .iter()
            .map(|resource| match registry.resolve_backward(resource) {
                Some(uri) => uri.to_uri_string(),
                None => resource.clone(),
            })
            .collect();
        trace!(qualifier = %qualifier, resources = polished.len(), "polished annotation");
        annotation.apply_or_remove(qualifier, polished.into_iter().collect());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> IndexSet<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn merge_appends_sorted_new_entries() {
        let merged = merge(&set(&["B"]), ["C", "A", "B"]);
        let order: Vec<&str> = merged.iter().map(String::as_str).collect();
        assert_eq!(order, ["B", "A", "C"]);
        assert_eq!(
            merge(&merged, ["C", "A", "B"]).into_iter().collect::<Vec<_>>(),
            ["B", "A", "C"]
        );
    }

    #[test]
    fn empty_merge_removes_qualifier() {
        let mut annotation = Annotation::new();
        annotation.add_resource(Qualifier::Is, "x");
        annotation.apply_or_remove(Qualifier::Is, IndexSet::new());
        assert!(annotation.resources(Qualifier::Is).is_none());
        assert!(annotation.is_empty());
    }

    #[test]
    fn qualifier_parses_snake_and_kebab() {
        assert_eq!("is_encoded_by".parse::<Qualifier>().unwrap(), Qualifier::IsEncodedBy);
        assert_eq!("occurs-in".parse::<Qualifier>().unwrap(), Qualifier::OccursIn);
        assert!("is-like".parse::<Qualifier>().is_err());
    }
}
