//! Repairs for cross-reference URLs that are known to be malformed in upstream
//! databases.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::registry::{Registry, RegistryUri};

static REACTOME_REACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"R-ALL-REACT_(\d+)").unwrap());

impl Registry {
    /// Returns the URL to keep for `url`, or `None` when it has to be dropped.
    pub fn check_resource_url(&self, url: &str) -> Option<String> {
        let url = url.trim();
        let url: Cow<'_, str> = REACTOME_REACT.replace_all(url, "R-ALL-$1");

        if let Some(uri) = RegistryUri::parse_identifiers_url(&url) {
            return self.check_identifiers_uri(&url, uri);
        }

        match self.resolve_backward(&url) {
            Some(uri) => Some(uri.to_uri_string()),
            None => {
                debug!(url = %url, "keeping unrecognized resource url");
                Some(url.into_owned())
            }
        }
    }

    fn check_identifiers_uri(&self, url: &str, uri: RegistryUri) -> Option<String> {
        let mut uri = self.fix_legacy_prefix(&uri);
        if self.is_invalid_namespace(uri.prefix()) {
            warn!(url = %url, prefix = %uri.prefix(), "dropping resource from invalid namespace");
            return None;
        }

        if !self.contains_prefix(uri.prefix()) {
            match self.prefix_for_namespace(uri.prefix()) {
                Some(prefix) => uri = RegistryUri::new(prefix, uri.local_id()),
                None => {
                    info!(url = %url, prefix = %uri.prefix(), "unknown namespace prefix, keeping resource");
                    return Some(url.to_string());
                }
            }
        }

        if self.matches_whole_id(uri.prefix(), uri.local_id()) {
            return Some(uri.to_uri_string());
        }

        info!(
            prefix = %uri.prefix(),
            id = %uri.local_id(),
            "identifier does not match namespace pattern"
        );
        match self.repair(&uri) {
            Some(fixed) => {
                info!(from = %uri, to = %fixed, "repaired resource");
                Some(fixed.to_uri_string())
            }
            None => {
                warn!(url = %url, "could not repair resource, dropping it");
                None
            }
        }
    }

    fn repair(&self, uri: &RegistryUri) -> Option<RegistryUri> {
        let id = uri.local_id();
        match uri.prefix() {
            "chebi" => {
                if !id.is_empty() && id.chars().all(|ch| ch.is_ascii_digit()) {
                    Some(RegistryUri::new("chebi", &format!("CHEBI:{id}")))
                } else {
                    Some(uri.clone())
                }
            }
            "ec-code" => {
                let dots = id.matches('.').count();
                if dots == 0 {
                    return None;
                }
                let padding = ".-".repeat(3usize.saturating_sub(dots));
                Some(RegistryUri::new("ec-code", &format!("{id}{padding}")))
            }
            "go" => {
                if id.to_lowercase().starts_with("go:") {
                    Some(uri.clone())
                } else {
                    Some(RegistryUri::new("go", &format!("GO:{id}")))
                }
            }
            "hmdb" => id
                .strip_prefix('/')
                .map(|rest| RegistryUri::new("hmdb", rest)),
            "kegg.compound" => {
                if id.starts_with('D') {
                    Some(RegistryUri::new("kegg.drug", id))
                } else if id.starts_with('G') {
                    Some(RegistryUri::new("kegg.glycan", id))
                } else {
                    Some(uri.clone())
                }
            }
            "reactome" => {
                let id = if id.starts_with(|ch: char| ch.is_ascii_digit()) {
                    format!("R-ALL-{id}")
                } else {
                    id.to_string()
                };
                self.matches_whole_id("reactome", &id)
                    .then(|| RegistryUri::new("reactome", &id))
            }
            "refseq" if id.starts_with("WP_") => Some(RegistryUri::new("ncbiprotein", id)),
            "rhea" if id.contains('#') => {
                let base = id.split('#').next().unwrap_or(id);
                Some(RegistryUri::new("rhea", base))
            }
            _ => None,
        }
    }
}
