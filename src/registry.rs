//! In-memory view of the identifiers.org namespace registry.
//!
//! Backward resolution is a linear scan over every non-deprecated resource pattern.
//! The registry holds a few thousand resources, so the scan stays cheap for
//! per-element use.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::XrefError;

pub const IDENTIFIERS_ORG: &str = "https://identifiers.org/";

static IDENTIFIERS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?identifiers\.org/(?P<prefix>[^/]+?)/(?P<id>.+)$").unwrap()
});

static PROTOCOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://").unwrap());

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\$?id\}").unwrap());

const INVALID_NAMESPACES: &[&str] = &[
    "bind",
    "ensemblgenomes-gn",
    "ensemblgenomes-tr",
    "omim",
    "pseudo",
    "psimi",
    "refseq_locus_tag",
    "refseq_name",
    "refseq_old_locus_tag",
    "refseq_orf_id",
    "refseq_synonym",
    "sabiork",
    "unit",
    "unknown",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Namespace {
    pub prefix: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "pattern", default)]
    pub id_pattern: String,
    #[serde(rename = "namespaceEmbeddedInLui", default)]
    pub embedded_in_lui: bool,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Resource {
    #[serde(rename = "urlPattern")]
    pub url_pattern: String,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegistryDump {
    payload: RegistryPayload,
}

#[derive(Debug, Deserialize)]
struct RegistryPayload {
    namespaces: Vec<Namespace>,
}

/// A compact `prefix/local_id` reference that renders as an identifiers.org URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RegistryUri {
    prefix: String,
    local_id: String,
}

impl RegistryUri {
    pub fn new(prefix: &str, local_id: &str) -> Self {
        Self {
            prefix: prefix.trim().to_lowercase(),
            local_id: local_id.trim().to_string(),
        }
    }

    /// Splits a canonical `identifiers.org/{prefix}/{id}` URL.
    pub fn parse_identifiers_url(url: &str) -> Option<Self> {
        let caps = IDENTIFIERS_URL.captures(url.trim())?;
        Some(Self::new(&caps["prefix"], &caps["id"]))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn to_uri_string(&self) -> String {
        format!("{IDENTIFIERS_ORG}{}/{}", self.prefix, self.local_id)
    }
}

impl fmt::Display for RegistryUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri_string())
    }
}

impl Ord for RegistryUri {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_uri_string().cmp(&other.to_uri_string())
    }
}

impl PartialOrd for RegistryUri {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
struct IdPattern {
    anchored: Regex,
    search: Regex,
}

#[derive(Debug)]
struct ResourceMatcher {
    matcher: Regex,
    namespace: usize,
    resource: usize,
}

#[derive(Debug)]
pub struct Registry {
    namespaces: Vec<Namespace>,
    name_for_prefix: HashMap<String, String>,
    pattern_for_name: HashMap<String, String>,
    prefix_for_name: HashMap<String, String>,
    id_patterns: HashMap<String, IdPattern>,
    backward: Vec<ResourceMatcher>,
}

impl Registry {
    pub fn load(namespaces: Vec<Namespace>) -> Result<Self, XrefError> {
        let mut name_for_prefix = HashMap::new();
        let mut pattern_for_name = HashMap::new();
        let mut prefix_for_name = HashMap::new();
        let mut id_patterns = HashMap::new();
        let mut backward = Vec::new();

        for (ns_index, namespace) in namespaces.iter().enumerate() {
            let prefix = namespace.prefix.trim().to_lowercase();
            if name_for_prefix.contains_key(&prefix) {
                return Err(XrefError::DuplicatePrefix(prefix));
            }
            name_for_prefix.insert(prefix.clone(), namespace.name.clone());
            pattern_for_name.insert(namespace.name.to_lowercase(), namespace.id_pattern.clone());
            prefix_for_name.insert(namespace.name.to_lowercase(), prefix.clone());

            match compile_id_pattern(&namespace.id_pattern) {
                Ok(pattern) => {
                    id_patterns.insert(prefix.clone(), pattern);
                }
                Err(err) => {
                    warn!(prefix = %prefix, error = %err, "skipping unparseable id pattern");
                }
            }

            for (res_index, resource) in namespace.resources.iter().enumerate() {
                if resource.deprecated {
                    continue;
                }
                match compile_resource_pattern(&resource.url_pattern) {
                    Ok(Some(matcher)) => backward.push(ResourceMatcher {
                        matcher,
                        namespace: ns_index,
                        resource: res_index,
                    }),
                    Ok(None) => {
                        warn!(
                            prefix = %prefix,
                            url_pattern = %resource.url_pattern,
                            "skipping resource pattern without id placeholder"
                        );
                    }
                    Err(err) => {
                        warn!(
                            prefix = %prefix,
                            url_pattern = %resource.url_pattern,
                            error = %err,
                            "skipping unparseable resource pattern"
                        );
                    }
                }
            }
        }

        debug!(
            namespaces = namespaces.len(),
            resources = backward.len(),
            "registry loaded"
        );

        Ok(Self {
            namespaces,
            name_for_prefix,
            pattern_for_name,
            prefix_for_name,
            id_patterns,
            backward,
        })
    }

    /// Reads the identifiers.org dump shape `{"payload": {"namespaces": [...]}}`.
    pub fn from_json_str(content: &str) -> Result<Self, XrefError> {
        let dump: RegistryDump =
            serde_json::from_str(content).map_err(|err| XrefError::RegistryParse(err.to_string()))?;
        Self::load(dump.payload.namespaces)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, XrefError> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|_| XrefError::RegistryRead(path.to_path_buf()))?;
        Self::from_json_str(&content)
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    pub fn contains_prefix(&self, prefix: &str) -> bool {
        self.name_for_prefix.contains_key(&prefix.to_lowercase())
    }

    pub fn namespace_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.name_for_prefix
            .get(&prefix.to_lowercase())
            .map(String::as_str)
    }

    pub fn prefix_for_namespace(&self, name: &str) -> Option<&str> {
        self.prefix_for_name
            .get(&name.to_lowercase())
            .map(String::as_str)
    }

    pub fn pattern_for_namespace(&self, name: &str) -> Option<&str> {
        self.pattern_for_name
            .get(&name.to_lowercase())
            .map(String::as_str)
    }

    pub fn forward(&self, prefix: &str, local_id: &str) -> RegistryUri {
        RegistryUri::new(prefix, local_id)
    }

    /// Checks the last `/` segment of `local_id` against the namespace id pattern.
    pub fn matches_pattern(&self, prefix: &str, local_id: &str) -> bool {
        let segment = local_id.rsplit('/').next().unwrap_or(local_id);
        self.id_patterns
            .get(&prefix.to_lowercase())
            .is_some_and(|pattern| pattern.anchored.is_match(segment))
    }

    /// Checks the complete `local_id` against the namespace id pattern.
    pub fn matches_whole_id(&self, prefix: &str, local_id: &str) -> bool {
        self.id_patterns
            .get(&prefix.to_lowercase())
            .is_some_and(|pattern| pattern.anchored.is_match(local_id))
    }

    pub fn resolve_backward(&self, url: &str) -> Option<RegistryUri> {
        let url = url.trim();
        if let Some(uri) = RegistryUri::parse_identifiers_url(url) {
            return Some(uri);
        }

        let stripped = PROTOCOL.replace(url, "");
        let mut first: Option<(&ResourceMatcher, String)> = None;
        let mut matched_namespaces: HashSet<usize> = HashSet::new();

        for entry in &self.backward {
            let Some(caps) = entry.matcher.captures(&stripped) else {
                continue;
            };
            matched_namespaces.insert(entry.namespace);
            if first.is_none() {
                first = Some((entry, caps["id"].to_string()));
            }
        }

        let Some((entry, captured)) = first else {
            debug!(url = %url, "no resource pattern matched");
            return None;
        };
        let namespace = &self.namespaces[entry.namespace];

        if matched_namespaces.len() > 1 {
            let candidates: Vec<&str> = self
                .namespaces
                .iter()
                .enumerate()
                .filter(|(index, _)| matched_namespaces.contains(index))
                .map(|(_, ns)| ns.prefix.as_str())
                .collect();
            info!(
                url = %url,
                chosen = %namespace.prefix,
                candidates = ?candidates,
                "ambiguous resource url, using first namespace"
            );
        }

        let local_id = if namespace.embedded_in_lui {
            self.id_patterns
                .get(&namespace.prefix.to_lowercase())
                .and_then(|pattern| pattern.search.find(&stripped))
                .map(|found| found.as_str().to_string())
                .unwrap_or(captured)
        } else {
            captured
        };

        debug!(
            url = %url,
            prefix = %namespace.prefix,
            resource = entry.resource,
            "resolved resource url"
        );
        Some(RegistryUri::new(&namespace.prefix, &local_id))
    }

    /// Remaps prefixes that identifiers.org renamed or merged.
    pub fn fix_legacy_prefix(&self, uri: &RegistryUri) -> RegistryUri {
        let prefix = uri.prefix();
        let local_id = uri.local_id();
        match prefix {
            "ncbigi" => RegistryUri::new("ncbigene", local_id),
            "reactome.reaction" => RegistryUri::new("reactome", local_id),
            "reactome.compound" => RegistryUri::new("reactome", &format!("R-ALL-{local_id}")),
            "biomodels.sbo" => RegistryUri::new("sbo", local_id),
            "inchi_key" => RegistryUri::new("inchikey", local_id),
            "psimod" | "psi-mod" => RegistryUri::new("mod", local_id),
            _ => match prefix.strip_prefix("obo.") {
                Some(rest) if !rest.is_empty() => RegistryUri::new(rest, local_id),
                _ => uri.clone(),
            },
        }
    }

    pub fn is_invalid_namespace(&self, prefix: &str) -> bool {
        let prefix = prefix.to_lowercase();
        INVALID_NAMESPACES.contains(&prefix.as_str())
    }

    pub fn is_identifiers_org_url(&self, url: &str) -> bool {
        IDENTIFIERS_URL.is_match(url.trim())
    }

    /// `bigg.*` namespaces carry canonical ids as their local ids.
    pub fn identifies_canonical(&self, prefix: &str) -> bool {
        prefix.to_lowercase().starts_with("bigg.")
    }
}

fn compile_id_pattern(pattern: &str) -> Result<IdPattern, regex::Error> {
    let body = strip_anchors(pattern);
    Ok(IdPattern {
        anchored: Regex::new(&format!("^(?:{body})$"))?,
        search: Regex::new(body)?,
    })
}

fn strip_anchors(pattern: &str) -> &str {
    let body = pattern.trim();
    let body = body.strip_prefix('^').unwrap_or(body);
    body.strip_suffix('$').unwrap_or(body)
}

/// Turns a resource URL template into an anchored regex over the protocol-less URL
/// with a single `id` capture. Returns `None` for templates without a placeholder.
fn compile_resource_pattern(url_pattern: &str) -> Result<Option<Regex>, regex::Error> {
    let template = PROTOCOL.replace(url_pattern.trim(), "");
    let mut parts = PLACEHOLDER.splitn(&template, 2);
    let head = parts.next().unwrap_or_default();
    let regex = match parts.next() {
        Some("") => format!("^{}(?P<id>.+)$", regex::escape(head)),
        Some(tail) => format!(
            "^{}(?P<id>.+?){}$",
            regex::escape(head),
            regex::escape(tail)
        ),
        None => return Ok(None),
    };
    Regex::new(&regex).map(Some)
}
