//! Canonical identifiers for model elements.
//!
//! A canonical id has the shape `{PREFIX}_{abbreviation}[_{compartment}][_{tissue}]`,
//! following the BiGG identifier guidelines. Only metabolites carry compartment and
//! tissue suffixes. Pseudo reactions (exchange, demand, sink, biomass) carry no
//! prefix at all.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::XrefError;

static METABOLITE_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<abbr>.+?)(?:_(?P<comp>[a-z][a-z0-9]?)(?:_(?P<tissue>[A-Z][A-Z0-9]?))?)?$",
    )
    .unwrap()
});

static PSEUDO_REACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:(?:EX|DM|SK|SINK)_.|BIOMASS)").unwrap());

static WHOLE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap());

static COMPARTMENT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]?$").unwrap());

static TISSUE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9]?$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    Metabolite,
    Reaction,
    GeneProduct,
}

impl ElementKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ElementKind::Metabolite => "M",
            ElementKind::Reaction => "R",
            ElementKind::GeneProduct => "G",
        }
    }

    /// Registry prefix whose local ids are canonical abbreviations of this kind.
    pub fn canonical_namespace(&self) -> &'static str {
        match self {
            ElementKind::Metabolite => "bigg.metabolite",
            ElementKind::Reaction => "bigg.reaction",
            ElementKind::GeneProduct => "bigg.gene",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Metabolite => write!(f, "metabolite"),
            ElementKind::Reaction => write!(f, "reaction"),
            ElementKind::GeneProduct => write!(f, "gene-product"),
        }
    }
}

impl FromStr for ElementKind {
    type Err = XrefError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "metabolite" | "species" => Ok(ElementKind::Metabolite),
            "reaction" => Ok(ElementKind::Reaction),
            "gene-product" | "gene_product" | "gene" => Ok(ElementKind::GeneProduct),
            _ => Err(XrefError::InvalidKind(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CanonicalId {
    kind: ElementKind,
    abbreviation: String,
    compartment_code: Option<String>,
    tissue_code: Option<String>,
    pseudo: bool,
}

impl CanonicalId {
    /// Decomposes a raw element id of the given kind.
    ///
    /// The kind prefix (`M_`, `R_`, `G_`) is optional and matched case-insensitively;
    /// duplicated leading underscores are dropped. For metabolites the last trailing
    /// lowercase segment becomes the compartment code, optionally followed by an
    /// uppercase tissue code.
    pub fn parse(raw: &str, kind: ElementKind) -> Result<Self, XrefError> {
        let trimmed = raw.trim();
        let rest = strip_kind_prefix(trimmed, kind).trim_start_matches('_');
        if rest.is_empty() || !rest.chars().all(is_id_char) {
            return Err(XrefError::InvalidIdentifier(raw.to_string()));
        }

        match kind {
            ElementKind::Metabolite => {
                let caps = METABOLITE_TAIL
                    .captures(rest)
                    .ok_or_else(|| XrefError::InvalidIdentifier(raw.to_string()))?;
                Ok(Self {
                    kind,
                    abbreviation: caps["abbr"].to_string(),
                    compartment_code: caps.name("comp").map(|m| m.as_str().to_string()),
                    tissue_code: caps.name("tissue").map(|m| m.as_str().to_string()),
                    pseudo: false,
                })
            }
            ElementKind::Reaction => Ok(Self {
                kind,
                abbreviation: rest.to_string(),
                compartment_code: None,
                tissue_code: None,
                pseudo: PSEUDO_REACTION.is_match(rest),
            }),
            ElementKind::GeneProduct => Ok(Self {
                kind,
                abbreviation: rest.to_string(),
                compartment_code: None,
                tissue_code: None,
                pseudo: false,
            }),
        }
    }

    /// Builds an id from explicit parts. Compartment and tissue codes are ignored for
    /// kinds other than metabolites.
    pub fn new(
        kind: ElementKind,
        abbreviation: &str,
        compartment_code: Option<&str>,
        tissue_code: Option<&str>,
    ) -> Result<Self, XrefError> {
        let valid_abbreviation = !abbreviation.is_empty()
            && !abbreviation.starts_with('_')
            && abbreviation.chars().all(is_id_char);
        if !valid_abbreviation {
            return Err(XrefError::InvalidIdentifier(abbreviation.to_string()));
        }

        let (compartment_code, tissue_code) = match kind {
            ElementKind::Metabolite => {
                if let Some(code) = compartment_code {
                    if !COMPARTMENT_CODE.is_match(code) {
                        return Err(XrefError::InvalidIdentifier(code.to_string()));
                    }
                }
                if let Some(code) = tissue_code {
                    if compartment_code.is_none() || !TISSUE_CODE.is_match(code) {
                        return Err(XrefError::InvalidIdentifier(code.to_string()));
                    }
                }
                (
                    compartment_code.map(str::to_string),
                    tissue_code.map(str::to_string),
                )
            }
            ElementKind::Reaction | ElementKind::GeneProduct => (None, None),
        };

        let id = Self {
            kind,
            abbreviation: abbreviation.to_string(),
            compartment_code,
            tissue_code,
            pseudo: kind == ElementKind::Reaction && PSEUDO_REACTION.is_match(abbreviation),
        };
        // e.g. abbreviation `h_c` without a compartment would re-parse as `h` in `c`
        if Self::parse(&id.encode(), kind)? != id {
            return Err(XrefError::InvalidIdentifier(id.encode()));
        }
        Ok(id)
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn abbreviation(&self) -> &str {
        &self.abbreviation
    }

    pub fn compartment_code(&self) -> Option<&str> {
        self.compartment_code.as_deref()
    }

    pub fn tissue_code(&self) -> Option<&str> {
        self.tissue_code.as_deref()
    }

    pub fn is_pseudo_reaction(&self) -> bool {
        self.pseudo
    }

    pub fn encode(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(4);
        if !self.pseudo {
            parts.push(self.kind.prefix());
        }
        parts.push(&self.abbreviation);
        if let Some(code) = &self.compartment_code {
            parts.push(code);
        }
        if let Some(code) = &self.tissue_code {
            parts.push(code);
        }
        parts.join("_")
    }

    /// True when `raw` parses as `kind` and its encoded form matches the
    /// whole-identifier grammar.
    pub fn is_valid(raw: &str, kind: ElementKind) -> bool {
        Self::parse(raw, kind).is_ok_and(|id| WHOLE_ID.is_match(&id.encode()))
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Parses the `kind:raw` form, e.g. `metabolite:M_nadh_c`.
impl FromStr for CanonicalId {
    type Err = XrefError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = value
            .trim()
            .split_once(':')
            .ok_or_else(|| XrefError::InvalidIdentifier(value.to_string()))?;
        CanonicalId::parse(rest, kind.parse()?)
    }
}

fn strip_kind_prefix(id: &str, kind: ElementKind) -> &str {
    let letter = kind.prefix();
    let mut chars = id.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some('_')) if letter.starts_with(first.to_ascii_uppercase()) => &id[2..],
        _ => id,
    }
}

fn is_id_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
