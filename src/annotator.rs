use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::annotation::{Annotation, Qualifier};
use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{CanonicalId, ElementKind};
use crate::error::XrefError;
use crate::model::{GeneProduct, Model, Reaction, Species};
use crate::registry::{Registry, RegistryUri};

/// Source of candidate cross-references for canonical ids.
pub trait XrefSource {
    fn lookup(&self, kind: ElementKind, abbreviation: &str) -> Result<BTreeSet<String>, XrefError>;
    fn is_known(&self, kind: ElementKind, abbreviation: &str) -> Result<bool, XrefError>;
    fn canonical_from_synonym(
        &self,
        kind: ElementKind,
        prefix: &str,
        local_id: &str,
    ) -> Result<Option<String>, XrefError>;
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Synonym {
    pub kind: ElementKind,
    pub prefix: String,
    pub id: String,
    pub abbreviation: String,
}

/// Cross-reference table held in memory, loadable from JSON.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct XrefTable {
    #[serde(default)]
    pub metabolites: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub reactions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub gene_products: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub synonyms: Vec<Synonym>,
}

impl XrefTable {
    pub fn from_json_str(content: &str) -> Result<Self, XrefError> {
        serde_json::from_str(content).map_err(|err| XrefError::XrefTableParse(err.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, XrefError> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|_| XrefError::XrefTableRead(path.to_path_buf()))?;
        Self::from_json_str(&content)
    }

    fn entries(&self, kind: ElementKind) -> &BTreeMap<String, Vec<String>> {
        match kind {
            ElementKind::Metabolite => &self.metabolites,
            ElementKind::Reaction => &self.reactions,
            ElementKind::GeneProduct => &self.gene_products,
        }
    }
}

impl XrefSource for XrefTable {
    fn lookup(&self, kind: ElementKind, abbreviation: &str) -> Result<BTreeSet<String>, XrefError> {
        Ok(self
            .entries(kind)
            .get(abbreviation)
            .map(|urls| urls.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn is_known(&self, kind: ElementKind, abbreviation: &str) -> Result<bool, XrefError> {
        Ok(self.entries(kind).contains_key(abbreviation))
    }

    fn canonical_from_synonym(
        &self,
        kind: ElementKind,
        prefix: &str,
        local_id: &str,
    ) -> Result<Option<String>, XrefError> {
        Ok(self
            .synonyms
            .iter()
            .find(|synonym| {
                synonym.kind == kind
                    && synonym.prefix.eq_ignore_ascii_case(prefix)
                    && synonym.id == local_id
            })
            .map(|synonym| synonym.abbreviation.clone()))
    }
}

/// Per-kind view of a model element.
pub trait Annotatable {
    const KIND: ElementKind;

    fn id(&self) -> &str;
    fn annotation(&self) -> &Annotation;
    fn annotation_mut(&mut self) -> &mut Annotation;
    fn meta_id(&self) -> Option<&str>;
    fn set_meta_id(&mut self, meta_id: String);

    fn qualifier_for(&self, _uri: Option<&RegistryUri>) -> Qualifier {
        Qualifier::Is
    }
}

macro_rules! impl_annotatable_fields {
    () => {
        fn id(&self) -> &str {
            &self.id
        }

        fn annotation(&self) -> &Annotation {
            &self.annotation
        }

        fn annotation_mut(&mut self) -> &mut Annotation {
            &mut self.annotation
        }

        fn meta_id(&self) -> Option<&str> {
            self.meta_id.as_deref()
        }

        fn set_meta_id(&mut self, meta_id: String) {
            self.meta_id = Some(meta_id);
        }
    };
}

impl Annotatable for Species {
    const KIND: ElementKind = ElementKind::Metabolite;
    impl_annotatable_fields!();
}

impl Annotatable for Reaction {
    const KIND: ElementKind = ElementKind::Reaction;
    impl_annotatable_fields!();
}

impl Annotatable for GeneProduct {
    const KIND: ElementKind = ElementKind::GeneProduct;
    impl_annotatable_fields!();

    /// Protein-level databases describe the product itself; everything else points at
    /// the encoding gene.
    fn qualifier_for(&self, uri: Option<&RegistryUri>) -> Qualifier {
        match uri.map(RegistryUri::prefix) {
            Some("uniprot" | "pdb" | "interpro") => Qualifier::Is,
            _ => Qualifier::IsEncodedBy,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AnnotationOptions {
    pub include_any_uri: bool,
    pub self_references: bool,
}

impl Default for AnnotationOptions {
    fn default() -> Self {
        Self {
            include_any_uri: false,
            self_references: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnnotationOutcome {
    Annotated {
        id: String,
        canonical_id: String,
        added: usize,
    },
    Skipped {
        id: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KindSummary {
    pub annotated: usize,
    pub skipped: usize,
    pub resources_added: usize,
}

impl KindSummary {
    fn record(&mut self, outcome: &AnnotationOutcome) {
        match outcome {
            AnnotationOutcome::Annotated { added, .. } => {
                self.annotated += 1;
                self.resources_added += added;
            }
            AnnotationOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnnotationSummary {
    pub species: KindSummary,
    pub reactions: KindSummary,
    pub gene_products: KindSummary,
}

pub struct Annotator<'a, S: XrefSource> {
    registry: &'a Registry,
    source: &'a S,
    options: AnnotationOptions,
}

impl<'a, S: XrefSource> Annotator<'a, S> {
    pub fn new(registry: &'a Registry, source: &'a S, options: AnnotationOptions) -> Self {
        Self {
            registry,
            source,
            options,
        }
    }

    /// Resolves the canonical id of `element`, falling back to its `is` resources
    /// when the element id itself is unusable.
    pub fn find_canonical_id<E: Annotatable>(
        &self,
        element: &E,
    ) -> Result<Option<CanonicalId>, XrefError> {
        let parsed = match CanonicalId::parse(element.id(), E::KIND) {
            Ok(id) => {
                if self.source.is_known(E::KIND, id.abbreviation())? {
                    return Ok(Some(id));
                }
                Some(id)
            }
            Err(XrefError::InvalidIdentifier(raw)) => {
                debug!(id = %raw, kind = %E::KIND, "element id is not a canonical id");
                None
            }
            Err(err) => return Err(err),
        };

        if let Some(resources) = element.annotation().resources(Qualifier::Is) {
            for resource in resources {
                if let Some(id) = self.canonical_from_resource(E::KIND, resource)? {
                    debug!(id = %element.id(), canonical = %id, "canonical id taken from annotation");
                    return Ok(Some(id));
                }
            }
        }

        Ok(parsed)
    }

    fn canonical_from_resource(
        &self,
        kind: ElementKind,
        resource: &str,
    ) -> Result<Option<CanonicalId>, XrefError> {
        let Some(uri) = self.registry.resolve_backward(resource) else {
            return Ok(None);
        };
        let uri = self.registry.fix_legacy_prefix(&uri);
        if self.registry.is_invalid_namespace(uri.prefix()) {
            return Ok(None);
        }

        let abbreviation = if self.registry.identifies_canonical(uri.prefix()) {
            Some(uri.local_id().to_string())
        } else {
            self.source
                .canonical_from_synonym(kind, uri.prefix(), uri.local_id())?
        };
        Ok(abbreviation.and_then(|abbreviation| CanonicalId::parse(&abbreviation, kind).ok()))
    }

    pub fn annotate<E: Annotatable>(&self, element: &mut E) -> Result<AnnotationOutcome, XrefError> {
        let Some(canonical) = self.find_canonical_id(element)? else {
            return Ok(AnnotationOutcome::Skipped {
                id: element.id().to_string(),
            });
        };

        let abbreviation = canonical.abbreviation();
        let mut candidates = self.source.lookup(E::KIND, abbreviation)?;
        if self.options.self_references && self.source.is_known(E::KIND, abbreviation)? {
            let self_ref = self
                .registry
                .forward(E::KIND.canonical_namespace(), abbreviation);
            candidates.insert(self_ref.to_uri_string());
        }

        let mut routed: BTreeMap<Qualifier, BTreeSet<String>> = BTreeMap::new();
        for candidate in candidates {
            let Some((uri, registry_uri)) = self.normalize_candidate(&candidate) else {
                continue;
            };
            let qualifier = element.qualifier_for(registry_uri.as_ref());
            routed.entry(qualifier).or_default().insert(uri);
        }

        let mut added = 0;
        for (qualifier, uris) in routed {
            added += element.annotation_mut().merge_candidates(qualifier, uris);
        }

        if !element.annotation().is_empty() && element.meta_id().is_none() {
            let meta_id = element.id().to_string();
            element.set_meta_id(meta_id);
        }

        trace!(id = %element.id(), canonical = %canonical, added, "annotated element");
        Ok(AnnotationOutcome::Annotated {
            id: element.id().to_string(),
            canonical_id: canonical.encode(),
            added,
        })
    }

    fn normalize_candidate(&self, candidate: &str) -> Option<(String, Option<RegistryUri>)> {
        let checked = self.registry.check_resource_url(candidate)?;
        match RegistryUri::parse_identifiers_url(&checked) {
            Some(uri) => {
                let uri = self.registry.fix_legacy_prefix(&uri);
                if self.registry.is_invalid_namespace(uri.prefix()) {
                    debug!(url = %checked, "dropping candidate from invalid namespace");
                    return None;
                }
                Some((uri.to_uri_string(), Some(uri)))
            }
            None if self.options.include_any_uri => Some((checked, None)),
            None => {
                debug!(url = %checked, "dropping non identifiers.org candidate");
                None
            }
        }
    }

    pub fn annotate_model(
        &self,
        model: &mut Model,
        sink: &dyn ProgressSink,
    ) -> Result<AnnotationSummary, XrefError> {
        let mut summary = AnnotationSummary::default();

        let started = Instant::now();
        for species in model.species.values_mut() {
            summary.species.record(&self.annotate(species)?);
        }
        sink.event(ProgressEvent {
            message: format!("phase=Annotate; {} species annotated", summary.species.annotated),
            elapsed: Some(started.elapsed()),
        });

        let started = Instant::now();
        for reaction in model.reactions.values_mut() {
            summary.reactions.record(&self.annotate(reaction)?);
        }
        sink.event(ProgressEvent {
            message: format!("phase=Annotate; {} reactions annotated", summary.reactions.annotated),
            elapsed: Some(started.elapsed()),
        });

        let started = Instant::now();
        for gene_product in model.gene_products.values_mut() {
            summary.gene_products.record(&self.annotate(gene_product)?);
        }
        sink.event(ProgressEvent {
            message: format!(
                "phase=Annotate; {} gene products annotated",
                summary.gene_products.annotated
            ),
            elapsed: Some(started.elapsed()),
        });

        Ok(summary)
    }
}
