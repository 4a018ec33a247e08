use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::annotator::{AnnotationOptions, AnnotationSummary, Annotator, XrefSource};
use crate::domain::{CanonicalId, ElementKind};
use crate::error::XrefError;
use crate::gpr::{self, Association};
use crate::model::Model;
use crate::registry::{Registry, RegistryUri};

#[derive(Debug, Clone, Serialize)]
pub struct IdResult {
    pub input: String,
    pub kind: ElementKind,
    pub abbreviation: String,
    pub compartment_code: Option<String>,
    pub tissue_code: Option<String>,
    pub pseudo: bool,
    pub encoded: String,
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResult {
    pub input: String,
    pub prefix: Option<String>,
    pub local_id: Option<String>,
    pub resolved: Option<String>,
    pub legacy_fixed: Option<String>,
    pub invalid_namespace: bool,
    pub matches_pattern: bool,
    pub checked: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GprResult {
    pub rule: String,
    pub parsed: String,
    pub canonical: String,
    pub tree: Association,
    pub gene_products: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotateResult {
    pub model_id: String,
    pub rules_attached: usize,
    pub rules_failed: usize,
    pub summary: AnnotationSummary,
    pub annotated_at: String,
    pub tool: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct App<S: XrefSource> {
    registry: Registry,
    source: S,
    options: AnnotationOptions,
}

impl<S: XrefSource> App<S> {
    pub fn new(registry: Registry, source: S, options: AnnotationOptions) -> Self {
        Self {
            registry,
            source,
            options,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn id(&self, raw: &str, kind: ElementKind) -> Result<IdResult, XrefError> {
        let id = CanonicalId::parse(raw, kind)?;
        let encoded = id.encode();
        Ok(IdResult {
            input: raw.to_string(),
            kind,
            abbreviation: id.abbreviation().to_string(),
            compartment_code: id.compartment_code().map(str::to_string),
            tissue_code: id.tissue_code().map(str::to_string),
            pseudo: id.is_pseudo_reaction(),
            valid: CanonicalId::is_valid(raw, kind),
            encoded,
        })
    }

    pub fn resolve(&self, url: &str) -> ResolveResult {
        let resolved = self.registry.resolve_backward(url);
        let fixed = resolved
            .as_ref()
            .map(|uri| self.registry.fix_legacy_prefix(uri));
        let legacy_fixed = match (&resolved, &fixed) {
            (Some(before), Some(after)) if before != after => Some(after.to_uri_string()),
            _ => None,
        };

        ResolveResult {
            input: url.trim().to_string(),
            prefix: fixed.as_ref().map(|uri| uri.prefix().to_string()),
            local_id: fixed.as_ref().map(|uri| uri.local_id().to_string()),
            resolved: resolved.as_ref().map(RegistryUri::to_uri_string),
            legacy_fixed,
            invalid_namespace: fixed
                .as_ref()
                .is_some_and(|uri| self.registry.is_invalid_namespace(uri.prefix())),
            matches_pattern: fixed
                .as_ref()
                .is_some_and(|uri| self.registry.matches_pattern(uri.prefix(), uri.local_id())),
            checked: self.registry.check_resource_url(url),
        }
    }

    /// Parses a rule against an empty scratch model, so leaves show their canonical
    /// gene product ids.
    pub fn gpr(&self, rule: &str) -> Result<GprResult, XrefError> {
        let parsed = gpr::parse(rule)?;
        let mut scratch = Model::new("scratch");
        let canonical = gpr::canonicalize(parsed.clone(), &mut scratch)?;
        let gene_products: BTreeSet<String> = canonical
            .leaves()
            .into_iter()
            .map(str::to_string)
            .collect();

        Ok(GprResult {
            rule: rule.to_string(),
            parsed: parsed.to_string(),
            canonical: canonical.to_string(),
            tree: canonical,
            gene_products: gene_products.into_iter().collect(),
        })
    }

    /// Attaches every reaction's `gene_reaction_rule`, then annotates the model.
    pub fn annotate(
        &self,
        model: &mut Model,
        sink: &dyn ProgressSink,
    ) -> Result<AnnotateResult, XrefError> {
        let started = Instant::now();
        let rules: Vec<(String, String)> = model
            .reactions
            .values()
            .filter_map(|reaction| {
                reaction
                    .gene_reaction_rule
                    .as_ref()
                    .filter(|rule| !rule.trim().is_empty())
                    .map(|rule| (reaction.id.clone(), rule.clone()))
            })
            .collect();

        let mut rules_attached = 0;
        let mut rules_failed = 0;
        for (reaction_id, rule) in &rules {
            match gpr::set_gene_product_association(model, reaction_id, rule) {
                Ok(()) => rules_attached += 1,
                Err(err @ (XrefError::GprParse { .. } | XrefError::InvalidIdentifier(_))) => {
                    warn!(reaction = %reaction_id, error = %err, "skipping gene reaction rule");
                    rules_failed += 1;
                }
                Err(err) => return Err(err),
            }
        }
        sink.event(ProgressEvent {
            message: format!("phase=Rules; {rules_attached} rules attached, {rules_failed} failed"),
            elapsed: Some(started.elapsed()),
        });

        let annotator = Annotator::new(&self.registry, &self.source, self.options);
        let summary = annotator.annotate_model(model, sink)?;
        debug!(model = %model.id, ?summary, "model annotated");

        Ok(AnnotateResult {
            model_id: model.id.clone(),
            rules_attached,
            rules_failed,
            summary,
            annotated_at: iso_timestamp(),
            tool: format!("gem-xref/{}", env!("CARGO_PKG_VERSION")),
        })
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
