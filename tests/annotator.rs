use std::sync::Mutex;

use assert_matches::assert_matches;

use gem_xref::annotation::Qualifier;
use gem_xref::annotator::{AnnotationOptions, AnnotationOutcome, Annotator, XrefSource, XrefTable};
use gem_xref::app::{ProgressEvent, ProgressSink};
use gem_xref::domain::ElementKind;
use gem_xref::error::XrefError;
use gem_xref::model::{GeneProduct, Model, Reaction, Species};
use gem_xref::registry::Registry;

const TABLE: &str = r#"{
  "metabolites": {
    "h2o": [
      "https://identifiers.org/chebi/15377",
      "http://www.hmdb.ca/metabolites/HMDB0002111",
      "https://example.com/water"
    ]
  },
  "reactions": {
    "PGI": [
      "https://identifiers.org/ec-code/5.3.1.9",
      "https://identifiers.org/omim/172400"
    ]
  },
  "gene_products": {
    "b4025": [
      "https://identifiers.org/ncbigene/948535",
      "https://identifiers.org/uniprot/P0A6T1"
    ]
  },
  "synonyms": [
    { "kind": "metabolite", "prefix": "chebi", "id": "CHEBI:15377", "abbreviation": "h2o" }
  ]
}"#;

fn registry() -> Registry {
    Registry::from_path(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/registry.json"))
        .unwrap()
}

fn table() -> XrefTable {
    XrefTable::from_json_str(TABLE).unwrap()
}

fn resources(annotation: &gem_xref::annotation::Annotation, qualifier: Qualifier) -> Vec<String> {
    let mut out: Vec<String> = annotation
        .resources(qualifier)
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default();
    out.sort();
    out
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

#[test]
fn table_lookups() {
    let table = table();
    assert!(table.is_known(ElementKind::Metabolite, "h2o").unwrap());
    assert!(!table.is_known(ElementKind::Reaction, "h2o").unwrap());
    assert_eq!(table.lookup(ElementKind::Reaction, "PGI").unwrap().len(), 2);
    assert!(table.lookup(ElementKind::Reaction, "NOPE").unwrap().is_empty());
    assert_eq!(
        table
            .canonical_from_synonym(ElementKind::Metabolite, "CHEBI", "CHEBI:15377")
            .unwrap()
            .as_deref(),
        Some("h2o")
    );
    assert_eq!(
        table
            .canonical_from_synonym(ElementKind::Reaction, "chebi", "CHEBI:15377")
            .unwrap(),
        None
    );
    assert_matches!(XrefTable::from_json_str("[]"), Err(XrefError::XrefTableParse(_)));
}

#[test]
fn species_are_annotated_with_canonical_resources() {
    let registry = registry();
    let table = table();
    let annotator = Annotator::new(&registry, &table, AnnotationOptions::default());

    let mut species = Species::new("M_h2o_c");
    let outcome = annotator.annotate(&mut species).unwrap();
    assert_eq!(
        outcome,
        AnnotationOutcome::Annotated {
            id: "M_h2o_c".to_string(),
            canonical_id: "M_h2o_c".to_string(),
            added: 3,
        }
    );
    assert_eq!(
        resources(&species.annotation, Qualifier::Is),
        [
            "https://identifiers.org/bigg.metabolite/h2o",
            "https://identifiers.org/chebi/CHEBI:15377",
            "https://identifiers.org/hmdb/HMDB0002111",
        ]
    );
    assert_eq!(species.meta_id.as_deref(), Some("M_h2o_c"));
}

#[test]
fn any_uri_option_keeps_provider_links() {
    let registry = registry();
    let table = table();
    let options = AnnotationOptions {
        include_any_uri: true,
        self_references: false,
    };
    let annotator = Annotator::new(&registry, &table, options);

    let mut species = Species::new("M_h2o_e");
    annotator.annotate(&mut species).unwrap();
    assert_eq!(
        resources(&species.annotation, Qualifier::Is),
        [
            "https://example.com/water",
            "https://identifiers.org/chebi/CHEBI:15377",
            "https://identifiers.org/hmdb/HMDB0002111",
        ]
    );
}

#[test]
fn gene_product_resources_are_routed_by_database() {
    let registry = registry();
    let table = table();
    let annotator = Annotator::new(&registry, &table, AnnotationOptions::default());

    let mut gene_product = GeneProduct::new("G_b4025");
    annotator.annotate(&mut gene_product).unwrap();
    assert_eq!(
        resources(&gene_product.annotation, Qualifier::Is),
        ["https://identifiers.org/uniprot/P0A6T1"]
    );
    assert_eq!(
        resources(&gene_product.annotation, Qualifier::IsEncodedBy),
        [
            "https://identifiers.org/bigg.gene/b4025",
            "https://identifiers.org/ncbigene/948535",
        ]
    );
}

#[test]
fn invalid_ids_without_resources_are_skipped() {
    let registry = registry();
    let table = table();
    let annotator = Annotator::new(&registry, &table, AnnotationOptions::default());

    let mut species = Species::new("h2o-c");
    assert_eq!(
        annotator.annotate(&mut species).unwrap(),
        AnnotationOutcome::Skipped {
            id: "h2o-c".to_string()
        }
    );
    assert!(species.annotation.is_empty());
    assert!(species.meta_id.is_none());
}

#[test]
fn canonical_id_from_synonym_resource() {
    let registry = registry();
    let table = table();
    let annotator = Annotator::new(&registry, &table, AnnotationOptions::default());

    let mut species = Species::new("M_water_c");
    species.annotation.add_resource(
        Qualifier::Is,
        "https://www.ebi.ac.uk/chebi/searchId.do?chebiId=CHEBI:15377",
    );
    let canonical = annotator.find_canonical_id(&species).unwrap().unwrap();
    assert_eq!(canonical.abbreviation(), "h2o");

    let outcome = annotator.annotate(&mut species).unwrap();
    assert_matches!(outcome, AnnotationOutcome::Annotated { added: 3, .. });
    let first = species
        .annotation
        .resources(Qualifier::Is)
        .and_then(|set| set.first())
        .cloned();
    assert_eq!(
        first.as_deref(),
        Some("https://www.ebi.ac.uk/chebi/searchId.do?chebiId=CHEBI:15377")
    );
}

#[test]
fn canonical_id_from_bigg_resource() {
    let registry = registry();
    let table = table();
    let annotator = Annotator::new(&registry, &table, AnnotationOptions::default());

    let mut species = Species::new("water-c");
    species
        .annotation
        .add_resource(Qualifier::Is, "http://bigg.ucsd.edu/universal/metabolites/h2o");
    let canonical = annotator.find_canonical_id(&species).unwrap().unwrap();
    assert_eq!(canonical.encode(), "M_h2o");
}

#[test]
fn existing_meta_id_is_kept() {
    let registry = registry();
    let table = table();
    let annotator = Annotator::new(&registry, &table, AnnotationOptions::default());

    let mut reaction = Reaction::new("R_PGI");
    reaction.meta_id = Some("meta_R_PGI".to_string());
    let outcome = annotator.annotate(&mut reaction).unwrap();
    assert_matches!(outcome, AnnotationOutcome::Annotated { added: 2, .. });
    assert_eq!(reaction.meta_id.as_deref(), Some("meta_R_PGI"));
    assert_eq!(
        resources(&reaction.annotation, Qualifier::Is),
        [
            "https://identifiers.org/bigg.reaction/PGI",
            "https://identifiers.org/ec-code/5.3.1.9",
        ]
    );
}

#[test]
fn model_summary_and_progress() {
    let registry = registry();
    let table = table();
    let annotator = Annotator::new(&registry, &table, AnnotationOptions::default());

    let mut model = Model::new("e_coli_core");
    model.add_species(Species::new("M_h2o_c"));
    model.add_species(Species::new("h2o-c"));
    model.add_reaction(Reaction::new("R_PGI"));
    model.add_gene_product(GeneProduct::new("G_b4025"));

    let sink = RecordingSink::default();
    let summary = annotator.annotate_model(&mut model, &sink).unwrap();

    assert_eq!(summary.species.annotated, 1);
    assert_eq!(summary.species.skipped, 1);
    assert_eq!(summary.species.resources_added, 3);
    assert_eq!(summary.reactions.resources_added, 2);
    assert_eq!(summary.gene_products.resources_added, 3);

    let messages = sink.messages.lock().unwrap();
    assert_eq!(
        *messages,
        [
            "phase=Annotate; 1 species annotated",
            "phase=Annotate; 1 reactions annotated",
            "phase=Annotate; 1 gene products annotated",
        ]
    );
}
