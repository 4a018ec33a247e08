use assert_matches::assert_matches;

use gem_xref::error::XrefError;
use gem_xref::gpr::{self, Association};
use gem_xref::model::{GeneProduct, Model, Reaction};

fn leaf(id: &str) -> Association {
    Association::Leaf(id.to_string())
}

#[test]
fn simple_disjunction() {
    let parsed = gpr::parse("a or b").unwrap();
    assert_eq!(parsed, Association::Or(vec![leaf("a"), leaf("b")]));
    assert_eq!(parsed.children().len(), 2);
}

#[test]
fn different_conjunctions_are_not_flattened() {
    let parsed = gpr::parse("(a and b) or (a and c)").unwrap();
    assert_eq!(
        parsed,
        Association::Or(vec![
            Association::And(vec![leaf("a"), leaf("b")]),
            Association::And(vec![leaf("a"), leaf("c")]),
        ])
    );
}

#[test]
fn and_binds_tighter_than_or() {
    let parsed = gpr::parse("a or b and c").unwrap();
    assert_eq!(
        parsed,
        Association::Or(vec![leaf("a"), Association::And(vec![leaf("b"), leaf("c")])])
    );
}

#[test]
fn empty_rule_is_typed_error() {
    assert_matches!(gpr::parse(""), Err(XrefError::GprParse { rule, .. }) if rule.is_empty());
}

#[test]
fn duplicate_leaves_pruned_from_new_branch() {
    let existing = Association::And(vec![leaf("a"), leaf("c")]);
    let incoming = Association::Or(vec![leaf("a"), leaf("b")]);
    let merged = gpr::merge(existing, incoming);
    assert_eq!(
        merged,
        Association::Or(vec![
            Association::And(vec![leaf("a"), leaf("c")]),
            Association::Or(vec![leaf("b")]),
        ])
    );
}

#[test]
fn fully_duplicated_branch_is_dropped() {
    let existing = Association::And(vec![leaf("a"), leaf("c")]);
    let incoming = Association::Or(vec![leaf("c"), leaf("a")]);
    let merged = gpr::merge(existing.clone(), incoming);
    assert_eq!(merged, Association::Or(vec![existing]));
}

#[test]
fn merge_into_leaf_appends_existing_last() {
    let merged = gpr::merge(leaf("a"), Association::Or(vec![leaf("b"), leaf("c")]));
    assert_eq!(merged, Association::Or(vec![leaf("b"), leaf("c"), leaf("a")]));

    let merged = gpr::merge(leaf("a"), Association::And(vec![leaf("b"), leaf("c")]));
    assert_eq!(
        merged,
        Association::Or(vec![Association::And(vec![leaf("b"), leaf("c")]), leaf("a")])
    );
}

#[test]
fn merge_into_or_splices_children() {
    let existing = Association::Or(vec![leaf("a"), leaf("b")]);
    let merged = gpr::merge(existing.clone(), Association::Or(vec![leaf("c")]));
    assert_eq!(merged, Association::Or(vec![leaf("a"), leaf("b"), leaf("c")]));

    let incoming = Association::And(vec![leaf("c"), leaf("d")]);
    let merged = gpr::merge(existing, incoming.clone());
    assert_eq!(merged, Association::Or(vec![leaf("a"), leaf("b"), incoming]));
}

#[test]
fn equivalent_shapes_keep_existing() {
    let existing = Association::And(vec![leaf("a"), leaf("b")]);
    let incoming = Association::And(vec![leaf("x"), leaf("y")]);
    assert!(gpr::equivalent(&existing, &incoming));
    assert_eq!(gpr::merge(existing.clone(), incoming), existing);

    assert!(gpr::equivalent(&leaf("a"), &leaf("b")));
    assert!(!gpr::equivalent(
        &Association::And(vec![leaf("a")]),
        &Association::Or(vec![leaf("a")])
    ));
    assert!(!gpr::equivalent(
        &Association::Or(vec![leaf("a"), leaf("b")]),
        &Association::Or(vec![leaf("a")])
    ));
}

#[test]
fn leaves_create_gene_products() {
    let mut model = Model::new("toy");
    let id = gpr::leaf_to_gene_product("b0001", &mut model).unwrap();
    assert_eq!(id, "G_b0001");
    assert_eq!(model.gene_products["G_b0001"].label, "G_b0001");

    let again = gpr::leaf_to_gene_product("G_b0001", &mut model).unwrap();
    assert_eq!(again, "G_b0001");
    assert_eq!(model.gene_products.len(), 1);
}

#[test]
fn leaf_tokens_are_sanitized() {
    let mut model = Model::new("toy");
    assert_eq!(
        gpr::leaf_to_gene_product("10026.1", &mut model).unwrap(),
        "G_10026__SBML_DOT__1"
    );
    assert_eq!(
        gpr::leaf_to_gene_product("YAL-001", &mut model).unwrap(),
        "G_YAL__001"
    );
}

#[test]
fn legacy_gene_product_is_renamed_in_place() {
    let mut model = Model::new("toy");
    model.add_gene_product(GeneProduct::new("G_first"));
    model.add_gene_product(GeneProduct::new("G_10026.1"));
    model.add_gene_product(GeneProduct::new("G_last"));
    let mut reaction = Reaction::new("R_X");
    reaction.gene_product_association = Some(leaf("G_10026.1"));
    model.add_reaction(reaction);

    let id = gpr::leaf_to_gene_product("10026.1", &mut model).unwrap();
    assert_eq!(id, "G_10026__SBML_DOT__1");

    let order: Vec<&str> = model.gene_products.keys().map(String::as_str).collect();
    assert_eq!(order, ["G_first", "G_10026__SBML_DOT__1", "G_last"]);
    assert_eq!(model.gene_products[1].id, "G_10026__SBML_DOT__1");
    assert_eq!(
        model.reactions["R_X"].gene_product_association,
        Some(leaf("G_10026__SBML_DOT__1"))
    );
}

#[test]
fn set_association_stores_and_merges() {
    let mut model = Model::new("toy");
    model.add_reaction(Reaction::new("R_PFK"));

    gpr::set_gene_product_association(&mut model, "R_PFK", "b3916 and b1723").unwrap();
    assert_eq!(
        model.reactions["R_PFK"].gene_product_association,
        Some(Association::And(vec![leaf("G_b3916"), leaf("G_b1723")]))
    );

    gpr::set_gene_product_association(&mut model, "R_PFK", "b3916 or b4025").unwrap();
    assert_eq!(
        model.reactions["R_PFK"].gene_product_association,
        Some(Association::Or(vec![
            Association::And(vec![leaf("G_b3916"), leaf("G_b1723")]),
            Association::Or(vec![leaf("G_b4025")]),
        ]))
    );
    assert_eq!(model.gene_products.len(), 3);
}

#[test]
fn failed_rule_keeps_previous_association() {
    let mut model = Model::new("toy");
    model.add_reaction(Reaction::new("R_PGI"));
    gpr::set_gene_product_association(&mut model, "R_PGI", "b4025").unwrap();

    let err = gpr::set_gene_product_association(&mut model, "R_PGI", "(b4025 or").unwrap_err();
    assert_matches!(err, XrefError::GprParse { .. });
    assert_eq!(
        model.reactions["R_PGI"].gene_product_association,
        Some(leaf("G_b4025"))
    );

    assert_matches!(
        gpr::set_gene_product_association(&mut model, "R_NOPE", "b1"),
        Err(XrefError::ReactionNotFound(_))
    );
}

#[test]
fn display_round_trips() {
    for rule in ["a", "a or b", "(a and b) or c", "a and (b or c) and d"] {
        let parsed = gpr::parse(rule).unwrap();
        assert_eq!(parsed.to_string(), rule);
        assert_eq!(gpr::parse(&parsed.to_string()).unwrap(), parsed);
    }
}

#[test]
fn invalid_gene_token_leaves_model_unchanged() {
    for rule in ["b1 or b!2", "b1 or αb2", "(b1 and é) or b3"] {
        let mut model = Model::new("toy");
        model.add_reaction(Reaction::new("R_X"));

        let err = gpr::set_gene_product_association(&mut model, "R_X", rule).unwrap_err();
        assert_matches!(err, XrefError::GprParse { rule: failed, .. } if failed == rule);
        assert!(model.gene_products.is_empty(), "{rule}");
        assert_eq!(model.reactions["R_X"].gene_product_association, None);
    }
}

#[test]
fn canonicalize_checks_leaves_first() {
    let mut model = Model::new("toy");
    let parsed = gpr::parse("b1 or b!2").unwrap();
    assert_matches!(
        gpr::canonicalize(parsed, &mut model),
        Err(XrefError::InvalidIdentifier(_))
    );
    assert!(model.gene_products.is_empty());
}
