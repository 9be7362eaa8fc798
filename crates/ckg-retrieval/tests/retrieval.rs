//! Retrieval tests over catalogs loaded from disk

use ckg_retrieval::prelude::*;
use ckg_retrieval::{RetrievalError, Resolution};
use proptest::prelude::*;
use std::sync::Arc;

const META: &str = r#"[
    {"meta_op": "Check whether the literal is an octal literal",
     "meta_impl": "private boolean isOctal(ASTNumericLiteral node) {\n    String image = node.getImage();\n    return image.length() > 1 && image.startsWith(\"0\");\n}"},
    {"meta_op": "Get the name of method",
     "meta_impl": "node.getName()"}
]"#;

const API: &str = r#"{"classes_contained_in_project_detail": [
    {"class_name": "ASTNumericLiteral", "methods": [
        {"signature": "int getBase()", "description": "get the base of numeric literal"},
        {"signature": "boolean isIntLiteral()", "description": "check whether numeric literal is int"}
    ]},
    {"class_name": "JavaNode", "methods": [
        {"signature": "JavaNode getParent()", "description": "get parent node"}
    ]}
]}"#;

fn build() -> RetrievalIndex {
    let dir = tempfile::tempdir().unwrap();
    let meta_path = dir.path().join("meta.json");
    let api_path = dir.path().join("api.json");
    std::fs::write(&meta_path, META).unwrap();
    std::fs::write(&api_path, API).unwrap();

    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
    let meta = MetaIndex::build(load_meta_catalog(&meta_path).unwrap(), embedder.as_ref()).unwrap();
    let api = ApiIndex::build(load_api_catalog(&api_path).unwrap(), embedder.as_ref()).unwrap();
    RetrievalIndex::new(Arc::new(meta), api, embedder, RetrievalConfig::default())
}

#[test]
fn test_missing_catalog_is_io_error() {
    let err = load_meta_catalog(std::path::Path::new("/nonexistent/meta.json")).unwrap_err();
    assert!(matches!(err, RetrievalError::Io { .. }));
}

#[test]
fn test_bad_catalog_shape_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("meta.json");
    std::fs::write(&path, r#"{"meta_op": "not a list"}"#).unwrap();
    assert!(matches!(load_meta_catalog(&path), Err(RetrievalError::Catalog { .. })));
}

#[test]
fn test_evidence_partitions_and_reports_gaps() {
    let mut index = build();
    index.register_kinds(&["NumericLiteral"]).unwrap();

    let steps = vec![
        "Check whether the literal is an octal literal".to_string(),
        "Get the name of method".to_string(),
        "Get the name of method".to_string(),
        "zzz qqq".to_string(),
    ];
    let evidence = Evidence::gather(&index, &steps, &["NumericLiteral"]).unwrap();

    assert_eq!(evidence.snippets.len(), 1);
    assert_eq!(evidence.apis.len(), 1);
    assert_eq!(evidence.apis[0].entry.implementation_fragment, "node.getName()");
    assert_eq!(evidence.gaps, vec!["zzz qqq".to_string()]);
    assert!(evidence.render_snippets().starts_with("1.  //Check whether the literal is an octal literal\n"));
}

#[test]
fn test_java_node_is_not_searched_as_utility() {
    let index = build();
    let res: Resolution = index.resolve("get parent node", &[] as &[&str]).unwrap();
    assert!(res.hits.iter().all(|h| h.entry.operation_name != "JavaNode getParent()"));
}

proptest! {
    #[test]
    fn prop_cosine_is_bounded(
        a in proptest::collection::vec(-100.0f32..100.0, 8),
        b in proptest::collection::vec(-100.0f32..100.0, 8),
    ) {
        if let Some(sim) = ckg_retrieval::cosine_similarity(&a, &b) {
            prop_assert!((-1.0001..=1.0001).contains(&sim));
        }
    }

    #[test]
    fn prop_resolution_never_mixes_tiers(step in "[a-z ]{0,40}") {
        let index = build();
        let res = index.resolve(&step, &["NumericLiteral"]).unwrap();
        match res.tier {
            Tier::Meta => prop_assert_eq!(res.hits.len(), 1),
            Tier::Api => prop_assert!(!res.hits.is_empty() && res.hits.len() <= 3),
            Tier::None => prop_assert!(res.hits.is_empty()),
        }
    }
}
