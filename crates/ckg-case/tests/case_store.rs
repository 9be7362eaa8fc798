//! Case store tests
//!
//! Loading, publication and working-set invariants against real files.

use ckg_case::prelude::*;
use ckg_case::{publish_active_subset, select_next_negative};
use proptest::prelude::*;
use std::fs;

const OCTAL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<test-data>
    <test-code>
        <description>neg1</description>
        <expected-problems>1</expected-problems>
        <code><![CDATA[
public class Foo {
    int i = 012;
}
]]></code>
    </test-code>
    <test-code>
        <description>pos1</description>
        <expected-problems>0</expected-problems>
        <code><![CDATA[
public class Foo {
    int i = 10;
}
]]></code>
    </test-code>
    <test-code>
        <description>neg2</description>
        <expected-problems>2</expected-problems>
        <code><![CDATA[
public class Foo {
    int i = 010;
    int j = 07;
}
]]></code>
    </test-code>
</test-data>
"#;

fn write_case_set(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("AvoidUsingOctalValues.xml");
    fs::write(&path, OCTAL).unwrap();
    path
}

#[test]
fn test_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let cases = CaseSet::load(write_case_set(&dir)).unwrap();

    assert_eq!(cases.len(), 3);
    assert_eq!(cases.position("neg2"), Some(2));
    assert_eq!(ckg_case::count_negative(cases.cases()), 2);
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = CaseSet::load(dir.path().join("absent.xml")).unwrap_err();
    assert!(matches!(err, CaseError::Io { .. }));
}

#[test]
fn test_publish_writes_only_active_cases() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_case_set(&dir);
    let dest = dir.path().join("active.xml");

    let candidates: CaseIdSet = ["neg1", "neg2"].into_iter().map(CaseId::from).collect();
    let skipped: CaseIdSet = std::iter::once(CaseId::from("neg2")).collect();

    let kept = publish_active_subset(&candidates, &skipped, &source, &dest).unwrap();
    assert_eq!(kept, 1);

    let published = CaseSet::load(&dest).unwrap();
    let ids: Vec<&str> = published.iter().map(|c| c.id().as_str()).collect();
    pretty_assertions::assert_eq!(ids, vec!["neg1"]);
}

#[test]
fn test_publish_by_membership_creates_parent() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_case_set(&dir);
    let dest = dir.path().join("target/test-classes/active.xml");

    let candidates: CaseIdSet = ["neg1", "pos1"].into_iter().map(CaseId::from).collect();
    let kept = publish_active_subset(&candidates, &CaseIdSet::new(), &source, &dest).unwrap();

    assert_eq!(kept, 2);
    let published = CaseSet::load(&dest).unwrap();
    assert_eq!(published.len(), 2);
}

#[test]
fn test_active_subset_publish_creates_parent() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_case_set(&dir);
    let dest = dir.path().join("nested/dir/active.xml");
    let cases = CaseSet::load(&source).unwrap();

    let mut sets = WorkingSets::new();
    sets.skip(&CaseId::from("pos1"));
    let kept = sets.active_all(&cases).publish(&source, &dest).unwrap();

    assert_eq!(kept, 2);
    assert!(!fs::read_to_string(&dest).unwrap().contains("pos1"));
}

#[test]
fn test_bootstrap_walk_skips_in_order() {
    let cases = CaseSet::from_xml_str(OCTAL).unwrap();
    let mut sets = WorkingSets::new();

    let first = select_next_negative(cases.cases(), sets.skipped()).unwrap();
    assert_eq!(first.id().as_str(), "neg1");
    sets.skip(first.id());

    let second = select_next_negative(cases.cases(), sets.skipped()).unwrap();
    assert_eq!(second.id().as_str(), "neg2");
}

fn ids() -> impl Strategy<Value = Vec<(usize, bool)>> {
    // (case index, accepted?) per attempt
    proptest::collection::vec((0..3usize, any::<bool>()), 0..12)
}

proptest! {
    #[test]
    fn prop_working_sets_stay_consistent(attempts in ids()) {
        let cases = CaseSet::from_xml_str(OCTAL).unwrap();
        let names = ["neg1", "pos1", "neg2"];
        let mut sets = WorkingSets::new();
        let mut previous_passed = CaseIdSet::new();

        for (idx, accepted) in attempts {
            let anchor = CaseId::from(names[idx]);
            if !sets.is_pending(&anchor) {
                continue;
            }
            sets.begin_attempt(&anchor, &cases);
            if accepted {
                sets.mark_passed();
                // passed only grows
                prop_assert!(previous_passed.iter().all(|id| sets.passed().contains(id)));
                prop_assert!(sets.passed().contains(&anchor));
            } else {
                sets.skip(&anchor);
                prop_assert!(!sets.candidates().contains(&anchor));
                prop_assert!(!sets.active_all(&cases).is_active(anchor.as_str()));
            }
            prop_assert!(sets.candidates().iter().all(|id| !sets.skipped().contains(id)));
            prop_assert!(sets.passed().iter().all(|id| !sets.skipped().contains(id)));
            previous_passed = sets.passed().clone();
        }
    }
}
