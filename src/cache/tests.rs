use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use super::*;
use crate::analysis::PairHistogram;
use crate::gen::Panel;

fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "sortition-cache-{}-{}",
        test,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn sample_run() -> AlgorithmRun {
    let panel_a: Panel = [0, 1].into_iter().collect();
    let panel_b: Panel = [1, 2].into_iter().collect();

    let mut pairs = PairHistogram::new(3);
    pairs.add(0, 1, 0.5);
    pairs.add(1, 2, 0.5);

    AlgorithmRun {
        allocation: BTreeMap::from([(0, 0.5), (1, 1.0), (2, 0.5)]),
        panels: BTreeSet::from([panel_a, panel_b]),
        pairs,
    }
}

#[test]
fn round_trip_preserves_the_run() {
    let dir = scratch_dir("round-trip");
    let key = Key::new("example", 2, "leximin");
    let run = sample_run();

    store(&dir, &key, &run).expect("cache directory is writable");
    let loaded = load(&dir, &key)
        .expect("cache blob is readable")
        .expect("the key was stored");

    assert_eq!(run, loaded);

    std::fs::remove_dir_all(&dir).expect("cleanup");
}

#[test]
fn missing_keys_load_as_none() {
    let dir = scratch_dir("missing");
    std::fs::create_dir_all(&dir).expect("scratch dir");

    let key = Key::new("example", 2, "legacy_first");
    assert!(load(&dir, &key).expect("readable").is_none());

    std::fs::remove_dir_all(&dir).expect("cleanup");
}

#[test]
fn keys_separate_algorithms_and_seeds() {
    let dir = scratch_dir("keys");
    let run = sample_run();

    store(&dir, &Key::new("example", 2, "legacy_first"), &run).expect("writable");

    assert!(load(&dir, &Key::new("example", 2, "legacy_second"))
        .expect("readable")
        .is_none());
    assert!(load(&dir, &Key::new("example", 3, "legacy_first"))
        .expect("readable")
        .is_none());
    assert!(load(&dir, &Key::new("other", 2, "legacy_first"))
        .expect("readable")
        .is_none());
    assert!(load(&dir, &Key::new("example", 2, "legacy_first"))
        .expect("readable")
        .is_some());

    std::fs::remove_dir_all(&dir).expect("cleanup");
}
