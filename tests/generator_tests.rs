use std::collections::HashSet;

use dirbuster_rs::generator::{estimate_candidates, generate, PathGenerator};
use dirbuster_rs::progress::ProgressStore;
use dirbuster_rs::wordlist::load_words_from_path;

fn words(ws: &[&str]) -> Vec<String> {
    ws.iter().map(|w| w.to_string()).collect()
}

#[test]
fn depth_two_counts_with_extensions() {
    let ws = words(&["a", "b", "c", "d"]);
    let exts = words(&["php", "txt"]);
    let out = generate(&ws, &exts, 2, &HashSet::new());

    let n = ws.len();
    let bases: Vec<_> = out.iter().filter(|p| !p.contains('.')).collect();
    let extended: Vec<_> = out.iter().filter(|p| p.contains('.')).collect();
    assert_eq!(bases.len(), n + n * n);
    assert_eq!(extended.len(), (n + n * n) * exts.len());
    assert_eq!(out.len() as u64, estimate_candidates(n, exts.len(), 2));

    for base in &bases {
        for ext in &exts {
            assert!(out.contains(&format!("{base}.{ext}")));
        }
    }
    // each base is directly followed by its extended forms
    let i = out.iter().position(|p| p == "b/c").unwrap();
    assert_eq!(&out[i + 1..i + 3], &["b/c.php".to_string(), "b/c.txt".to_string()]);
}

#[test]
fn depth_one_has_no_combinations() {
    let out = generate(&words(&["admin", "login", "api"]), &words(&["bak"]), 1, &HashSet::new());
    assert!(out.iter().all(|p| !p.contains('/')));
    assert_eq!(out.len(), 6);
}

#[test]
fn resume_set_is_exact_difference() {
    let ws = words(&["x", "y", "z"]);
    let full = generate(&ws, &[], 2, &HashSet::new());
    let tested: HashSet<String> = ["y", "x/z", "z/z"].iter().map(|s| s.to_string()).collect();
    let resumed = generate(&ws, &[], 2, &tested);

    let expected: Vec<_> = full.iter().filter(|p| !tested.contains(*p)).cloned().collect();
    assert_eq!(resumed, expected);
    assert!(tested.iter().all(|t| !resumed.contains(t)));
}

#[test]
fn resume_from_snapshot_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProgressStore::new(dir.path().join("progress.json"));
    store.save("http://example.com/", &["admin".to_string()]).unwrap();

    let state = store.load();
    let out: Vec<_> = PathGenerator::new(words(&["admin", "login"]), vec![], 2)
        .skip_tested(state.skip_set())
        .collect();
    assert_eq!(out, vec!["login", "admin/admin", "admin/login", "login/admin", "login/login"]);
}

#[test]
fn wordlist_file_feeds_generator() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("words.txt");
    std::fs::write(&path, b"admin\n\n  login \nadmin\n\xff\n").unwrap();

    let ws = load_words_from_path(&path).unwrap();
    assert_eq!(ws, vec!["admin", "login"]);
    let out = generate(&ws, &[], 2, &HashSet::new());
    assert_eq!(
        out,
        vec!["admin", "login", "admin/admin", "admin/login", "login/admin", "login/login"]
    );
}
