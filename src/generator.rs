//! Candidate path generation.
//!
//! Paths are produced lazily in a fixed order so that a resumed run skips
//! exactly the subset an earlier run already attempted:
//!
//! 1. depth 1 (`word`), then depth 2 (`word/word`), then depth 3
//!    (`word/word/word`), each a full cartesian product in word-list order
//!    with the last segment varying fastest;
//! 2. every base path is followed by `base.ext` for each extension.
//!
//! The output grows as `(n + n² + n³) · (1 + extensions)`. Use
//! [`estimate_candidates`] before scanning and [`PathGenerator::limit`] to
//! bound a run.

use std::collections::HashSet;

/// Deepest supported combination level.
pub const MAX_DEPTH: usize = 3;

/// Above this many candidates the coordinator warns before scanning.
pub const LARGE_SCAN_THRESHOLD: u64 = 1_000_000;

/// Strip whitespace and a leading dot from each extension, dropping empties.
pub fn normalize_extensions<S: AsRef<str>>(extensions: &[S]) -> Vec<String> {
    let mut out = Vec::new();
    for ext in extensions {
        let ext = ext.as_ref().trim().trim_start_matches('.');
        if !ext.is_empty() && !out.iter().any(|e: &String| e == ext) {
            out.push(ext.to_string());
        }
    }
    out
}

/// Upper bound on the number of paths a generator will emit before resume
/// filtering or a cap is applied. Saturates instead of overflowing.
pub fn estimate_candidates(words: usize, extensions: usize, depth: usize) -> u64 {
    let n = words as u64;
    let per_base = 1u64.saturating_add(extensions as u64);
    let mut level_size = 1u64;
    let mut total = 0u64;
    for _ in 0..depth.min(MAX_DEPTH) {
        level_size = level_size.saturating_mul(n);
        total = total.saturating_add(level_size.saturating_mul(per_base));
    }
    total
}

/// Lazy iterator over candidate paths.
#[derive(Debug, Clone)]
pub struct PathGenerator {
    words: Vec<String>,
    extensions: Vec<String>,
    max_depth: usize,
    skip: HashSet<String>,
    limit: Option<usize>,
    level: usize,
    indices: Vec<usize>,
    ext_idx: usize,
    base: Option<String>,
    emitted: usize,
}

impl PathGenerator {
    pub fn new(words: Vec<String>, extensions: Vec<String>, depth: usize) -> Self {
        Self {
            words,
            extensions,
            max_depth: depth.min(MAX_DEPTH),
            skip: HashSet::new(),
            limit: None,
            level: 1,
            indices: vec![0],
            ext_idx: 0,
            base: None,
            emitted: 0,
        }
    }

    /// Paths in `tested` are never emitted.
    pub fn skip_tested(mut self, tested: HashSet<String>) -> Self {
        self.skip = tested;
        self
    }

    /// Stop after `max` paths have been emitted.
    pub fn limit(mut self, max: Option<usize>) -> Self {
        self.limit = max;
        self
    }

    pub fn estimate(&self) -> u64 {
        estimate_candidates(self.words.len(), self.extensions.len(), self.max_depth)
    }

    /// True when the estimate exceeds [`LARGE_SCAN_THRESHOLD`].
    pub fn is_large(&self) -> bool {
        self.estimate() > LARGE_SCAN_THRESHOLD
    }

    fn exhausted(&self) -> bool {
        self.words.is_empty() || self.level > self.max_depth
    }

    fn current(&mut self) -> String {
        let words = &self.words;
        let base = self.base.get_or_insert_with(|| {
            self.indices
                .iter()
                .map(|&i| words[i].as_str())
                .collect::<Vec<_>>()
                .join("/")
        });
        match self.ext_idx {
            0 => base.clone(),
            i => format!("{}.{}", base, self.extensions[i - 1]),
        }
    }

    fn advance(&mut self) {
        self.ext_idx += 1;
        if self.ext_idx <= self.extensions.len() {
            return;
        }
        self.ext_idx = 0;
        self.base = None;

        let n = self.words.len();
        let mut pos = self.level - 1;
        loop {
            self.indices[pos] += 1;
            if self.indices[pos] < n {
                return;
            }
            self.indices[pos] = 0;
            if pos == 0 {
                // Odometer rolled over: move to the next depth.
                self.level += 1;
                self.indices = vec![0; self.level];
                return;
            }
            pos -= 1;
        }
    }
}

impl Iterator for PathGenerator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if self.limit.is_some_and(|max| self.emitted >= max) || self.exhausted() {
                return None;
            }
            let candidate = self.current();
            self.advance();
            if self.skip.contains(&candidate) {
                continue;
            }
            self.emitted += 1;
            return Some(candidate);
        }
    }
}

/// Eagerly collect every candidate, skipping anything in `already_tested`.
pub fn generate(
    words: &[String],
    extensions: &[String],
    depth: usize,
    already_tested: &HashSet<String>,
) -> Vec<String> {
    PathGenerator::new(words.to_vec(), normalize_extensions(extensions), depth)
        .skip_tested(already_tested.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(ws: &[&str]) -> Vec<String> {
        ws.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn depth_two_order() {
        let out = generate(&words(&["admin", "login"]), &[], 2, &HashSet::new());
        assert_eq!(
            out,
            vec!["admin", "login", "admin/admin", "admin/login", "login/admin", "login/login"]
        );
    }

    #[test]
    fn extensions_follow_each_base() {
        let out = generate(&words(&["a", "b"]), &words(&["php", ".bak"]), 1, &HashSet::new());
        assert_eq!(out, vec!["a", "a.php", "a.bak", "b", "b.php", "b.bak"]);
    }

    #[test]
    fn depth_three_counts_and_cap() {
        let ws = words(&["x", "y", "z"]);
        assert_eq!(generate(&ws, &[], 3, &HashSet::new()).len(), 3 + 9 + 27);
        // deeper requests add nothing past three levels
        assert_eq!(generate(&ws, &[], 7, &HashSet::new()).len(), 3 + 9 + 27);
        let last = generate(&ws, &[], 3, &HashSet::new()).pop().unwrap();
        assert_eq!(last, "z/z/z");
    }

    #[test]
    fn zero_depth_and_empty_words_yield_nothing() {
        assert!(generate(&words(&["a"]), &[], 0, &HashSet::new()).is_empty());
        assert!(generate(&[], &words(&["php"]), 3, &HashSet::new()).is_empty());
    }

    #[test]
    fn limit_truncates_in_order() {
        let out: Vec<_> = PathGenerator::new(words(&["a", "b"]), vec![], 2)
            .limit(Some(3))
            .collect();
        assert_eq!(out, vec!["a", "b", "a/a"]);
    }

    #[test]
    fn limit_counts_only_emitted_paths() {
        let skip: HashSet<String> = ["a".to_string()].into_iter().collect();
        let out: Vec<_> = PathGenerator::new(words(&["a", "b"]), vec![], 2)
            .skip_tested(skip)
            .limit(Some(2))
            .collect();
        assert_eq!(out, vec!["b", "a/a"]);
    }

    #[test]
    fn estimate_matches_formula_and_saturates() {
        assert_eq!(estimate_candidates(10, 2, 2), (10 + 100) * 3);
        assert_eq!(estimate_candidates(10, 0, 3), 10 + 100 + 1000);
        assert_eq!(estimate_candidates(usize::MAX, usize::MAX, 3), u64::MAX);
    }

    #[test]
    fn large_candidate_sets_are_flagged() {
        let ws: Vec<String> = (0..1000).map(|i| format!("w{i}")).collect();
        assert!(estimate_candidates(1000, 0, 2) > LARGE_SCAN_THRESHOLD);
        assert!(PathGenerator::new(ws.clone(), vec![], 2).is_large());
        assert!(!PathGenerator::new(ws, vec!["php".into()], 1).is_large());
    }

    #[test]
    fn normalize_strips_dots_and_duplicates() {
        assert_eq!(
            normalize_extensions(&[" .php", "php", "", "txt"]),
            vec!["php", "txt"]
        );
    }
}
