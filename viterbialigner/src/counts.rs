//! Occurrence counts gathered from enumerated alignments (the M-step).
//!
//! [`HardCounts`] adds exactly 1 for every (letter, phone symbol) occurrence
//! on every complete alignment, whatever that alignment's probability.
//! [`PosteriorCounts`] weights each alignment by its posterior within its
//! word and accumulates in the log semiring.

use std::collections::BTreeMap;

use rustfst::prelude::*;

use crate::error::{AlignError, Result};
use crate::path::AlignmentPath;
use crate::table::EmissionTable;

/// Accumulates counts word by word and renormalizes them into a table.
pub trait Counter {
    /// Add the complete alignments of one word. Returns false when the word
    /// has to be treated as unalignable.
    fn observe_word(&mut self, paths: &[AlignmentPath]) -> Result<bool>;

    /// Sum of the final log-probability of every non-empty alignment seen.
    fn log_likelihood(&self) -> f64;

    /// Renormalize per letter. Letters that were never observed get no entry.
    fn into_table(self) -> Result<EmissionTable>;
}

#[derive(Debug, Default)]
pub struct HardCounts {
    counts: BTreeMap<String, BTreeMap<String, u64>>,
    log_likelihood: f64,
}

impl HardCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> &BTreeMap<String, BTreeMap<String, u64>> {
        &self.counts
    }
}

impl Counter for HardCounts {
    fn observe_word(&mut self, paths: &[AlignmentPath]) -> Result<bool> {
        for path in paths.iter().filter(|p| !p.is_empty()) {
            self.log_likelihood += path.log_prob();
            for step in path.steps() {
                *self
                    .counts
                    .entry(step.letter.clone())
                    .or_default()
                    .entry(step.phone.clone())
                    .or_insert(0) += 1;
            }
        }
        Ok(!paths.is_empty())
    }

    fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    fn into_table(self) -> Result<EmissionTable> {
        Ok(EmissionTable::from_counts(&self.counts))
    }
}

/// Expected counts, stored as `LogWeight` (negative log of the count).
#[derive(Debug, Default)]
pub struct PosteriorCounts {
    counts: BTreeMap<String, BTreeMap<String, LogWeight>>,
    log_likelihood: f64,
}

impl PosteriorCounts {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Counter for PosteriorCounts {
    fn observe_word(&mut self, paths: &[AlignmentPath]) -> Result<bool> {
        let alignable = !paths.is_empty();
        let paths: Vec<&AlignmentPath> = paths.iter().filter(|p| !p.is_empty()).collect();
        if paths.is_empty() {
            return Ok(alignable);
        }

        // -log of the total probability of the word's alignments
        let mut total = LogWeight::zero();
        for path in &paths {
            total
                .plus_assign(LogWeight::new(-path.log_prob() as f32))
                .map_err(semiring_error)?;
        }
        if total.is_zero() {
            // every alignment is impossible, nothing to distribute
            return Ok(false);
        }
        let normalizer = *total.value() as f64;

        for path in paths {
            self.log_likelihood += path.log_prob();
            let posterior = LogWeight::new((-path.log_prob() - normalizer) as f32);
            for step in path.steps() {
                self.counts
                    .entry(step.letter.clone())
                    .or_default()
                    .entry(step.phone.clone())
                    .or_insert_with(LogWeight::zero)
                    .plus_assign(posterior)
                    .map_err(semiring_error)?;
            }
        }
        Ok(true)
    }

    fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    fn into_table(self) -> Result<EmissionTable> {
        let mut table = EmissionTable::new();
        for (letter, phones) in self.counts {
            let mut letter_total = LogWeight::zero();
            for count in phones.values() {
                letter_total.plus_assign(count).map_err(semiring_error)?;
            }
            if letter_total.is_zero() {
                continue;
            }
            let normalized = phones
                .into_iter()
                .filter(|(_, count)| !count.is_zero())
                .map(|(phone, count)| {
                    (phone, *letter_total.value() as f64 - *count.value() as f64)
                })
                .collect();
            table.set_letter(letter, normalized);
        }
        Ok(table)
    }
}

fn semiring_error(e: impl std::fmt::Display) -> AlignError {
    AlignError::Fst(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(pairs: &[(&str, &str, f64)]) -> AlignmentPath {
        let mut path = AlignmentPath::new();
        for (i, (letter, phone, increment)) in pairs.iter().enumerate() {
            path = path.extended(i, i, letter, phone, *increment);
        }
        path
    }

    #[test]
    fn test_hard_counts_ignore_probability() {
        let mut counts = HardCounts::new();
        counts
            .observe_word(&[
                path(&[("c", "k", -0.1), ("a", "ae", -0.1)]),
                path(&[("c", "s", -5.0), ("a", "ae", -0.1)]),
            ])
            .expect("Test assertion failed");
        assert_eq!(counts.counts()["c"]["k"], 1);
        assert_eq!(counts.counts()["c"]["s"], 1);
        assert_eq!(counts.counts()["a"]["ae"], 2);
        assert!((counts.log_likelihood() - (-0.2 - 5.1)).abs() < 1e-12);

        let table = counts.into_table().expect("Test assertion failed");
        assert!((table.get("c", "k").unwrap() - 0.5f64.ln()).abs() < 1e-12);
        assert_eq!(table.get("a", "ae"), Some(0.0));
    }

    #[test]
    fn test_hard_counts_skip_empty_paths() {
        let mut counts = HardCounts::new();
        let alignable = counts
            .observe_word(&[AlignmentPath::new()])
            .expect("Test assertion failed");
        assert!(alignable);
        assert!(counts.counts().is_empty());
        assert_eq!(counts.log_likelihood(), 0.0);
        assert!(counts.into_table().expect("Test assertion failed").is_empty());
    }

    #[test]
    fn test_posterior_counts_weight_paths() {
        let mut counts = PosteriorCounts::new();
        // posteriors 0.75 and 0.25
        counts
            .observe_word(&[
                path(&[("c", "k", 0.75f64.ln())]),
                path(&[("c", "s", 0.25f64.ln())]),
            ])
            .expect("Test assertion failed");
        let table = counts.into_table().expect("Test assertion failed");
        assert!((table.get("c", "k").unwrap().exp() - 0.75).abs() < 1e-5);
        assert!((table.get("c", "s").unwrap().exp() - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_posterior_counts_skip_impossible_words() {
        let mut counts = PosteriorCounts::new();
        let alignable = counts
            .observe_word(&[path(&[("c", "k", f64::NEG_INFINITY)])])
            .expect("Test assertion failed");
        assert!(!alignable);
        assert!(counts.into_table().expect("Test assertion failed").is_empty());
    }

    #[test]
    fn test_counters_report_words_without_alignments() {
        let mut hard = HardCounts::new();
        let mut posterior = PosteriorCounts::new();
        assert!(!hard.observe_word(&[]).expect("Test assertion failed"));
        assert!(!posterior.observe_word(&[]).expect("Test assertion failed"));

        // hard counts keep impossible paths, posterior counts cannot weight them
        let impossible = [path(&[("b", "b", f64::NEG_INFINITY)])];
        assert!(hard.observe_word(&impossible).expect("Test assertion failed"));
        assert!(!posterior.observe_word(&impossible).expect("Test assertion failed"));
    }
}
