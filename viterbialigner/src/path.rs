//! Alignment paths and the per-state containers that hold them.

use itertools::Itertools;

use crate::table::{CLUSTER_SEPARATOR, EMPTY_PHONE};

/// One transition taken through a lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentStep {
    /// Letters consumed before this step (row of the originating state).
    pub row: usize,
    /// Phones consumed before this step (column of the originating state).
    pub col: usize,
    /// Letter consumed, as looked up in the emission table.
    pub letter: String,
    /// Phone symbol emitted: a phone, the empty phone or a biphone cluster.
    pub phone: String,
    /// Log-probability of the path up to and including this step.
    pub log_prob: f64,
}

impl AlignmentStep {
    /// Number of phones this step consumed (0, 1 or 2).
    pub fn phone_count(&self) -> usize {
        if self.phone == EMPTY_PHONE {
            0
        } else {
            self.phone.split(CLUSTER_SEPARATOR).count()
        }
    }
}

/// An ordered sequence of steps, one per consumed letter.
///
/// Paths are never mutated once stored; extending one produces a new path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentPath {
    steps: Vec<AlignmentStep>,
}

impl AlignmentPath {
    /// The empty path every lattice starts from.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cumulative log-probability; 0 for the empty path.
    pub fn log_prob(&self) -> f64 {
        self.steps.last().map_or(0.0, |step| step.log_prob)
    }

    /// Copy of this path with one more step appended.
    pub fn extended(
        &self,
        row: usize,
        col: usize,
        letter: &str,
        phone: &str,
        increment: f64,
    ) -> Self {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.extend_from_slice(&self.steps);
        steps.push(AlignmentStep {
            row,
            col,
            letter: letter.to_string(),
            phone: phone.to_string(),
            log_prob: self.log_prob() + increment,
        });
        Self { steps }
    }

    pub fn steps(&self) -> &[AlignmentStep] {
        &self.steps
    }

    /// Number of letters consumed.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Total number of phones consumed, counting clusters as two.
    pub fn phones_consumed(&self) -> usize {
        self.steps.iter().map(AlignmentStep::phone_count).sum()
    }

    /// The path as ordered (letter, phone symbol) pairs.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.steps
            .iter()
            .map(|step| (step.letter.clone(), step.phone.clone()))
            .collect()
    }

    /// Render as `letter:phone` pairs, see [`render_pairs`].
    pub fn display_pairs(&self) -> String {
        render_pairs(
            self.steps
                .iter()
                .map(|step| (step.letter.as_str(), step.phone.as_str())),
        )
    }
}

/// Render (letter, phone symbol) pairs separated by spaces, with `_` for the
/// empty phone, e.g. `c:k a:ae t:t e:_`.
pub fn render_pairs<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(letter, phone)| {
            let phone = if phone == EMPTY_PHONE { "_" } else { phone };
            format!("{letter}:{phone}")
        })
        .join(" ")
}

/// Candidate paths collected at one lattice state.
///
/// No deduplication is done, so ambiguous words can accumulate many paths.
#[derive(Debug, Clone, Default)]
pub struct PathStore {
    paths: Vec<AlignmentPath>,
}

impl PathStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: AlignmentPath) {
        self.paths.push(path);
    }

    pub fn extend(&mut self, paths: impl IntoIterator<Item = AlignmentPath>) {
        self.paths.extend(paths);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AlignmentPath> {
        self.paths.iter()
    }

    pub fn all_paths(&self) -> &[AlignmentPath] {
        &self.paths
    }

    /// Paths ordered by ascending cumulative log-probability. The sort is
    /// stable, so equal paths keep insertion order.
    pub fn sorted(&self) -> Vec<&AlignmentPath> {
        self.paths
            .iter()
            .sorted_by(|a, b| a.log_prob().total_cmp(&b.log_prob()))
            .collect()
    }

    /// The highest scoring path; among ties, the last one inserted.
    pub fn best_path(&self) -> Option<&AlignmentPath> {
        self.paths
            .iter()
            .max_by(|a, b| a.log_prob().total_cmp(&b.log_prob()))
    }

    pub fn into_paths(self) -> Vec<AlignmentPath> {
        self.paths
    }
}
