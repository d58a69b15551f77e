//! Alignment lattices.
//!
//! For a word of `n` letters and a pronunciation of `m` phones the lattice has
//! `(n + 1) * (m + 1)` states. State `(row, col)` stands for "the last
//! `n - row` letters and the last `m - col` phones remain". Paths enter at
//! `(0, 0)` and every complete alignment ends at the terminal state `(n, m)`.
//!
//! Each transition consumes exactly one letter:
//!
//! * deletion: the letter emits the empty phone, `(r, c) -> (r + 1, c)`
//! * diagonal: the letter emits one phone, `(r, c) -> (r + 1, c + 1)`
//! * biphone: the letter emits a two-phone cluster, `(r, c) -> (r + 1, c + 2)`
//!
//! Paths are pushed forward row by row, so a state's paths are complete before
//! it is expanded. All paths are kept, not only the best one.

use tracing::trace;

use crate::error::{AlignError, Result};
use crate::path::{AlignmentPath, PathStore};
use crate::table::{biphone, EmissionTable, CLUSTER_SEPARATOR, EMPTY_PHONE};
use crate::utils::split_letters;

/// One node of the lattice and the paths that currently reach it.
#[derive(Debug, Clone, Default)]
pub struct LatticeState {
    /// Letters consumed to reach this state.
    pub row: usize,
    /// Phones consumed to reach this state.
    pub col: usize,
    paths: PathStore,
}

impl LatticeState {
    pub fn paths(&self) -> &PathStore {
        &self.paths
    }
}

/// Kinds of transition out of a lattice state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Deletion,
    Diagonal,
    Biphone,
}

impl Transition {
    /// Phones consumed by the transition.
    pub fn width(self) -> usize {
        match self {
            Transition::Deletion => 0,
            Transition::Diagonal => 1,
            Transition::Biphone => 2,
        }
    }
}

/// The full state grid for one (word, pronunciation) pair.
#[derive(Debug)]
pub struct AlignmentLattice<'t> {
    letters: Vec<String>,
    pronunciation: Vec<String>,
    table: &'t EmissionTable,
    states: Vec<LatticeState>,
    aligned: bool,
}

impl<'t> AlignmentLattice<'t> {
    /// Build the grid for `word` and `pronunciation`, seeding the initial
    /// state with the empty path.
    ///
    /// Fails if a phone is empty or contains the cluster separator, since such
    /// a phone cannot be told apart from a deletion or a cluster.
    pub fn new(word: &str, pronunciation: &[String], table: &'t EmissionTable) -> Result<Self> {
        Self::from_letters(split_letters(word), pronunciation, table)
    }

    /// Like [`AlignmentLattice::new`], for a word already split into letters.
    pub fn from_letters(
        letters: Vec<String>,
        pronunciation: &[String],
        table: &'t EmissionTable,
    ) -> Result<Self> {
        if let Some(bad) = pronunciation
            .iter()
            .find(|p| p.is_empty() || p.contains(CLUSTER_SEPARATOR))
        {
            return Err(AlignError::MalformedPhone { phone: bad.clone() });
        }

        let width = pronunciation.len() + 1;
        let mut states = Vec::with_capacity((letters.len() + 1) * width);
        for row in 0..=letters.len() {
            for col in 0..width {
                states.push(LatticeState {
                    row,
                    col,
                    paths: PathStore::new(),
                });
            }
        }
        states[0].paths.push(AlignmentPath::new());

        Ok(Self {
            letters,
            pronunciation: pronunciation.to_vec(),
            table,
            states,
            aligned: false,
        })
    }

    /// Build and propagate in one go.
    pub fn aligned(word: &str, pronunciation: &[String], table: &'t EmissionTable) -> Result<Self> {
        let mut lattice = Self::new(word, pronunciation, table)?;
        lattice.align();
        Ok(lattice)
    }

    pub fn letters(&self) -> &[String] {
        &self.letters
    }

    pub fn pronunciation(&self) -> &[String] {
        &self.pronunciation
    }

    fn index(&self, row: usize, col: usize) -> usize {
        row * (self.pronunciation.len() + 1) + col
    }

    /// State with `row` letters and `col` phones consumed.
    pub fn state(&self, row: usize, col: usize) -> Option<&LatticeState> {
        if row > self.letters.len() || col > self.pronunciation.len() {
            return None;
        }
        self.states.get(self.index(row, col))
    }

    /// Unconsumed letters at `state`.
    pub fn remaining_letters(&self, state: &LatticeState) -> &[String] {
        &self.letters[state.row..]
    }

    /// Unconsumed phones at `state`.
    pub fn remaining_phones(&self, state: &LatticeState) -> &[String] {
        &self.pronunciation[state.col..]
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// The state where both word and pronunciation are used up.
    pub fn terminal(&self) -> &LatticeState {
        &self.states[self.states.len() - 1]
    }

    /// Push every path forward to the terminal state. Calling this again is a
    /// no-op.
    pub fn align(&mut self) {
        if self.aligned {
            return;
        }
        let num_phones = self.pronunciation.len();
        for row in 0..self.letters.len() {
            for col in 0..=num_phones {
                self.expand(row, col);
            }
        }
        self.aligned = true;
        trace!(
            word = %self.letters.concat(),
            complete = self.terminal().paths.len(),
            "lattice aligned"
        );
    }

    /// Extend the paths of `(row, col)` along every available transition, in
    /// the order deletion, diagonal, biphone.
    fn expand(&mut self, row: usize, col: usize) {
        let idx = self.index(row, col);
        if self.states[idx].paths.is_empty() {
            return;
        }

        let symbol = self.table.lookup_symbol(&self.letters[row]);
        let remaining_phones = self.pronunciation.len() - col;

        for transition in [Transition::Deletion, Transition::Diagonal, Transition::Biphone] {
            if transition.width() > remaining_phones {
                continue;
            }
            let phone = match transition {
                Transition::Deletion => EMPTY_PHONE.to_string(),
                Transition::Diagonal => self.pronunciation[col].clone(),
                Transition::Biphone => {
                    biphone(&self.pronunciation[col], &self.pronunciation[col + 1])
                }
            };
            let Some(increment) = self.table.get(symbol, &phone) else {
                continue;
            };

            let succ = self.index(row + 1, col + transition.width());
            // successors always sit in a later row, so they live after idx
            let (head, tail) = self.states.split_at_mut(idx + 1);
            let current = &head[idx];
            let target = &mut tail[succ - idx - 1];
            target.paths.extend(
                current
                    .paths
                    .iter()
                    .map(|path| path.extended(row, col, symbol, &phone, increment)),
            );
        }
    }

    /// Every complete alignment, possibly none.
    pub fn all_paths(&self) -> &[AlignmentPath] {
        self.terminal().paths.all_paths()
    }

    /// The complete alignment with the highest log-probability, if any.
    pub fn best_path(&self) -> Option<&AlignmentPath> {
        self.terminal().paths.best_path()
    }

    /// Consume the lattice, keeping only the complete alignments.
    pub fn into_paths(mut self) -> Vec<AlignmentPath> {
        let terminal = self.states.len() - 1;
        std::mem::take(&mut self.states[terminal].paths).into_paths()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phones(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    fn cat_table() -> EmissionTable {
        let mut table = EmissionTable::new();
        table.insert("c", "k", -0.1);
        table.insert("a", "ae", -0.2);
        table.insert("t", "t", -0.3);
        for letter in ["c", "a", "t"] {
            table.insert(letter, EMPTY_PHONE, f64::NEG_INFINITY);
        }
        table
    }

    #[test]
    fn test_grid_size_and_seed() {
        let table = cat_table();
        let lattice = AlignmentLattice::new("cat", &phones("k ae t"), &table)
            .expect("Failed to build lattice in test");
        assert_eq!(lattice.num_states(), 16);
        let start = lattice.state(0, 0).expect("Test assertion failed");
        assert_eq!(start.paths().len(), 1);
        assert_eq!(lattice.remaining_letters(start), &["c", "a", "t"]);
        assert_eq!(lattice.remaining_phones(lattice.terminal()).len(), 0);
        assert!(lattice.state(4, 0).is_none());
    }

    #[test]
    fn test_cat_best_path() {
        let table = cat_table();
        let lattice = AlignmentLattice::aligned("cat", &phones("k ae t"), &table)
            .expect("Failed to build lattice in test");
        let best = lattice.best_path().expect("Test assertion failed");
        assert_eq!(
            best.pairs(),
            vec![
                ("c".to_string(), "k".to_string()),
                ("a".to_string(), "ae".to_string()),
                ("t".to_string(), "t".to_string()),
            ]
        );
        assert!((best.log_prob() - (-0.6)).abs() < 1e-12);
        // the deletion paths still exist, they are just impossible
        assert!(lattice
            .all_paths()
            .iter()
            .all(|p| p.log_prob() == f64::NEG_INFINITY || p == best));
    }

    #[test]
    fn test_biphone_transition() {
        let mut table = EmissionTable::new();
        table.insert("x", "k-s", -0.5);
        table.insert("x", "k", -1.0);
        table.insert("e", EMPTY_PHONE, -0.1);
        table.insert("e", "s", -2.0);
        let lattice = AlignmentLattice::aligned("xe", &phones("k s"), &table)
            .expect("Failed to build lattice in test");
        let paths = lattice.all_paths();
        assert_eq!(paths.len(), 2);
        let best = lattice.best_path().expect("Test assertion failed");
        assert_eq!(best.display_pairs(), "x:k-s e:_");
        for path in paths {
            assert_eq!(path.len(), 2);
            assert_eq!(path.phones_consumed(), 2);
        }
    }

    #[test]
    fn test_unknown_letter_uses_oov_symbol() {
        let mut table = EmissionTable::new();
        table.insert("a", "ey", 0.0);
        table.insert("", EMPTY_PHONE, 0.0);
        let lattice = AlignmentLattice::aligned("'a", &phones("ey"), &table)
            .expect("Failed to build lattice in test");
        let best = lattice.best_path().expect("Test assertion failed");
        assert_eq!(best.steps()[0].letter, "");
        assert_eq!(best.steps()[0].phone, EMPTY_PHONE);
        assert!(!table.contains_letter("'"));
    }

    #[test]
    fn test_unknown_letter_without_oov_entry_is_unalignable() {
        let mut table = EmissionTable::new();
        table.insert("a", "ey", 0.0);
        let lattice = AlignmentLattice::aligned("'a", &phones("ey"), &table)
            .expect("Failed to build lattice in test");
        assert!(lattice.all_paths().is_empty());
        assert!(lattice.best_path().is_none());
    }

    #[test]
    fn test_phone_without_letter_is_unalignable() {
        let table = EmissionTable::from_allowed_pairs([("a", "ae"), ("a", "")]);
        let lattice = AlignmentLattice::aligned("a", &phones("ae ae"), &table)
            .expect("Failed to build lattice in test");
        assert!(lattice.all_paths().is_empty());
    }

    #[test]
    fn test_empty_word_and_pronunciation() {
        let table = EmissionTable::new();
        let lattice = AlignmentLattice::aligned("", &[], &table)
            .expect("Failed to build lattice in test");
        assert_eq!(lattice.all_paths().len(), 1);
        let only = &lattice.all_paths()[0];
        assert!(only.is_empty());
        assert_eq!(only.log_prob(), 0.0);
    }

    #[test]
    fn test_malformed_phone_rejected() {
        let table = EmissionTable::new();
        let err = AlignmentLattice::new("ab", &phones("k-s"), &table).unwrap_err();
        assert_eq!(
            err,
            AlignError::MalformedPhone {
                phone: "k-s".to_string()
            }
        );
        let err = AlignmentLattice::new("ab", &["".to_string()], &table).unwrap_err();
        assert!(matches!(err, AlignError::MalformedPhone { .. }));
    }

    #[test]
    fn test_enumerates_all_segmentations() {
        // every letter may delete or emit "p"; "pp" -> "p" has two alignments
        let table = EmissionTable::from_allowed_pairs([("p", "p"), ("p", "")]);
        let lattice = AlignmentLattice::aligned("pp", &phones("p"), &table)
            .expect("Failed to build lattice in test");
        let rendered: Vec<String> = lattice
            .all_paths()
            .iter()
            .map(AlignmentPath::display_pairs)
            .collect();
        assert_eq!(rendered, vec!["p:_ p:p", "p:p p:_"]);
    }
}
