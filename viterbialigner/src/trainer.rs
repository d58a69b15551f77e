//! Viterbi-style EM over a pronunciation dictionary.
//!
//! Each iteration aligns every dictionary entry against the current
//! [`EmissionTable`] (E-step), collects every complete alignment, and builds a
//! fresh table from occurrence counts (M-step). Training stops when a new
//! table is identical to the previous one (`Converged`) or when the iteration
//! budget runs out (`Exhausted`).
//!
//! Words are always visited in sorted order and per-word results are merged
//! in that order, so a run is reproducible bit for bit whether or not the
//! E-step runs in parallel.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::counts::{Counter, HardCounts, PosteriorCounts};
use crate::error::{AlignError, Result};
use crate::lattice::AlignmentLattice;
use crate::path::{render_pairs, AlignmentPath};
use crate::table::{EmissionTable, CLUSTER_SEPARATOR};
use crate::utils::split_letters;

/// Word -> pronunciation (a sequence of phone symbols).
pub type Dictionary = BTreeMap<String, Vec<String>>;

/// How the M-step turns alignments into counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountMode {
    /// Every occurrence on every complete alignment counts 1.
    #[default]
    Hard,
    /// Occurrences are weighted by the alignment's posterior within its word.
    Posterior,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    /// Maximum number of E/M iterations.
    pub max_iterations: usize,
    pub count_mode: CountMode,
    /// Evaluate the lattices of different words on the rayon thread pool.
    pub parallel: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            count_mode: CountMode::Hard,
            parallel: true,
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(AlignError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Initializing,
    RunningEStep,
    RunningMStep,
    /// Re-estimation left the table unchanged.
    Converged,
    /// The iteration budget was used up first.
    Exhausted,
}

impl TrainerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TrainerState::Converged | TrainerState::Exhausted)
    }
}

/// Complete alignments found for one word during an E-step.
#[derive(Debug, Clone)]
pub struct WordAlignments {
    pub word: String,
    pub paths: Vec<AlignmentPath>,
}

/// Summary of one EM iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    /// 1-based iteration number.
    pub iteration: usize,
    /// Sum of the final log-probability of every non-empty alignment.
    pub log_likelihood: f64,
    /// Complete alignments enumerated over the whole dictionary.
    pub num_alignments: usize,
    pub aligned_words: usize,
    /// Words with no complete alignment under the table used for this
    /// iteration; they contributed no counts.
    pub unalignable_words: Vec<String>,
    /// Dictionary letters the re-estimated table has no entry for.
    pub degenerate_letters: Vec<String>,
    /// The re-estimated table equals the previous one.
    pub converged: bool,
}

/// Best alignment of one dictionary word as (letter, phone symbol) pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct WordAlignment {
    pub word: String,
    /// Empty when the word cannot be aligned.
    pub pairs: Vec<(String, String)>,
    pub log_prob: Option<f64>,
}

impl WordAlignment {
    pub fn is_aligned(&self) -> bool {
        self.log_prob.is_some()
    }

    pub fn display_pairs(&self) -> String {
        render_pairs(self.pairs.iter().map(|(l, p)| (l.as_str(), p.as_str())))
    }
}

/// Output of one M-step.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    /// The re-estimated table.
    pub table: EmissionTable,
    pub log_likelihood: f64,
    /// Words that contributed no counts: no complete alignment, or (posterior
    /// counts) only alignments of probability 0.
    pub unalignable_words: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingOutcome {
    pub state: TrainerState,
    pub iterations: usize,
}

/// Owns the dictionary, the table history and the per-iteration statistics of
/// one training run.
#[derive(Debug)]
pub struct Trainer {
    dictionary: Dictionary,
    letters: BTreeSet<String>,
    config: TrainerConfig,
    history: Vec<EmissionTable>,
    log_likelihoods: Vec<f64>,
    reports: Vec<IterationReport>,
    state: TrainerState,
}

impl Trainer {
    /// Set up a run with `initial` as iteration 0.
    ///
    /// Fails on an invalid configuration or on a pronunciation that contains
    /// a phone no lattice can represent.
    pub fn new(dictionary: Dictionary, initial: EmissionTable, config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        for pronunciation in dictionary.values() {
            if let Some(bad) = pronunciation
                .iter()
                .find(|p| p.is_empty() || p.contains(CLUSTER_SEPARATOR))
            {
                return Err(AlignError::MalformedPhone { phone: bad.clone() });
            }
        }
        let letters = dictionary.keys().flat_map(|w| split_letters(w)).collect();

        Ok(Self {
            dictionary,
            letters,
            config,
            history: vec![initial],
            log_likelihoods: Vec::new(),
            reports: Vec::new(),
            state: TrainerState::Initializing,
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    /// The most recent table (the initial table before any iteration).
    pub fn current_table(&self) -> &EmissionTable {
        // history always holds at least the initial table
        &self.history[self.history.len() - 1]
    }

    /// Every distinct table so far, starting with the initial one.
    pub fn history(&self) -> &[EmissionTable] {
        &self.history
    }

    pub fn log_likelihoods(&self) -> &[f64] {
        &self.log_likelihoods
    }

    pub fn reports(&self) -> &[IterationReport] {
        &self.reports
    }

    /// Number of E/M iterations run so far.
    pub fn iterations(&self) -> usize {
        self.reports.len()
    }

    /// Apply `f` to every dictionary entry in sorted order, in parallel when
    /// configured. Output order always follows the dictionary.
    fn map_words<T, F>(&self, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&str, &[String]) -> Result<T> + Sync + Send,
    {
        let entries: Vec<(&String, &Vec<String>)> = self.dictionary.iter().collect();
        if self.config.parallel {
            entries
                .par_iter()
                .map(|(word, pron)| f(word, pron))
                .collect()
        } else {
            entries.iter().map(|(word, pron)| f(word, pron)).collect()
        }
    }

    /// Align every dictionary word against `table` and keep all complete
    /// alignments.
    pub fn e_step(&self, table: &EmissionTable) -> Result<Vec<WordAlignments>> {
        self.map_words(|word, pronunciation| {
            let paths = AlignmentLattice::aligned(word, pronunciation, table)?.into_paths();
            debug!(word, alignments = paths.len(), "aligned word");
            Ok(WordAlignments {
                word: word.to_string(),
                paths,
            })
        })
    }

    /// Re-estimate a table from E-step output.
    pub fn m_step(&self, alignments: &[WordAlignments]) -> Result<Estimate> {
        match self.config.count_mode {
            CountMode::Hard => collect_counts(HardCounts::new(), alignments),
            CountMode::Posterior => collect_counts(PosteriorCounts::new(), alignments),
        }
    }

    /// Run one full E-step/M-step iteration and return the resulting state.
    pub fn step(&mut self) -> Result<TrainerState> {
        if self.state.is_terminal() {
            return Err(AlignError::AlreadyFinished);
        }

        self.state = TrainerState::RunningEStep;
        let alignments = self.e_step(self.current_table())?;

        self.state = TrainerState::RunningMStep;
        let Estimate {
            table,
            log_likelihood,
            unalignable_words,
        } = self.m_step(&alignments)?;
        self.log_likelihoods.push(log_likelihood);

        // a letter served by the OOV row only loses its mass with that row
        let previous = self.current_table();
        let degenerate_letters: Vec<String> = self
            .letters
            .iter()
            .filter(|letter| !table.contains_letter(previous.lookup_symbol(letter)))
            .cloned()
            .collect();
        let converged = table == *self.current_table();
        let iteration = self.reports.len() + 1;

        info!(
            iteration,
            log_likelihood,
            aligned = alignments.len() - unalignable_words.len(),
            unalignable = unalignable_words.len(),
            "EM iteration complete"
        );
        if !degenerate_letters.is_empty() {
            warn!(
                iteration,
                letters = ?degenerate_letters,
                "letters lost all probability mass"
            );
        }

        self.reports.push(IterationReport {
            iteration,
            log_likelihood,
            num_alignments: alignments.iter().map(|wa| wa.paths.len()).sum(),
            aligned_words: alignments.len() - unalignable_words.len(),
            unalignable_words,
            degenerate_letters,
            converged,
        });

        self.state = if converged {
            info!(iteration, "table converged");
            TrainerState::Converged
        } else {
            self.history.push(table);
            if iteration >= self.config.max_iterations {
                warn!(iteration, "iteration budget exhausted before convergence");
                TrainerState::Exhausted
            } else {
                TrainerState::RunningEStep
            }
        };
        Ok(self.state)
    }

    /// Iterate until `Converged` or `Exhausted`.
    pub fn run(&mut self) -> Result<TrainingOutcome> {
        while !self.state.is_terminal() {
            self.step()?;
        }
        Ok(TrainingOutcome {
            state: self.state,
            iterations: self.iterations(),
        })
    }

    /// Best alignment of every dictionary word under the current table.
    pub fn best_alignments(&self) -> Result<Vec<WordAlignment>> {
        self.best_alignments_with(self.current_table())
    }

    /// Best alignment of every dictionary word under `table`.
    pub fn best_alignments_with(&self, table: &EmissionTable) -> Result<Vec<WordAlignment>> {
        self.map_words(|word, pronunciation| {
            let lattice = AlignmentLattice::aligned(word, pronunciation, table)?;
            let best = lattice.best_path();
            Ok(WordAlignment {
                word: word.to_string(),
                pairs: best.map(AlignmentPath::pairs).unwrap_or_default(),
                log_prob: best.map(AlignmentPath::log_prob),
            })
        })
    }

    /// Words that have no complete alignment under `table`.
    pub fn unalignable_words(&self, table: &EmissionTable) -> Result<Vec<String>> {
        let flags = self.map_words(|word, pronunciation| {
            let lattice = AlignmentLattice::aligned(word, pronunciation, table)?;
            Ok(lattice.all_paths().is_empty().then(|| word.to_string()))
        })?;
        Ok(flags.into_iter().flatten().collect())
    }
}

fn collect_counts<C: Counter>(mut counter: C, alignments: &[WordAlignments]) -> Result<Estimate> {
    let mut unalignable_words = Vec::new();
    for word in alignments {
        if !counter.observe_word(&word.paths)? {
            unalignable_words.push(word.word.clone());
        }
    }
    let log_likelihood = counter.log_likelihood();
    Ok(Estimate {
        table: counter.into_table()?,
        log_likelihood,
        unalignable_words,
    })
}
