//! # viterbialigner
//!
//! Letter-to-phone alignment for grapheme-to-phoneme training data.
//!
//! Given a word, its pronunciation and an [`EmissionTable`] of allowed
//! letter/phone pairs, an [`AlignmentLattice`] enumerates every way of
//! assigning each letter nothing, one phone, or a two-phone cluster so that
//! both sequences are used up. A [`Trainer`] runs Viterbi-style EM over a
//! whole dictionary to learn the table.
//!
//! ```rust
//! use viterbialigner::{AlignmentLattice, EmissionTable};
//!
//! let table = EmissionTable::from_allowed_pairs([("c", "k"), ("a", "ae"), ("t", "t"), ("e", "")]);
//! let pron: Vec<String> = ["k", "ae", "t"].iter().map(|p| p.to_string()).collect();
//! let lattice = AlignmentLattice::aligned("cate", &pron, &table).unwrap();
//!
//! let best = lattice.best_path().unwrap();
//! assert_eq!(best.display_pairs(), "c:k a:ae t:t e:_");
//! ```

pub mod counts;
pub mod error;
pub mod lattice;
pub mod path;
pub mod table;
pub mod trainer;
pub mod utils;

pub use counts::{Counter, HardCounts, PosteriorCounts};
pub use error::{AlignError, Result};
pub use lattice::{AlignmentLattice, LatticeState, Transition};
pub use path::{render_pairs, AlignmentPath, AlignmentStep, PathStore};
pub use table::{biphone, EmissionTable, CLUSTER_SEPARATOR, EMPTY_PHONE, OOV_LETTER, UNWEIGHTED};
pub use trainer::{
    CountMode, Dictionary, Estimate, IterationReport, Trainer, TrainerConfig, TrainerState,
    TrainingOutcome, WordAlignment, WordAlignments,
};
pub use utils::split_letters;
