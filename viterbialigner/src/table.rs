//! Letter-to-phone emission tables.
//!
//! An [`EmissionTable`] maps each letter to the phone symbols it may emit and
//! the log-probability of each. Phone symbols are a single phone, the empty
//! phone (the letter is deleted), or a two-phone cluster joined with
//! [`CLUSTER_SEPARATOR`]. A pair that is absent from the table is simply not
//! allowed; lookups return `None` rather than failing.

use std::collections::BTreeMap;
use std::sync::Arc;

use rustfst::fst_impls::VectorFst;
use rustfst::prelude::*;

use crate::error::{AlignError, Result};

/// Phone symbol for a letter that emits nothing.
pub const EMPTY_PHONE: &str = "";

/// Letter symbol that stands in for any letter missing from a table.
pub const OOV_LETTER: &str = "";

/// Joins the two phones of a biphone cluster.
pub const CLUSTER_SEPARATOR: char = '-';

/// Weight given to every allowed pair of an initial table ("allowed but
/// unweighted").
pub const UNWEIGHTED: f64 = 0.0;

/// Input symbol used for [`OOV_LETTER`] when a table is exported as an FST.
pub const OOV_SYMBOL: &str = "<unk>";

/// Build the cluster symbol for two consecutive phones, e.g. `k-s`.
pub fn biphone(first: &str, second: &str) -> String {
    format!("{first}{CLUSTER_SEPARATOR}{second}")
}

/// Learned letter -> {phone symbol -> log-probability} parameters.
///
/// Backed by ordered maps so iteration, export and equality checks are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmissionTable {
    entries: BTreeMap<String, BTreeMap<String, f64>>,
}

impl EmissionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an initial table where every allowed (letter, phone) pair gets
    /// [`UNWEIGHTED`].
    pub fn from_allowed_pairs<I, L, P>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (L, P)>,
        L: Into<String>,
        P: Into<String>,
    {
        let mut table = Self::new();
        for (letter, phone) in pairs {
            table.insert(letter, phone, UNWEIGHTED);
        }
        table
    }

    /// Set the log-probability of a (letter, phone symbol) pair.
    pub fn insert(&mut self, letter: impl Into<String>, phone: impl Into<String>, log_prob: f64) {
        self.entries
            .entry(letter.into())
            .or_default()
            .insert(phone.into(), log_prob);
    }

    /// Replace every entry of `letter` with `phones`. An empty map leaves the
    /// letter present but with nothing allowed.
    pub fn set_letter(&mut self, letter: impl Into<String>, phones: BTreeMap<String, f64>) {
        self.entries.insert(letter.into(), phones);
    }

    /// Log-probability of `phone` for `letter`, or `None` when the pair is not
    /// allowed.
    pub fn get(&self, letter: &str, phone: &str) -> Option<f64> {
        self.entries.get(letter)?.get(phone).copied()
    }

    pub fn contains_letter(&self, letter: &str) -> bool {
        self.entries.contains_key(letter)
    }

    /// The table key to use for `letter`: the letter itself when present,
    /// otherwise [`OOV_LETTER`]. The table is never modified.
    pub fn lookup_symbol<'a>(&self, letter: &'a str) -> &'a str {
        if self.contains_letter(letter) {
            letter
        } else {
            OOV_LETTER
        }
    }

    /// All phone symbols allowed for `letter`.
    pub fn phones(&self, letter: &str) -> Option<&BTreeMap<String, f64>> {
        self.entries.get(letter)
    }

    pub fn letters(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate over every (letter, phone symbol, log-probability) entry.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.entries.iter().flat_map(|(letter, phones)| {
            phones
                .iter()
                .map(move |(phone, lp)| (letter.as_str(), phone.as_str(), *lp))
        })
    }

    /// Number of letters in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the probabilities of every phone symbol of `letter`.
    pub fn letter_mass(&self, letter: &str) -> Option<f64> {
        self.entries
            .get(letter)
            .map(|phones| phones.values().map(|lp| lp.exp()).sum())
    }

    /// True when `letter` can emit something other than the empty phone.
    pub fn has_phone_entries(&self, letter: &str) -> bool {
        self.entries
            .get(letter)
            .is_some_and(|phones| phones.keys().any(|p| p != EMPTY_PHONE))
    }

    /// Renormalize raw occurrence counts in log space:
    /// `log(count) - log(sum of counts for the letter)`.
    ///
    /// Letters without any count get no entry.
    pub fn from_counts(counts: &BTreeMap<String, BTreeMap<String, u64>>) -> Self {
        let mut table = Self::new();
        for (letter, phones) in counts {
            let total: u64 = phones.values().sum();
            if total == 0 {
                continue;
            }
            let letter_total = (total as f64).ln();
            let normalized = phones
                .iter()
                .filter(|(_, &count)| count > 0)
                .map(|(phone, &count)| (phone.clone(), (count as f64).ln() - letter_total))
                .collect();
            table.set_letter(letter.clone(), normalized);
        }
        table
    }

    /// Export as a one-state weighted transducer with letters on the input
    /// side and phone symbols on the output side. Weights are `-log p`, the
    /// empty phone becomes epsilon and disallowed (`-inf`) entries are left
    /// out.
    pub fn to_fst(&self) -> Result<(Arc<SymbolTable>, VectorFst<TropicalWeight>)> {
        let mut symt = SymbolTable::new();
        for (letter, phone, _) in self.iter() {
            symt.add_symbol(fst_letter_symbol(letter));
            if phone != EMPTY_PHONE {
                symt.add_symbol(phone);
            }
        }

        let mut fst = VectorFst::<TropicalWeight>::new();
        let state = fst.add_state();
        fst.set_start(state).map_err(fst_error)?;
        fst.set_final(state, TropicalWeight::one())
            .map_err(fst_error)?;

        for (letter, phone, log_prob) in self.iter() {
            if log_prob == f64::NEG_INFINITY {
                continue;
            }
            let ilabel = symt
                .get_label(fst_letter_symbol(letter))
                .ok_or_else(|| AlignError::Fst(format!("no label for letter {letter:?}")))?;
            let olabel = if phone == EMPTY_PHONE {
                EPS_LABEL
            } else {
                symt.get_label(phone)
                    .ok_or_else(|| AlignError::Fst(format!("no label for phone {phone:?}")))?
            };
            fst.add_tr(state, Tr::new(ilabel, olabel, -log_prob as f32, state))
                .map_err(fst_error)?;
        }

        let symt = Arc::new(symt);
        fst.set_input_symbols(Arc::clone(&symt));
        fst.set_output_symbols(Arc::clone(&symt));
        Ok((symt, fst))
    }
}

fn fst_letter_symbol(letter: &str) -> &str {
    if letter == OOV_LETTER {
        OOV_SYMBOL
    } else {
        letter
    }
}

fn fst_error(e: impl std::fmt::Display) -> AlignError {
    AlignError::Fst(e.to_string())
}
