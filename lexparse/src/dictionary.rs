//! CMUdict-style pronunciation dictionaries.
//!
//! ```text
//! ;;; comment
//! CAT  K AE1 T
//! TOMATO  T AH0 M EY1 T OW2
//! TOMATO(2)  T AH0 M AA1 T OW2
//! ```

use std::io::BufRead;

use anyhow::{Context, Result};
use tracing::{debug, info};
use viterbialigner::trainer::Dictionary;

use crate::normalize::{normalize_phone, normalize_word};

/// Comment marker at the start of a dictionary line.
pub const COMMENT_PREFIX: &str = ";;;";

/// Read a dictionary with one `WORD PH1 PH2 ...` entry per line.
///
/// Comment and blank lines are skipped. Only the first pronunciation of a
/// word is kept, so numbered variants such as `WORD(2)` never replace it.
/// Words are lower-cased and NFD-normalized, phones lower-cased; stress
/// digits stay part of the phone.
pub fn read_dictionary<R: BufRead>(reader: R) -> Result<Dictionary> {
    let mut dictionary = Dictionary::new();
    let mut variants = 0usize;

    for (i, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading dictionary line {}", i + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with(COMMENT_PREFIX) {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(headword) = fields.next() else {
            continue;
        };
        if variant_base(headword).is_some() {
            variants += 1;
            continue;
        }
        let word = normalize_word(headword);
        let pronunciation: Vec<String> = fields.map(normalize_phone).collect();
        if dictionary.contains_key(&word) {
            debug!(word, line = i + 1, "keeping first pronunciation");
            continue;
        }
        dictionary.insert(word, pronunciation);
    }

    info!(words = dictionary.len(), variants, "read dictionary");
    Ok(dictionary)
}

/// For a numbered variant headword like `tomato(2)`, the base word.
fn variant_base(headword: &str) -> Option<&str> {
    let (base, rest) = headword.split_once('(')?;
    let number = rest.strip_suffix(')')?;
    if base.is_empty() || number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CMU: &str = ";;; sample\n\
        CAT  K AE1 T\n\
        \n\
        TOMATO  T AH0 M EY1 T OW2\n\
        TOMATO(2)  T AH0 M AA1 T OW2\n\
        CAFÉ  K AE0 F EY1\n";

    #[test]
    fn test_read_dictionary() {
        let dict = read_dictionary(CMU.as_bytes()).expect("Failed to read dictionary in test");
        assert_eq!(dict.len(), 3);
        assert_eq!(dict["cat"], vec!["k", "ae1", "t"]);
        assert_eq!(dict["tomato"], vec!["t", "ah0", "m", "ey1", "t", "ow2"]);
        assert!(dict.contains_key("cafe\u{0301}"));
        assert!(!dict.contains_key("tomato(2)"));
    }

    #[test]
    fn test_first_pronunciation_wins() {
        let data = "READ  R IY1 D\nREAD  R EH1 D\n";
        let dict = read_dictionary(data.as_bytes()).expect("Failed to read dictionary in test");
        assert_eq!(dict["read"], vec!["r", "iy1", "d"]);
    }

    #[test]
    fn test_headword_without_phones() {
        let data = "H\n";
        let dict = read_dictionary(data.as_bytes()).expect("Failed to read dictionary in test");
        assert_eq!(dict["h"], Vec::<String>::new());
    }

    #[test]
    fn test_variant_base() {
        assert_eq!(variant_base("tomato(2)"), Some("tomato"));
        assert_eq!(variant_base("tomato(12)"), Some("tomato"));
        assert_eq!(variant_base("tomato"), None);
        assert_eq!(variant_base("(2)"), None);
        assert_eq!(variant_base("a(b)"), None);
        assert_eq!(variant_base("a()"), None);
    }
}
