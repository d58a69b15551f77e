//! Unicode normalization for words and phones read from external files.
//!
//! Words are compared and segmented in NFD (Normalized Form Decomposition),
//! so a precomposed `é` and `e` + combining acute become the same letter.

use unicode_normalization::UnicodeNormalization;

/// Normalize text using NFD (Normalized Form Decomposition).
pub fn nfd_normalize(text: &str) -> String {
    text.nfd().collect()
}

/// Normalize a dictionary headword: trim, lowercase, then NFD.
pub fn normalize_word(word: &str) -> String {
    nfd_normalize(&word.trim().to_lowercase())
}

/// Normalize a phone symbol: trim and lowercase. Stress digits are kept.
pub fn normalize_phone(phone: &str) -> String {
    phone.trim().to_lowercase()
}
