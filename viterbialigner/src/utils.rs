use unicode_segmentation::UnicodeSegmentation;

/// Split a word into its letters.
///
/// Letters are extended grapheme clusters, so a base letter and its combining
/// marks (as produced by NFD normalization) stay together as one letter. For
/// plain ASCII words this is one letter per character.
pub fn split_letters(word: &str) -> Vec<String> {
    word.graphemes(true).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_ascii() {
        assert_eq!(split_letters("cat"), vec!["c", "a", "t"]);
    }

    #[test]
    fn test_split_keeps_combining_marks() {
        // e + combining acute accent
        let letters = split_letters("cafe\u{0301}");
        assert_eq!(letters.len(), 4);
        assert_eq!(letters[3], "e\u{0301}");
    }

    #[test]
    fn test_split_empty() {
        assert!(split_letters("").is_empty());
    }
}
