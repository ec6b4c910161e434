//! Detection of grammar-tagged ngrams
//!
//! Starting with its 2012 edition, the Google Books Ngram dataset carries
//! part-of-speech tagged variants of every ngram (e.g. `dog_NOUN` or
//! `_VERB_`) alongside the untagged ones. The tagged variants are redundant
//! with the plain counts, so any ngram that contains one of them must be
//! thrown away as a whole rather than stripped.

/// Substrings that identify a token carrying a grammar tag
///
/// A tagged token either reads `word_TAG` or `_TAG_`, so looking for `_TAG`
/// anywhere in the token catches both forms.
pub const ANNOTATION_MARKERS: [&str; 12] = [
    "_NOUN", "_VERB", "_ADJ", "_ADV", "_PRON", "_DET", "_ADP", "_NUM", "_CONJ", "_PRT", "_.",
    "_X",
];

/// Truth that a single token carries a grammar tag
pub fn is_annotated_token(token: &str) -> bool {
    ANNOTATION_MARKERS
        .iter()
        .any(|marker| token.contains(marker))
}

/// Truth that an ngram contains at least one grammar-tagged token
///
/// Stops looking at the first tagged token.
pub fn is_annotated(ngram: &str) -> bool {
    ngram.split_whitespace().any(is_annotated_token)
}
