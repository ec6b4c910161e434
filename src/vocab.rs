//! Vocabulary selection from unigram counts
//!
//! Word types that occur too rarely do not carry enough statistics to get a
//! meaningful representation. They are all replaced by a single reserved
//! symbol, which keeps the matrix size in check.

use crate::{
    add_counts,
    config::CooccurConfig,
    output::{self, OutputDir},
    Count, Result,
};
use anyhow::Context;
use std::{collections::HashSet, path::Path};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
};

/// Symbol that stands for every rare word type
///
/// Cannot collide with a dataset word, since Google's tokenizer splits
/// punctuation away from words.
pub const RARE_SYMBOL: &str = "<?>";

/// Word type and its occurence count
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct WordCount {
    pub word: Box<str>,
    pub count: Count,
}

/// Set of word types that are frequent enough to be kept
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Vocabulary(HashSet<Box<str>>);
//
impl Vocabulary {
    /// Truth that a word type is part of the vocabulary
    pub fn contains(&self, word: &str) -> bool {
        self.0.contains(word)
    }

    /// Number of kept word types, not including the rare symbol
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Map a token to itself if it's part of the vocabulary, to the rare
    /// symbol otherwise
    pub fn map<'a>(&self, token: &'a str) -> &'a str {
        if self.contains(token) {
            token
        } else {
            RARE_SYMBOL
        }
    }
}
//
impl FromIterator<Box<str>> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = Box<str>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Summary of the unigram counts and of the vocabulary cutoff
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct CorpusStats {
    /// Word types with this many occurences or less are rare
    pub rare_cutoff: Count,

    /// Number of word types
    pub num_types: usize,

    /// Total number of word occurences
    pub total_count: Count,

    /// Number of rare word types
    pub num_rare_types: usize,

    /// Total number of rare word occurences
    pub rare_count: Count,
}
//
impl CorpusStats {
    /// Number of matrix rows that the vocabulary can produce
    ///
    /// Rare words are merged into one rare symbol, which only exists if at
    /// least one word type is rare.
    pub fn reduced_vocabulary_size(&self) -> usize {
        if self.num_rare_types == 0 {
            self.num_types
        } else {
            self.num_types - self.num_rare_types + 1
        }
    }

    /// Percentage of word occurences that are not rare
    pub fn preserved_mass_percent(&self) -> f64 {
        if self.total_count == 0 {
            return 100.0;
        }
        (self.total_count - self.rare_count) as f64 / self.total_count as f64 * 100.0
    }
}

/// Select the vocabulary from the unigram counts of the configuration
///
/// Writes down the word types sorted by decreasing count, and the rare ones.
pub async fn build_vocabulary(
    config: &CooccurConfig,
    output: &OutputDir,
) -> Result<(Vocabulary, CorpusStats)> {
    let mut word_counts = read_word_counts(&config.unigram_path).await?;
    log::info!("Sorting {} word types...", word_counts.len());
    sort_word_counts(&mut word_counts);
    write_word_counts(output, output::SORTED_WORD_TYPES, &word_counts).await?;

    let (vocabulary, stats) = partition(&word_counts, config.rare_cutoff);
    log::info!(
        "{} / {} word types rare (cutoff <= {})",
        stats.num_rare_types,
        stats.num_types,
        stats.rare_cutoff
    );
    let rare_words = word_counts
        .iter()
        .filter(|word_count| word_count.count <= config.rare_cutoff)
        .cloned()
        .collect::<Vec<_>>();
    let rare_file = output::rare_words(&config.vocabulary_signature());
    write_word_counts(output, &rare_file, &rare_words).await?;
    Ok((vocabulary, stats))
}

/// Read word types and their counts from a unigram count file
///
/// Faulty lines are skipped with a warning, but the rare symbol appearing as
/// a word is an error, since its counts would get mixed up with those of rare
/// words.
pub async fn read_word_counts(path: &Path) -> Result<Vec<WordCount>> {
    let context = || format!("reading unigram counts from {}", path.display());
    let file = File::open(path).await.with_context(context)?;
    let mut lines = BufReader::new(file).lines();
    let mut word_counts = Vec::new();
    while let Some(line) = lines.next_line().await.with_context(context)? {
        let Some(word_count) = parse_word_count(&line) else {
            log::warn!("Skipping a faulty line: {line:?}");
            continue;
        };
        anyhow::ensure!(
            &*word_count.word != RARE_SYMBOL,
            "reserved rare word symbol {RARE_SYMBOL} appears in unigram counts from {}",
            path.display()
        );
        word_counts.push(word_count);
    }
    Ok(word_counts)
}

/// Parse a `word count` line, where any whitespace can separate the fields
fn parse_word_count(line: &str) -> Option<WordCount> {
    let mut fields = line.split_whitespace();
    let (Some(word), Some(count), None) = (fields.next(), fields.next(), fields.next()) else {
        return None;
    };
    Some(WordCount {
        word: word.into(),
        count: count.parse().ok()?,
    })
}

/// Sort word types by decreasing count, then by word
pub fn sort_word_counts(word_counts: &mut [WordCount]) {
    word_counts.sort_unstable_by(|lhs, rhs| {
        rhs.count
            .cmp(&lhs.count)
            .then_with(|| lhs.word.cmp(&rhs.word))
    });
}

/// Split word types into the vocabulary and rare words
///
/// A word type is rare if its count is lower than or equal to the cutoff.
pub fn partition(word_counts: &[WordCount], rare_cutoff: Count) -> (Vocabulary, CorpusStats) {
    let mut stats = CorpusStats {
        rare_cutoff,
        num_types: word_counts.len(),
        ..CorpusStats::default()
    };
    let mut vocabulary = Vec::new();
    for WordCount { word, count } in word_counts {
        stats.total_count = add_counts(stats.total_count, *count);
        if *count <= rare_cutoff {
            stats.num_rare_types += 1;
            stats.rare_count = add_counts(stats.rare_count, *count);
        } else {
            vocabulary.push(word.clone());
        }
    }
    (vocabulary.into_iter().collect(), stats)
}

/// Write down word types and counts in a file of the output directory
async fn write_word_counts(
    output: &OutputDir,
    name: &str,
    word_counts: &[WordCount],
) -> Result<()> {
    let mut file = output.create(name).await?;
    write_word_count_lines(&mut file, word_counts)
        .await
        .with_context(|| format!("writing word counts to {name}"))
}

/// Write word types and counts as `word count` lines
async fn write_word_count_lines(
    output: &mut (impl AsyncWrite + Unpin),
    word_counts: &[WordCount],
) -> Result<()> {
    for WordCount { word, count } in word_counts {
        output
            .write_all(format!("{word} {count}\n").as_bytes())
            .await?;
    }
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::fs;

    fn word_count(word: &str, count: Count) -> WordCount {
        WordCount {
            word: word.into(),
            count,
        }
    }

    #[test]
    fn parse_lines() {
        assert_eq!(parse_word_count("the\t10000"), Some(word_count("the", 10000)));
        assert_eq!(parse_word_count("cat 3"), Some(word_count("cat", 3)));
        assert_eq!(parse_word_count("cat"), None);
        assert_eq!(parse_word_count("the cat\t3"), None);
        assert_eq!(parse_word_count("cat lots"), None);
        assert_eq!(parse_word_count(""), None);
    }

    #[test]
    fn sort_by_decreasing_count_then_word() {
        let mut word_counts = vec![
            word_count("b", 5),
            word_count("z", 10),
            word_count("a", 5),
            word_count("c", 1),
        ];
        sort_word_counts(&mut word_counts);
        let words = word_counts.iter().map(|wc| &*wc.word).collect::<Vec<_>>();
        assert_eq!(words, ["z", "a", "b", "c"]);
    }

    #[test]
    fn cutoff_is_inclusive() {
        let word_counts = [word_count("plugh", 4001), word_count("xyzzy", 4000)];
        let (vocabulary, stats) = partition(&word_counts, 4000);
        assert!(vocabulary.contains("plugh"));
        assert!(!vocabulary.contains("xyzzy"));
        assert_eq!(vocabulary.len(), 1);
        assert_eq!(stats.num_rare_types, 1);
        assert_eq!(stats.rare_count, 4000);
        assert_eq!(stats.total_count, 8001);
        assert_eq!(stats.reduced_vocabulary_size(), 2);
    }

    #[test]
    fn no_rare_words_means_no_rare_row() {
        let word_counts = [word_count("the", 10000), word_count("cat", 3)];
        let (vocabulary, stats) = partition(&word_counts, 0);
        assert_eq!(vocabulary.len(), 2);
        assert_eq!(stats.reduced_vocabulary_size(), 2);
        assert_eq!(stats.preserved_mass_percent(), 100.0);
    }

    #[test]
    fn rare_tokens_map_to_rare_symbol() {
        let (vocabulary, _) = partition(&[word_count("the", 10000), word_count("cat", 3)], 3);
        assert_eq!(vocabulary.map("the"), "the");
        assert_eq!(vocabulary.map("cat"), RARE_SYMBOL);
        assert_eq!(vocabulary.map("unseen"), RARE_SYMBOL);
    }

    #[tokio::test]
    async fn vocabulary_files() {
        let dir = tempfile::tempdir().unwrap();
        let unigram_path = dir.path().join("unigrams");
        fs::write(&unigram_path, "cat\t3\nbroken line here\nthe\t10000\ndog\t3\n")
            .await
            .unwrap();
        let config = CooccurConfig {
            unigram_path: unigram_path.into(),
            ngram_path: dir.path().join("ngrams").into(),
            output_dir: dir.path().join("out").into(),
            rare_cutoff: 3,
            bag_of_words: false,
        };
        let output = OutputDir::recreate(&config.output_dir).await.unwrap();

        let (vocabulary, stats) = build_vocabulary(&config, &output).await.unwrap();
        assert_eq!(vocabulary.len(), 1);
        assert!(vocabulary.contains("the"));
        assert_eq!(stats.num_types, 3);
        assert_eq!(stats.total_count, 10006);

        let sorted = fs::read_to_string(output.path(output::SORTED_WORD_TYPES))
            .await
            .unwrap();
        assert_eq!(sorted, "the 10000\ncat 3\ndog 3\n");
        let rare = fs::read_to_string(output.path("rare_words_rare3"))
            .await
            .unwrap();
        assert_eq!(rare, "cat 3\ndog 3\n");
    }

    #[tokio::test]
    async fn rare_symbol_in_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let unigram_path = dir.path().join("unigrams");
        fs::write(&unigram_path, "the\t10\n<?>\t3\n").await.unwrap();
        assert!(read_word_counts(&unigram_path).await.is_err());
    }

    #[tokio::test]
    async fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_word_counts(&dir.path().join("missing")).await.is_err());
    }
}
