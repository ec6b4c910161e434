//! Accumulation of word-context co-occurrence counts from ngram counts
//!
//! Each ngram is seen as a context window around its center token. The center
//! token is the word, and every other token of the window is one of its
//! contexts. By default, contexts remember their position relative to the
//! center word, so that e.g. "the" right before a word and "the" two tokens
//! after it are different contexts. In bag-of-words mode, positions are
//! discarded instead.

use crate::{
    add_counts,
    config::CooccurConfig,
    ordered::OrderedMap,
    progress::{ProgressConfig, ProgressReport, Work},
    vocab::Vocabulary,
    Count, Result,
};
use anyhow::Context;
use std::{fmt::Write as _, rc::Rc};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};

/// Co-occurrence counts and their marginals
///
/// Words and contexts are numbered in the order where they were first seen in
/// the ngram counts, and these numbers are the final matrix indices.
#[derive(Clone, Debug, Default)]
pub struct Cooccurrences {
    /// Occurence count of each center word
    pub words: OrderedMap<Rc<str>, Count>,

    /// Occurence count of each context
    pub contexts: OrderedMap<Rc<str>, Count>,

    /// For each context, co-occurrence count with each word number
    ///
    /// This is stored context-major because the matrix is eventually written
    /// down in compressed sparse column format, with one column per context.
    pub columns: Vec<OrderedMap<usize, Count>>,

    /// Number of tokens in each ngram
    pub window_size: usize,
}
//
impl Cooccurrences {
    /// Number of nonzero co-occurrence counts
    pub fn num_nonzeros(&self) -> usize {
        self.columns.iter().map(OrderedMap::len).sum()
    }
}

/// Accumulate co-occurrence counts from the ngram counts of the configuration
pub async fn accumulate(
    config: &CooccurConfig,
    vocabulary: &Vocabulary,
    report: &ProgressReport,
) -> Result<Cooccurrences> {
    let path = &config.ngram_path;
    let context = || format!("reading ngram counts from {}", path.display());
    let file = File::open(path).await.with_context(context)?;
    let file_size = file.metadata().await.with_context(context)?.len();
    let progress = report.add(
        "Counting co-occurrences",
        ProgressConfig::new(Work::Bytes(file_size as usize)),
    );

    let mut builder = CooccurrenceBuilder::new(vocabulary, config.bag_of_words);
    let mut lines = BufReader::new(file).lines();
    while let Some(line) = lines.next_line().await.with_context(context)? {
        builder.add_line(&line);
        progress.make_progress(line.len() as u64 + 1);
    }
    let skipped_lines = builder.skipped_lines;
    let cooccurrences = builder.finish().with_context(context)?;
    log::info!(
        "Found {} words and {} contexts in window size {} ({skipped_lines} faulty lines skipped)",
        cooccurrences.words.len(),
        cooccurrences.contexts.len(),
        cooccurrences.window_size,
    );
    Ok(cooccurrences)
}

/// Accumulator of co-occurrence counts
#[derive(Debug)]
pub struct CooccurrenceBuilder<'vocab> {
    /// Words that are not mapped to the rare symbol
    vocabulary: &'vocab Vocabulary,

    /// Truth that contexts should not record their position
    bag_of_words: bool,

    /// Number of tokens per ngram, set by the first well-formed line
    window_size: Option<usize>,

    /// Counts accumulated so far
    words: OrderedMap<Rc<str>, Count>,
    contexts: OrderedMap<Rc<str>, Count>,
    columns: Vec<OrderedMap<usize, Count>>,

    /// Number of lines that were rejected
    skipped_lines: usize,

    /// Scratch space for positional context names
    context_buf: String,
}
//
impl<'vocab> CooccurrenceBuilder<'vocab> {
    /// Set up the accumulator
    pub fn new(vocabulary: &'vocab Vocabulary, bag_of_words: bool) -> Self {
        Self {
            vocabulary,
            bag_of_words,
            window_size: None,
            words: OrderedMap::new(),
            contexts: OrderedMap::new(),
            columns: Vec::new(),
            skipped_lines: 0,
            context_buf: String::new(),
        }
    }

    /// Integrate a `tokens<TAB>count` line from an ngram count file
    ///
    /// Returns truth that the line was accepted. Faulty lines, and lines whose
    /// ngram length differs from that of the first accepted line, are skipped
    /// with a warning.
    pub fn add_line(&mut self, line: &str) -> bool {
        let mut fields = line.split('\t');
        let (Some(ngram), Some(count), None) = (fields.next(), fields.next(), fields.next()) else {
            return self.skip(line, "expected an ngram and a count");
        };
        let Ok(count) = count.trim().parse::<Count>() else {
            return self.skip(line, "count is not an integer");
        };
        let tokens = ngram.split_whitespace().collect::<Vec<_>>();
        if tokens.is_empty() {
            return self.skip(line, "ngram is empty");
        }
        match self.window_size {
            None => self.window_size = Some(tokens.len()),
            Some(window_size) if window_size != tokens.len() => {
                return self.skip(line, "ngram length differs from the first ngram")
            }
            Some(_) => {}
        }
        self.add_ngram(&tokens, count);
        true
    }

    /// Record that a line was rejected
    fn skip(&mut self, line: &str, reason: &str) -> bool {
        log::warn!("Skipping a faulty line ({reason}): {line:?}");
        self.skipped_lines += 1;
        false
    }

    /// Integrate an ngram whose length matches the window size
    fn add_ngram(&mut self, tokens: &[&str], count: Count) {
        let Self {
            vocabulary,
            bag_of_words,
            window_size: _,
            words,
            contexts,
            columns,
            skipped_lines: _,
            context_buf,
        } = self;

        // With an even window size, the center ends the first half
        let center = (tokens.len() - 1) / 2;
        let word = vocabulary.map(tokens[center]);
        let word_idx = words.index_or_insert_with(word, |word| Rc::from(word));
        let word_count = words.value_at_mut(word_idx);
        *word_count = add_counts(*word_count, count);

        for (pos, token) in tokens.iter().enumerate() {
            if pos == center {
                continue;
            }
            let token = vocabulary.map(token);
            let context = if *bag_of_words {
                token
            } else {
                let offset = center as isize - pos as isize;
                context_buf.clear();
                write!(context_buf, "w({offset})={token}")
                    .expect("writing to a String can't fail");
                &context_buf[..]
            };

            let context_idx = contexts.index_or_insert_with(context, |context| Rc::from(context));
            let context_count = contexts.value_at_mut(context_idx);
            *context_count = add_counts(*context_count, count);

            if context_idx == columns.len() {
                columns.push(OrderedMap::new());
            }
            let column = &mut columns[context_idx];
            let row = column.index_or_insert_with(&word_idx, |&word_idx| word_idx);
            let cooccurrence = column.value_at_mut(row);
            *cooccurrence = add_counts(*cooccurrence, count);
        }
    }

    /// Export the accumulated counts
    ///
    /// Fails if no ngram was ever accepted, as the window size is then unknown.
    pub fn finish(self) -> Result<Cooccurrences> {
        let Some(window_size) = self.window_size else {
            anyhow::bail!("no well-formed ngram count was found");
        };
        assert_eq!(
            self.columns.len(),
            self.contexts.len(),
            "every context should have co-occurred with some word"
        );
        anyhow::ensure!(
            self.words.len() <= self.vocabulary.len() + 1,
            "found more distinct words than the vocabulary and rare symbol allow"
        );
        Ok(Cooccurrences {
            words: self.words,
            contexts: self.contexts,
            columns: self.columns,
            window_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::RARE_SYMBOL;

    fn vocabulary(words: &[&str]) -> Vocabulary {
        words.iter().map(|&word| Box::<str>::from(word)).collect()
    }

    fn accumulate_lines(vocabulary: &Vocabulary, bag_of_words: bool, lines: &[&str]) -> Cooccurrences {
        let mut builder = CooccurrenceBuilder::new(vocabulary, bag_of_words);
        for line in lines {
            builder.add_line(line);
        }
        builder.finish().unwrap()
    }

    fn column(cooccurrences: &Cooccurrences, context: &str) -> Vec<(String, Count)> {
        let idx = cooccurrences.contexts.index_of(context).unwrap();
        cooccurrences.columns[idx]
            .iter()
            .map(|(&word_idx, &count)| {
                let (word, _) = cooccurrences.words.entry_at(word_idx);
                (word.to_string(), count)
            })
            .collect()
    }

    #[test]
    fn positional_contexts() {
        let vocabulary = vocabulary(&["a", "the"]);
        let cooc = accumulate_lines(&vocabulary, false, &["a the a\t5"]);
        assert_eq!(cooc.window_size, 3);
        assert_eq!(cooc.words.get("the"), Some(&5));
        assert_eq!(cooc.contexts.len(), 2);
        assert_eq!(cooc.contexts.index_of("w(1)=a"), Some(0));
        assert_eq!(cooc.contexts.index_of("w(-1)=a"), Some(1));
        assert_eq!(column(&cooc, "w(1)=a"), [("the".to_string(), 5)]);
        assert_eq!(column(&cooc, "w(-1)=a"), [("the".to_string(), 5)]);
        assert_eq!(cooc.num_nonzeros(), 2);
    }

    #[test]
    fn bag_of_words_contexts() {
        let vocabulary = vocabulary(&["a", "the"]);
        let cooc = accumulate_lines(&vocabulary, true, &["a the a\t5"]);
        assert_eq!(cooc.contexts.len(), 1);
        assert_eq!(cooc.contexts.get("a"), Some(&10));
        assert_eq!(column(&cooc, "a"), [("the".to_string(), 10)]);
    }

    #[test]
    fn unknown_tokens_become_rare() {
        let vocabulary = vocabulary(&["the"]);
        let cooc = accumulate_lines(&vocabulary, false, &["x the y\t1", "the x the\t2"]);
        assert_eq!(cooc.words.get("the"), Some(&1));
        assert_eq!(cooc.words.get(RARE_SYMBOL), Some(&2));
        assert_eq!(cooc.contexts.get("w(1)=<?>"), Some(&1));
        assert_eq!(cooc.contexts.get("w(-1)=<?>"), Some(&1));
        assert_eq!(cooc.contexts.get("w(1)=the"), Some(&2));
        assert_eq!(column(&cooc, "w(-1)=the"), [(RARE_SYMBOL.to_string(), 2)]);
    }

    #[test]
    fn even_window_center_ends_first_half() {
        let vocabulary = vocabulary(&["a", "b", "c", "d"]);
        let cooc = accumulate_lines(&vocabulary, false, &["a b c d\t1"]);
        assert_eq!(cooc.window_size, 4);
        assert_eq!(cooc.words.get("b"), Some(&1));
        let contexts = cooc
            .contexts
            .iter()
            .map(|(context, _)| &**context)
            .collect::<Vec<_>>();
        assert_eq!(contexts, ["w(1)=a", "w(-1)=c", "w(-2)=d"]);
    }

    #[test]
    fn counts_accumulate_in_first_seen_order() {
        let vocabulary = vocabulary(&["a", "b", "c"]);
        let cooc = accumulate_lines(
            &vocabulary,
            true,
            &["a b c\t1", "c a b\t2", "a b a\t3"],
        );
        let words = cooc.words.iter().map(|(w, &c)| (&**w, c)).collect::<Vec<_>>();
        assert_eq!(words, [("b", 4), ("a", 2)]);
        let contexts = cooc.contexts.iter().map(|(c, &n)| (&**c, n)).collect::<Vec<_>>();
        assert_eq!(contexts, [("a", 7), ("c", 3), ("b", 2)]);
        assert_eq!(column(&cooc, "a"), [("b".to_string(), 7)]);
        assert_eq!(
            column(&cooc, "c"),
            [("b".to_string(), 1), ("a".to_string(), 2)]
        );
        assert_eq!(column(&cooc, "b"), [("a".to_string(), 2)]);
        assert_eq!(cooc.num_nonzeros(), 4);
    }

    #[test]
    fn faulty_lines_are_skipped() {
        let vocabulary = vocabulary(&["a", "b", "c"]);
        let mut builder = CooccurrenceBuilder::new(&vocabulary, false);
        assert!(!builder.add_line("a b c"));
        assert!(!builder.add_line("a b c\tmany"));
        assert!(!builder.add_line("\t3"));
        assert!(!builder.add_line("a b c\t1\t2"));
        assert!(builder.add_line("a b c\t1"));
        assert!(!builder.add_line("a b\t1"));
        assert!(!builder.add_line("a b c d e\t1"));
        assert!(builder.add_line("c b a\t1"));
        assert_eq!(builder.skipped_lines, 6);
        let cooc = builder.finish().unwrap();
        assert_eq!(cooc.window_size, 3);
        assert_eq!(cooc.words.get("b"), Some(&2));
    }

    #[test]
    fn empty_input_is_an_error() {
        let vocabulary = vocabulary(&["a"]);
        let mut builder = CooccurrenceBuilder::new(&vocabulary, false);
        builder.add_line("garbage");
        assert!(builder.finish().is_err());
    }
}
