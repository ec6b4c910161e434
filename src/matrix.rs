//! Serialization of the co-occurrence matrix and of its dictionaries
//!
//! The matrix is written in the sparse text format of SVDLIBC: a header line
//! with the number of rows, columns and nonzero entries, then for each column
//! the number of nonzero entries in that column followed by one line per
//! entry with its row index and value. Rows are words and columns are
//! contexts.

use crate::{
    config::CooccurConfig,
    cooccur::Cooccurrences,
    ordered::OrderedMap,
    output::{self, OutputDir},
    progress::{ProgressConfig, ProgressReport, Work},
    Count, Result,
};
use anyhow::Context;
use std::rc::Rc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Dimensions of the co-occurrence matrix
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct MatrixStats {
    /// Number of rows
    pub num_words: usize,

    /// Number of columns
    pub num_contexts: usize,

    /// Number of nonzero entries
    pub num_nonzeros: usize,
}

/// Write down the co-occurrence matrix, dictionaries and marginal counts
pub async fn write_matrix(
    config: &CooccurConfig,
    cooccurrences: &Cooccurrences,
    output: &OutputDir,
    report: &ProgressReport,
) -> Result<MatrixStats> {
    let vocabulary_signature = config.vocabulary_signature();
    let context_signature = config.context_signature(cooccurrences.window_size);

    let name = output::word_dictionary(&vocabulary_signature);
    let mut file = output.create(&name).await?;
    write_dictionary(&mut file, &cooccurrences.words)
        .await
        .with_context(|| format!("writing word dictionary {name}"))?;

    let name = output::word_counts(&vocabulary_signature);
    let mut file = output.create(&name).await?;
    write_marginals(&mut file, &cooccurrences.words)
        .await
        .with_context(|| format!("writing word counts {name}"))?;

    let name = output::context_dictionary(&context_signature);
    let mut file = output.create(&name).await?;
    write_dictionary(&mut file, &cooccurrences.contexts)
        .await
        .with_context(|| format!("writing context dictionary {name}"))?;

    let name = output::context_counts(&context_signature);
    let mut file = output.create(&name).await?;
    write_marginals(&mut file, &cooccurrences.contexts)
        .await
        .with_context(|| format!("writing context counts {name}"))?;

    let progress = report.add(
        "Writing co-occurrence matrix",
        ProgressConfig::new(Work::PercentSteps(cooccurrences.columns.len())),
    );
    let name = output::cooccurrence_matrix(&context_signature);
    let mut file = output.create(&name).await?;
    let stats = write_sparse_matrix(&mut file, cooccurrences, || {
        progress.make_progress(1);
    })
    .await
    .with_context(|| format!("writing co-occurrence matrix {name}"))?;
    log::info!(
        "Wrote {} x {} matrix ({} nonzeros)",
        stats.num_words,
        stats.num_contexts,
        stats.num_nonzeros
    );
    Ok(stats)
}

/// Write `string index` lines in index order, then flush
pub async fn write_dictionary<V>(
    output: &mut (impl AsyncWrite + Unpin),
    entries: &OrderedMap<Rc<str>, V>,
) -> Result<()> {
    for (idx, (string, _)) in entries.iter().enumerate() {
        output
            .write_all(format!("{string} {idx}\n").as_bytes())
            .await?;
    }
    output.flush().await?;
    Ok(())
}

/// Write one count per line in index order, then flush
pub async fn write_marginals(
    output: &mut (impl AsyncWrite + Unpin),
    entries: &OrderedMap<Rc<str>, Count>,
) -> Result<()> {
    for (_, count) in entries.iter() {
        output.write_all(format!("{count}\n").as_bytes()).await?;
    }
    output.flush().await?;
    Ok(())
}

/// Write the co-occurrence counts as an SVDLIBC sparse text matrix
///
/// `column_done` is called after each column. The output is flushed at the
/// end.
pub async fn write_sparse_matrix(
    output: &mut (impl AsyncWrite + Unpin),
    cooccurrences: &Cooccurrences,
    mut column_done: impl FnMut(),
) -> Result<MatrixStats> {
    let stats = MatrixStats {
        num_words: cooccurrences.words.len(),
        num_contexts: cooccurrences.contexts.len(),
        num_nonzeros: cooccurrences.num_nonzeros(),
    };
    assert_eq!(
        cooccurrences.columns.len(),
        stats.num_contexts,
        "there should be one column per context"
    );
    output
        .write_all(
            format!(
                "{} {} {}\n",
                stats.num_words, stats.num_contexts, stats.num_nonzeros
            )
            .as_bytes(),
        )
        .await?;
    for column in &cooccurrences.columns {
        output
            .write_all(format!("{}\n", column.len()).as_bytes())
            .await?;
        for (&word_idx, &count) in column.iter() {
            assert!(word_idx < stats.num_words, "row index out of bounds");
            output
                .write_all(format!("{word_idx} {count}\n").as_bytes())
                .await?;
        }
        column_done();
    }
    output.flush().await?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cooccur::CooccurrenceBuilder, vocab::Vocabulary};

    fn cooccurrences(words: &[&str], bag_of_words: bool, lines: &[&str]) -> Cooccurrences {
        let vocabulary = words
            .iter()
            .map(|&word| Box::<str>::from(word))
            .collect::<Vocabulary>();
        let mut builder = CooccurrenceBuilder::new(&vocabulary, bag_of_words);
        for line in lines {
            builder.add_line(line);
        }
        builder.finish().unwrap()
    }

    async fn sparse_matrix(cooccurrences: &Cooccurrences) -> (String, MatrixStats, usize) {
        let mut output = Vec::new();
        let mut columns = 0;
        let stats = write_sparse_matrix(&mut output, cooccurrences, || columns += 1)
            .await
            .unwrap();
        (String::from_utf8(output).unwrap(), stats, columns)
    }

    #[tokio::test]
    async fn dictionaries_and_marginals() {
        let cooc = cooccurrences(&["a", "the"], false, &["a the a\t5", "the a the\t2"]);

        let mut words = Vec::new();
        write_dictionary(&mut words, &cooc.words).await.unwrap();
        assert_eq!(String::from_utf8(words).unwrap(), "the 0\na 1\n");

        let mut word_counts = Vec::new();
        write_marginals(&mut word_counts, &cooc.words).await.unwrap();
        assert_eq!(String::from_utf8(word_counts).unwrap(), "5\n2\n");

        let mut contexts = Vec::new();
        write_dictionary(&mut contexts, &cooc.contexts).await.unwrap();
        assert_eq!(
            String::from_utf8(contexts).unwrap(),
            "w(1)=a 0\nw(-1)=a 1\nw(1)=the 2\nw(-1)=the 3\n"
        );

        let mut context_counts = Vec::new();
        write_marginals(&mut context_counts, &cooc.contexts)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(context_counts).unwrap(), "5\n5\n2\n2\n");
    }

    #[tokio::test]
    async fn sparse_layout() {
        let cooc = cooccurrences(&["a", "the"], false, &["a the a\t5", "the a the\t2"]);
        let (matrix, stats, columns) = sparse_matrix(&cooc).await;
        assert_eq!(matrix, "2 4 4\n1\n0 5\n1\n0 5\n1\n1 2\n1\n1 2\n");
        assert_eq!(
            stats,
            MatrixStats {
                num_words: 2,
                num_contexts: 4,
                num_nonzeros: 4
            }
        );
        assert_eq!(columns, 4);
    }

    #[tokio::test]
    async fn column_sizes_add_up_to_nonzeros() {
        let cooc = cooccurrences(
            &["a", "b", "c"],
            true,
            &["a b c\t1", "c a b\t2", "a b a\t3", "b c x\t4"],
        );
        let (matrix, stats, _) = sparse_matrix(&cooc).await;

        let mut lines = matrix.lines();
        let header = lines
            .next()
            .unwrap()
            .split(' ')
            .map(|field| field.parse::<usize>().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(
            header,
            [stats.num_words, stats.num_contexts, stats.num_nonzeros]
        );

        let mut total = 0;
        for _ in 0..stats.num_contexts {
            let column_len = lines.next().unwrap().parse::<usize>().unwrap();
            let mut rows = Vec::new();
            for _ in 0..column_len {
                let (row, count) = lines.next().unwrap().split_once(' ').unwrap();
                let row = row.parse::<usize>().unwrap();
                assert!(row < stats.num_words);
                assert!(count.parse::<Count>().unwrap() > 0);
                assert!(!rows.contains(&row), "rows must be unique within a column");
                rows.push(row);
            }
            total += column_len;
        }
        assert_eq!(lines.next(), None);
        assert_eq!(total, stats.num_nonzeros);
    }
}
