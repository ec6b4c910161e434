//! Co-occurrence matrix construction, from merged counts to output directory

use crate::{
    config::CooccurConfig, cooccur, matrix, output::OutputDir, progress::ProgressReport, vocab,
    Result,
};

/// Build the co-occurrence matrix and everything that goes with it
///
/// The output directory is recreated first, then filled with the vocabulary
/// files, the dictionaries and marginal counts, the matrix and the run report.
pub async fn build_matrix(config: &CooccurConfig, report: &ProgressReport) -> Result<()> {
    let output = OutputDir::recreate(&config.output_dir).await?;

    // Pick the vocabulary from unigram counts
    let (vocabulary, corpus_stats) = vocab::build_vocabulary(config, &output).await?;

    // Count co-occurrences from ngram counts
    let cooccurrences = cooccur::accumulate(config, &vocabulary, report).await?;

    // Write them down
    let matrix_stats = matrix::write_matrix(config, &cooccurrences, &output, report).await?;
    output.write_report(&corpus_stats, &matrix_stats).await
}
