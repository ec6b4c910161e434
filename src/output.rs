//! Output directory of the co-occurrence matrix construction stage
//!
//! Everything that the stage produces goes into a single directory, which is
//! recreated from scratch on every run. File names carry the parameters that
//! affected their contents, so that several matrices built with different
//! settings can be told apart once moved elsewhere.

use crate::{matrix::MatrixStats, vocab::CorpusStats, Result};
use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::{
    fs::{self, File},
    io::{AsyncWriteExt, BufWriter},
};

/// Word types sorted by decreasing occurence count
pub const SORTED_WORD_TYPES: &str = "sorted_word_types";

/// Human-readable summary of the run
pub const REPORT: &str = "log.0";

/// Rare word types, given the vocabulary signature
pub fn rare_words(vocabulary_signature: &str) -> String {
    format!("rare_words_{vocabulary_signature}")
}

/// Word dictionary, given the vocabulary signature
pub fn word_dictionary(vocabulary_signature: &str) -> String {
    format!("word_str2num_{vocabulary_signature}")
}

/// Word marginal counts, given the vocabulary signature
pub fn word_counts(vocabulary_signature: &str) -> String {
    format!("count_word_{vocabulary_signature}")
}

/// Context dictionary, given the context signature
pub fn context_dictionary(context_signature: &str) -> String {
    format!("context_str2num_{context_signature}")
}

/// Context marginal counts, given the context signature
pub fn context_counts(context_signature: &str) -> String {
    format!("count_context_{context_signature}")
}

/// Sparse co-occurrence matrix, given the context signature
pub fn cooccurrence_matrix(context_signature: &str) -> String {
    format!("count_word_context_{context_signature}")
}

/// Freshly created output directory
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct OutputDir(Box<Path>);
//
impl OutputDir {
    /// Create the output directory, deleting whatever was there before
    pub async fn recreate(path: &Path) -> Result<Self> {
        let context = || format!("deleting previous output at {}", path.display());
        if fs::try_exists(path).await.with_context(context)? {
            log::info!("Deleting previous output at {}", path.display());
            let is_dir = fs::symlink_metadata(path)
                .await
                .with_context(context)?
                .is_dir();
            let deleted = if is_dir {
                fs::remove_dir_all(path).await
            } else {
                fs::remove_file(path).await
            };
            deleted.with_context(context)?;
        }
        fs::create_dir_all(path)
            .await
            .with_context(|| format!("creating output directory {}", path.display()))?;
        Ok(Self(path.into()))
    }

    /// Location of a file from the output directory
    pub fn path(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }

    /// Create a file in the output directory
    pub async fn create(&self, name: &str) -> Result<BufWriter<File>> {
        let path = self.path(name);
        let file = File::create(&path)
            .await
            .with_context(|| format!("creating output file {}", path.display()))?;
        Ok(BufWriter::new(file))
    }

    /// Write down the human-readable summary of the run
    pub async fn write_report(&self, corpus: &CorpusStats, matrix: &MatrixStats) -> Result<()> {
        let mut report = self.create(REPORT).await?;
        let text = format!(
            "[Corpus]\n\
             \x20  {} unigram counts\n\
             \x20  Cutoff {}: {} => {} word types\n\
             \x20  Preserved word types: {:.2}% unigram mass\n\
             \n\
             [Matrix]\n\
             \x20  {} x {} ({} nonzeros)\n",
            corpus.total_count,
            corpus.rare_cutoff,
            corpus.num_types,
            corpus.reduced_vocabulary_size(),
            corpus.preserved_mass_percent(),
            matrix.num_words,
            matrix.num_contexts,
            matrix.num_nonzeros,
        );
        report.write_all(text.as_bytes()).await?;
        report.flush().await.context("writing the run report")?;
        Ok(())
    }
}
