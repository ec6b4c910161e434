//! Processing stage configuration
//!
//! Each stage receives its own configuration object, digested from the
//! matching CLI arguments. Please refer to the argument structs in the crate
//! root to know more about individual fields.

use crate::{CooccurArgs, Count, DownloadArgs, ListArgs, MergeArgs, Result};
use anyhow::Context;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Configuration of the shard listing stage
#[allow(missing_docs)]
#[derive(Clone, Debug)]
pub struct ListConfig {
    /// Dataset file name pattern, anchored at the start of the name
    pub pattern: Regex,

    // Other fields have the same meaning as in ListArgs
    pub output: Box<Path>,
    pub listing_url: Box<str>,
}
//
impl ListConfig {
    /// Determine listing configuration from CLI arguments
    pub(crate) fn new(args: ListArgs) -> Result<Self> {
        let ListArgs {
            pattern,
            output,
            listing_url,
        } = args;
        Ok(Self {
            pattern: anchored_regex(&pattern)?,
            output: output.into(),
            listing_url,
        })
    }
}

/// Compile a regex that must match at the start of the input
pub fn anchored_regex(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})"))
        .with_context(|| format!("compiling file name pattern {pattern:?}"))
}

/// Configuration of the shard download stage
#[allow(missing_docs)]
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct DownloadConfig {
    pub url_list: Box<Path>,
    pub shard_dir: Box<Path>,
}
//
impl DownloadConfig {
    /// Determine download configuration from CLI arguments
    pub(crate) fn new(args: DownloadArgs) -> Self {
        let DownloadArgs {
            url_list,
            shard_dir,
        } = args;
        Self {
            url_list: url_list.into(),
            shard_dir: shard_dir.into(),
        }
    }
}

/// Configuration of the shard merging stage
#[allow(missing_docs)]
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MergeConfig {
    pub shard_dir: Box<Path>,
    pub output: Box<Path>,
    pub shard_prefix: Box<str>,
}
//
impl MergeConfig {
    /// Determine merging configuration from CLI arguments
    pub(crate) fn new(args: MergeArgs) -> Self {
        let MergeArgs {
            shard_dir,
            output,
            shard_prefix,
        } = args;
        Self {
            shard_dir: shard_dir.into(),
            output: output.into(),
            shard_prefix,
        }
    }

    /// Truth that a file from the shard directory is a dataset shard
    pub fn is_shard(&self, file_name: &str) -> bool {
        file_name.starts_with(&*self.shard_prefix)
    }
}

/// Configuration of the co-occurrence matrix construction stage
#[allow(missing_docs)]
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CooccurConfig {
    pub unigram_path: Box<Path>,
    pub ngram_path: Box<Path>,
    pub output_dir: Box<Path>,
    pub rare_cutoff: Count,
    pub bag_of_words: bool,
}
//
impl CooccurConfig {
    /// Determine matrix construction configuration from CLI arguments
    pub(crate) fn new(args: CooccurArgs) -> Result<Self> {
        let CooccurArgs {
            unigram_path,
            ngram_path,
            output_path,
            rare_cutoff,
            bow,
        } = args;
        let config = Self {
            unigram_path: unigram_path.into(),
            ngram_path: ngram_path.into(),
            output_dir: output_path.into(),
            rare_cutoff,
            bag_of_words: bow,
        };
        config.check_inputs_outside_output()?;
        Ok(config)
    }

    /// Make sure that recreating the output directory will not delete inputs
    pub fn check_inputs_outside_output(&self) -> Result<()> {
        let output_dir = resolve_path(&self.output_dir)?;
        for input in [&self.unigram_path, &self.ngram_path] {
            anyhow::ensure!(
                !resolve_path(input)?.starts_with(&output_dir),
                "input {} lies inside of output directory {}, which will be destroyed",
                input.display(),
                self.output_dir.display()
            );
        }
        Ok(())
    }

    /// Output file name suffix of artifacts that only depend on the vocabulary
    pub fn vocabulary_signature(&self) -> String {
        format!("rare{}", self.rare_cutoff)
    }

    /// Output file name suffix of artifacts that depend on the context
    /// definition, given the window size that was found in the input
    pub fn context_signature(&self, window_size: usize) -> String {
        let mut signature = format!("{}_window{window_size}", self.vocabulary_signature());
        if self.bag_of_words {
            signature.push_str("_bow");
        }
        signature.push_str("_spl");
        signature
    }
}

/// Absolute form of a path with symlinks and `..` resolved
///
/// Trailing components that do not exist yet are kept as written.
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    let context = || format!("resolving path {}", path.display());
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().with_context(context)?.join(path)
    };
    for ancestor in absolute.ancestors() {
        if let Ok(resolved) = ancestor.canonicalize() {
            let missing = absolute.strip_prefix(ancestor).with_context(context)?;
            return Ok(resolved.join(missing));
        }
    }
    anyhow::bail!("no part of path {} exists", path.display())
}
