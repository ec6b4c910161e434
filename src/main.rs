//! This program turns the Google Books Ngram dataset, whose general
//! documentation you can find at
//! <http://storage.googleapis.com/books/ngrams/books/datasetsv2.html>, into a
//! sparse word-by-context co-occurrence matrix that can be fed to an SVD
//! solver such as SVDLIBC in order to derive spectral word representations.
//!
//! The work is split into stages that communicate through files, each exposed
//! as a subcommand: `list` finds the dataset files of interest, `download`
//! fetches them, `merge` collapses them into a canonical ngram count stream,
//! and `cooccur` derives the co-occurrence matrix from canonical streams.

mod config;
mod cooccur;
mod listing;
mod matrix;
mod merge;
mod ordered;
mod output;
mod pipeline;
mod progress;
mod tsv;
mod vocab;

use crate::{
    config::{CooccurConfig, DownloadConfig, ListConfig, MergeConfig},
    progress::ProgressReport,
};
use clap::{Args as ClapArgs, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

/// Build a word-context co-occurrence matrix from Google Books ngrams
#[derive(Parser, Debug)]
#[command(version, author)]
struct Args {
    #[command(subcommand)]
    command: Command,
}
//
impl Args {
    /// Decode and validate CLI arguments
    pub fn parse_and_check() -> Result<Self> {
        // Decode CLI arguments
        let args = Args::parse();

        // Check CLI arguments for basic sanity
        if let Command::Merge(merge) = &args.command {
            anyhow::ensure!(
                !merge.shard_prefix.is_empty(),
                "an empty shard prefix would treat every file of the directory as a shard"
            );
        }
        Ok(args)
    }
}

/// Processing stages
#[derive(Subcommand, Debug)]
enum Command {
    /// Collect the URLs of the dataset files whose name matches a pattern
    List(ListArgs),

    /// Download the dataset files from a list of URLs
    Download(DownloadArgs),

    /// Merge gzipped dataset files into a single stream of ngram counts
    Merge(MergeArgs),

    /// Build the co-occurrence matrix from merged unigram and ngram counts
    Cooccur(CooccurArgs),
}

/// Arguments of the `list` subcommand
#[derive(ClapArgs, Debug)]
struct ListArgs {
    /// Regular expression that dataset file names must match
    ///
    /// The expression is anchored at the start of the file name. For example,
    /// all English 5-gram files from the 2012 edition are selected by
    /// `googlebooks-eng-all-5gram-20120701-(.*).gz`.
    pattern: Box<str>,

    /// File where matching URLs will be written, one per line
    output: PathBuf,

    /// Web page that links to every file of the dataset
    #[arg(long, default_value = listing::DEFAULT_LISTING_URL)]
    listing_url: Box<str>,
}

/// Arguments of the `download` subcommand
#[derive(ClapArgs, Debug)]
struct DownloadArgs {
    /// File with one dataset URL per line, as produced by `list`
    url_list: PathBuf,

    /// Directory where downloaded dataset files will be stored
    shard_dir: PathBuf,
}

/// Arguments of the `merge` subcommand
#[derive(ClapArgs, Debug)]
struct MergeArgs {
    /// Directory of downloaded dataset files
    shard_dir: PathBuf,

    /// Output file of merged ngram counts
    output: PathBuf,

    /// Name prefix of the files from the shard directory that are dataset files
    ///
    /// Other files in the directory are ignored.
    #[arg(long, default_value = "googlebooks")]
    shard_prefix: Box<str>,
}

/// Arguments of the `cooccur` subcommand
#[derive(ClapArgs, Debug)]
struct CooccurArgs {
    /// Merged unigram counts, as produced by `merge`
    unigram_path: PathBuf,

    /// Merged ngram counts, as produced by `merge`
    ///
    /// All ngrams must have the same length, which sets the size of the
    /// context window around each center word.
    ngram_path: PathBuf,

    /// Output directory
    ///
    /// Anything that already exists at this location will be deleted.
    output_path: PathBuf,

    /// Word types occurring this many times or less are considered rare
    ///
    /// All rare words are replaced by a single reserved symbol, which keeps
    /// the matrix size in check and pools the little evidence we have about
    /// them.
    #[arg(long, default_value = "4000")]
    rare_cutoff: Count,

    /// Use bag-of-words contexts
    ///
    /// By default, contexts record the position of the context word relative
    /// to the center word. With this flag, the position is discarded and
    /// identical words at different positions are merged into a single
    /// context.
    #[arg(long, default_value_t = false)]
    bow: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Set up logging
    setup_logging().map_err(|e| anyhow::format_err!("{e}"))?;

    // Decode CLI arguments
    let args = Args::parse_and_check()?;

    // Set up progress reporting
    let report = ProgressReport::new();

    // Run the requested processing stage
    match args.command {
        Command::List(args) => {
            let config = ListConfig::new(args)?;
            let client = reqwest::Client::new();
            let urls = listing::collect_shard_urls(&client, &config).await?;
            listing::write_url_list(&config.output, &urls).await?;
        }
        Command::Download(args) => {
            let config = DownloadConfig::new(args);
            let client = reqwest::Client::new();
            listing::download_shards(&client, &config, &report).await?;
        }
        Command::Merge(args) => {
            let config = MergeConfig::new(args);
            merge::merge_shards(&config, &report).await?;
        }
        Command::Cooccur(args) => {
            let config = CooccurConfig::new(args)?;
            pipeline::build_matrix(&config, &report).await?;
        }
    }
    Ok(())
}

/// Use anyhow for Result type erasure
pub use anyhow::Result;

/// Space-separated sequence of tokens
pub type Ngram = Box<str>;

/// Number of occurences of an ngram
///
/// English has more than 283 billion unigram matches over the whole dataset,
/// so anything narrower than 64 bits would be asking for trouble once counts
/// get accumulated across years.
pub type Count = u64;

/// Year of Gregorian Calendar
pub type Year = i16;

/// Addition operator for occurence counts
pub fn add_counts(x: Count, y: Count) -> Count {
    x.checked_add(y).expect("overflow while adding occurence counts")
}

/// Set up logging
fn setup_logging() -> syslog::Result<()> {
    syslog::init(
        syslog::Facility::LOG_USER,
        if cfg!(feature = "log-trace") {
            LevelFilter::Trace
        } else if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        None,
    )
}
