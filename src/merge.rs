//! Merging of data files into a single canonical stream of ngram counts
//!
//! Google's data files provide one entry per ngram and per year of
//! publication. We only care about the total occurence count of each ngram,
//! so consecutive entries about the same ngram are summed up, and ngrams that
//! contain grammar tags are thrown away since they duplicate the counts of
//! the untagged ngrams.
//!
//! Entries about one ngram are contiguous within a data file, which lets us
//! merge them in a single streaming pass. We do not attempt to merge entries
//! about the same ngram across different data files: Google partitions its
//! dataset by ngram prefix, so this never happens in practice.

use crate::{
    add_counts,
    config::MergeConfig,
    progress::{ProgressConfig, ProgressReport, Work},
    tsv::{self, filter},
    Count, Ngram, Result,
};
use anyhow::Context;
use futures::stream::StreamExt;
use std::{fmt, path::PathBuf};
use tokio::{
    fs::{self, File},
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter},
};

/// Merge all data files from a directory into one canonical ngram count file
pub async fn merge_shards(config: &MergeConfig, report: &ProgressReport) -> Result<MergeStats> {
    // Enumerate data files in a reproducible order
    let shards = list_shards(config).await?;
    log::info!(
        "Merging {} data files from {}",
        shards.len(),
        config.shard_dir.display()
    );

    // Set up output
    let output_context = || format!("writing merged counts to {}", config.output.display());
    let mut output = BufWriter::new(
        File::create(&config.output)
            .await
            .with_context(output_context)?,
    );

    // Merge data files one after another
    let progress = report.add(
        "Merging data files",
        ProgressConfig::new(Work::Steps(shards.len())),
    );
    let mut stats = MergeStats::default();
    for shard in shards {
        log::info!("Processing data file {}", shard.display());
        let tsv_bytes = tsv::open(&shard).await?;
        merge_shard(tsv_bytes, &mut output, &mut stats)
            .await
            .with_context(|| format!("merging data file {}", shard.display()))?;
        stats.shards += 1;
        progress.make_progress(1);
    }
    output.flush().await.with_context(output_context)?;
    log::info!("Done merging data files: {stats}");
    Ok(stats)
}

/// List the data files of the shard directory, sorted by file name
async fn list_shards(config: &MergeConfig) -> Result<Vec<PathBuf>> {
    let context = || format!("listing data files in {}", config.shard_dir.display());
    let mut shards = Vec::new();
    let mut dir = fs::read_dir(&config.shard_dir).await.with_context(context)?;
    while let Some(dir_entry) = dir.next_entry().await.with_context(context)? {
        let is_file = dir_entry.file_type().await.with_context(context)?.is_file();
        let file_name = dir_entry.file_name();
        match file_name.to_str() {
            Some(name) if is_file && config.is_shard(name) => shards.push(dir_entry.path()),
            _ => log::debug!("Ignoring {file_name:?}, which is not a data file"),
        }
    }
    shards.sort_unstable();
    Ok(shards)
}

/// Merge the entries of one data file into the canonical output
///
/// Records that cannot be decoded are skipped with a warning.
pub async fn merge_shard(
    tsv_bytes: impl AsyncRead + Unpin + Send + 'static,
    output: &mut (impl AsyncWrite + Unpin),
    stats: &mut MergeStats,
) -> Result<()> {
    let mut entries = Box::pin(tsv::entries(tsv_bytes));
    let mut runs = RunBuilder::new();
    while let Some(entry) = entries.next().await {
        stats.records += 1;
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if tsv::is_malformed_record(&e) => {
                log::warn!("Skipping a faulty record: {e}");
                stats.malformed += 1;
                continue;
            }
            Err(e) => return Err(e).context("reading data file entries"),
        };

        // An empty ngram would come out as a line without tokens
        if entry.ngram.trim().is_empty() {
            log::warn!("Skipping a record without an ngram: {entry:?}");
            stats.malformed += 1;
            continue;
        }

        // Tagged ngrams must not even open a run, or they would split the run
        // of the untagged ngram that they are interleaved with
        if filter::is_annotated(&entry.ngram) {
            log::trace!("Rejected {entry:?} because it carries grammar tags");
            stats.annotated += 1;
            continue;
        }

        if let Some(run) = runs.add_entry(entry.ngram, entry.match_count) {
            write_run(output, run, stats).await?;
        }
    }
    if let Some(run) = runs.finish_shard() {
        write_run(output, run, stats).await?;
    }
    Ok(())
}

/// Write down the total count of an ngram
async fn write_run(
    output: &mut (impl AsyncWrite + Unpin),
    (ngram, count): (Ngram, Count),
    stats: &mut MergeStats,
) -> Result<()> {
    output.write_all(ngram.as_bytes()).await?;
    output.write_all(format!("\t{count}\n").as_bytes()).await?;
    stats.runs += 1;
    Ok(())
}

/// Accumulator of the contiguous entries that a data file has about an ngram
///
/// Either no ngram has been seen yet, or there is a current ngram whose total
/// count is being accumulated. Switching to another ngram, or reaching the end
/// of the data file, yields the finished run.
#[derive(Debug, Default)]
pub struct RunBuilder {
    /// Last seen ngram, if any, and its total count so far
    current_run: Option<(Ngram, Count)>,
}
//
impl RunBuilder {
    /// Set up the accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Integrate a new dataset entry, return the previous run if it's over
    pub fn add_entry(&mut self, ngram: Ngram, count: Count) -> Option<(Ngram, Count)> {
        // If the entry is associated with the current ngram, merge it into the
        // current ngram's total
        if let Some((current_ngram, total)) = &mut self.current_run {
            if *current_ngram == ngram {
                *total = add_counts(*total, count);
                return None;
            }
        }

        // Otherwise, flush the current run and make the entry the new one
        self.switch_run(Some((ngram, count)))
    }

    /// Flush the pending run, if any, at the end of a data file
    pub fn finish_shard(&mut self) -> Option<(Ngram, Count)> {
        self.switch_run(None)
    }

    /// Switch to a different run (or none at all), return the former one
    fn switch_run(&mut self, new_run: Option<(Ngram, Count)>) -> Option<(Ngram, Count)> {
        std::mem::replace(&mut self.current_run, new_run)
    }
}

/// What happened during a merge
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct MergeStats {
    /// Number of data files that were processed
    pub shards: usize,

    /// Number of records that were read, valid or not
    pub records: usize,

    /// Number of records that were discarded due to grammar tags
    pub annotated: usize,

    /// Number of records that could not be decoded
    pub malformed: usize,

    /// Number of lines that were written to the canonical output
    pub runs: usize,
}
//
impl fmt::Display for MergeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records from {} files, {} tagged and {} faulty records dropped, {} ngram counts written",
            self.records, self.shards, self.annotated, self.malformed, self.runs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::write::GzipEncoder;
    use std::path::Path;

    async fn merge_str(tsv: &'static str) -> (String, MergeStats) {
        let mut output = Vec::new();
        let mut stats = MergeStats::default();
        merge_shard(tsv.as_bytes(), &mut output, &mut stats)
            .await
            .unwrap();
        (String::from_utf8(output).unwrap(), stats)
    }

    async fn write_gz(path: &Path, contents: &str) {
        let mut encoder = GzipEncoder::new(Vec::new());
        encoder.write_all(contents.as_bytes()).await.unwrap();
        encoder.shutdown().await.unwrap();
        fs::write(path, encoder.into_inner()).await.unwrap();
    }

    #[test]
    fn run_state_machine() {
        let mut runs = RunBuilder::new();
        assert_eq!(runs.finish_shard(), None);
        assert_eq!(runs.add_entry("a".into(), 1), None);
        assert_eq!(runs.add_entry("a".into(), 2), None);
        assert_eq!(runs.add_entry("b".into(), 5), Some(("a".into(), 3)));
        assert_eq!(runs.add_entry("a".into(), 1), Some(("b".into(), 5)));
        assert_eq!(runs.finish_shard(), Some(("a".into(), 1)));
        assert_eq!(runs.finish_shard(), None);
    }

    #[tokio::test]
    async fn years_are_summed() {
        let (merged, stats) = merge_str(
            "the cat\t2000\t5\t3\nthe cat\t2001\t7\t2\nthe dog\t2000\t1\t1\n",
        )
        .await;
        assert_eq!(merged, "the cat\t12\nthe dog\t1\n");
        assert_eq!(stats.records, 3);
        assert_eq!(stats.runs, 2);
    }

    #[tokio::test]
    async fn annotated_ngrams_are_dropped() {
        let (merged, stats) = merge_str(
            "dog cat\t2012\t1\t1\ndog_NOUN cat\t2013\t5\t3\ndog cat\t2013\t2\t1\n",
        )
        .await;
        // The tagged record neither contributes nor interrupts the run
        assert_eq!(merged, "dog cat\t3\n");
        assert_eq!(stats.annotated, 1);

        let (merged, _) = merge_str("dog_NOUN cat\t2013\t5\t3\n").await;
        assert_eq!(merged, "");
    }

    #[tokio::test]
    async fn faulty_records_are_skipped() {
        let (merged, stats) = merge_str("a\t2000\t1\t1\na\t2001\na\t2002\t2\t1\nb\t2000\tmany\t1\n").await;
        assert_eq!(merged, "a\t3\n");
        assert_eq!(stats.malformed, 2);
    }

    #[tokio::test]
    async fn empty_ngrams_are_skipped() {
        let (merged, stats) = merge_str("\t2000\t1\t1\na\t2001\t2\t1\n \t2002\t1\t1\na\t2002\t3\t1\n").await;
        // Skipped records do not interrupt the run either
        assert_eq!(merged, "a\t5\n");
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.runs, 1);
    }

    #[tokio::test]
    async fn non_adjacent_duplicates_are_not_merged() {
        let (merged, _) = merge_str("a\t2000\t1\t1\nb\t2000\t1\t1\na\t2000\t4\t1\n").await;
        assert_eq!(merged, "a\t1\nb\t1\na\t4\n");
    }

    #[tokio::test]
    async fn merge_directory() {
        let dir = tempfile::tempdir().unwrap();
        let shard_dir = dir.path().join("shards");
        fs::create_dir(&shard_dir).await.unwrap();
        write_gz(
            &shard_dir.join("googlebooks-b.gz"),
            "b\t2000\t1\t1\nb\t2001\t2\t1\nshared\t2000\t10\t1\n",
        )
        .await;
        write_gz(
            &shard_dir.join("googlebooks-a.gz"),
            "a\t2000\t4\t1\nshared\t2000\t1\t1\nshared\t2001\t1\t1\n",
        )
        .await;
        fs::write(shard_dir.join("urls.txt"), "not a shard\n")
            .await
            .unwrap();

        let config = MergeConfig {
            shard_dir: shard_dir.into(),
            output: dir.path().join("merged").into(),
            shard_prefix: "googlebooks".into(),
        };
        let stats = merge_shards(&config, &ProgressReport::new()).await.unwrap();
        assert_eq!(stats.shards, 2);

        // Data files come in name order, and runs from distinct files stay
        // distinct even when they are about the same ngram
        let merged = fs::read_to_string(&config.output).await.unwrap();
        assert_eq!(merged, "a\t4\nshared\t2\nb\t3\nshared\t10\n");
    }

    #[tokio::test]
    async fn missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = MergeConfig {
            shard_dir: dir.path().join("missing").into(),
            output: dir.path().join("merged").into(),
            shard_prefix: "googlebooks".into(),
        };
        assert!(merge_shards(&config, &ProgressReport::new()).await.is_err());
    }
}
