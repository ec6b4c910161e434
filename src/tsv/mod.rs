//! Reading of the gzipped TSV data files from Google

pub mod filter;

use crate::{Count, Ngram, Result, Year};
use anyhow::Context;
use async_compression::tokio::bufread::GzipDecoder;
use csv_async::{AsyncReaderBuilder, ErrorKind, Terminator};
use futures::stream::Stream;
use serde::Deserialize;
use std::{path::Path, pin::Pin};
use tokio::{
    fs::File,
    io::{AsyncRead, BufReader},
};

/// Entry from the dataset
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq)]
pub struct Entry {
    /// (Case-sensitive) ngram whose frequency is being studied
    pub ngram: Ngram,

    /// Year on which the data was recorded
    #[allow(unused)]
    year: Year,

    /// Number of recorded occurences
    pub match_count: Count,

    /// Number of books across which occurences were recorded
    #[allow(unused)]
    volume_count: Count,
}

/// Uncompressed bytes of a data file
pub type TsvBytes = Pin<Box<dyn AsyncRead + Send>>;

/// Open a data file for reading
///
/// Files with a `.gz` extension are decompressed on the fly. Google's files
/// may consist of several concatenated gzip members, all of which are read.
pub async fn open(path: &Path) -> Result<TsvBytes> {
    let file = File::open(path)
        .await
        .with_context(|| format!("opening data file {}", path.display()))?;
    let bytes = BufReader::new(file);
    if path.extension().is_some_and(|ext| ext == "gz") {
        let mut tsv_bytes = GzipDecoder::new(bytes);
        tsv_bytes.multiple_members(true);
        Ok(Box::pin(tsv_bytes))
    } else {
        Ok(Box::pin(bytes))
    }
}

/// Decode uncompressed TSV bytes into dataset entries
///
/// The data files have no header and no quoting: ngrams may contain quote
/// characters that must be taken literally. Records end at `\n` only, since
/// a carriage return may appear inside an ngram. Records with missing fields
/// come out as errors for which [`is_malformed_record`] returns true, and do not
/// stop the stream.
pub fn entries<R>(tsv_bytes: R) -> impl Stream<Item = csv_async::Result<Entry>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    AsyncReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .terminator(Terminator::Any(b'\n'))
        .create_deserializer(tsv_bytes)
        .into_deserialize::<Entry>()
}

/// Truth that a TSV decoding error only affects the current record
///
/// Anything else is an I/O error after which the file cannot be read further.
pub fn is_malformed_record(error: &csv_async::Error) -> bool {
    !matches!(error.kind(), ErrorKind::Io(_))
}
