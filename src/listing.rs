//! Discovery and download of the Google Books Ngram data files

use crate::{
    config::{DownloadConfig, ListConfig},
    progress::{ProgressConfig, ProgressReport, Work},
    Result,
};
use anyhow::Context;
use futures::stream::StreamExt;
use regex::Regex;
use reqwest::Response;
use std::{
    collections::HashSet,
    io::{self, ErrorKind},
    path::Path,
    sync::OnceLock,
};
use tokio::{
    fs::{self, File},
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter},
};
use tokio_util::io::StreamReader;

/// Web page that links to every file of the 2012 edition of the dataset
pub const DEFAULT_LISTING_URL: &str =
    "http://storage.googleapis.com/books/ngrams/books/datasetsv2.html";

/// Collect the URLs of the data files whose name matches the configured pattern
pub async fn collect_shard_urls(
    client: &reqwest::Client,
    config: &ListConfig,
) -> Result<Vec<Box<str>>> {
    let context = || format!("fetching the data file listing at {}", config.listing_url);
    let page = client
        .get(&*config.listing_url)
        .send()
        .await
        .and_then(Response::error_for_status)
        .with_context(context)?
        .text()
        .await
        .with_context(context)?;
    let urls = matching_links(&page, &config.pattern);
    log::info!(
        "Found {} files that matched {}",
        urls.len(),
        config.pattern.as_str()
    );
    Ok(urls)
}

/// Extract the links of an HTML page whose file name matches a pattern
///
/// Links are returned in order of appearance. A link that the page repeats is
/// only listed once, so that its file does not get downloaded twice.
pub fn matching_links(page: &str, pattern: &Regex) -> Vec<Box<str>> {
    static HREF: OnceLock<Regex> = OnceLock::new();
    let href = HREF.get_or_init(|| {
        Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).expect("href regex should be valid")
    });
    let mut seen = HashSet::new();
    href.captures_iter(page)
        .filter_map(|captures| captures.get(1))
        .map(|url| url.as_str())
        .filter(|url| pattern.is_match(file_name(url)) && seen.insert(*url))
        .map(Box::<str>::from)
        .collect()
}

/// Last path component of a URL
fn file_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Write down a list of URLs, one per line
pub async fn write_url_list(path: &Path, urls: &[Box<str>]) -> Result<()> {
    let context = || format!("writing URL list to {}", path.display());
    let mut output = BufWriter::new(File::create(path).await.with_context(context)?);
    for url in urls {
        output.write_all(url.as_bytes()).await.with_context(context)?;
        output.write_all(b"\n").await.with_context(context)?;
    }
    output.flush().await.with_context(context)?;
    Ok(())
}

/// Read a list of URLs, one per line, ignoring blank lines
pub async fn read_url_list(path: &Path) -> Result<Vec<Box<str>>> {
    let context = || format!("reading URL list from {}", path.display());
    let file = File::open(path).await.with_context(context)?;
    let mut lines = BufReader::new(file).lines();
    let mut urls = Vec::new();
    while let Some(line) = lines.next_line().await.with_context(context)? {
        let url = line.trim();
        if !url.is_empty() {
            urls.push(url.into());
        }
    }
    Ok(urls)
}

/// Download the data files from the configured URL list, one after another
pub async fn download_shards(
    client: &reqwest::Client,
    config: &DownloadConfig,
    report: &ProgressReport,
) -> Result<()> {
    let urls = read_url_list(&config.url_list).await?;
    fs::create_dir_all(&config.shard_dir)
        .await
        .with_context(|| format!("creating data file directory {}", config.shard_dir.display()))?;

    // Track file downloads
    let downloads = report.add(
        "Downloading data files",
        ProgressConfig::new(Work::Steps(urls.len())),
    );
    let bytes = report.add(
        "Downloaded data",
        ProgressConfig::new(Work::Bytes(0)).allow_adding_work(),
    );
    if urls.is_empty() {
        bytes.done_adding_work();
    }

    for (idx, url) in urls.iter().enumerate() {
        let name = file_name(url);
        anyhow::ensure!(!name.is_empty(), "URL {url} does not name a file");
        let path = config.shard_dir.join(name);
        log::info!("Downloading {url} to {}", path.display());

        // Start the download
        let context = || format!("downloading {url}");
        let response = client
            .get(&**url)
            .send()
            .await
            .and_then(Response::error_for_status)
            .with_context(context)?;
        bytes.add_work(response.content_length().unwrap_or(0));
        if idx + 1 == urls.len() {
            bytes.done_adding_work();
        }

        // Stream the body to disk
        let mut body = StreamReader::new(response.bytes_stream().map(|res| {
            res
                // Track how many bytes have been downloaded so far
                .inspect(|block| {
                    bytes.make_progress(block.len() as u64);
                })
                // Translate reqwest errors into I/O errors
                .map_err(|e| io::Error::new(ErrorKind::Other, Box::new(e)))
        }));
        let mut file = File::create(&path)
            .await
            .with_context(|| format!("creating {}", path.display()))?;
        tokio::io::copy(&mut body, &mut file)
            .await
            .with_context(context)?;
        file.flush().await.with_context(context)?;
        downloads.make_progress(1);
    }
    Ok(())
}
