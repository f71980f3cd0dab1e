use anyhow::{anyhow, Context, Result};
use clap::Parser;
use reqwest::{header, Client, Url};
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tokio::task::{spawn_blocking, JoinHandle};
use tokio::time::sleep;
use tracing_subscriber::{fmt, EnvFilter};
use webindex_core::tokenizer::Analyzer;
use webindex_core::{Index, Store, StoreConfig, TermCounter};

mod extract;
mod robots;

use extract::{norm, Extractor, Page};
use robots::RobotsCache;

type SharedIndex = Arc<Index<Box<dyn Store>>>;

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl pages, respecting robots.txt, and index them into the store")]
struct Cli {
    /// Path to a file with seed URLs (one per line)
    #[arg(long)]
    seeds: String,
    /// Store locator: memory, sled:<path> or redis://host:port/db (default: $INDEX_STORE or sled:./index)
    #[arg(long)]
    store: Option<String>,
    /// CSS selector for the elements whose text is indexed
    #[arg(long, default_value = "p")]
    content_selector: String,
    /// Also append every fetched page to this JSONL file
    #[arg(long)]
    archive: Option<String>,
    /// Re-fetch and re-index pages that are already indexed
    #[arg(long, default_value_t = false)]
    reindex: bool,
    /// Maximum number of pages to index
    #[arg(long, default_value_t = 1_000)]
    max_docs: usize,
    /// Maximum pages to crawl per host (politeness)
    #[arg(long, default_value_t = 10)]
    max_per_host: usize,
    /// Concurrency (number of workers)
    #[arg(long, default_value_t = 8)]
    concurrency: usize,
    /// Request timeout seconds
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
    /// User-Agent string to use for robots.txt and crawling
    #[arg(long, default_value = "webindex-bot/0.1 (+https://example.com/bot)")]
    user_agent: String,
    /// Only follow links that remain on the same host as the page
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    same_host_only: bool,
}

#[derive(Default)]
struct Seen { urls: HashSet<String>, per_host: HashMap<String, usize> }

impl Seen {
    /// Claim a crawl slot for `url`; false if seen before or its host is full.
    fn claim(&mut self, url: &Url, max_per_host: usize) -> bool {
        if !self.urls.insert(norm(url)) { return false; }
        if let Some(h) = url.host_str() {
            let cnt = self.per_host.entry(h.to_string()).or_insert(0);
            if *cnt >= max_per_host { return false; }
            *cnt += 1;
        }
        true
    }
}

#[derive(Serialize)]
struct ArchivedPage<'a> {
    id: String,
    title: &'a str,
    body: &'a str,
    url: &'a str,
    timestamp: String,
}

type Fetch = JoinHandle<(Url, Option<Page>)>;

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let config = StoreConfig::resolve(args.store.as_deref())?;
    let store = config.open().with_context(|| format!("opening store {config}"))?;
    let index: SharedIndex = Arc::new(Index::new(store));

    let client = Client::builder()
        .user_agent(args.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()?;
    let extractor = Arc::new(Extractor::new(&args.content_selector)?);
    let robots = Arc::new(RobotsCache::default());
    let analyzer = Analyzer::default();

    let mut frontier = load_seeds(&args.seeds)?;
    if frontier.is_empty() { return Err(anyhow!("no valid seeds")); }
    tracing::info!(
        seeds = frontier.len(), max_docs = args.max_docs, concurrency = args.concurrency,
        same_host_only = args.same_host_only, store = %config, "crawl starting"
    );

    let mut archive = match &args.archive {
        Some(path) => {
            open_archive(path)?
        }
        None => None,
    };

    let mut seen = Seen::default();
    let mut indexed = 0usize;
    let mut inflight: Vec<Fetch> = Vec::new();

    while indexed < args.max_docs && (!frontier.is_empty() || !inflight.is_empty()) {
        // Fill workers
        while inflight.len() < args.concurrency && indexed + inflight.len() < args.max_docs {
            let Some(url) = frontier.pop_front() else { break };
            if !seen.claim(&url, args.max_per_host) { continue; }
            if !args.reindex && already_indexed(&index, norm(&url)).await? {
                tracing::debug!(%url, "already indexed, skipping");
                continue;
            }
            inflight.push(tokio::spawn(fetch(client.clone(), robots.clone(), extractor.clone(), url)));
        }

        if inflight.is_empty() { break; }

        let mut i = 0;
        while i < inflight.len() {
            if !inflight[i].is_finished() {
                i += 1;
                continue;
            }
            let Ok((url, page)) = inflight.swap_remove(i).await else { continue };
            let Some(page) = page else { continue };

            for l in &page.links {
                if args.same_host_only && l.host_str() != url.host_str() { continue; }
                frontier.push_back(l.clone());
            }

            let label = norm(&url);
            let mut terms = TermCounter::new(label.clone());
            terms.process_text(&page.text, &analyzer);
            index_page(&index, label.clone(), terms).await?;
            if let Some(out) = archive.as_mut() {
                write_archive(out, &label, &page)?;
            }
            indexed += 1;
            if indexed % 100 == 0 {
                tracing::info!(indexed, visited = seen.urls.len(), frontier = frontier.len(), "progress");
            }
        }
        if !inflight.is_empty() { sleep(Duration::from_millis(10)).await; }
    }

    if let Some(mut out) = archive { out.flush()?; }
    tracing::info!(indexed, visited = seen.urls.len(), frontier = frontier.len(), "crawl done");
    Ok(())
}

fn open_archive(path: &str) -> Result<Option<BufWriter<File>>> {
    if let Some(dir) = std::path::Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating archive directory {}", dir.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating archive {path}"))?;
    Ok(Some(BufWriter::new(file)))
}

fn load_seeds(path: &str) -> Result<VecDeque<Url>> {
    let mut frontier = VecDeque::new();
    for line in BufReader::new(File::open(path).with_context(|| format!("opening seeds {path}"))?).lines() {
        let s = line?.trim().to_string();
        if s.is_empty() || s.starts_with('#') { continue; }
        let u = Url::parse(&s).or_else(|_| Url::parse(&format!("https://{}", s)));
        match u {
            Ok(u) => frontier.push_back(u),
            Err(e) => tracing::warn!(seed = %s, error = %e, "ignoring invalid seed"),
        }
    }
    Ok(frontier)
}

async fn already_indexed(index: &SharedIndex, url: String) -> Result<bool> {
    let index = index.clone();
    Ok(spawn_blocking(move || index.is_indexed(&url)).await??)
}

async fn index_page(index: &SharedIndex, url: String, terms: TermCounter) -> Result<()> {
    let index = index.clone();
    spawn_blocking(move || index.index_page(&url, &terms)).await??;
    Ok(())
}

async fn fetch(client: Client, robots: Arc<RobotsCache>, extractor: Arc<Extractor>, url: Url) -> (Url, Option<Page>) {
    if !robots.allowed(&client, &url).await {
        tracing::debug!(%url, "disallowed by robots.txt");
        return (url, None);
    }
    if let Some(delay) = robots.delay_ms(&url) { sleep(Duration::from_millis(delay)).await; }

    let resp = match client.get(url.clone()).send().await {
        Ok(resp) if resp.status().is_success() => resp,
        Ok(resp) => {
            tracing::debug!(%url, status = %resp.status(), "skipping non-success response");
            return (url, None);
        }
        Err(e) => {
            tracing::warn!(%url, error = %e, "fetch failed");
            return (url, None);
        }
    };
    let is_html = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .map_or(true, |v| v.starts_with("text/html"));
    if !is_html { return (url, None); }
    let bytes = match resp.bytes().await { Ok(b) => b, Err(_) => return (url, None) };
    if bytes.len() > 2 * 1024 * 1024 { return (url, None); }

    let body = String::from_utf8_lossy(&bytes);
    let page = extractor.extract(&body, &url);
    (url, Some(page))
}

fn write_archive<W: Write>(out: &mut W, url: &str, page: &Page) -> Result<()> {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    let id = format!("{:x}", hasher.finalize());
    let timestamp = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    let rec = ArchivedPage { id, title: &page.title, body: &page.text, url, timestamp };
    serde_json::to_writer(&mut *out, &rec)?;
    out.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_creates_missing_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out/pages.jsonl");
        assert!(open_archive(path.to_str().unwrap()).unwrap().is_some());
        assert!(path.exists());
    }

    #[test]
    fn archive_under_a_file_fails_on_the_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let path = blocker.join("pages.jsonl");
        let err = open_archive(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("creating archive directory"), "{err:#}");
    }

    #[test]
    fn seen_limits_hosts_and_repeats() {
        let mut seen = Seen::default();
        let a = Url::parse("https://a.test/1").unwrap();
        let a_frag = Url::parse("https://a.test/1#top").unwrap();
        let b = Url::parse("https://a.test/2").unwrap();
        assert!(seen.claim(&a, 1));
        assert!(!seen.claim(&a_frag, 1));
        assert!(!seen.claim(&b, 1));
    }

    #[test]
    fn archive_lines_read_back_as_pages() {
        let page = Page { title: "T".into(), text: "java java".into(), links: vec![] };
        let mut out = Vec::new();
        write_archive(&mut out, "https://a.test/java", &page).unwrap();
        let line = String::from_utf8(out).unwrap();
        let v: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(v["url"], "https://a.test/java");
        assert_eq!(v["body"], "java java");
        assert_eq!(v["id"].as_str().unwrap().len(), 40);
    }
}
