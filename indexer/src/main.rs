use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;
use webindex_core::tokenizer::Analyzer;
use webindex_core::{Index, Store, StoreConfig, TermCounter};

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    body: String,
    #[serde(default)]
    url: Option<String>,
}

impl InputDoc {
    /// Pages are keyed by url; archives without one fall back to their id.
    fn label(&self) -> Option<&str> {
        self.url.as_deref().or(self.id.as_deref()).filter(|s| !s.trim().is_empty())
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, query and maintain the store-backed page index", long_about = None)]
struct Cli {
    /// Store locator: memory, sled:<path> or redis://host:port/db (default: $INDEX_STORE or sled:./index)
    #[arg(long, global = true)]
    store: Option<String>,
    /// Index words without stemming
    #[arg(long, global = true, default_value_t = false)]
    no_stem: bool,
    /// Index stop words too
    #[arg(long, global = true, default_value_t = false)]
    keep_stopwords: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index pages from JSON/JSONL files or a directory of them
    Index {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Re-index pages that are already in the index
        #[arg(long, default_value_t = false)]
        reindex: bool,
    },
    /// List the urls containing a term
    Urls {
        term: String,
        /// Use the term as given instead of normalizing it
        #[arg(long, default_value_t = false)]
        raw: bool,
    },
    /// Show how often a term occurs at a url
    Count {
        url: String,
        term: String,
        #[arg(long, default_value_t = false)]
        raw: bool,
    },
    /// Show the count of a term at every url containing it
    Counts {
        term: String,
        #[arg(long, default_value_t = false)]
        raw: bool,
    },
    /// List every indexed term (scans the whole store)
    Terms,
    /// List raw store keys of one record family
    Keys {
        #[arg(value_enum)]
        family: Family,
    },
    /// Print every term with its urls and counts
    Dump,
    /// Delete index data. Irreversible.
    Clear {
        #[arg(value_enum)]
        target: ClearTarget,
        /// Confirm the deletion
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Family {
    UrlSets,
    TermCounters,
}

#[derive(Clone, Copy, ValueEnum)]
enum ClearTarget {
    UrlSets,
    TermCounters,
    All,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let analyzer = Analyzer { stem: !cli.no_stem, drop_stopwords: !cli.keep_stopwords };

    let config = StoreConfig::resolve(cli.store.as_deref())?;
    let index = Index::new(config.open().with_context(|| format!("opening store {config}"))?);

    match cli.command {
        Commands::Index { input, reindex } => {
            let stats = index_path(&index, Path::new(&input), &analyzer, reindex)?;
            tracing::info!(indexed = stats.indexed, skipped = stats.skipped, input = %input, "indexing complete");
        }
        Commands::Urls { term, raw } => {
            let term = query_term(&analyzer, &term, raw)?;
            for url in index.urls_for_term(&term)? {
                println!("{url}");
            }
        }
        Commands::Count { url, term, raw } => {
            let term = query_term(&analyzer, &term, raw)?;
            println!("{}", index.count_at(&url, &term)?);
        }
        Commands::Counts { term, raw } => {
            let term = query_term(&analyzer, &term, raw)?;
            for (url, count) in index.counts_for_term(&term)? {
                println!("{url} {count}");
            }
        }
        Commands::Terms => {
            for term in index.indexed_terms()? {
                println!("{term}");
            }
        }
        Commands::Keys { family } => {
            let keys = match family {
                Family::UrlSets => index.url_set_keys()?,
                Family::TermCounters => index.term_counter_keys()?,
            };
            for key in keys {
                println!("{key}");
            }
        }
        Commands::Dump => {
            let stdout = io::stdout();
            index.dump(&mut stdout.lock())?;
        }
        Commands::Clear { target, yes } => {
            if !yes {
                return Err(anyhow!("refusing to delete index data without --yes"));
            }
            let deleted = match target {
                ClearTarget::UrlSets => index.clear_url_sets()?,
                ClearTarget::TermCounters => index.clear_term_counters()?,
                ClearTarget::All => index.clear_all()?,
            };
            println!("deleted {deleted} keys");
        }
    }
    Ok(())
}

fn query_term(analyzer: &Analyzer, term: &str, raw: bool) -> Result<String> {
    if raw {
        return Ok(term.to_string());
    }
    analyzer
        .normalize(term)
        .ok_or_else(|| anyhow!("{term:?} is not an indexable term (stop word or no letters); pass --raw to look it up as is"))
}

#[derive(Debug, Default, PartialEq, Eq)]
struct IndexStats {
    indexed: usize,
    skipped: usize,
}

fn index_path<S: Store>(index: &Index<S>, input: &Path, analyzer: &Analyzer, reindex: bool) -> Result<IndexStats> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
        files.sort();
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        return Err(anyhow!("input {} does not exist", input.display()));
    }

    let mut stats = IndexStats::default();
    for file in files {
        let docs = read_docs(&file).with_context(|| format!("reading {}", file.display()))?;
        for doc in docs {
            ingest_doc(index, doc, analyzer, reindex, &mut stats)?;
        }
    }
    Ok(stats)
}

fn read_docs(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let mut docs = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            docs.push(serde_json::from_str(&line)?);
        }
        return Ok(docs);
    }
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    Ok(match json {
        serde_json::Value::Array(arr) => arr.into_iter().map(serde_json::from_value::<InputDoc>).collect::<Result<Vec<_>, _>>()?,
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => Vec::new(),
    })
}

fn ingest_doc<S: Store>(index: &Index<S>, doc: InputDoc, analyzer: &Analyzer, reindex: bool, stats: &mut IndexStats) -> Result<()> {
    let Some(url) = doc.label() else {
        tracing::warn!(title = doc.title.as_deref().unwrap_or(""), "document has neither url nor id; skipped");
        stats.skipped += 1;
        return Ok(());
    };
    if !reindex && index.is_indexed(url)? {
        tracing::debug!(url, "already indexed");
        stats.skipped += 1;
        return Ok(());
    }
    let mut terms = TermCounter::new(url);
    terms.process_text(&doc.body, analyzer);
    index.index_page(url, &terms).with_context(|| format!("indexing {url}"))?;
    stats.indexed += 1;
    Ok(())
}
