use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ircore::persist::{save_doc_id_map, save_docs, save_index, save_meta, IndexPaths, MetaFile, FORMAT_VERSION};
use ircore::tokenizer::tokenize;
use ircore::{DocId, DocMeta, IndexBuilder, IndexConfig, LengthMetric};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    title: String,
    body: String,
    url: Option<String>,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a positional inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Document length used to normalize ranked scores
        #[arg(long, value_enum, default_value_t = LengthArg::Euclidean)]
        length_metric: LengthArg,
        /// Skip the per-document term counts (disables relevance feedback)
        #[arg(long, default_value_t = false)]
        no_doc_terms: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LengthArg {
    Euclidean,
    TokenCount,
}

impl From<LengthArg> for LengthMetric {
    fn from(arg: LengthArg) -> Self {
        match arg {
            LengthArg::Euclidean => LengthMetric::Euclidean,
            LengthArg::TokenCount => LengthMetric::TokenCount,
        }
    }
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, length_metric, no_doc_terms } => {
            let config = IndexConfig { track_doc_terms: !no_doc_terms, length_metric: length_metric.into() };
            build_index(&input, &output, config)
        }
    }
}

/// Ingestion state. Doc ids are handed out sequentially, which keeps every
/// term's insertions in non-decreasing doc id order.
struct Ingest<'a> {
    builder: IndexBuilder,
    next_doc_id: DocId,
    docs: HashMap<DocId, DocMeta>,
    doc_id_map: HashMap<String, DocId>,
    out_paths: &'a IndexPaths,
}

fn build_index(input: &str, output: &str, config: IndexConfig) -> Result<()> {
    let input_path = Path::new(input);
    let out_paths = IndexPaths::new(output);
    fs::create_dir_all(out_paths.texts_dir())?;

    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        anyhow::bail!("input path {input} does not exist");
    }

    let mut ingest = Ingest {
        builder: IndexBuilder::new(config),
        next_doc_id: 0,
        docs: HashMap::new(),
        doc_id_map: HashMap::new(),
        out_paths: &out_paths,
    };
    for file in files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            index_jsonl(&file, &mut ingest)?;
        } else {
            index_json(&file, &mut ingest)?;
        }
    }

    let Ingest { builder, docs, doc_id_map, .. } = ingest;
    let index = builder.build();
    tracing::info!(num_docs = index.num_docs(), num_terms = index.num_terms(), "ingested documents");

    save_index(&out_paths, &index)?;
    save_docs(&out_paths, &docs)?;
    save_doc_id_map(&out_paths, &doc_id_map)?;
    let meta = MetaFile {
        num_docs: index.num_docs() as u32,
        num_terms: index.num_terms() as u32,
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into()),
        version: FORMAT_VERSION,
    };
    save_meta(&out_paths, &meta)?;

    tracing::info!(output, "index build complete");
    Ok(())
}

fn index_jsonl(file: &Path, ingest: &mut Ingest) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line)?;
        ingest_doc(doc, ingest)?;
    }
    Ok(())
}

fn index_json(file: &Path, ingest: &mut Ingest) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let doc: InputDoc = serde_json::from_value(v)?;
                ingest_doc(doc, ingest)?;
            }
        }
        serde_json::Value::Object(_) => {
            let doc: InputDoc = serde_json::from_value(json)?;
            ingest_doc(doc, ingest)?;
        }
        _ => tracing::warn!(file = %file.display(), "expected an object or an array of objects, skipped"),
    }
    Ok(())
}

fn ingest_doc(doc: InputDoc, ingest: &mut Ingest) -> Result<()> {
    if ingest.doc_id_map.contains_key(&doc.id) {
        tracing::warn!(id = %doc.id, "duplicate document id, skipped");
        return Ok(());
    }
    let doc_id = ingest.next_doc_id;
    ingest.next_doc_id += 1;
    ingest.doc_id_map.insert(doc.id.clone(), doc_id);

    let tokens = tokenize(&doc.body);
    if tokens.is_empty() {
        // still counts towards N
        ingest.builder.set_doc_length(doc_id, 0.0);
    }
    for (term, pos) in tokens {
        ingest.builder.insert(&term, doc_id, pos)?;
    }

    // Write text for snippet extraction
    let text_rel = format!("texts/{}.txt", doc_id);
    fs::write(ingest.out_paths.root.join(&text_rel), &doc.body)?;

    ingest.docs.insert(doc_id, DocMeta { external_id: doc.id, title: doc.title, url: doc.url, text_path: Some(text_rel) });
    Ok(())
}
