use crate::{DocId, DocMeta, InvertedIndex};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn index(&self) -> PathBuf { self.root.join("index.bin") }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn doc_id_map(&self) -> PathBuf { self.root.join("doc_id_map.bin") }
    pub fn texts_dir(&self) -> PathBuf { self.root.join("texts") }
}

/// Everything the server needs to answer queries.
pub struct Snapshot {
    pub index: InvertedIndex,
    pub docs: HashMap<DocId, DocMeta>,
    pub meta: MetaFile,
}

fn write_bin<T: Serialize>(path: PathBuf, value: &T) -> Result<()> {
    let mut f = File::create(&path).with_context(|| format!("create {}", path.display()))?;
    let bytes = bincode::serialize(value)?;
    f.write_all(&bytes)?;
    Ok(())
}

fn read_bin<T: for<'de> Deserialize<'de>>(path: PathBuf) -> Result<T> {
    let mut f = File::open(&path).with_context(|| format!("open {}", path.display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let value = bincode::deserialize(&buf).with_context(|| format!("decode {}", path.display()))?;
    Ok(value)
}

pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_bin(paths.index(), index)
}

pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    read_bin(paths.index())
}

pub fn save_docs(paths: &IndexPaths, docs: &HashMap<DocId, DocMeta>) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_bin(paths.docs(), docs)
}

pub fn load_docs(paths: &IndexPaths) -> Result<HashMap<DocId, DocMeta>> {
    read_bin(paths.docs())
}

pub fn save_doc_id_map(paths: &IndexPaths, map: &HashMap<String, DocId>) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_bin(paths.doc_id_map(), map)
}

pub fn load_doc_id_map(paths: &IndexPaths) -> Result<HashMap<String, DocId>> {
    read_bin(paths.doc_id_map())
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    anyhow::ensure!(meta.version <= FORMAT_VERSION, "unsupported index version {}", meta.version);
    Ok(meta)
}

/// Load index, document metadata and meta file.
pub fn load_snapshot(paths: &IndexPaths) -> Result<Snapshot> {
    let meta = load_meta(paths)?;
    let index = load_index(paths)?;
    let docs = load_docs(paths)?;
    tracing::info!(root = %paths.root.display(), num_docs = index.num_docs(), num_terms = index.num_terms(), "snapshot loaded");
    Ok(Snapshot { index, docs, meta })
}
