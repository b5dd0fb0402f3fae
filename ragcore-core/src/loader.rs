//! Component D — concurrent file loading: walks a path, dispatches
//! parsing by extension, chunks the result, and inserts chunks into
//! the vector store (embedded) while registering the owning `File` in
//! the graph store, deduplicated on path (spec §4.D).
//!
//! Grounded on the teacher's `processor.rs` multi-stage orchestration
//! shape and on `tonydavis629-canopy`'s use of `rayon` for bounded
//! file-level parallelism — the teacher itself is single-threaded, so
//! the worker pool is an "enrich from the rest of the pack" pull.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use uuid::Uuid;

use crate::chunker::{chunk_pages, DEFAULT_MAX_CHUNK_SIZE};
use crate::error::CoreError;
use crate::graph::GraphStore;
use crate::llm::LlmClient;
use crate::model::{Chunk, File};
use crate::pdf;
use crate::vector::{Embedding, VectorStore};

#[derive(Debug, Default, Clone, Copy)]
pub struct LoadStats {
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub chunks_inserted: usize,
}

pub struct LoadResult {
    pub stats: LoadStats,
    /// Every chunk produced by a newly-loaded file this run, handed
    /// off to the KG builder without re-reading the vector store.
    pub chunks: Vec<Chunk>,
}

trait DocumentParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<String>, CoreError>;
}

struct PdfParser;

impl DocumentParser for PdfParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<String>, CoreError> {
        pdf::parse_to_pages(bytes)
    }
}

struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<String>, CoreError> {
        Ok(vec![String::from_utf8_lossy(bytes).into_owned()])
    }
}

/// `.docx` and other archive/office formats are collaborators spec.md
/// §1 treats as external interfaces only; this models the seam a real
/// parser would sit behind without implementing the format itself.
struct UnsupportedParser(String);

impl DocumentParser for UnsupportedParser {
    fn parse(&self, _bytes: &[u8]) -> Result<Vec<String>, CoreError> {
        Err(CoreError::Input(format!(
            "{} parsing is outside this engine's core scope",
            self.0
        )))
    }
}

fn parser_for(extension: &str) -> Box<dyn DocumentParser> {
    match extension.to_ascii_lowercase().as_str() {
        "pdf" => Box::new(PdfParser),
        "txt" | "md" => Box::new(PlainTextParser),
        other => Box::new(UnsupportedParser(other.to_string())),
    }
}

fn file_key(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    format!("{:x}", hasher.finalize())
}

struct RawFile {
    display_path: String,
    extension: String,
    bytes: Vec<u8>,
}

/// Recursively collects files under `root`, skipping `~$`-prefixed
/// temp files. ZIP members are extracted into a scratch `TempDir`
/// whose lifetime is scoped to this call — it drops (and so deletes)
/// before `collect` returns, on every exit path including an error
/// partway through extraction (spec §5).
fn collect(root: &Path, out: &mut Vec<RawFile>) -> Result<(), CoreError> {
    if root.is_dir() {
        let entries = fs::read_dir(root).map_err(|e| CoreError::Input(format!("reading {}: {e}", root.display())))?;
        for entry in entries {
            let entry = entry.map_err(|e| CoreError::Input(e.to_string()))?;
            let path = entry.path();
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with("~$"))
            {
                continue;
            }
            collect(&path, out)?;
        }
        return Ok(());
    }

    let extension = root.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    if extension == "zip" {
        let bytes = fs::read(root).map_err(|e| CoreError::Input(e.to_string()))?;
        let reader = std::io::Cursor::new(bytes);
        let mut archive = zip::ZipArchive::new(reader).map_err(|e| CoreError::parse(root.display().to_string(), e))?;
        let scratch = TempDir::new().map_err(|e| CoreError::Input(e.to_string()))?;
        archive
            .extract(scratch.path())
            .map_err(|e| CoreError::parse(root.display().to_string(), e))?;
        collect(scratch.path(), out)?;
        return Ok(());
    }

    let bytes = fs::read(root).map_err(|e| CoreError::Input(e.to_string()))?;
    out.push(RawFile {
        display_path: root.display().to_string(),
        extension,
        bytes,
    });
    Ok(())
}

pub struct Loader<'a> {
    graph: &'a dyn GraphStore,
    vectors: &'a dyn VectorStore,
    llm: &'a dyn LlmClient,
    max_chunk_size: usize,
    /// Spec §5's single pipeline-global critical section for store
    /// writes, scoped to this stage (the loader and the KG builder
    /// each hold their own — stages are joined, never concurrent with
    /// each other, so this is equivalent to one global lock).
    write_gate: Mutex<()>,
}

impl<'a> Loader<'a> {
    pub fn new(graph: &'a dyn GraphStore, vectors: &'a dyn VectorStore, llm: &'a dyn LlmClient, max_chunk_size: usize) -> Self {
        let max_chunk_size = if max_chunk_size == 0 { DEFAULT_MAX_CHUNK_SIZE } else { max_chunk_size };
        Loader {
            graph,
            vectors,
            llm,
            max_chunk_size,
            write_gate: Mutex::new(()),
        }
    }

    /// Walks `root` with a worker pool bounded by `parallel_limit`,
    /// parsing, chunking, and inserting every file not already present
    /// under its path-derived key (dedup on path, spec §4.D/§8 loader
    /// idempotence). A single file's parse failure is logged and
    /// skipped rather than aborting the run (spec §7).
    pub fn load_path(&self, root: &Path, parallel_limit: usize) -> Result<LoadResult, CoreError> {
        let mut raw = Vec::new();
        collect(root, &mut raw)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallel_limit.max(1))
            .build()
            .map_err(|e| CoreError::Input(e.to_string()))?;

        let outcomes: Vec<Result<Vec<Chunk>, CoreError>> = pool.install(|| raw.par_iter().map(|file| self.load_one(file)).collect());

        let mut stats = LoadStats::default();
        let mut chunks = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(produced) if produced.is_empty() => stats.files_skipped += 1,
                Ok(produced) => {
                    stats.files_loaded += 1;
                    stats.chunks_inserted += produced.len();
                    chunks.extend(produced);
                }
                Err(err) => {
                    tracing::warn!(%err, "file load failed, skipping");
                    stats.files_failed += 1;
                }
            }
        }

        Ok(LoadResult { stats, chunks })
    }

    /// Returns the chunks produced for a newly-loaded file, or an
    /// empty vec if the file was already loaded (idempotent re-run).
    fn load_one(&self, file: &RawFile) -> Result<Vec<Chunk>, CoreError> {
        let key = file_key(&file.display_path);

        {
            let _gate = self.write_gate.lock().unwrap();
            if self.graph.get_file(&key)?.is_some() {
                return Ok(Vec::new());
            }
        }

        let parser = parser_for(&file.extension);
        let pages = parser.parse(&file.bytes)?;
        let outputs = chunk_pages(&pages, self.max_chunk_size);

        let label = Path::new(&file.display_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&file.display_path)
            .to_string();

        let mut chunks = Vec::with_capacity(outputs.len());
        let mut embeddings = Vec::with_capacity(outputs.len());
        for (index, output) in outputs.iter().enumerate() {
            let vector = self.llm.embed(&output.content)?;
            let mut payload = HashMap::new();
            payload.insert("file_key".to_string(), key.clone());
            payload.insert("text".to_string(), output.content.clone());
            payload.insert("heading_path".to_string(), output.heading_path.join(" / "));
            payload.insert("page_hint".to_string(), output.page_hint.clone());
            embeddings.push(Embedding {
                id: Uuid::new_v4(),
                vector,
                payload,
            });
            chunks.push(Chunk {
                file_key: key.clone(),
                index,
                heading_path: output.heading_path.clone(),
                text: output.content.clone(),
                pages: output.pages.clone(),
            });
        }

        let _gate = self.write_gate.lock().unwrap();
        if self.graph.get_file(&key)?.is_some() {
            // Another worker raced us between the first check and here.
            return Ok(Vec::new());
        }
        self.graph.upsert_file(File {
            key: key.clone(),
            path: file.display_path.clone(),
            label,
            loaded_at: chrono::Utc::now(),
            chunk_count: chunks.len(),
        })?;
        for embedding in embeddings {
            self.vectors.upsert(embedding)?;
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryGraphStore;
    use crate::llm::EchoLlmClient;
    use crate::vector::InMemoryVectorStore;
    use std::io::Write;

    #[test]
    fn ignores_temp_files_and_loads_text() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("note.txt"), "# Title\n\nHello world.").unwrap();
        let mut temp = std::fs::File::create(dir.path().join("~$note.txt")).unwrap();
        temp.write_all(b"should be ignored").unwrap();

        let graph = InMemoryGraphStore::new();
        let vectors = InMemoryVectorStore::new();
        let llm = EchoLlmClient;
        let loader = Loader::new(&graph, &vectors, &llm, 4096);

        let result = loader.load_path(dir.path(), 2).unwrap();
        assert_eq!(result.stats.files_loaded, 1);
        assert_eq!(result.chunks.len(), 1);
    }

    #[test]
    fn reingesting_the_same_path_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "Body text.").unwrap();

        let graph = InMemoryGraphStore::new();
        let vectors = InMemoryVectorStore::new();
        let llm = EchoLlmClient;
        let loader = Loader::new(&graph, &vectors, &llm, 4096);

        let first = loader.load_path(dir.path(), 2).unwrap();
        let second = loader.load_path(dir.path(), 2).unwrap();

        assert_eq!(first.stats.files_loaded, 1);
        assert_eq!(second.stats.files_loaded, 0);
        assert_eq!(second.stats.files_skipped, 1);
        assert!(second.chunks.is_empty());
    }

    #[test]
    fn unsupported_extension_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.docx"), b"not really a docx").unwrap();

        let graph = InMemoryGraphStore::new();
        let vectors = InMemoryVectorStore::new();
        let llm = EchoLlmClient;
        let loader = Loader::new(&graph, &vectors, &llm, 4096);

        let result = loader.load_path(dir.path(), 1).unwrap();
        assert_eq!(result.stats.files_failed, 1);
        assert_eq!(result.stats.files_loaded, 0);
    }
}
