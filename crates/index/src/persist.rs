//! Crash-safe persistence for the vector index
//!
//! Two files under the data directory:
//! - `vector_index.bin`: raw normalized vectors, one record per paper
//! - `vector_index_meta.bin`: header + length-prefixed metadata records
//!
//! Both are written with the atomic rename pattern (write `<name>.tmp`,
//! fsync, rename over the final path). Records are emitted in ascending
//! paper-id order and the format carries no timestamps, so re-saving an
//! unchanged index is byte-identical.

use crate::paper::{ContentHash, Paper};
use crate::strategy::IndexStrategy;
use citeguard_common::errors::{CoreError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const VECTOR_FILE: &str = "vector_index.bin";
pub const META_FILE: &str = "vector_index_meta.bin";

const VECTOR_MAGIC: &[u8; 4] = b"CGVX";
const META_MAGIC: &[u8; 4] = b"CGVM";
const FORMAT_VERSION: u16 = 1;

/// Separator for the authors-joined field; never appears in author names
/// that survive normalization upstream.
const AUTHOR_SEPARATOR: char = '\u{1f}';

/// Snapshot handed to the writer / returned by the reader
#[derive(Debug)]
pub struct PersistedIndex {
    pub strategy: IndexStrategy,
    pub dimension: usize,
    pub next_paper_id: u64,
    pub papers: Vec<Paper>,
}

/// Serialize and atomically write both index files.
pub fn write_index(data_dir: &Path, snapshot: &PersistedIndex) -> Result<()> {
    fs::create_dir_all(data_dir)?;

    let vectors = encode_vectors(snapshot);
    let meta = encode_meta(snapshot);

    atomic_write(&data_dir.join(VECTOR_FILE), &vectors)?;
    atomic_write(&data_dir.join(META_FILE), &meta)?;
    Ok(())
}

/// Read both index files. Returns `Ok(None)` when no index has been
/// persisted yet; format violations surface as `IndexCorrupted`.
pub fn read_index(data_dir: &Path) -> Result<Option<PersistedIndex>> {
    let vector_path = data_dir.join(VECTOR_FILE);
    let meta_path = data_dir.join(META_FILE);

    if !vector_path.exists() || !meta_path.exists() {
        return Ok(None);
    }

    let vectors = fs::read(&vector_path)?;
    let meta = fs::read(&meta_path)?;

    let (dimension, vector_rows) = decode_vectors(&vectors)?;
    let mut snapshot = decode_meta(&meta)?;

    if snapshot.dimension != dimension {
        return Err(CoreError::IndexCorrupted {
            message: format!(
                "meta dimension {} disagrees with vector file dimension {}",
                snapshot.dimension, dimension
            ),
        });
    }

    // Join vectors to metadata by paper id
    for paper in snapshot.papers.iter_mut() {
        match vector_rows.iter().find(|(id, _)| *id == paper.paper_id) {
            Some((_, vector)) => paper.embedding = vector.clone(),
            None => {
                return Err(CoreError::IndexCorrupted {
                    message: format!("paper {} has metadata but no vector", paper.paper_id),
                })
            }
        }
    }

    if vector_rows.len() != snapshot.papers.len() {
        return Err(CoreError::IndexCorrupted {
            message: format!(
                "{} vectors for {} metadata records",
                vector_rows.len(),
                snapshot.papers.len()
            ),
        });
    }

    Ok(Some(snapshot))
}

/// Copy both persisted files into `backup_<UTCstamp>/` under the data
/// directory. Returns the backup directory path.
pub fn backup(data_dir: &Path) -> Result<PathBuf> {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    let backup_dir = data_dir.join(format!("backup_{}", stamp));
    fs::create_dir_all(&backup_dir)?;

    for name in [VECTOR_FILE, META_FILE] {
        let source = data_dir.join(name);
        if source.exists() {
            fs::copy(&source, backup_dir.join(name))?;
        }
    }

    Ok(backup_dir)
}

/// Write `<path>.tmp`, fsync, rename over the final path.
fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_file_name(format!(
        "{}.tmp",
        path.file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CoreError::Persistence {
                message: format!("invalid path {:?}", path),
            })?
    ));

    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn encode_vectors(snapshot: &PersistedIndex) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        16 + snapshot.papers.len() * (8 + snapshot.dimension * 4),
    );
    out.extend_from_slice(VECTOR_MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(snapshot.dimension as u16).to_le_bytes());
    out.extend_from_slice(&(snapshot.papers.len() as u64).to_le_bytes());

    for paper in &snapshot.papers {
        out.extend_from_slice(&paper.paper_id.to_le_bytes());
        for &x in &paper.embedding {
            out.extend_from_slice(&x.to_le_bytes());
        }
    }
    out
}

fn decode_vectors(bytes: &[u8]) -> Result<(usize, Vec<(u64, Vec<f32>)>)> {
    let mut cursor = Cursor::new(bytes);
    let magic = cursor.take(4)?;
    if magic != VECTOR_MAGIC {
        return Err(corrupted("bad vector file magic"));
    }
    let version = cursor.u16()?;
    if version != FORMAT_VERSION {
        return Err(corrupted(&format!("unsupported vector file version {}", version)));
    }
    let dimension = cursor.u16()? as usize;
    let count = cursor.u64()? as usize;

    let mut rows = Vec::with_capacity(count);
    for _ in 0..count {
        let id = cursor.u64()?;
        let mut vector = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            vector.push(cursor.f32()?);
        }
        rows.push((id, vector));
    }
    Ok((dimension, rows))
}

fn encode_meta(snapshot: &PersistedIndex) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(META_MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.push(snapshot.strategy.tag());
    out.extend_from_slice(&(snapshot.dimension as u16).to_le_bytes());
    out.extend_from_slice(&(snapshot.papers.len() as u64).to_le_bytes());
    out.extend_from_slice(&snapshot.next_paper_id.to_le_bytes());

    for paper in &snapshot.papers {
        out.extend_from_slice(&paper.paper_id.to_le_bytes());
        out.extend_from_slice(paper.content_hash.as_bytes());
        let authors_joined = paper.authors.join(&AUTHOR_SEPARATOR.to_string());
        for field in [
            paper.title.as_str(),
            paper.abstract_text.as_str(),
            authors_joined.as_str(),
            paper.source.as_str(),
            paper.document_type.as_str(),
            paper.publication_date.as_str(),
            paper.doi.as_str(),
            paper.url.as_str(),
        ] {
            out.extend_from_slice(&(field.len() as u32).to_le_bytes());
            out.extend_from_slice(field.as_bytes());
        }
    }
    out
}

fn decode_meta(bytes: &[u8]) -> Result<PersistedIndex> {
    let mut cursor = Cursor::new(bytes);
    let magic = cursor.take(4)?;
    if magic != META_MAGIC {
        return Err(corrupted("bad meta file magic"));
    }
    let version = cursor.u16()?;
    if version != FORMAT_VERSION {
        return Err(corrupted(&format!("unsupported meta file version {}", version)));
    }
    let strategy_tag = cursor.u8()?;
    let strategy = IndexStrategy::from_tag(strategy_tag)
        .ok_or_else(|| corrupted(&format!("unknown strategy tag {}", strategy_tag)))?;
    let dimension = cursor.u16()? as usize;
    let count = cursor.u64()? as usize;
    let next_paper_id = cursor.u64()?;

    let mut papers = Vec::with_capacity(count);
    for _ in 0..count {
        let paper_id = cursor.u64()?;
        let hash_bytes: [u8; 32] = cursor
            .take(32)?
            .try_into()
            .map_err(|_| corrupted("truncated content hash"))?;

        let mut fields = Vec::with_capacity(8);
        for _ in 0..8 {
            fields.push(cursor.string()?);
        }
        let [title, abstract_text, authors_joined, source, document_type, publication_date, doi, url]: [String; 8] =
            fields.try_into().expect("eight fields read");

        let authors = if authors_joined.is_empty() {
            Vec::new()
        } else {
            authors_joined
                .split(AUTHOR_SEPARATOR)
                .map(str::to_string)
                .collect()
        };

        papers.push(Paper {
            paper_id,
            content_hash: ContentHash(hash_bytes),
            title,
            abstract_text,
            authors,
            source,
            document_type,
            publication_date,
            doi,
            url,
            embedding: Vec::new(),
        });
    }

    Ok(PersistedIndex {
        strategy,
        dimension,
        next_paper_id,
        papers,
    })
}

fn corrupted(message: &str) -> CoreError {
    CoreError::IndexCorrupted {
        message: message.to_string(),
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(corrupted("unexpected end of file"));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn string(&mut self) -> Result<String> {
        let len = u32::from_le_bytes(self.take(4)?.try_into().unwrap()) as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| corrupted("invalid utf-8 in string field"))
    }
}
