//! Concrete n-gram inverted index.
//!
//! [`NgramIndex`] is an in-memory view of a corpus index part: a sorted key
//! table mapping `~`-joined n-grams to posting lists, plus the documents
//! themselves. It persists as a single bincode-encoded, zstd-compressed
//! snapshot so a part can be opened with one read.
//!
//! Building index parts at corpus scale is the job of external tooling; the
//! [`NgramIndex::from_documents`] constructor exists so tests, benches, and
//! small corpora can run the pipeline end to end.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use zstd::{decode_all, encode_all};

use crate::{CorpusError, Document, IndexStore};

/// Bump whenever the snapshot layout changes.
pub const INDEX_SCHEMA_VERSION: u16 = 2;

/// One posting: a document, its term frequency for the key, and the token
/// positions at which the n-gram starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc: u32,
    pub tf: u32,
    pub positions: Vec<u32>,
}

/// Posting list under one n-gram key. `total` is the stored document
/// frequency; `entries` are sorted by doc id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingList {
    pub total: u32,
    pub entries: Vec<Posting>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    schema_version: u16,
    gram: u32,
    docs: Vec<Document>,
    keys: Vec<(String, PostingList)>,
}

/// In-memory n-gram inverted index over a document set.
pub struct NgramIndex {
    gram: usize,
    docs: Vec<Document>,
    names: HashMap<String, u32>,
    keys: BTreeMap<String, PostingList>,
}

impl NgramIndex {
    /// Build an index part directly from documents.
    pub fn from_documents(docs: Vec<Document>, gram: usize) -> Self {
        let gram = gram.max(1);
        let mut keys: BTreeMap<String, PostingList> = BTreeMap::new();

        for (id, doc) in docs.iter().enumerate() {
            let words = doc.words();
            if words.len() < gram {
                continue;
            }
            let mut local: HashMap<String, Vec<u32>> = HashMap::new();
            for pos in 0..=(words.len() - gram) {
                let key = words[pos..pos + gram].join("~");
                local.entry(key).or_default().push(pos as u32);
            }
            for (key, positions) in local {
                let list = keys.entry(key).or_default();
                list.total += 1;
                list.entries.push(Posting {
                    doc: id as u32,
                    tf: positions.len() as u32,
                    positions,
                });
            }
        }

        for list in keys.values_mut() {
            list.entries.sort_by_key(|p| p.doc);
        }

        let names = docs
            .iter()
            .enumerate()
            .map(|(id, d)| (d.name.clone(), id as u32))
            .collect();

        NgramIndex {
            gram,
            docs,
            names,
            keys,
        }
    }

    /// Open a snapshot written by [`NgramIndex::save`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let file = File::open(path)?;
        let raw = decode_all(BufReader::new(file))?;
        let (snap, _): (Snapshot, usize) =
            decode_from_slice(&raw, standard()).map_err(|e| CorpusError::Decode(e.to_string()))?;
        if snap.schema_version != INDEX_SCHEMA_VERSION {
            return Err(CorpusError::SchemaVersion {
                found: snap.schema_version,
                expected: INDEX_SCHEMA_VERSION,
            });
        }
        let names = snap
            .docs
            .iter()
            .enumerate()
            .map(|(id, d)| (d.name.clone(), id as u32))
            .collect();
        Ok(NgramIndex {
            gram: snap.gram as usize,
            docs: snap.docs,
            names,
            keys: snap.keys.into_iter().collect(),
        })
    }

    /// Persist this part as a bincode+zstd snapshot.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CorpusError> {
        let snap = Snapshot {
            schema_version: INDEX_SCHEMA_VERSION,
            gram: self.gram as u32,
            docs: self.docs.clone(),
            keys: self
                .keys
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        let encoded =
            encode_to_vec(&snap, standard()).map_err(|e| CorpusError::Encode(e.to_string()))?;
        let compressed = encode_all(encoded.as_slice(), 3)?;
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(&compressed)?;
        out.flush()?;
        Ok(())
    }
}

impl IndexStore for NgramIndex {
    fn gram(&self) -> usize {
        self.gram
    }

    fn doc_count(&self) -> usize {
        self.docs.len()
    }

    fn doc(&self, id: u32) -> Option<&Document> {
        self.docs.get(id as usize)
    }

    fn doc_name(&self, id: u32) -> Option<&str> {
        self.docs.get(id as usize).map(|d| d.name.as_str())
    }

    fn doc_id(&self, name: &str) -> Option<u32> {
        self.names.get(name).copied()
    }

    fn key_count(&self) -> usize {
        self.keys.len()
    }

    fn scan<'a>(&'a self) -> Box<dyn Iterator<Item = (&'a str, &'a PostingList)> + 'a> {
        Box::new(self.keys.iter().map(|(k, v)| (k.as_str(), v)))
    }

    fn postings(&self, key: &str) -> Option<&PostingList> {
        self.keys.get(key)
    }
}
