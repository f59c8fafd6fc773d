//! ftk-audit
//!
//! Append-only JSON Lines trail of what the order store accepted. One record
//! per committed transition or payment, numbered from zero. Manager overrides
//! are their own kind so a reviewer can pull them out with [`overrides`].
//!
//! With chaining on, every record carries the digest of its predecessor and
//! its own SHA-256 digest; [`verify_chain`] reports the first line that was
//! edited, dropped or moved.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditKind {
    Transition,
    /// Transition that skipped the concurrency stamp on a manager's say-so.
    OverrideTransition,
    Paid,
}

impl AuditKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditKind::Transition => "TRANSITION",
            AuditKind::OverrideTransition => "OVERRIDE_TRANSITION",
            AuditKind::Paid => "PAID",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Position in the file, starting at 0.
    pub seq: u64,
    pub at: DateTime<Utc>,
    /// Store instance that wrote the record. Survives a resume.
    pub store_id: Uuid,
    pub order_id: String,
    pub kind: AuditKind,
    pub detail: Value,
    pub prev: Option<String>,
    pub digest: Option<String>,
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

pub struct AuditWriter {
    path: PathBuf,
    chained: bool,
    head: Option<String>,
    store_id: Uuid,
    next_seq: u64,
}

impl AuditWriter {
    /// Start a trail at `path`, creating parent directories.
    pub fn new(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }
        Ok(Self {
            path,
            chained: hash_chain,
            head: None,
            store_id: Uuid::new_v4(),
            next_seq: 0,
        })
    }

    /// Continue an existing trail: sequence, chain head and store id are taken
    /// from its last record. A missing file starts a fresh trail.
    pub fn resume(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let mut w = Self::new(path, hash_chain)?;
        if !w.path.exists() {
            return Ok(w);
        }
        if let Some(last) = read_records(&w.path)?.pop() {
            w.next_seq = last.seq + 1;
            w.head = last.digest;
            w.store_id = last.store_id;
        }
        Ok(w)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sequence number the next record will get.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Append one record. Nothing is advanced unless the line reached disk.
    pub fn append(&mut self, kind: AuditKind, order_id: &str, detail: Value) -> Result<AuditRecord> {
        let mut rec = AuditRecord {
            seq: self.next_seq,
            at: Utc::now(),
            store_id: self.store_id,
            order_id: order_id.to_string(),
            kind,
            detail,
            prev: None,
            digest: None,
        };
        if self.chained {
            rec.prev = self.head.clone();
            rec.digest = Some(digest(&rec)?);
        }

        let mut line = canonical(&rec)?;
        line.push('\n');
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open audit trail {:?}", self.path))?;
        f.write_all(line.as_bytes())
            .with_context(|| format!("write audit trail {:?}", self.path))?;

        self.next_seq += 1;
        if self.chained {
            self.head = rec.digest.clone();
        }
        Ok(rec)
    }
}

/// serde_json's map is ordered by key, so a round-trip through `Value` gives
/// one spelling per record.
fn canonical<T: Serialize>(v: &T) -> Result<String> {
    let value = serde_json::to_value(v).context("serialize audit record")?;
    serde_json::to_string(&value).context("encode audit record")
}

/// SHA-256 over the canonical record with `digest` cleared.
pub fn digest(rec: &AuditRecord) -> Result<String> {
    let unsealed = AuditRecord {
        digest: None,
        ..rec.clone()
    };
    Ok(hex::encode(Sha256::digest(canonical(&unsealed)?.as_bytes())))
}

// ---------------------------------------------------------------------------
// Reading and verification
// ---------------------------------------------------------------------------

fn parse_lines(content: &str) -> impl Iterator<Item = (usize, Result<AuditRecord>)> + '_ {
    content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| {
            let rec = serde_json::from_str(l.trim())
                .with_context(|| format!("parse audit record at line {}", i + 1));
            (i + 1, rec)
        })
}

pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<AuditRecord>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit trail {:?}", path.as_ref()))?;
    parse_lines(&content).map(|(_, r)| r).collect()
}

/// Every manager override in the trail, oldest first.
pub fn overrides(path: impl AsRef<Path>) -> Result<Vec<AuditRecord>> {
    Ok(read_records(path)?
        .into_iter()
        .filter(|r| r.kind == AuditKind::OverrideTransition)
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainReport {
    Intact { records: usize },
    /// `line` is 1-based, counting blank lines.
    Broken { line: usize, reason: String },
}

pub fn verify_chain(path: impl AsRef<Path>) -> Result<ChainReport> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit trail {:?}", path.as_ref()))?;
    verify_chain_str(&content)
}

/// [`verify_chain`] over JSONL already in memory.
pub fn verify_chain_str(content: &str) -> Result<ChainReport> {
    let mut head: Option<String> = None;
    let mut expected_seq: Option<u64> = None;
    let mut records = 0usize;

    for (line, rec) in parse_lines(content) {
        let rec = rec?;
        let broken = |reason: String| -> Result<ChainReport> {
            Ok(ChainReport::Broken { line, reason })
        };

        // The first record fixes the start; after that the trail is gapless.
        if let Some(want) = expected_seq {
            if rec.seq != want {
                return broken(format!("sequence gap: expected {}, found {}", want, rec.seq));
            }
        }
        if rec.prev != head {
            return broken(format!("prev mismatch: expected {:?}, found {:?}", head, rec.prev));
        }
        if let Some(claimed) = &rec.digest {
            let actual = digest(&rec)?;
            if *claimed != actual {
                return broken(format!("digest mismatch: claimed {}, computed {}", claimed, actual));
            }
        }

        expected_seq = Some(rec.seq + 1);
        head = rec.digest;
        records += 1;
    }

    Ok(ChainReport::Intact { records })
}
