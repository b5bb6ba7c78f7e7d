use crate::models::{EvidenceKind, Tag};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Local evidence persistence. `set_evidence_tags` is best-effort: callers
/// treat its failure as non-fatal.
pub trait EvidenceStore: Send + Sync {
    fn create_evidence(
        &self,
        file_path: &Path,
        operation_slug: &str,
        kind: EvidenceKind,
    ) -> Result<i64>;
    fn set_evidence_tags(&self, tags: &[Tag], evidence_id: i64) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: i64,
    pub file_path: PathBuf,
    pub operation_slug: String,
    pub kind: EvidenceKind,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum JournalLine {
    Evidence(EvidenceRecord),
    Tags { evidence_id: i64, tags: Vec<Tag> },
}

/// Append-only JSON-lines journal. Evidence rows are written once; later tag
/// assignments are appended as separate rows and merged on read.
pub struct JsonlEvidenceStore {
    path: PathBuf,
    next_id: Mutex<i64>,
}

impl JsonlEvidenceStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let next_id = Self::scan_max_id(&path)? + 1;
        Ok(Self {
            path,
            next_id: Mutex::new(next_id),
        })
    }

    fn scan_max_id(path: &Path) -> Result<i64> {
        if !path.exists() {
            return Ok(0);
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read evidence journal {}", path.display()))?;

        let mut max_id = 0;
        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            let parsed: JournalLine = serde_json::from_str(line).with_context(|| {
                format!("corrupt evidence journal line in {}", path.display())
            })?;
            if let JournalLine::Evidence(record) = parsed {
                max_id = max_id.max(record.id);
            }
        }
        Ok(max_id)
    }

    fn append(&self, line: &JournalLine) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).with_context(|| {
                format!("failed to create journal directory {}", parent.display())
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open journal {}", self.path.display()))?;

        let json = serde_json::to_string(line).context("failed to serialize journal line")?;
        writeln!(file, "{json}")?;
        Ok(())
    }

    /// Read the journal back with tag rows folded into their evidence rows.
    pub fn read_all(&self) -> Result<Vec<EvidenceRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read journal {}", self.path.display()))?;

        let mut records: Vec<EvidenceRecord> = Vec::new();
        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            match serde_json::from_str(line).with_context(|| {
                format!("corrupt evidence journal line in {}", self.path.display())
            })? {
                JournalLine::Evidence(record) => records.push(record),
                JournalLine::Tags { evidence_id, tags } => {
                    if let Some(record) = records.iter_mut().find(|r| r.id == evidence_id) {
                        record.tags = tags;
                    }
                }
            }
        }
        Ok(records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EvidenceStore for JsonlEvidenceStore {
    fn create_evidence(
        &self,
        file_path: &Path,
        operation_slug: &str,
        kind: EvidenceKind,
    ) -> Result<i64> {
        let mut next_id = self.next_id.lock().expect("evidence id mutex poisoned");
        let id = *next_id;

        self.append(&JournalLine::Evidence(EvidenceRecord {
            id,
            file_path: file_path.to_path_buf(),
            operation_slug: operation_slug.to_string(),
            kind,
            recorded_at: Utc::now(),
            tags: Vec::new(),
        }))?;

        *next_id += 1;
        Ok(id)
    }

    fn set_evidence_tags(&self, tags: &[Tag], evidence_id: i64) -> Result<()> {
        self.append(&JournalLine::Tags {
            evidence_id,
            tags: tags.to_vec(),
        })
    }
}

/// Persist clipboard text as a codeblock evidence file and return its path.
pub fn save_codeblock(content: &str, evidence_dir: &Path) -> Result<PathBuf> {
    create_dir_all(evidence_dir).with_context(|| {
        format!(
            "failed to create evidence directory {}",
            evidence_dir.display()
        )
    })?;

    let filename = format!(
        "codeblock-{}.txt",
        Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
    );
    let path = evidence_dir.join(filename);
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write codeblock {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::{EvidenceStore, JsonlEvidenceStore, save_codeblock};
    use crate::models::{EvidenceKind, Tag};
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn assigns_sequential_ids_and_reads_back() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlEvidenceStore::open(temp.path().join("evidence.jsonl")).expect("open");

        let first = store
            .create_evidence(Path::new("/tmp/a.png"), "op-one", EvidenceKind::Image)
            .expect("create");
        let second = store
            .create_evidence(Path::new("/tmp/b.txt"), "op-one", EvidenceKind::Codeblock)
            .expect("create");
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        let records = store.read_all().expect("read");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].operation_slug, "op-one");
        assert_eq!(records[1].kind, EvidenceKind::Codeblock);
    }

    #[test]
    fn tag_rows_fold_into_evidence_on_read() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlEvidenceStore::open(temp.path().join("evidence.jsonl")).expect("open");

        let id = store
            .create_evidence(Path::new("/tmp/a.png"), "op", EvidenceKind::Image)
            .expect("create");
        store
            .set_evidence_tags(
                &[Tag {
                    id: 4,
                    name: "finding".to_string(),
                }],
                id,
            )
            .expect("tags");

        let records = store.read_all().expect("read");
        assert_eq!(records[0].tags.len(), 1);
        assert_eq!(records[0].tags[0].name, "finding");
    }

    #[test]
    fn id_counter_resumes_after_reopen() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("evidence.jsonl");

        {
            let store = JsonlEvidenceStore::open(&path).expect("open");
            store
                .create_evidence(Path::new("/tmp/a.png"), "op", EvidenceKind::Image)
                .expect("create");
        }

        let store = JsonlEvidenceStore::open(&path).expect("reopen");
        let id = store
            .create_evidence(Path::new("/tmp/b.png"), "op", EvidenceKind::Image)
            .expect("create");
        assert_eq!(id, 2);
    }

    #[test]
    fn codeblock_file_contains_clipboard_text() {
        let temp = tempdir().expect("tempdir");
        let path = save_codeblock("fn main() {}", temp.path()).expect("save");
        let content = std::fs::read_to_string(&path).expect("read");
        assert_eq!(content, "fn main() {}");
    }
}
