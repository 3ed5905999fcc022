//! Append-only JSON-lines persistence for `key -> record` maps.
//!
//! Every mutation appends one line; `load` replays the file. Once the number
//! of appended operations outgrows the live set by `compact_ratio`, the owner
//! calls `compact` which rewrites the live set through a temp file and an
//! atomic rename. A single legacy JSON object document (`{key: record}`) is
//! imported on load and immediately rewritten in journal form.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub const JOURNAL_VERSION: u32 = 1;
const MIN_COMPACT_OPS: usize = 64;

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Op<V> {
    Header { version: u32 },
    Put { key: String, value: V },
    Delete { key: String },
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum OpRef<'a, V> {
    Header { version: u32 },
    Put { key: &'a str, value: &'a V },
    Delete { key: &'a str },
}

#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    compact_ratio: f64,
    ops_since_compact: usize,
    /// The file ends mid-line (torn write); the next append starts a new line.
    unterminated: bool,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>, compact_ratio: f64) -> Self {
        Self { path: path.into(), compact_ratio: compact_ratio.max(1.0), ops_since_compact: 0, unterminated: false }
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn size_bytes(&self) -> u64 { fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0) }

    /// Replay the journal. A missing file is an empty map.
    pub fn load<V: DeserializeOwned + Serialize>(&mut self) -> Result<HashMap<String, V>> {
        self.ops_since_compact = 0;
        self.unterminated = false;
        if !self.path.exists() { return Ok(HashMap::new()); }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() { return Ok(HashMap::new()); }
        self.unterminated = !content.ends_with('\n');

        if let Ok(serde_json::Value::Object(doc)) = serde_json::from_str::<serde_json::Value>(&content) {
            if !doc.contains_key("op") { return self.migrate_legacy(doc); }
        }

        let mut live = HashMap::new();
        let mut skipped = 0usize;
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() { continue; }
            match serde_json::from_str::<Op<V>>(line) {
                Ok(Op::Header { version }) if version > JOURNAL_VERSION => {
                    return Err(Error::data(&self.path, format!("journal version {version} is newer than supported {JOURNAL_VERSION}")));
                }
                Ok(Op::Header { .. }) => {}
                Ok(Op::Put { key, value }) => { live.insert(key, value); self.ops_since_compact += 1; }
                Ok(Op::Delete { key }) => { live.remove(&key); self.ops_since_compact += 1; }
                Err(e) => { skipped += 1; warn!(path = %self.path.display(), line = lineno + 1, error = %e, "skipping unreadable journal line"); }
            }
        }
        debug!(path = %self.path.display(), live = live.len(), ops = self.ops_since_compact, skipped, "journal replayed");
        Ok(live)
    }

    /// `load`, except that an unreadable file is moved aside to
    /// `<file>.corrupt` and the caller starts from an empty map.
    pub fn load_or_quarantine<V: DeserializeOwned + Serialize>(&mut self) -> HashMap<String, V> {
        match self.load() {
            Ok(live) => live,
            Err(e) => {
                let mut aside = self.path.clone().into_os_string();
                aside.push(".corrupt");
                match fs::rename(&self.path, &aside) {
                    Ok(()) => warn!(path = %self.path.display(), error = %e, moved_to = ?aside, "cache file unreadable, starting empty"),
                    Err(mv) => warn!(path = %self.path.display(), error = %e, rename_error = %mv, "cache file unreadable and could not be moved aside, starting empty"),
                }
                self.ops_since_compact = 0;
                self.unterminated = false;
                HashMap::new()
            }
        }
    }

    fn migrate_legacy<V: DeserializeOwned + Serialize>(&mut self, doc: serde_json::Map<String, serde_json::Value>) -> Result<HashMap<String, V>> {
        let total = doc.len();
        let mut live = HashMap::with_capacity(total);
        for (key, value) in doc {
            match serde_json::from_value::<V>(value) {
                Ok(v) => { live.insert(key, v); }
                Err(e) => warn!(path = %self.path.display(), %key, error = %e, "dropping unreadable legacy record"),
            }
        }
        self.compact(live.iter())?;
        info!(path = %self.path.display(), imported = live.len(), total, "migrated legacy cache document to journal");
        Ok(live)
    }

    pub fn put<V: Serialize>(&mut self, key: &str, value: &V) -> Result<()> {
        self.append(&OpRef::Put { key, value })
    }

    /// Append several puts with a single write; on error none of them were
    /// acknowledged.
    pub fn put_batch<'a, V: Serialize + 'a>(&mut self, entries: impl IntoIterator<Item = (&'a str, &'a V)>) -> Result<()> {
        let mut lines = Vec::new();
        let mut n = 0usize;
        for (key, value) in entries {
            serde_json::to_writer(&mut lines, &OpRef::Put { key, value })?;
            lines.push(b'\n');
            n += 1;
        }
        if n == 0 { return Ok(()); }
        self.write_ops(&lines, n)
    }

    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.append::<()>(&OpRef::Delete { key })
    }

    fn append<V: Serialize>(&mut self, op: &OpRef<'_, V>) -> Result<()> {
        let mut line = serde_json::to_vec(op)?;
        line.push(b'\n');
        self.write_ops(&line, 1)
    }

    fn write_ops(&mut self, lines: &[u8], ops: usize) -> Result<()> {
        if let Some(parent) = self.path.parent() { if !parent.as_os_str().is_empty() { fs::create_dir_all(parent)?; } }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut buf = Vec::with_capacity(lines.len() + 32);
        if file.metadata()?.len() == 0 {
            let header: OpRef<'_, ()> = OpRef::Header { version: JOURNAL_VERSION };
            serde_json::to_writer(&mut buf, &header)?;
            buf.push(b'\n');
        } else if self.unterminated {
            buf.push(b'\n');
        }
        buf.extend_from_slice(lines);
        file.write_all(&buf)?;
        file.flush()?;
        self.unterminated = false;
        self.ops_since_compact += ops;
        Ok(())
    }

    pub fn needs_compaction(&self, live: usize) -> bool {
        let budget = ((live as f64) * self.compact_ratio) as usize;
        self.ops_since_compact > budget.max(MIN_COMPACT_OPS)
    }

    /// Rewrite the file so it holds exactly `live`.
    pub fn compact<'a, V: Serialize + 'a>(&mut self, live: impl IntoIterator<Item = (&'a String, &'a V)>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut w = BufWriter::new(tmp.as_file());
            let header: OpRef<'_, ()> = OpRef::Header { version: JOURNAL_VERSION };
            serde_json::to_writer(&mut w, &header)?;
            w.write_all(b"\n")?;
            let mut n = 0usize;
            for (key, value) in live {
                serde_json::to_writer(&mut w, &OpRef::Put { key: key.as_str(), value })?;
                w.write_all(b"\n")?;
                n += 1;
            }
            w.flush()?;
            debug!(path = %self.path.display(), records = n, "journal compacted");
        }
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        self.ops_since_compact = 0;
        self.unterminated = false;
        Ok(())
    }

    /// Delete the backing file.
    pub fn remove(&mut self) -> Result<()> {
        if self.path.exists() { fs::remove_file(&self.path)?; }
        self.ops_since_compact = 0;
        self.unterminated = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Rec {
        text: String,
        #[serde(default)]
        hits: u32,
    }

    fn rec(text: &str, hits: u32) -> Rec { Rec { text: text.to_string(), hits } }

    #[test]
    fn put_delete_and_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.jsonl");
        let mut j = Journal::new(&path, 2.0);
        j.put("a", &rec("alpha", 0)).unwrap();
        j.put("b", &rec("bravo", 1)).unwrap();
        j.put("a", &rec("alpha", 3)).unwrap();
        j.delete("b").unwrap();

        let mut reopened = Journal::new(&path, 2.0);
        let live: HashMap<String, Rec> = reopened.load().unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live["a"], rec("alpha", 3));
        let first = fs::read_to_string(&path).unwrap().lines().next().unwrap().to_string();
        assert!(first.contains("\"header\""), "first line is the version header: {first}");
    }

    #[test]
    fn torn_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.jsonl");
        let mut j = Journal::new(&path, 2.0);
        j.put("a", &rec("alpha", 0)).unwrap();
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"{\"op\":\"put\",\"key\":\"b\",\"val").unwrap();

        let live: HashMap<String, Rec> = Journal::new(&path, 2.0).load().unwrap();
        assert_eq!(live.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn append_after_torn_line_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.jsonl");
        let mut j = Journal::new(&path, 2.0);
        j.put("a", &rec("alpha", 0)).unwrap();
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"{\"op\":\"put\",\"key\":\"b\",\"val").unwrap();

        let mut reopened = Journal::new(&path, 2.0);
        let _: HashMap<String, Rec> = reopened.load().unwrap();
        reopened.put("c", &rec("charlie", 2)).unwrap();

        let live: HashMap<String, Rec> = Journal::new(&path, 2.0).load().unwrap();
        let mut keys: Vec<_> = live.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["a", "c"]);
        assert_eq!(live["c"], rec("charlie", 2));
    }

    #[test]
    fn batch_put_is_one_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.jsonl");
        let mut j = Journal::new(&path, 2.0);
        let (a, b) = (rec("alpha", 1), rec("bravo", 2));
        j.put_batch([("a", &a), ("b", &b)]).unwrap();
        j.put_batch(std::iter::empty::<(&str, &Rec)>()).unwrap();
        let live: HashMap<String, Rec> = Journal::new(&path, 2.0).load().unwrap();
        assert_eq!(live.len(), 2);
        assert_eq!(live["b"], b);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3, "header plus two puts");
    }

    #[test]
    fn legacy_document_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        fs::write(&path, r#"{"k1": {"text": "one"}, "k2": {"text": "two", "hits": 4}, "bad": {"nope": 1}}"#).unwrap();

        let live: HashMap<String, Rec> = Journal::new(&path, 2.0).load().unwrap();
        assert_eq!(live.len(), 2);
        assert_eq!(live["k1"].hits, 0, "missing field defaults");
        assert_eq!(live["k2"].hits, 4);

        let again: HashMap<String, Rec> = Journal::new(&path, 2.0).load().unwrap();
        assert_eq!(again, live, "rewritten in journal form");
        assert!(fs::read_to_string(&path).unwrap().starts_with("{\"op\":\"header\""));
    }

    #[test]
    fn newer_version_is_a_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.jsonl");
        fs::write(&path, "{\"op\":\"header\",\"version\":99}\n").unwrap();
        let err = Journal::new(&path, 2.0).load::<Rec>().unwrap_err();
        assert!(matches!(err, Error::Data { .. }));
    }

    #[test]
    fn unreadable_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.jsonl");
        fs::write(&path, "{\"op\":\"header\",\"version\":99}\n").unwrap();
        let mut j = Journal::new(&path, 2.0);
        let live: HashMap<String, Rec> = j.load_or_quarantine();
        assert!(live.is_empty());
        assert!(dir.path().join("j.jsonl.corrupt").exists());
        j.put("a", &rec("alpha", 0)).unwrap();
        let reloaded: HashMap<String, Rec> = Journal::new(&path, 2.0).load().unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn compaction_keeps_only_live_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.jsonl");
        let mut j = Journal::new(&path, 2.0);
        let mut live = HashMap::new();
        for i in 0..100u32 {
            let r = rec("same", i);
            j.put("only", &r).unwrap();
            live.insert("only".to_string(), r);
        }
        assert!(j.needs_compaction(live.len()));
        let before = j.size_bytes();
        j.compact(live.iter()).unwrap();
        assert!(j.size_bytes() < before);
        assert!(!j.needs_compaction(live.len()));
        let reloaded: HashMap<String, Rec> = Journal::new(&path, 2.0).load().unwrap();
        assert_eq!(reloaded["only"].hits, 99);
    }
}
