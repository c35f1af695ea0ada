//! Store interface and the default JSONL file implementation.

use crate::error::StoreError;
use crate::model::{StoredMessageRecord, ThreadId};
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[async_trait]
/// Durable, ordered message log keyed by thread id.
///
/// Implementations may be slow or intermittently unavailable; callers are
/// expected to tolerate `StoreError::Unavailable` from every method.
pub trait MessageStore: Send + Sync {
    /// Fetch every persisted record for a thread, oldest first.
    async fn get_messages(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<StoredMessageRecord>, StoreError>;

    /// Append records to the end of a thread's log.
    async fn append_messages(
        &self,
        thread_id: &ThreadId,
        records: &[StoredMessageRecord],
    ) -> Result<(), StoreError>;

    /// Replace a thread's whole log. Concurrent readers must never observe a
    /// partially written list.
    async fn replace_messages(
        &self,
        thread_id: &ThreadId,
        records: &[StoredMessageRecord],
    ) -> Result<(), StoreError>;
}

/// File-backed store keeping one JSONL file per thread.
#[derive(Debug, Clone)]
pub struct JsonlMessageStore {
    /// Root directory for thread logs.
    root: PathBuf,
    /// Serializes appends and replaces across clones.
    write_lock: Arc<Mutex<()>>,
}

impl JsonlMessageStore {
    /// Create a new file-backed store under the given root.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("initialized JSONL message store (root={})", root.display());
        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Root directory holding the thread files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the thread's JSONL file.
    fn thread_path(&self, thread_id: &ThreadId) -> PathBuf {
        self.root
            .join(format!("{}.jsonl", file_stem_for(thread_id)))
    }

    /// Path to the temporary file used while replacing a thread.
    fn temp_path(&self, thread_id: &ThreadId) -> PathBuf {
        self.root
            .join(format!("{}.jsonl.tmp", file_stem_for(thread_id)))
    }

    /// Load all records for a thread.
    fn load_records(&self, thread_id: &ThreadId) -> Result<Vec<StoredMessageRecord>, StoreError> {
        let path = self.thread_path(thread_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new().read(true).open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredMessageRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => warn!(
                    "skipping unreadable thread record (thread_id={}, line={}, error={})",
                    thread_id,
                    index + 1,
                    err
                ),
            }
        }
        Ok(records)
    }

    /// Append records as new lines.
    fn append_records(
        &self,
        thread_id: &ThreadId,
        records: &[StoredMessageRecord],
    ) -> Result<(), StoreError> {
        let mut buffer = String::new();
        for record in records {
            buffer.push_str(&serde_json::to_string(record)?);
            buffer.push('\n');
        }
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(self.thread_path(thread_id))?;
        if !ends_with_newline(&mut file)? {
            // A torn trailing line must not swallow the first new record.
            warn!("terminating torn thread record (thread_id={})", thread_id);
            buffer.insert(0, '\n');
        }
        file.write_all(buffer.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Rewrite a thread's records through a temp file and rename.
    fn write_records(
        &self,
        thread_id: &ThreadId,
        records: &[StoredMessageRecord],
    ) -> Result<(), StoreError> {
        let path = self.thread_path(thread_id);
        let temp_path = self.temp_path(thread_id);
        let _guard = self.write_lock.lock();
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            for record in records {
                let line = serde_json::to_string(record)?;
                writeln!(file, "{line}")?;
            }
            file.sync_all()?;
        }
        fs::rename(temp_path, path)?;
        Ok(())
    }

    /// Run blocking file work off the async executor.
    async fn blocking<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(JsonlMessageStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || work(store))
            .await
            .map_err(|err| StoreError::unavailable(format!("store task failed: {err}")))?
    }
}

#[async_trait]
impl MessageStore for JsonlMessageStore {
    async fn get_messages(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<StoredMessageRecord>, StoreError> {
        let id = thread_id.clone();
        let records = self.blocking(move |store| store.load_records(&id)).await?;
        debug!(
            "loaded thread records (thread_id={}, count={})",
            thread_id,
            records.len()
        );
        Ok(records)
    }

    async fn append_messages(
        &self,
        thread_id: &ThreadId,
        records: &[StoredMessageRecord],
    ) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let id = thread_id.clone();
        let batch = records.to_vec();
        self.blocking(move |store| store.append_records(&id, &batch))
            .await?;
        debug!(
            "appended thread records (thread_id={}, count={})",
            thread_id,
            records.len()
        );
        Ok(())
    }

    async fn replace_messages(
        &self,
        thread_id: &ThreadId,
        records: &[StoredMessageRecord],
    ) -> Result<(), StoreError> {
        let id = thread_id.clone();
        let batch = records.to_vec();
        self.blocking(move |store| store.write_records(&id, &batch))
            .await?;
        info!(
            "replaced thread records (thread_id={}, count={})",
            thread_id,
            records.len()
        );
        Ok(())
    }
}

/// Whether the file is empty or its last byte is a newline.
fn ends_with_newline(file: &mut File) -> Result<bool, StoreError> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Map a thread id onto a file stem. Every byte outside `[A-Za-z0-9-]` is
/// hex-escaped behind `_`, so distinct ids never share a file.
fn file_stem_for(thread_id: &ThreadId) -> String {
    let mut stem = String::with_capacity(thread_id.as_str().len());
    for byte in thread_id.as_str().bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("_{byte:02x}"));
        }
    }
    stem
}
