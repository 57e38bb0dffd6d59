use crate::error::TreeError;
use crate::header::{HEADER_SIZE, Header, MAGIC};
use crate::succinct::{RecordPayload, SuccinctEncoding};
use anyhow::{Context, Result};
use fs2::FileExt;
use memmap2::Mmap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk image of a tree: a [`Header`] followed by the succinct record.
#[derive(Debug, Clone)]
pub struct TreeFile {
    path: PathBuf,
}

impl TreeFile {
    /// Refers to the image at `path`; nothing is opened until save or load
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Path of the image
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `encoding` to the file, replacing any previous image.
    ///
    /// The file is held under an exclusive lock while it is rewritten and
    /// synced before the lock is released.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened or created
    /// - The file is locked by another process
    /// - Writing or syncing fails
    pub fn save<T: RecordPayload>(&self, encoding: &SuccinctEncoding<T>) -> Result<()> {
        let body = encoding.to_record_bytes().context("Failed to serialize tree")?;
        let header = Header::new(encoding.node_count() as u64, body.len() as u64);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .with_context(|| format!("Failed to open tree file: {}", self.path.display()))?;

        FileExt::try_lock_exclusive(&file).context("Tree file is already open by another process")?;

        // Truncate only once the lock is held
        file.set_len(0).context("Failed to truncate tree file")?;
        file.write_all(&header.to_bytes()).context("Failed to write header")?;
        file.write_all(&body).context("Failed to write tree record")?;
        file.sync_all().context("Failed to sync tree file")?;

        debug!(
            path = %self.path.display(),
            nodes = encoding.node_count(),
            bytes = HEADER_SIZE + body.len(),
            "saved tree image"
        );
        Ok(())
    }

    /// Reads an encoding back from the file.
    ///
    /// The encoding is only framed here; decoding it into a tree checks the
    /// structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, mapped, or shared-locked.
    /// A bad magic, version, length or record surfaces as a
    /// [`TreeError::CorruptEncoding`] that can be recovered with
    /// `downcast_ref`.
    pub fn load<T: RecordPayload>(&self) -> Result<SuccinctEncoding<T>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open tree file: {}", self.path.display()))?;

        FileExt::try_lock_shared(&file).context("Tree file is being written by another process")?;

        let file_len = file.metadata().context("Failed to stat tree file")?.len();
        if file_len < HEADER_SIZE as u64 {
            return Err(corrupt(format!("file is {file_len} bytes, shorter than its header")))
                .with_context(|| format!("Invalid tree file: {}", self.path.display()));
        }

        // SAFETY: the shared lock keeps cooperating writers out while mapped
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to map tree file: {}", self.path.display()))?;

        let encoding = parse_image(&mmap)
            .with_context(|| format!("Invalid tree file: {}", self.path.display()))?;

        debug!(path = %self.path.display(), nodes = encoding.node_count(), "loaded tree image");
        Ok(encoding)
    }
}

fn parse_image<T: RecordPayload>(bytes: &[u8]) -> Result<SuccinctEncoding<T>> {
    if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
        return Err(corrupt("not a tree image (bad magic)"));
    }
    let header = Header::from_bytes(bytes).ok_or_else(|| corrupt("truncated header"))?;
    if !header.is_valid() {
        return Err(corrupt(format!(
            "unsupported version {} or flags {:#x}",
            header.version, header.flags
        )));
    }

    let body = &bytes[HEADER_SIZE..];
    if header.body_len != body.len() as u64 {
        return Err(corrupt(format!(
            "header declares {} body bytes, file holds {}",
            header.body_len,
            body.len()
        )));
    }

    let encoding = SuccinctEncoding::from_record_bytes(body)?;
    if encoding.node_count() as u64 != header.node_count {
        return Err(corrupt(format!(
            "header declares {} nodes, record holds {}",
            header.node_count,
            encoding.node_count()
        )));
    }
    Ok(encoding)
}

fn corrupt(msg: impl Into<String>) -> anyhow::Error {
    TreeError::corrupt(msg).into()
}
