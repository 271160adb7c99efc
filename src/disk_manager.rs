//! Reads and writes fixed-size pages to a single backing file. No caching,
//! no concurrency -- just the byte-level contract the buffer manager builds
//! on top of.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;
use crate::types::{PageIdT, PAGE_SIZE};

pub struct DiskManager {
    file: File,
}

impl DiskManager {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self { file })
    }

    /// Number of whole pages currently backed by the file.
    pub fn num_pages(&self) -> Result<u32> {
        let len = self.file.metadata()?.len();
        Ok((len / PAGE_SIZE as u64) as u32)
    }

    /// Read page `page_id` into a freshly allocated, zero-padded buffer.
    /// Reading a page past the current end of file returns a zeroed page,
    /// which is what a never-yet-written page looks like.
    pub fn read_page(&mut self, page_id: PageIdT) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; PAGE_SIZE as usize];
        let offset = page_id as u64 * PAGE_SIZE as u64;
        if offset >= self.file.metadata()?.len() {
            return Ok(buf);
        }
        self.file.seek(SeekFrom::Start(offset))?;
        let n = self.file.read(&mut buf)?;
        let _ = n;
        Ok(buf)
    }

    /// Write `page` (must be exactly `PAGE_SIZE` bytes) at `page_id`,
    /// zero-filling any gap if this extends the file.
    pub fn write_page(&mut self, page_id: PageIdT, page: &[u8]) -> Result<()> {
        debug_assert_eq!(page.len(), PAGE_SIZE as usize);
        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page)?;
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}
