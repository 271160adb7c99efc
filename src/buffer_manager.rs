//! A minimal in-process page cache sitting on top of the disk manager.
//!
//! There is no external page-cache collaborator in this project, so the
//! engine keeps every fetched page in memory for the life of the session and
//! writes dirty pages back on `flush_all`. This is adequate at the project's
//! scale (`MAX_PAGES` pages of `PAGE_SIZE` bytes each) and keeps the fetch
//! path simple: callers always get a mutable page buffer, mark it dirty
//! themselves if they wrote to it, and the manager handles the rest.

use std::collections::HashMap;

use crate::disk_manager::DiskManager;
use crate::error::Result;
use crate::types::{PageIdT, PAGE_SIZE};

struct Frame {
    bytes: Vec<u8>,
    dirty: bool,
}

pub struct BufferManager {
    disk: DiskManager,
    frames: HashMap<PageIdT, Frame>,
    next_page_id: PageIdT,
}

impl BufferManager {
    pub fn new(disk: DiskManager) -> Result<Self> {
        let next_page_id = disk.num_pages()?;
        Ok(Self {
            disk,
            frames: HashMap::new(),
            next_page_id,
        })
    }

    /// Number of pages allocated so far, including pages cached dirty but not
    /// yet flushed to disk.
    pub fn num_pages(&self) -> Result<u32> {
        Ok(self.next_page_id)
    }

    /// Fetch a page, reading it from disk on first access.
    pub fn fetch_page(&mut self, page_id: PageIdT) -> Result<&mut Vec<u8>> {
        if !self.frames.contains_key(&page_id) {
            let bytes = self.disk.read_page(page_id)?;
            self.frames.insert(page_id, Frame { bytes, dirty: false });
        }
        let frame = self.frames.get_mut(&page_id).unwrap();
        Ok(&mut frame.bytes)
    }

    /// Mark a cached page as modified so it gets written back on flush.
    pub fn mark_dirty(&mut self, page_id: PageIdT) {
        if let Some(frame) = self.frames.get_mut(&page_id) {
            frame.dirty = true;
        }
    }

    /// Allocate a new, zeroed page at the next page id and cache it dirty.
    /// The id comes from an in-memory counter, not the on-disk file length,
    /// so a page allocated but not yet flushed is never handed out twice.
    pub fn new_page(&mut self) -> Result<PageIdT> {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        let bytes = vec![0u8; PAGE_SIZE as usize];
        self.frames.insert(page_id, Frame { bytes, dirty: true });
        Ok(page_id)
    }

    /// Write every dirty page back to disk.
    pub fn flush_all(&mut self) -> Result<()> {
        for (page_id, frame) in self.frames.iter_mut() {
            if frame.dirty {
                self.disk.write_page(*page_id, &frame.bytes)?;
                frame.dirty = false;
            }
        }
        self.disk.sync()
    }
}
