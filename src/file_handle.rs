//! Ties the page codec and buffer manager together into the operations a
//! table needs: insert a record, fetch one by id, delete one, and scan every
//! live record in the file.
//!
//! Page 0 is reserved as a free-space directory: one 32-bit word per data
//! page, `(used: u16) << 16 | (num: u16)`, mirroring that page's own
//! `(free_ptr, num)` trailer so a first-fit page search never has to fetch
//! every data page just to read its header.

use log::debug;

use crate::buffer_manager::BufferManager;
use crate::disk_manager::DiskManager;
use crate::error::{Error, Result};
use crate::page_codec;
use crate::types::{PageIdT, RecordId, SlotIdT, DIRECTORY_PAGE_ID, FIRST_DATA_PAGE_ID, MAX_PAGES, PAGE_SIZE};
use std::path::Path;

/// The page-0 directory's `used` quantity for a page with header `(num,
/// free_ptr)`, per the documented invariant `used = 4*(num+2) + free_ptr`.
fn used_bytes(num: u16, free_ptr: u16) -> u16 {
    (4 * (num as u32 + 2) + free_ptr as u32) as u16
}

/// Recover a page's `free_ptr` from its mirrored `(used, num)` word.
fn free_ptr_from_used(used: u16, num: u16) -> u16 {
    (used as u32 - 4 * (num as u32 + 2)) as u16
}

pub struct FileHandle {
    buffer: BufferManager,
}

impl FileHandle {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let disk = DiskManager::open(path)?;
        let mut buffer = BufferManager::new(disk)?;
        if buffer.num_pages()? == 0 {
            let page_id = buffer.new_page()?;
            debug_assert_eq!(page_id, DIRECTORY_PAGE_ID);
            let page = buffer.fetch_page(page_id)?;
            page_codec::init_page(page);
            buffer.mark_dirty(page_id);
        }
        Ok(Self { buffer })
    }

    pub fn flush(&mut self) -> Result<()> {
        self.buffer.flush_all()
    }

    /// Read a page's mirrored `(used, num)` word. `used` is the same
    /// `4*(num+2) + free_ptr` quantity the page's own header implies.
    fn read_directory_word(&mut self, page_id: PageIdT) -> Result<(u16, u16)> {
        let dir = self.buffer.fetch_page(DIRECTORY_PAGE_ID)?;
        let offset = 4 * page_id as usize;
        let used = u16::from_le_bytes([dir[offset], dir[offset + 1]]);
        let num = u16::from_le_bytes([dir[offset + 2], dir[offset + 3]]);
        Ok((used, num))
    }

    /// Mirror a page's header into its page-0 word, computing `used` from
    /// the page's actual `(num, free_ptr)` rather than storing `free_ptr`
    /// bare under the `used` name.
    fn write_directory_word(&mut self, page_id: PageIdT, num: u16, free_ptr: u16) -> Result<()> {
        let used = used_bytes(num, free_ptr);
        let dir = self.buffer.fetch_page(DIRECTORY_PAGE_ID)?;
        let offset = 4 * page_id as usize;
        dir[offset..offset + 2].copy_from_slice(&used.to_le_bytes());
        dir[offset + 2..offset + 4].copy_from_slice(&num.to_le_bytes());
        self.buffer.mark_dirty(DIRECTORY_PAGE_ID);
        Ok(())
    }

    /// Insert a pre-encoded record and return its new id.
    pub fn insert(&mut self, bytes: &[u8]) -> Result<RecordId> {
        let payload_len = bytes.len() as u32;
        let num_pages = self.buffer.num_pages()?;

        let mut target = None;
        for page_id in FIRST_DATA_PAGE_ID..num_pages {
            let (used, num) = self.read_directory_word(page_id)?;
            let free_ptr = free_ptr_from_used(used, num);
            if page_codec::has_room_for_new_slot(PAGE_SIZE as usize, num, free_ptr, payload_len) {
                target = Some(page_id);
                break;
            }
        }

        let page_id = match target {
            Some(p) => p,
            None => {
                if num_pages >= MAX_PAGES {
                    return Err(Error::OutOfSpace { requested: payload_len });
                }
                let page_id = self.buffer.new_page()?;
                let page = self.buffer.fetch_page(page_id)?;
                page_codec::init_page(page);
                self.write_directory_word(page_id, 0, 0)?;
                debug!("allocated page {} for a {}-byte record", page_id, payload_len);
                page_id
            }
        };

        let page = self.buffer.fetch_page(page_id)?;
        let (num, free_ptr) = page_codec::read_header(page);

        // Tie-break: reuse the lowest tombstoned slot before appending a new one.
        let mut reuse_slot = None;
        for slot_id in 1..=num as u32 {
            if page_codec::is_tombstone(page_codec::read_slot(page, slot_id)) {
                reuse_slot = Some(slot_id);
                break;
            }
        }

        let (slot_id, new_num) = match reuse_slot {
            Some(slot_id) => {
                if !page_codec::has_room_reusing_slot(page.len(), num, free_ptr, payload_len) {
                    return Err(Error::OutOfSpace { requested: payload_len });
                }
                (slot_id, num)
            }
            None => {
                if !page_codec::has_room_for_new_slot(page.len(), num, free_ptr, payload_len) {
                    return Err(Error::OutOfSpace { requested: payload_len });
                }
                (num as u32 + 1, num + 1)
            }
        };

        let (offset, new_free_ptr) = page_codec::append_payload(page, free_ptr, bytes);
        page_codec::write_slot(page, slot_id, offset, bytes.len() as u16);
        page_codec::set_header(page, new_num, new_free_ptr);
        self.buffer.mark_dirty(page_id);
        self.write_directory_word(page_id, new_num, new_free_ptr)?;

        Ok(RecordId::new(page_id, slot_id))
    }

    /// Fetch the raw bytes of a live record.
    pub fn get(&mut self, rid: RecordId) -> Result<Vec<u8>> {
        let page = self.buffer.fetch_page(rid.page_id)?;
        let (num, _) = page_codec::read_header(page);
        if rid.slot_id == 0 || rid.slot_id > num as u32 {
            return Err(Error::NotFound(rid));
        }
        let slot = page_codec::read_slot(page, rid.slot_id);
        if page_codec::is_tombstone(slot) {
            return Err(Error::NotFound(rid));
        }
        Ok(page_codec::read_payload(page, slot).to_vec())
    }

    /// Delete a live record, compacting its page in place.
    pub fn delete(&mut self, rid: RecordId) -> Result<()> {
        let page = self.buffer.fetch_page(rid.page_id)?;
        let (num, free_ptr) = page_codec::read_header(page);
        if rid.slot_id == 0 || rid.slot_id > num as u32 {
            return Err(Error::NotFound(rid));
        }
        let (offset, length) = page_codec::read_slot(page, rid.slot_id);
        if page_codec::is_tombstone((offset, length)) {
            return Err(Error::NotFound(rid));
        }

        let new_free_ptr = page_codec::compact(page, num, free_ptr, offset, length);
        page_codec::tombstone(page, rid.slot_id);
        page_codec::set_header(page, num, new_free_ptr);
        self.buffer.mark_dirty(rid.page_id);
        self.write_directory_word(rid.page_id, num, new_free_ptr)?;
        debug!("deleted {} and compacted page {}", rid, rid.page_id);
        Ok(())
    }

    /// Overwrite a live record with `new_bytes`, keeping its id if the new
    /// payload fits within the old one's slot and reallocating elsewhere
    /// otherwise. Returns the record's id after the update.
    pub fn update(&mut self, rid: RecordId, new_bytes: &[u8]) -> Result<RecordId> {
        if self.try_update_in_place(rid, new_bytes)? {
            return Ok(rid);
        }
        self.delete(rid)?;
        self.insert(new_bytes)
    }

    /// Attempt to overwrite a record in place. Succeeds only if `new_bytes`
    /// is no longer than the record's current slot; on success, any bytes
    /// freed by shrinking are compacted out of the page immediately.
    fn try_update_in_place(&mut self, rid: RecordId, new_bytes: &[u8]) -> Result<bool> {
        let page = self.buffer.fetch_page(rid.page_id)?;
        let (num, free_ptr) = page_codec::read_header(page);
        if rid.slot_id == 0 || rid.slot_id > num as u32 {
            return Err(Error::NotFound(rid));
        }
        let (offset, length) = page_codec::read_slot(page, rid.slot_id);
        if page_codec::is_tombstone((offset, length)) {
            return Err(Error::NotFound(rid));
        }
        if new_bytes.len() > length as usize {
            return Ok(false);
        }

        let shrink = length - new_bytes.len() as u16;
        let new_free_ptr = if shrink > 0 {
            page_codec::compact(page, num, free_ptr, offset + new_bytes.len() as u16, shrink)
        } else {
            free_ptr
        };
        page[offset as usize..offset as usize + new_bytes.len()].copy_from_slice(new_bytes);
        page_codec::write_slot(page, rid.slot_id, offset, new_bytes.len() as u16);
        page_codec::set_header(page, num, new_free_ptr);
        self.buffer.mark_dirty(rid.page_id);
        self.write_directory_word(rid.page_id, num, new_free_ptr)?;
        Ok(true)
    }

    /// Every live `(RecordId, raw bytes)` pair in the file, in page/slot order.
    pub fn scan(&mut self) -> Result<Vec<(RecordId, Vec<u8>)>> {
        let num_pages = self.buffer.num_pages()?;
        let mut out = Vec::new();
        for page_id in FIRST_DATA_PAGE_ID..num_pages {
            let page = self.buffer.fetch_page(page_id)?;
            let (num, _) = page_codec::read_header(page);
            for slot_id in 1..=num as SlotIdT {
                let slot = page_codec::read_slot(page, slot_id);
                if page_codec::is_tombstone(slot) {
                    continue;
                }
                let bytes = page_codec::read_payload(page, slot).to_vec();
                out.push((RecordId::new(page_id, slot_id), bytes));
            }
        }
        Ok(out)
    }
}
