//! Pure functions over a single pinned page buffer: reading and writing the
//! slot directory, the free-space pointer, and record payloads.
//!
//! Data format:
//! ```text
//! +--------------------------+--------------+--------------------------+
//! | PAYLOADS (grows ->)      | ... FREE ... | (<- grows) SLOT DIRECTORY |
//! +--------------------------+--------------+--------------------------+
//! 0                        free_ptr                      P-4*(num+1)  P-4
//! ```
//! followed by a 4-byte trailer `(num: u16, free_ptr: u16)` at `[P-4, P)`.
//! Each slot is 4 bytes, `(offset: u16, length: u16)`; slot `i` (1-indexed)
//! lives at `[P-4*(i+1), P-4*i)` regardless of `num`, so a slot's address
//! never moves once assigned -- this is what keeps a RID stable across
//! compactions of other records on the same page.
//!
//! A slot with `offset == 0xFFFF` is tombstoned and carries `length == 0`.

use crate::types::TOMBSTONE_OFFSET;

/// Zero a freshly-allocated page and give it an empty header.
pub fn init_page(page: &mut [u8]) {
    for b in page.iter_mut() {
        *b = 0;
    }
    set_header(page, 0, 0);
}

/// Read the `(num, free_ptr)` trailer.
pub fn read_header(page: &[u8]) -> (u16, u16) {
    let p = page.len();
    let num = u16::from_le_bytes([page[p - 4], page[p - 3]]);
    let free_ptr = u16::from_le_bytes([page[p - 2], page[p - 1]]);
    (num, free_ptr)
}

/// Write the `(num, free_ptr)` trailer.
pub fn set_header(page: &mut [u8], num: u16, free_ptr: u16) {
    let p = page.len();
    page[p - 4..p - 2].copy_from_slice(&num.to_le_bytes());
    page[p - 2..p].copy_from_slice(&free_ptr.to_le_bytes());
}

fn slot_range(page_len: usize, i: u32) -> (usize, usize) {
    let p = page_len as u32;
    let start = (p - 4 * (i + 1)) as usize;
    (start, start + 4)
}

/// Read slot `i` (1-indexed). Callers must ensure `1 <= i <= num`.
pub fn read_slot(page: &[u8], i: u32) -> (u16, u16) {
    let (start, _) = slot_range(page.len(), i);
    let offset = u16::from_le_bytes([page[start], page[start + 1]]);
    let length = u16::from_le_bytes([page[start + 2], page[start + 3]]);
    (offset, length)
}

/// Write slot `i` (1-indexed).
pub fn write_slot(page: &mut [u8], i: u32, offset: u16, length: u16) {
    let (start, _) = slot_range(page.len(), i);
    page[start..start + 2].copy_from_slice(&offset.to_le_bytes());
    page[start + 2..start + 4].copy_from_slice(&length.to_le_bytes());
}

pub fn is_tombstone(slot: (u16, u16)) -> bool {
    slot.0 == TOMBSTONE_OFFSET
}

pub fn tombstone(page: &mut [u8], i: u32) {
    write_slot(page, i, TOMBSTONE_OFFSET, 0);
}

/// Read the payload bytes addressed by `slot`.
pub fn read_payload<'a>(page: &'a [u8], slot: (u16, u16)) -> &'a [u8] {
    let (offset, length) = slot;
    &page[offset as usize..offset as usize + length as usize]
}

/// Whether a page with the given header has room for a new payload of
/// `payload_len` bytes plus one additional slot directory entry.
pub fn has_room_for_new_slot(page_len: usize, num: u16, free_ptr: u16, payload_len: u32) -> bool {
    (free_ptr as u32) + payload_len + 4 * (num as u32 + 1) <= page_len as u32
}

/// Whether a page with the given header has room to grow `free_ptr` by
/// `payload_len` bytes without adding a new slot (reusing a tombstone).
pub fn has_room_reusing_slot(page_len: usize, num: u16, free_ptr: u16, payload_len: u32) -> bool {
    (free_ptr as u32) + payload_len + 4 * (num as u32) <= page_len as u32
}

/// Append `bytes` at the current free pointer and return `(offset_written,
/// new_free_ptr)`. Caller must have already checked there is room.
pub fn append_payload(page: &mut [u8], free_ptr: u16, bytes: &[u8]) -> (u16, u16) {
    let start = free_ptr as usize;
    page[start..start + bytes.len()].copy_from_slice(bytes);
    (free_ptr, free_ptr + bytes.len() as u16)
}

/// Shift payload bytes down to close the gap left by deleting a record at
/// `(offset, length)`, and fix up every other live slot whose payload sat
/// above the deleted one. Returns the new `free_ptr`. Does not touch the
/// deleted slot itself -- callers should tombstone it separately.
pub fn compact(page: &mut [u8], num: u16, free_ptr: u16, offset: u16, length: u16) -> u16 {
    let gap_end = (offset + length) as usize;
    let region_end = free_ptr as usize;
    if region_end > gap_end {
        page.copy_within(gap_end..region_end, offset as usize);
    }

    for i in 1..=num as u32 {
        let (o, l) = read_slot(page, i);
        if is_tombstone((o, l)) {
            continue;
        }
        if o >= offset + length {
            write_slot(page, i, o - length, l);
        }
    }

    free_ptr - length
}
