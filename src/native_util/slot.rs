#![cfg_attr(not(windows), allow(dead_code))]

use std::fmt::Display;

use log::warn;

/// The page protection that allows a slot to be written.
pub const PAGE_READWRITE: u32 = 0x04;

/// Writes `value` into a pointer-sized slot that may live in a read-only page, and returns the
/// value it replaces.
///
/// `protect` sets the protection of the page holding the slot and returns the previous one. The
/// write only fails if the page cannot be made writable. Once the slot has been written, failing
/// to restore the old protection is logged and the write stands.
///
/// # Safety
///
/// `slot` must point to a live, pointer-sized location that is writable after `protect` returns.
pub unsafe fn write_slot<P, E>(slot: *mut usize, value: usize, mut protect: P) -> Result<usize, E>
where
    P: FnMut(*mut usize, u32) -> Result<u32, E>,
    E: Display,
{
    let protection = protect(slot, PAGE_READWRITE)?;
    let previous = slot.replace(value);
    if let Err(err) = protect(slot, protection) {
        warn!("Could not restore the protection of the import table page: {}", err);
    }
    Ok(previous)
}
