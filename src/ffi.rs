//! C ABI adapter.
//!
//! Every entry point returns 0 on success or a negative [`crate::ErrorKind`] status.
//! The failure message is kept in a thread-local slot readable through
//! [`blockdelta_last_error`] until the next call on the same thread. Buffers
//! handed out are allocated with `malloc` and must be released with
//! [`blockdelta_free_data`].

use std::cell::RefCell;
use std::ffi::{c_char, c_int, CStr, CString};
use std::ptr;

use crate::types::{DeltaError, Result};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(err: &DeltaError) {
    // interior NULs cannot cross the C boundary
    let msg = err.to_string().replace('\0', " ");
    LAST_ERROR.with(|cell| *cell.borrow_mut() = CString::new(msg).ok());
}

fn clear_last_error() {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = None);
}

/// Turn a core result into a status code, recording the error message.
fn status(result: Result<()>) -> c_int {
    match result {
        Ok(()) => {
            clear_last_error();
            0
        }
        Err(e) => {
            set_last_error(&e);
            e.kind().status_code()
        }
    }
}

fn null_arg(name: &str) -> DeltaError {
    DeltaError::Config(format!("null pointer passed for {}", name))
}

/// Borrow a caller buffer; a null pointer is only accepted with length 0.
///
/// # Safety
/// `data` must point to `len` readable bytes that stay valid for `'a`.
unsafe fn borrow_buf<'a>(data: *const u8, len: usize, name: &str) -> Result<&'a [u8]> {
    if data.is_null() {
        return if len == 0 { Ok(&[]) } else { Err(null_arg(name)) };
    }
    Ok(std::slice::from_raw_parts(data, len))
}

/// # Safety
/// `path` must be null or a valid NUL-terminated string.
unsafe fn borrow_path<'a>(path: *const c_char, name: &str) -> Result<&'a str> {
    if path.is_null() {
        return Err(null_arg(name));
    }
    CStr::from_ptr(path)
        .to_str()
        .map_err(|_| DeltaError::Config(format!("{} is not valid UTF-8", name)))
}

/// Copy `bytes` into a fresh `malloc` block owned by the caller.
///
/// # Safety
/// `out_data` and `out_len` must be valid for writes.
unsafe fn hand_out(bytes: Vec<u8>, out_data: *mut *mut u8, out_len: *mut usize) -> Result<()> {
    // malloc(0) may legitimately return null; always ask for at least one byte
    let buf = libc::malloc(bytes.len().max(1)) as *mut u8;
    if buf.is_null() {
        return Err(DeltaError::Allocation(bytes.len() as u64));
    }
    ptr::copy_nonoverlapping(bytes.as_ptr(), buf, bytes.len());
    *out_data = buf;
    *out_len = bytes.len();
    Ok(())
}

/// Message for the last failure on this thread, or null after a success.
///
/// The pointer stays valid until the next `blockdelta_*` call on this thread.
#[no_mangle]
pub extern "C" fn blockdelta_last_error() -> *const c_char {
    LAST_ERROR.with(|cell| {
        cell.borrow()
            .as_ref()
            .map_or(ptr::null(), |s| s.as_ptr())
    })
}

/// Create a patch from two in-memory buffers.
///
/// # Safety
/// `old_data`/`new_data` must point to `old_len`/`new_len` readable bytes;
/// `patch_data` and `patch_len` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn blockdelta_create_patch_data(
    old_data: *const u8,
    old_len: usize,
    new_data: *const u8,
    new_len: usize,
    patch_data: *mut *mut u8,
    patch_len: *mut usize,
    block_size: u32,
) -> c_int {
    status((|| -> Result<()> {
        if patch_data.is_null() || patch_len.is_null() {
            return Err(null_arg("patch output"));
        }
        let old = borrow_buf(old_data, old_len, "old data")?;
        let new = borrow_buf(new_data, new_len, "new data")?;
        let patch = crate::create_patch(old, new, block_size)?;
        hand_out(patch, patch_data, patch_len)
    })())
}

/// Reconstruct new data from an old buffer and a patch buffer.
///
/// # Safety
/// `old_data`/`patch_data` must point to `old_len`/`patch_len` readable bytes;
/// `new_data` and `new_len` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn blockdelta_apply_patch_data(
    old_data: *const u8,
    old_len: usize,
    patch_data: *const u8,
    patch_len: usize,
    new_data: *mut *mut u8,
    new_len: *mut usize,
) -> c_int {
    status((|| -> Result<()> {
        if new_data.is_null() || new_len.is_null() {
            return Err(null_arg("new output"));
        }
        let old = borrow_buf(old_data, old_len, "old data")?;
        let patch = borrow_buf(patch_data, patch_len, "patch data")?;
        let new = crate::apply_patch(old, patch)?;
        hand_out(new, new_data, new_len)
    })())
}

/// Release a buffer returned by one of the `*_data` entry points.
///
/// # Safety
/// `data` must be null or a pointer previously returned through this API,
/// and must not be freed twice.
#[no_mangle]
pub unsafe extern "C" fn blockdelta_free_data(data: *mut u8) {
    if !data.is_null() {
        libc::free(data as *mut libc::c_void);
    }
}

/// Diff two files on disk and write the patch to `patch_path`.
///
/// # Safety
/// All paths must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn blockdelta_create_patch_file(
    old_path: *const c_char,
    new_path: *const c_char,
    patch_path: *const c_char,
    block_size: u32,
) -> c_int {
    status((|| -> Result<()> {
        let old = borrow_path(old_path, "old path")?;
        let new = borrow_path(new_path, "new path")?;
        let patch = borrow_path(patch_path, "patch path")?;
        crate::create_patch_file(old, new, patch, block_size)
    })())
}

/// Apply the patch file to the old file and write the result to `out_path`.
///
/// # Safety
/// All paths must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn blockdelta_apply_patch_file(
    old_path: *const c_char,
    patch_path: *const c_char,
    out_path: *const c_char,
) -> c_int {
    status((|| -> Result<()> {
        let old = borrow_path(old_path, "old path")?;
        let patch = borrow_path(patch_path, "patch path")?;
        let out = borrow_path(out_path, "output path")?;
        crate::apply_patch_file(old, patch, out)
    })())
}
