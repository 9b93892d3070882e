//! Path-based wrappers: read both inputs fully, run the core, write the result.

use std::fs::{File, OpenOptions};
use std::ops::Deref;
use std::path::Path;

use memmap2::{Mmap, MmapMut};
use tracing::info;

use crate::types::{DeltaError, Result};

/// Read-only view of an input file. Empty files are not mapped.
enum Input {
    Mapped(Mmap),
    Empty,
}

impl Deref for Input {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Input::Mapped(m) => &m[..],
            Input::Empty => &[],
        }
    }
}

fn map_input(path: &Path) -> Result<Input> {
    let file = File::open(path).map_err(|e| DeltaError::io(path, e))?;
    let len = file.metadata().map_err(|e| DeltaError::io(path, e))?.len();
    if len == 0 {
        return Ok(Input::Empty);
    }
    // SAFETY: the map is read-only and lives only for one create/apply call;
    // the file must not be truncated concurrently.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| DeltaError::io(path, e))?;
    Ok(Input::Mapped(mmap))
}

/// Create `path` with exactly `bytes` as its contents through a writable map.
fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| DeltaError::io(path, e))?;
    if bytes.is_empty() {
        return Ok(());
    }
    file.set_len(bytes.len() as u64)
        .map_err(|e| DeltaError::io(path, e))?;
    // SAFETY: we have exclusive access to this newly-truncated file.
    let mut mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|e| DeltaError::io(path, e))?;
    mmap.copy_from_slice(bytes);
    mmap.flush().map_err(|e| DeltaError::io(path, e))?;
    Ok(())
}

/// Diff two files and write the serialized patch to `patch_path`.
pub fn create_patch_file(
    old_path: impl AsRef<Path>,
    new_path: impl AsRef<Path>,
    patch_path: impl AsRef<Path>,
    block_size: u32,
) -> Result<()> {
    let (old_path, new_path, patch_path) =
        (old_path.as_ref(), new_path.as_ref(), patch_path.as_ref());
    // the maps are released before writing, so the patch may replace an input
    let patch = {
        let old = map_input(old_path)?;
        let new = map_input(new_path)?;
        crate::create_patch(&old, &new, block_size)?
    };
    write_output(patch_path, &patch)?;

    info!(
        old = %old_path.display(),
        new = %new_path.display(),
        patch = %patch_path.display(),
        patch_len = patch.len(),
        "wrote patch"
    );
    Ok(())
}

/// Apply the patch at `patch_path` to `old_path`, writing the result to `out_path`.
///
/// The output file is only created once reconstruction and verification succeed.
pub fn apply_patch_file(
    old_path: impl AsRef<Path>,
    patch_path: impl AsRef<Path>,
    out_path: impl AsRef<Path>,
) -> Result<()> {
    let (old_path, patch_path, out_path) =
        (old_path.as_ref(), patch_path.as_ref(), out_path.as_ref());
    let new = {
        let old = map_input(old_path)?;
        let patch = map_input(patch_path)?;
        crate::apply_patch(&old, &patch)?
    };
    write_output(out_path, &new)?;

    info!(
        old = %old_path.display(),
        patch = %patch_path.display(),
        out = %out_path.display(),
        new_len = new.len(),
        "applied patch"
    );
    Ok(())
}
