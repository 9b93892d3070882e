//! Block-matching binary delta engine.
//!
//! [`create_patch`] indexes the old data in fixed-size blocks, scans the new
//! data with a rolling fingerprint and serializes the resulting COPY/INSERT
//! instructions behind a self-describing header. [`apply_patch`] decodes that
//! patch, replays it against the old data and verifies the result's SHA-256
//! before returning it.

pub mod types;
pub mod hash;
pub mod index;
pub mod matcher;
pub mod encoding;
pub mod apply;
pub mod files;
pub mod ffi;

use tracing::debug;

// Re-exports for convenience
pub use types::{
    hex_str, patch_summary, DeltaError, ErrorKind, Instruction, Patch, PatchHeader, PatchOptions,
    PatchSummary, Result, DEFAULT_BLOCK_SIZE, DIGEST_LEN, PATCH_HEADER_SIZE, PATCH_MAGIC,
    PATCH_VERSION,
};
pub use hash::{content_digest, fingerprint, RollingHash};
pub use index::BlockIndex;
pub use matcher::find_matches;
pub use encoding::{decode_header, decode_patch, encode_patch, encoded_len, is_patch, varint_len};
pub use apply::{apply_instructions, apply_patch as apply, apply_to, check_ranges, output_size};
pub use files::{apply_patch_file, create_patch_file};

/// Diff `old` against `new` into an in-memory patch.
pub fn diff(old: &[u8], new: &[u8], opts: &PatchOptions) -> Result<Patch> {
    opts.validate()?;
    let index = BlockIndex::build(old, opts.block_size as usize)?;
    let instructions = find_matches(old, new, &index);
    Ok(Patch {
        header: PatchHeader {
            version: PATCH_VERSION,
            block_size: opts.block_size,
            old_len: old.len() as u64,
            new_len: new.len() as u64,
            new_digest: content_digest(new),
        },
        instructions,
    })
}

/// Create a serialized patch that turns `old` into `new`.
///
/// Deterministic: the same inputs and block size always give identical bytes.
pub fn create_patch(old: &[u8], new: &[u8], block_size: u32) -> Result<Vec<u8>> {
    let patch = diff(old, new, &PatchOptions::new(block_size))?;
    let bytes = encode_patch(&patch);
    debug!(
        old_len = old.len(),
        new_len = new.len(),
        block_size,
        patch_len = bytes.len(),
        instructions = patch.instructions.len(),
        "patch created"
    );
    Ok(bytes)
}

/// Reconstruct the new data from `old` and serialized `patch` bytes.
pub fn apply_patch(old: &[u8], patch: &[u8]) -> Result<Vec<u8>> {
    apply::apply_patch_bytes(old, patch)
}

/// Decode a patch without applying it.
pub fn inspect(patch: &[u8]) -> Result<Patch> {
    decode_patch(patch)
}
