use tracing::debug;

use crate::encoding::decode_patch;
use crate::hash::content_digest;
use crate::types::{hex_str, DeltaError, Instruction, Patch, Result};

/// Compute the total output size of an instruction list.
pub fn output_size(instructions: &[Instruction]) -> u64 {
    instructions.iter().map(Instruction::output_len).sum()
}

/// Verify every COPY lies inside `old` before any output is produced.
pub fn check_ranges(old: &[u8], instructions: &[Instruction]) -> Result<()> {
    let old_len = old.len() as u64;
    for ins in instructions {
        if let Instruction::Copy { old_offset, length } = *ins {
            let in_bounds = old_offset
                .checked_add(length)
                .is_some_and(|end| end <= old_len);
            if !in_bounds {
                return Err(DeltaError::Range {
                    offset: old_offset,
                    length,
                    old_len,
                });
            }
        }
    }
    Ok(())
}

/// Replay instructions against `old`, appending to `out`.
///
/// Callers must have run [`check_ranges`]; returns the number of bytes written.
pub fn apply_to(old: &[u8], instructions: &[Instruction], out: &mut Vec<u8>) -> usize {
    let start = out.len();
    for ins in instructions {
        match ins {
            Instruction::Copy { old_offset, length } => {
                let s = *old_offset as usize;
                out.extend_from_slice(&old[s..s + *length as usize]);
            }
            Instruction::Insert { bytes } => out.extend_from_slice(bytes),
        }
    }
    out.len() - start
}

/// Reserve exactly `len` bytes, reporting failure instead of aborting.
fn allocate_output(len: u64) -> Result<Vec<u8>> {
    let size = usize::try_from(len).map_err(|_| DeltaError::Allocation(len))?;
    let mut out = Vec::new();
    out.try_reserve_exact(size)
        .map_err(|_| DeltaError::Allocation(len))?;
    Ok(out)
}

/// Reconstruct new data from `old` and bare instructions (no header checks).
pub fn apply_instructions(old: &[u8], instructions: &[Instruction]) -> Result<Vec<u8>> {
    check_ranges(old, instructions)?;
    let mut out = allocate_output(output_size(instructions))?;
    apply_to(old, instructions, &mut out);
    Ok(out)
}

/// Reconstruct new data from `old` and a decoded patch.
///
/// All-or-nothing: the output is returned only when the old length matches the
/// header, every copy is in range, the length is exact and the digest agrees.
pub fn apply_patch(old: &[u8], patch: &Patch) -> Result<Vec<u8>> {
    let h = &patch.header;
    if old.len() as u64 != h.old_len {
        return Err(DeltaError::OldLength {
            expected: h.old_len,
            actual: old.len() as u64,
        });
    }
    check_ranges(old, &patch.instructions)?;

    let mut out = allocate_output(h.new_len)?;
    let written = apply_to(old, &patch.instructions, &mut out);
    if written as u64 != h.new_len {
        return Err(DeltaError::Format(format!(
            "reconstructed {} bytes, header declares {}",
            written, h.new_len
        )));
    }

    let actual = content_digest(&out);
    if actual != h.new_digest {
        return Err(DeltaError::Checksum {
            expected: hex_str(&h.new_digest),
            actual: hex_str(&actual),
        });
    }

    debug!(
        instructions = patch.instructions.len(),
        old_len = old.len(),
        new_len = written,
        "patch applied"
    );
    Ok(out)
}

/// Decode `patch_bytes` and apply them to `old`.
pub fn apply_patch_bytes(old: &[u8], patch_bytes: &[u8]) -> Result<Vec<u8>> {
    let patch = decode_patch(patch_bytes)?;
    apply_patch(old, &patch)
}
