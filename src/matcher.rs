use tracing::{debug, trace};

use crate::encoding::encoded_len;
use crate::hash::RollingHash;
use crate::index::BlockIndex;
use crate::types::Instruction;

/// Scan `new` against the indexed `old` data and emit COPY/INSERT instructions.
///
/// A `block_size` window slides over `new`. At each position the window's
/// fingerprint selects candidate old offsets (ascending); the first one whose
/// bytes really match wins and is extended greedily past the block. Unmatched
/// bytes accumulate into a single INSERT that is flushed before each COPY and
/// at the end of input.
///
/// A winning match is only emitted when its encoded COPY is shorter than the
/// bytes it covers; otherwise those bytes stay in the literal run. If the
/// resulting instructions still encode larger than one INSERT of all of `new`,
/// that single INSERT is returned instead, so the patch never exceeds the
/// literal-only size.
///
/// Candidates that do not fit inside `old` are skipped, so an index built from
/// other data yields fewer matches rather than a panic.
/// Time: O(|new|) expected with short candidate chains. Space: O(|old| / n).
pub fn find_matches(old: &[u8], new: &[u8], index: &BlockIndex) -> Vec<Instruction> {
    let n = index.block_size();
    let mut instructions = Vec::new();
    if new.is_empty() {
        return instructions;
    }

    let mut positions: usize = 0;
    let mut probes: usize = 0;
    let mut collisions: usize = 0;
    let mut unprofitable: usize = 0;

    // Step (1): open the window at p = 0 (never, if new is shorter than a block)
    let mut p: usize = 0;
    let mut pending_start: usize = 0;
    let mut rh: Option<RollingHash> = (new.len() >= n).then(|| RollingHash::new(&new[..n]));

    while let Some(hash) = rh.as_mut() {
        if p + n > new.len() {
            break;
        }
        positions += 1;

        // Step (2): first verified candidate wins
        let mut matched: Option<usize> = None;
        for &cand in index.candidates(hash.value()) {
            probes += 1;
            if old.get(cand..cand + n) == Some(&new[p..p + n]) {
                matched = Some(cand);
                break;
            }
            collisions += 1;
        }

        // Step (3): extend forward, bounded by both buffers
        let extended = matched.map(|old_offset| {
            let max_ext = (new.len() - p).min(old.len() - old_offset);
            let length = new[p..p + max_ext]
                .iter()
                .zip(&old[old_offset..old_offset + max_ext])
                .position(|(a, b)| a != b)
                .unwrap_or(max_ext);
            (old_offset, length)
        });

        // Step (4): keep the copy only if it encodes smaller than its bytes
        let profitable = extended.filter(|&(old_offset, length)| {
            let copy = Instruction::Copy {
                old_offset: old_offset as u64,
                length: length as u64,
            };
            encoded_len(&copy) < length
        });
        if extended.is_some() && profitable.is_none() {
            unprofitable += 1;
        }

        let Some((old_offset, length)) = profitable else {
            // Step (5): literal byte, slide the window by one
            p += 1;
            if p + n <= new.len() {
                hash.roll(new[p - 1], new[p + n - 1]);
            }
            continue;
        };

        if pending_start < p {
            instructions.push(Instruction::Insert {
                bytes: new[pending_start..p].to_vec(),
            });
        }
        trace!(new_offset = p, old_offset, length, "copy");
        instructions.push(Instruction::Copy {
            old_offset: old_offset as u64,
            length: length as u64,
        });

        p += length;
        pending_start = p;
        if p + n <= new.len() {
            hash.reset(&new[p..p + n]);
        }
    }

    // Step (6): trailing literals, including any tail shorter than a block
    if pending_start < new.len() {
        instructions.push(Instruction::Insert {
            bytes: new[pending_start..].to_vec(),
        });
    }

    debug!(positions, probes, collisions, unprofitable, "scan finished");

    // Step (7): never encode larger than the whole input as one literal
    let literal = Instruction::Insert { bytes: new.to_vec() };
    let encoded: usize = instructions.iter().map(encoded_len).sum();
    if instructions.len() > 1 && encoded > encoded_len(&literal) {
        debug!(encoded, literal = encoded_len(&literal), "falling back to literal");
        instructions = vec![literal];
    }

    log_instruction_stats(&instructions);

    instructions
}

/// Emit aggregate statistics about matcher output at debug level.
pub(crate) fn log_instruction_stats(instructions: &[Instruction]) {
    let mut copy_lens: Vec<u64> = Vec::new();
    let mut total_copy: u64 = 0;
    let mut total_insert: u64 = 0;
    let mut num_inserts: usize = 0;
    for ins in instructions {
        match ins {
            Instruction::Copy { length, .. } => {
                total_copy += length;
                copy_lens.push(*length);
            }
            Instruction::Insert { bytes } => {
                total_insert += bytes.len() as u64;
                num_inserts += 1;
            }
        }
    }
    let total_out = total_copy + total_insert;
    let copy_pct = if total_out > 0 {
        total_copy as f64 / total_out as f64 * 100.0
    } else {
        0.0
    };
    debug!(
        copies = copy_lens.len(),
        copy_bytes = total_copy,
        inserts = num_inserts,
        insert_bytes = total_insert,
        "copy coverage {:.1}%",
        copy_pct
    );
    if let (Some(&min), Some(&max)) = (copy_lens.iter().min(), copy_lens.iter().max()) {
        copy_lens.sort_unstable();
        let mean = total_copy as f64 / copy_lens.len() as f64;
        let median = copy_lens[copy_lens.len() / 2];
        debug!(min, max, median, "copy lengths mean={:.1}", mean);
    }
}
