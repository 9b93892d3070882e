use crate::types::{
    DeltaError, Instruction, Patch, PatchHeader, Result, DIGEST_LEN, PATCH_CMD_COPY,
    PATCH_CMD_END, PATCH_CMD_INSERT, PATCH_HEADER_SIZE, PATCH_MAGIC, PATCH_VERSION,
};

/// Maximum encoded width of a u64 varint.
const VARINT_MAX_BYTES: usize = 10;

/// Encode a patch to the binary format.
///
/// Format:
///   Header: magic (4) + version (1) + block_size u32 BE + old_len u64 BE
///           + new_len u64 BE + SHA-256 of new data (32)
///   Instructions (fields are LEB128 varints):
///     END:    type=0
///     COPY:   type=1, old_offset, length
///     INSERT: type=2, length, bytes
pub fn encode_patch(patch: &Patch) -> Vec<u8> {
    let h = &patch.header;
    let body: usize = patch.instructions.iter().map(encoded_len).sum();

    let mut out = Vec::with_capacity(PATCH_HEADER_SIZE + body + 1);
    out.extend_from_slice(PATCH_MAGIC);
    out.push(h.version);
    out.extend_from_slice(&h.block_size.to_be_bytes());
    out.extend_from_slice(&h.old_len.to_be_bytes());
    out.extend_from_slice(&h.new_len.to_be_bytes());
    out.extend_from_slice(&h.new_digest);

    for ins in &patch.instructions {
        match ins {
            Instruction::Copy { old_offset, length } => {
                out.push(PATCH_CMD_COPY);
                write_varint(&mut out, *old_offset);
                write_varint(&mut out, *length);
            }
            Instruction::Insert { bytes } => {
                out.push(PATCH_CMD_INSERT);
                write_varint(&mut out, bytes.len() as u64);
                out.extend_from_slice(bytes);
            }
        }
    }

    out.push(PATCH_CMD_END);
    out
}

/// Decode the binary patch format.
///
/// Decoding is strictly sequential; every length field is checked against the
/// bytes that remain, and the instructions must produce exactly `new_len` bytes.
pub fn decode_patch(data: &[u8]) -> Result<Patch> {
    let header = decode_header(data)?;
    let mut reader = Reader::new(data, PATCH_HEADER_SIZE);
    let mut instructions = Vec::new();
    let mut total: u64 = 0;

    loop {
        let at = reader.pos;
        let tag = reader
            .byte()
            .ok_or_else(|| DeltaError::Format("missing END marker".into()))?;

        let ins = match tag {
            PATCH_CMD_END => break,

            PATCH_CMD_COPY => {
                let old_offset = reader.varint()?;
                let length = reader.varint()?;
                Instruction::Copy { old_offset, length }
            }

            PATCH_CMD_INSERT => {
                let len = reader.varint()?;
                let bytes = reader.take(len).ok_or_else(|| {
                    DeltaError::Format(format!(
                        "insert at byte {} declares {} bytes, only {} remain",
                        at,
                        len,
                        reader.remaining()
                    ))
                })?;
                Instruction::Insert {
                    bytes: bytes.to_vec(),
                }
            }

            other => {
                return Err(DeltaError::Format(format!(
                    "unknown instruction type {:#04x} at byte {}",
                    other, at
                )));
            }
        };

        let len = ins.output_len();
        if len == 0 {
            return Err(DeltaError::Format(format!(
                "zero-length instruction at byte {}",
                at
            )));
        }
        total = total
            .checked_add(len)
            .filter(|&t| t <= header.new_len)
            .ok_or_else(|| {
                DeltaError::Format(format!(
                    "instructions at byte {} exceed declared output length {}",
                    at, header.new_len
                ))
            })?;
        instructions.push(ins);
    }

    if reader.remaining() != 0 {
        return Err(DeltaError::Format(format!(
            "{} trailing bytes after END marker",
            reader.remaining()
        )));
    }
    if total != header.new_len {
        return Err(DeltaError::Format(format!(
            "instructions produce {} bytes, header declares {}",
            total, header.new_len
        )));
    }

    Ok(Patch {
        header,
        instructions,
    })
}

/// Parse and validate only the fixed-size header.
pub fn decode_header(data: &[u8]) -> Result<PatchHeader> {
    if data.len() < PATCH_HEADER_SIZE {
        return Err(DeltaError::Format(format!(
            "patch is {} bytes, header needs {}",
            data.len(),
            PATCH_HEADER_SIZE
        )));
    }
    if &data[..4] != PATCH_MAGIC {
        return Err(DeltaError::Format("not a patch file (bad magic)".into()));
    }
    let version = data[4];
    if version != PATCH_VERSION {
        return Err(DeltaError::Format(format!(
            "unsupported patch version {} (expected {})",
            version, PATCH_VERSION
        )));
    }

    let block_size = u32::from_be_bytes([data[5], data[6], data[7], data[8]]);
    if block_size == 0 {
        return Err(DeltaError::Format("header records block size 0".into()));
    }
    let old_len = be_u64(&data[9..17]);
    let new_len = be_u64(&data[17..25]);
    let mut new_digest = [0u8; DIGEST_LEN];
    new_digest.copy_from_slice(&data[25..25 + DIGEST_LEN]);

    Ok(PatchHeader {
        version,
        block_size,
        old_len,
        new_len,
        new_digest,
    })
}

/// Check if binary data starts with a patch header of this format.
pub fn is_patch(data: &[u8]) -> bool {
    data.len() >= 5 && &data[..4] == PATCH_MAGIC && data[4] == PATCH_VERSION
}

/// Number of bytes `value` takes as a LEB128 varint.
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

/// Exact encoded size of one instruction, tag byte included.
pub fn encoded_len(ins: &Instruction) -> usize {
    match ins {
        Instruction::Copy { old_offset, length } => {
            1 + varint_len(*old_offset) + varint_len(*length)
        }
        Instruction::Insert { bytes } => 1 + varint_len(bytes.len() as u64) + bytes.len(),
    }
}

fn be_u64(b: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&b[..8]);
    u64::from_be_bytes(buf)
}

/// LEB128: 7 value bits per byte, high bit set while more bytes follow.
fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

/// Forward-only cursor over the patch bytes.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Reader { data, pos }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn byte(&mut self) -> Option<u8> {
        let b = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn take(&mut self, len: u64) -> Option<&'a [u8]> {
        let len = usize::try_from(len).ok()?;
        if len > self.remaining() {
            return None;
        }
        let s = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Some(s)
    }

    fn varint(&mut self) -> Result<u64> {
        let start = self.pos;
        let mut value: u64 = 0;
        for i in 0..VARINT_MAX_BYTES {
            let byte = self.byte().ok_or_else(|| {
                DeltaError::Format(format!("truncated integer at byte {}", start))
            })?;
            let bits = (byte & 0x7f) as u64;
            // the tenth byte may only carry the single remaining bit
            if i == VARINT_MAX_BYTES - 1 && bits > 1 {
                break;
            }
            value |= bits << (7 * i);
            if byte & 0x80 == 0 {
                // a zero final byte after the first means the value had a shorter form
                if i > 0 && byte == 0 {
                    return Err(DeltaError::Format(format!(
                        "non-canonical integer at byte {}",
                        start
                    )));
                }
                return Ok(value);
            }
        }
        Err(DeltaError::Format(format!(
            "integer at byte {} overflows 64 bits",
            start
        )))
    }
}
