use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Constants
//
// Patch layout (all header integers big-endian):
//   magic (4) + version (1) + block_size u32 (4) + old_len u64 (8)
//   + new_len u64 (8) + new_digest (32)
// Instructions follow, each a tag byte plus LEB128 fields, closed by END.
// ============================================================================

pub const DEFAULT_BLOCK_SIZE: u32 = 16;
pub const PATCH_MAGIC: &[u8; 4] = b"BDLT";
pub const PATCH_VERSION: u8 = 1;
pub const PATCH_CMD_END: u8 = 0;
pub const PATCH_CMD_COPY: u8 = 1;
pub const PATCH_CMD_INSERT: u8 = 2;
pub const DIGEST_LEN: usize = 32;
pub const PATCH_HEADER_SIZE: usize = 4 + 1 + 4 + 8 + 8 + DIGEST_LEN;

// ============================================================================
// Instructions
// ============================================================================

/// One step of reconstruction: reuse a span of the old data or append literals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Copy { old_offset: u64, length: u64 },
    Insert { bytes: Vec<u8> },
}

impl Instruction {
    /// Number of output bytes this instruction produces.
    #[inline]
    pub fn output_len(&self) -> u64 {
        match self {
            Instruction::Copy { length, .. } => *length,
            Instruction::Insert { bytes } => bytes.len() as u64,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Copy { old_offset, length } => {
                write!(f, "COPY(off={}, len={})", old_offset, length)
            }
            Instruction::Insert { bytes } => {
                if bytes.len() <= 20 {
                    write!(f, "INSERT({:?})", bytes)
                } else {
                    write!(f, "INSERT(len={})", bytes.len())
                }
            }
        }
    }
}

// ============================================================================
// Patch
// ============================================================================

/// Self-describing patch metadata, written ahead of the instruction stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchHeader {
    pub version: u8,
    pub block_size: u32,
    pub old_len: u64,
    pub new_len: u64,
    pub new_digest: [u8; DIGEST_LEN],
}

/// A decoded patch. Only lives for the duration of a create or apply call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Patch {
    pub header: PatchHeader,
    pub instructions: Vec<Instruction>,
}

// ============================================================================
// Options
// ============================================================================

/// Tunables for patch creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchOptions {
    /// Width of the fingerprinted block. Smaller blocks find shorter reused
    /// spans at the cost of a larger index and more instructions.
    pub block_size: u32,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl PatchOptions {
    pub fn new(block_size: u32) -> Self {
        Self { block_size }
    }

    /// Reject settings the matcher cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(DeltaError::Config("block size must be > 0".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Error type
// ============================================================================

pub type Result<T> = std::result::Result<T, DeltaError>;

#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("format error: {0}")]
    Format(String),

    #[error(
        "range error: copy at offset {offset} with length {length} exceeds old data length {old_len}"
    )]
    Range { offset: u64, length: u64, old_len: u64 },

    #[error("range error: patch expects {expected} bytes of old data, got {actual}")]
    OldLength { expected: u64, actual: u64 },

    #[error("checksum error: expected {expected}, reconstructed {actual}")]
    Checksum { expected: String, actual: String },

    #[error("allocation error: cannot reserve {0} bytes for output")]
    Allocation(u64),
}

/// Failure categories, stable across the C boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Io,
    Format,
    Range,
    Checksum,
    Allocation,
}

impl ErrorKind {
    /// Negative status returned by the C entry points.
    pub fn status_code(self) -> i32 {
        match self {
            ErrorKind::Config => -1,
            ErrorKind::Io => -2,
            ErrorKind::Format => -3,
            ErrorKind::Range => -4,
            ErrorKind::Checksum => -5,
            ErrorKind::Allocation => -6,
        }
    }
}

impl DeltaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeltaError::Config(_) => ErrorKind::Config,
            DeltaError::Io { .. } => ErrorKind::Io,
            DeltaError::Format(_) => ErrorKind::Format,
            DeltaError::Range { .. } | DeltaError::OldLength { .. } => ErrorKind::Range,
            DeltaError::Checksum { .. } => ErrorKind::Checksum,
            DeltaError::Allocation(_) => ErrorKind::Allocation,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeltaError::Io {
            path: path.into(),
            source,
        }
    }
}

// ============================================================================
// Summary statistics
// ============================================================================

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PatchSummary {
    pub num_instructions: usize,
    pub num_copies: usize,
    pub num_inserts: usize,
    pub copy_bytes: u64,
    pub insert_bytes: u64,
    pub total_output_bytes: u64,
}

pub fn patch_summary(instructions: &[Instruction]) -> PatchSummary {
    let mut summary = PatchSummary {
        num_instructions: instructions.len(),
        ..PatchSummary::default()
    };
    for ins in instructions {
        match ins {
            Instruction::Copy { length, .. } => {
                summary.num_copies += 1;
                summary.copy_bytes += length;
            }
            Instruction::Insert { bytes } => {
                summary.num_inserts += 1;
                summary.insert_bytes += bytes.len() as u64;
            }
        }
    }
    summary.total_output_bytes = summary.copy_bytes + summary.insert_bytes;
    summary
}

/// Lowercase hex rendering for digests in messages and reports.
pub fn hex_str(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
