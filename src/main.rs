use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use blockdelta::{
    decode_patch, encode_patch, hex_str, patch_summary, DeltaError, PatchOptions,
};

/// Parse a block size, rejecting 0 before any file is touched.
fn parse_block_size(s: &str) -> Result<u32, String> {
    let n: u32 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid block size '{}': {}", s, e))?;
    if n == 0 {
        return Err("--block-size must be >= 1".to_string());
    }
    Ok(n)
}

fn read_or_exit(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap_or_else(|e| {
        eprintln!("error: {}", DeltaError::Io { path: path.to_path_buf(), source: e });
        process::exit(1);
    })
}

fn exit_on<T>(result: blockdelta::Result<T>) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        process::exit(1);
    })
}

// ── CLI types ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(about = "Block-matching binary delta patches", version)]
struct Cli {
    /// Print diagnostic messages to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a patch turning OLD into NEW
    Create {
        /// Old (reference) file
        old: PathBuf,

        /// New (target) file
        new: PathBuf,

        /// Output patch file
        patch: PathBuf,

        /// Fingerprint block size in bytes (must be >= 1)
        #[arg(long, short = 'b', default_value_t = blockdelta::DEFAULT_BLOCK_SIZE,
              value_parser = parse_block_size)]
        block_size: u32,
    },

    /// Reconstruct NEW from OLD and a patch
    Apply {
        /// Old (reference) file
        old: PathBuf,

        /// Patch file
        patch: PathBuf,

        /// Output (reconstructed) file
        output: PathBuf,
    },

    /// Show patch header and instruction statistics
    Info {
        /// Patch file
        patch: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ── main ─────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Create {
            old,
            new,
            patch,
            block_size,
        } => {
            let old_bytes = read_or_exit(&old);
            let new_bytes = read_or_exit(&new);

            let t0 = Instant::now();
            let opts = PatchOptions::new(block_size);
            let diff = exit_on(blockdelta::diff(&old_bytes, &new_bytes, &opts));
            let patch_bytes = encode_patch(&diff);
            let elapsed = t0.elapsed();

            fs::write(&patch, &patch_bytes).unwrap_or_else(|e| {
                eprintln!("error: {}", DeltaError::Io { path: patch.clone(), source: e });
                process::exit(1);
            });

            let stats = patch_summary(&diff.instructions);
            let ratio = if new_bytes.is_empty() {
                0.0
            } else {
                patch_bytes.len() as f64 / new_bytes.len() as f64
            };
            println!("Old:          {} ({} bytes)", old.display(), old_bytes.len());
            println!("New:          {} ({} bytes)", new.display(), new_bytes.len());
            println!("Patch:        {} ({} bytes)", patch.display(), patch_bytes.len());
            println!("Block size:   {}", block_size);
            println!("Compression:  {:.4} (patch/new)", ratio);
            println!(
                "Instructions: {} copies, {} inserts",
                stats.num_copies, stats.num_inserts
            );
            println!("Copy bytes:   {}", stats.copy_bytes);
            println!("Insert bytes: {}", stats.insert_bytes);
            println!("Time:         {:.3}s", elapsed.as_secs_f64());
        }

        Commands::Apply { old, patch, output } => {
            let old_bytes = read_or_exit(&old);
            let patch_bytes = read_or_exit(&patch);

            let t0 = Instant::now();
            let decoded = exit_on(decode_patch(&patch_bytes));
            let new_bytes = exit_on(blockdelta::apply(&old_bytes, &decoded));
            let elapsed = t0.elapsed();
            debug!(digest = %hex_str(&decoded.header.new_digest), "output verified");

            fs::write(&output, &new_bytes).unwrap_or_else(|e| {
                eprintln!("error: {}", DeltaError::Io { path: output.clone(), source: e });
                process::exit(1);
            });

            println!("Old:          {} ({} bytes)", old.display(), old_bytes.len());
            println!("Patch:        {} ({} bytes)", patch.display(), patch_bytes.len());
            println!("Output:       {} ({} bytes)", output.display(), new_bytes.len());
            println!("Time:         {:.3}s", elapsed.as_secs_f64());
        }

        Commands::Info { patch } => {
            let patch_bytes = read_or_exit(&patch);
            let decoded = exit_on(decode_patch(&patch_bytes));
            let h = &decoded.header;

            let stats = patch_summary(&decoded.instructions);
            println!("Patch file:   {} ({} bytes)", patch.display(), patch_bytes.len());
            println!("Version:      {}", h.version);
            println!("Block size:   {}", h.block_size);
            println!("Old size:     {} bytes", h.old_len);
            println!("New size:     {} bytes", h.new_len);
            println!("New SHA-256:  {}", hex_str(&h.new_digest));
            println!("Instructions: {}", stats.num_instructions);
            println!(
                "  Copies:     {} ({} bytes)",
                stats.num_copies, stats.copy_bytes
            );
            println!(
                "  Inserts:    {} ({} bytes)",
                stats.num_inserts, stats.insert_bytes
            );
            if cli.verbose {
                for ins in &decoded.instructions {
                    println!("  {}", ins);
                }
            }
        }
    }
}
