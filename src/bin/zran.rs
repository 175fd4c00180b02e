//! Command-line wrapper around the `zran` library: build an index, inspect
//! one, extract a range, or carve out a narrowed index + compressed slice.
//! Kept deliberately thin: every subcommand is a few lines over the
//! library's public API, per spec.md's framing of CLI wrappers as an
//! external collaborator rather than part of the core.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "zran", about = "Random access into DEFLATE-family streams")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Raw,
    Zlib,
    Gzip,
}

impl From<ModeArg> for zran::Mode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Raw => zran::Mode::Raw,
            ModeArg::Zlib => zran::Mode::Zlib,
            ModeArg::Gzip => zran::Mode::Gzip,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Build a DFLIDX index for a compressed file.
    Build {
        input: PathBuf,
        index_out: PathBuf,
        #[arg(long, value_enum, default_value_t = ModeArg::Gzip)]
        mode: ModeArg,
        #[arg(long, default_value_t = zran::DEFAULT_SPAN)]
        span: u64,
    },
    /// Print summary information about a DFLIDX index file.
    Info { index: PathBuf },
    /// Extract `length` uncompressed bytes starting at `start`.
    Extract {
        compressed: PathBuf,
        index: PathBuf,
        start: u64,
        length: u64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Narrow an index (and report the matching compressed byte range) to
    /// just what's needed to serve the given start offsets.
    Modify {
        index: PathBuf,
        #[arg(required = true)]
        starts: Vec<u64>,
        #[arg(long)]
        stop: Option<u64>,
        #[arg(long)]
        index_out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Build {
            input,
            index_out,
            mode,
            span,
        } => {
            let file = fs::File::open(&input)?;
            let index = zran::Index::create(file, mode.into(), span)?;
            index.write_file(&index_out)?;
            log::info!(
                "wrote index with {} checkpoints to {}",
                index.have(),
                index_out.display()
            );
        }
        Command::Info { index } => {
            let index = zran::Index::read_file(&index)?;
            println!("mode:              {:?}", index.mode);
            println!("compressed_size:   {}", index.compressed_size);
            println!("uncompressed_size: {}", index.uncompressed_size);
            println!("checkpoints:       {}", index.have());
        }
        Command::Extract {
            compressed,
            index,
            start,
            length,
            output,
        } => {
            let compressed = fs::read(compressed)?;
            let index = zran::Index::read_file(index)?;
            let data = zran::decompress(&compressed, &index, start, length)?;
            match output {
                Some(path) => fs::write(path, data)?,
                None => {
                    use std::io::Write;
                    std::io::stdout().write_all(&data)?;
                }
            }
        }
        Command::Modify {
            index,
            starts,
            stop,
            index_out,
        } => {
            let index = zran::Index::read_file(index)?;
            let (compressed_range, uncompressed_range, new_index) =
                index.create_modified_index(&starts, stop)?;
            new_index.write_file(&index_out)?;
            log::info!(
                "compressed_range={:?} uncompressed_range={:?} checkpoints={}",
                compressed_range,
                uncompressed_range,
                new_index.have()
            );
        }
    }

    Ok(())
}
