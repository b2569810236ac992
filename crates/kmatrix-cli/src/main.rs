use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use kmatrix_lib::constants::DEFAULT_COUNTER_LEN;
use kmatrix_lib::store::text::{dump_store, import_counts};
use kmatrix_lib::{
    run_scan, KmerCodec, MatrixBuildConfig, MatrixBuilder, ProfileHistogram, ReadFormat,
    ScanConfig, ScanMode, StoreReader,
};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "kmatrix")]
#[command(version = "0.1.0")]
#[command(about = "Multi-sample k-mer presence matrices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a presence matrix from per-sample count stores
    Build {
        /// Per-sample count stores, in sample order (first is the master)
        #[arg(short, long = "input", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Output matrix store
        #[arg(short, long)]
        output: PathBuf,

        /// Minimum count for a sample to be marked present
        #[arg(short, long, default_value = "1")]
        abundance: u64,

        /// Keep k-mers present in at least this many samples
        #[arg(long, default_value = "0")]
        min: u32,

        /// Keep k-mers present in at most this many samples
        #[arg(long)]
        max: Option<u32>,

        /// Number of threads for sorting the output
        #[arg(short = 't', long, default_value = "1")]
        threads: usize,
    },

    /// Histogram of canonical haplotype profiles in a matrix store
    Histo {
        /// Matrix store
        #[arg(short, long)]
        input: PathBuf,
    },

    /// List the presence vectors of each read's k-mers
    #[command(group(ArgGroup::new("reads").required(true).args(["fasta", "fastq"])))]
    Read {
        /// Matrix store
        #[arg(short, long)]
        jf: PathBuf,

        /// FASTA reads
        #[arg(long)]
        fasta: Option<PathBuf>,

        /// FASTQ reads
        #[arg(long)]
        fastq: Option<PathBuf>,
    },

    /// Summarize sequence lines read from standard input
    Summary {
        /// Matrix store
        #[arg(short, long)]
        jf: PathBuf,

        /// Number of threads
        #[arg(short = 't', long, default_value = "1")]
        threads: usize,
    },

    /// Print the header of a store
    Info {
        /// Store file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print every record of a store as `KMER\tvalue`
    Dump {
        /// Store file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Create a count store from `KMER count` text lines
    Import {
        /// Text file of k-mer counts
        #[arg(short, long)]
        input: PathBuf,

        /// Output count store
        #[arg(short, long)]
        output: PathBuf,

        /// K-mer length
        #[arg(short, long)]
        k: usize,

        /// Bytes per stored count
        #[arg(long, default_value_t = DEFAULT_COUNTER_LEN)]
        counter_len: usize,
    },
}

fn main() -> ExitCode {
    // Initialize tracing: use RUST_LOG if set, otherwise default to info.
    // Logs go to stderr; stdout carries results.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Build { inputs, output, abundance, min, max, threads } => {
            build_command(inputs, output, abundance, min, max, threads)
        }
        Commands::Histo { input } => histo_command(input),
        Commands::Read { jf, fasta, fastq } => read_command(jf, fasta, fastq),
        Commands::Summary { jf, threads } => summary_command(jf, threads),
        Commands::Info { input } => info_command(input),
        Commands::Dump { input } => dump_command(input),
        Commands::Import { input, output, k, counter_len } => {
            import_command(input, output, k, counter_len)
        }
    }
}

/// Build a presence matrix
fn build_command(
    inputs: Vec<PathBuf>,
    output: PathBuf,
    abundance: u64,
    min: u32,
    max: Option<u32>,
    threads: usize,
) -> anyhow::Result<()> {
    info!("Building presence matrix...");
    if threads == 0 {
        anyhow::bail!("--threads must be at least 1");
    }

    let mut config = MatrixBuildConfig::new(inputs, output).map_err(anyhow::Error::msg)?;
    config.abundance = abundance;
    config.min_prevalence = min;
    config.max_prevalence = max.unwrap_or(u32::MAX);
    config.num_threads = threads;

    let builder = MatrixBuilder::new(config)?;
    builder.build().context("Failed to build matrix")?;

    info!("Matrix built successfully!");
    Ok(())
}

/// Print the canonical profile histogram of a matrix store
fn histo_command(input: PathBuf) -> anyhow::Result<()> {
    let histogram = ProfileHistogram::from_store(&input)
        .with_context(|| format!("Failed to histogram {}", input.display()))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    histogram.write_tsv(&mut out)?;
    out.flush()?;
    Ok(())
}

/// Enumerate read k-mers against a matrix
fn read_command(jf: PathBuf, fasta: Option<PathBuf>, fastq: Option<PathBuf>) -> anyhow::Result<()> {
    let mode = match (fasta, fastq) {
        (Some(reads), None) => ScanMode::Enumerate { reads, format: ReadFormat::Fasta },
        (None, Some(reads)) => ScanMode::Enumerate { reads, format: ReadFormat::Fastq },
        _ => anyhow::bail!("exactly one of --fasta or --fastq is required"),
    };
    let config = ScanConfig::new(jf, mode);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    run_scan(&config, io::empty(), &mut out)?;
    Ok(())
}

/// Summarize stdin lines against a matrix
fn summary_command(jf: PathBuf, threads: usize) -> anyhow::Result<()> {
    let mut config = ScanConfig::new(jf, ScanMode::Summary);
    config.num_threads = threads;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    run_scan(&config, stdin.lock(), &mut out)?;
    Ok(())
}

/// Print header fields of a store
fn info_command(input: PathBuf) -> anyhow::Result<()> {
    let reader = StoreReader::open(&input)?;
    let header = reader.header();

    println!("file:        {}", input.display());
    println!("format:      {}", header.format);
    println!("k:           {}", header.k());
    println!("key_len:     {} bits", header.key_bit_length);
    println!("val_len:     {} bits", header.value_bit_length);
    println!("counter_len: {} bytes", header.counter_len);
    println!("records:     {}", header.record_count);
    println!("max_reprobe: {}", header.max_reprobe);
    println!("canonical:   {}", header.canonical);
    match &header.matrix {
        Some(matrix) => println!(
            "hash matrix: {}x{}{}",
            matrix.r,
            matrix.c,
            if matrix.identity { " (identity)" } else { "" }
        ),
        None => println!("hash matrix: none"),
    }
    Ok(())
}

/// Print every record of a store
fn dump_command(input: PathBuf) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let records = dump_store(&input, &mut out)
        .with_context(|| format!("Failed to dump {}", input.display()))?;
    out.flush()?;
    info!("Dumped {} records", records);
    Ok(())
}

/// Convert a text count listing to a store
fn import_command(input: PathBuf, output: PathBuf, k: usize, counter_len: usize) -> anyhow::Result<()> {
    let codec = KmerCodec::new(k)?;
    info!("Importing {} (k={})...", input.display(), k);
    let records = import_counts(&input, &output, codec, counter_len)
        .with_context(|| format!("Failed to import {}", input.display()))?;
    info!("Wrote {} records to {}", records, output.display());
    Ok(())
}
