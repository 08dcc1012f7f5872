//! `reprint` CLI: streaming stages for text-reuse detection.
//!
//! Every subcommand reads line-delimited records on stdin and writes
//! line-delimited records on stdout; logs go to stderr. Success exits 0,
//! usage errors and stream failures exit 1.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use align::{ScoreStage, ScoresConfig};
use cluster::{render_clusters, ClusterConfig, ClusterStage};
use corpus::{NgramIndex, SeriesMap};
use pairs::{MergeConfig, PairEnumerator, PairMerger, PairsConfig};
use quotes::{QuoteHunter, QuotesConfig};
use reprint::read_word_set;

#[derive(Parser)]
#[command(name = "reprint", version, about = "Detect, align, and cluster reused passages")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enumerate candidate document pairs from an index part
    Pairs(PairsArgs),
    /// Coalesce sorted pair records and apply the feature threshold
    Merge(MergeArgs),
    /// Align merged pairs into passages
    Scores(ScoresArgs),
    /// Cluster alignment records into reprint families
    Cluster(ClusterArgs),
    /// Render cluster JSON lines for reading
    Format(FormatArgs),
    /// Hunt for quotations of reference texts in the corpus
    Quotes(QuotesArgs),
}

#[derive(Args)]
struct PairsArgs {
    /// Emit a seriesA/seriesB histogram instead of pair records
    #[arg(short, long)]
    counts: bool,
    /// Cap on the cross-series cross-count per feature
    #[arg(short = 'u', long, default_value_t = 100)]
    max_series: u32,
    /// Drop postings with term frequency above this
    #[arg(short = 'd', long, default_value_t = 100)]
    max_df: u32,
    /// Precomputed docId<TAB>seriesId map; defaults to parsing index names
    #[arg(short = 'm', long, value_name = "PATH")]
    series_map: Option<PathBuf>,
    /// Keep only keys with hash(key) % MODP == 0
    #[arg(short = 'p', long, default_value_t = 1)]
    modp: u64,
    /// Keep only records with hash(pair) % MODREC == 0
    #[arg(short = 'r', long, default_value_t = 1)]
    modrec: u64,
    /// Skip STEP * STRIDE keys before scanning
    #[arg(short = 's', long, default_value_t = 0)]
    step: usize,
    /// Number of keys to scan
    #[arg(short = 't', long, default_value_t = 1000)]
    stride: usize,
    /// Drop features with mean token length below this
    #[arg(short = 'w', long, default_value_t = 1.5)]
    word_length: f64,
    /// Stopword file, one word per line
    #[arg(short = 'S', long, value_name = "PATH")]
    stop: Option<PathBuf>,
    /// Index part path
    index: PathBuf,
}

#[derive(Args)]
struct MergeArgs {
    /// Minimum feature count for a merged pair
    #[arg(short, long, default_value_t = 1)]
    min_matches: usize,
}

#[derive(Args)]
struct ScoresArgs {
    /// Anchor n-gram order; 0 means whole-document alignment
    #[arg(short = 'n', long, default_value_t = 5)]
    ngram: usize,
    /// Index part path
    index: PathBuf,
}

#[derive(Args)]
struct ClusterArgs {
    /// Absolute token-overlap threshold; 0 uses the relative criterion
    #[arg(short = 'm', long, default_value_t = 0)]
    min_overlap: usize,
    /// Relative span-overlap threshold
    #[arg(short = 'o', long, default_value_t = 0.5)]
    relative_overlap: f64,
    /// Drop clusters where one series exceeds this fraction of members
    #[arg(short = 'p', long, default_value_t = 1.0)]
    max_proportion: f64,
    /// Drop clusters where one series exceeds this many members
    #[arg(short = 'r', long, default_value_t = 4)]
    max_repeats: usize,
}

#[derive(Args)]
struct FormatArgs {
    /// Index part path
    index: PathBuf,
}

#[derive(Args)]
struct QuotesArgs {
    /// Skip terms with document frequency above this
    #[arg(short = 'c', long, default_value_t = 1000)]
    max_count: u32,
    /// Split hit chains at reference-position gaps above this
    #[arg(short = 'g', long, default_value_t = 200)]
    max_gap: usize,
    /// Drop spans scoring below this
    #[arg(short = 's', long, default_value_t = 0.0)]
    min_score: f64,
    /// Pretty-print JSON hits
    #[arg(short = 'p', long)]
    pretty: bool,
    /// Attach per-word alignment records
    #[arg(short = 'w', long)]
    words: bool,
    /// Unigram language model, term<TAB>logprob per line
    #[arg(short = 'l', long, value_name = "PATH")]
    lm: Option<PathBuf>,
    /// Corpus documents to exclude, one name per line
    #[arg(short = 'b', long, value_name = "PATH")]
    bad_docs: Option<PathBuf>,
    /// Index part path
    index: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(1);
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let stdin = io::stdin().lock();
    let mut out = io::BufWriter::new(io::stdout().lock());

    match cli.command {
        Command::Pairs(args) => {
            let index = NgramIndex::open(&args.index)?;
            let series = match &args.series_map {
                Some(path) => SeriesMap::from_tsv(open(path)?)?,
                None => SeriesMap::from_index(&index),
            };
            let stop = match &args.stop {
                Some(path) => read_word_set(open(path)?)?,
                None => Default::default(),
            };
            let cfg = PairsConfig::default()
                .with_max_series(args.max_series)
                .with_max_df(args.max_df)
                .with_shard(args.modp, args.modrec)
                .with_window(args.step, args.stride)
                .with_word_length(args.word_length)
                .with_counts(args.counts)
                .with_stop(stop);
            PairEnumerator::new(&index, &series, cfg)?.run(&mut out)?;
        }
        Command::Merge(args) => {
            let cfg = MergeConfig::default().with_min_matches(args.min_matches);
            PairMerger::new(cfg)?.run(stdin, &mut out)?;
        }
        Command::Scores(args) => {
            let index = NgramIndex::open(&args.index)?;
            let cfg = ScoresConfig::default().with_gram(args.ngram);
            ScoreStage::new(&index, cfg).run(stdin, &mut out)?;
        }
        Command::Cluster(args) => {
            let cfg = ClusterConfig::default()
                .with_min_overlap(args.min_overlap)
                .with_relative_overlap(args.relative_overlap)
                .with_max_proportion(args.max_proportion)
                .with_max_repeats(args.max_repeats);
            ClusterStage::new(cfg)?.run(stdin, &mut out)?;
        }
        Command::Format(args) => {
            let index = NgramIndex::open(&args.index)?;
            render_clusters(&index, stdin, &mut out)?;
        }
        Command::Quotes(args) => {
            let index = NgramIndex::open(&args.index)?;
            let mut cfg = QuotesConfig::default()
                .with_max_count(args.max_count)
                .with_max_gap(args.max_gap)
                .with_min_score(args.min_score)
                .with_words(args.words);
            cfg.pretty = args.pretty;
            if let Some(path) = &args.bad_docs {
                cfg = cfg.with_bad_docs(read_word_set(open(path)?)?);
            }
            if let Some(path) = &args.lm {
                cfg = cfg.with_lm(read_lm(open(path)?)?);
            }
            QuoteHunter::new(&index, cfg)?.run(stdin, &mut out)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn open(path: &Path) -> anyhow::Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

fn read_lm(reader: impl BufRead) -> anyhow::Result<hashbrown::HashMap<String, f64>> {
    let mut table = hashbrown::HashMap::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let (term, logprob) = line
            .split_once('\t')
            .ok_or_else(|| anyhow::anyhow!("lm line {}: expected term<TAB>logprob", lineno + 1))?;
        table.insert(term.to_string(), logprob.trim().parse()?);
    }
    Ok(table)
}
