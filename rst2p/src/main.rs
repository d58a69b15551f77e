//! rst2p: learn letter-to-phone alignment tables from a pronunciation
//! dictionary.
//!
//! Usage:
//! - `rst2p check --allowables allowables.csv --dict cmudict.txt`
//! - `rst2p train --allowables allowables.csv --dict cmudict.txt --table-out table.csv`
//! - `rst2p train ... --posterior --iterations 10 --alignments-out alignments.csv -vv`

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use rustfst::prelude::*;
use tabled::{settings::Style, Table, Tabled};
use tracing::{info, Level};
use viterbialigner::{
    CountMode, Dictionary, EmissionTable, IterationReport, Trainer, TrainerConfig, TrainerState,
};

#[derive(Parser)]
#[command(name = "rst2p")]
#[command(about = "EM training of letter-to-phone alignment tables")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run EM and write the learned table and best alignments
    Train(TrainArgs),
    /// List dictionary words the allowables table cannot align
    Check(InputArgs),
}

#[derive(Args)]
struct InputArgs {
    /// CSV of allowed phones per letter
    #[arg(short, long)]
    allowables: PathBuf,

    /// CMUdict-style pronunciation dictionary
    #[arg(short, long)]
    dict: PathBuf,
}

#[derive(Args)]
struct TrainArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Maximum number of EM iterations
    #[arg(short, long, default_value_t = TrainerConfig::default().max_iterations)]
    iterations: usize,

    /// Weight each alignment by its posterior instead of counting it once
    #[arg(long)]
    posterior: bool,

    /// Align words on a single thread
    #[arg(long)]
    sequential: bool,

    /// Where to write the learned table (letter,phone,log_prob)
    #[arg(long)]
    table_out: Option<PathBuf>,

    /// Where to write the best alignment of every word
    #[arg(long)]
    alignments_out: Option<PathBuf>,

    /// Where to write the learned table as a text-format transducer; the
    /// symbol table goes next to it with a `.syms` extension
    #[arg(long)]
    fst_out: Option<PathBuf>,
}

impl TrainArgs {
    fn config(&self) -> TrainerConfig {
        TrainerConfig {
            max_iterations: self.iterations,
            count_mode: if self.posterior {
                CountMode::Posterior
            } else {
                CountMode::Hard
            },
            parallel: !self.sequential,
        }
    }
}

#[derive(Tabled)]
struct IterationRow {
    #[tabled(rename = "Iteration")]
    iteration: usize,
    #[tabled(rename = "Log-likelihood")]
    log_likelihood: String,
    #[tabled(rename = "Alignments")]
    alignments: usize,
    #[tabled(rename = "Aligned")]
    aligned: usize,
    #[tabled(rename = "Unalignable")]
    unalignable: usize,
    #[tabled(rename = "Degenerate letters")]
    degenerate: String,
}

impl From<&IterationReport> for IterationRow {
    fn from(report: &IterationReport) -> Self {
        Self {
            iteration: report.iteration,
            log_likelihood: format!("{:.4}", report.log_likelihood),
            alignments: report.num_alignments,
            aligned: report.aligned_words,
            unalignable: report.unalignable_words.len(),
            degenerate: report.degenerate_letters.join(" "),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Train(args) => train(&args),
        Command::Check(args) => check(&args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_inputs(args: &InputArgs) -> Result<(EmissionTable, Dictionary)> {
    let file = File::open(&args.allowables)
        .with_context(|| format!("opening allowables {}", args.allowables.display()))?;
    let table = lexparse::read_allowables(file)
        .with_context(|| format!("parsing allowables {}", args.allowables.display()))?;

    let file = File::open(&args.dict)
        .with_context(|| format!("opening dictionary {}", args.dict.display()))?;
    let dictionary = lexparse::read_dictionary(BufReader::new(file))
        .with_context(|| format!("parsing dictionary {}", args.dict.display()))?;

    if table.is_empty() {
        bail!("allowables {} has no rows", args.allowables.display());
    }
    Ok((table, dictionary))
}

fn check(args: &InputArgs) -> Result<()> {
    let (table, dictionary) = load_inputs(args)?;
    let total = dictionary.len();
    let trainer = Trainer::new(dictionary, table, TrainerConfig::default())?;
    let problems = trainer.unalignable_words(trainer.current_table())?;

    if problems.is_empty() {
        println!("{}", format!("All {total} words can be aligned.").green());
        return Ok(());
    }
    for word in &problems {
        let phones = trainer
            .dictionary()
            .get(word)
            .map(|p| p.join(" "))
            .unwrap_or_default();
        println!("{}  {}", word.red(), phones);
    }
    println!(
        "\n{} of {} words cannot be aligned",
        problems.len().to_string().bold(),
        total
    );
    Ok(())
}

fn train(args: &TrainArgs) -> Result<()> {
    let (table, dictionary) = load_inputs(&args.input)?;
    let mut trainer = Trainer::new(dictionary, table, args.config())?;

    info!(
        words = trainer.dictionary().len(),
        max_iterations = trainer.config().max_iterations,
        "starting EM"
    );
    let outcome = trainer.run()?;

    let rows: Vec<IterationRow> = trainer.reports().iter().map(IterationRow::from).collect();
    let table = Table::new(&rows).with(Style::modern()).to_string();
    println!("{table}");

    let state = match outcome.state {
        TrainerState::Converged => "converged".green().bold(),
        TrainerState::Exhausted => "iteration budget exhausted".yellow().bold(),
        other => format!("{other:?}").red().bold(),
    };
    println!("{} after {} iteration(s)", state, outcome.iterations);

    if let Some(last) = trainer.reports().last() {
        if !last.unalignable_words.is_empty() {
            println!(
                "{} words could not be aligned: {}",
                last.unalignable_words.len().to_string().bold(),
                last.unalignable_words.join(" ")
            );
        }
    }

    if let Some(path) = &args.table_out {
        let file = create(path)?;
        lexparse::write_table(file, trainer.current_table())
            .with_context(|| format!("writing table {}", path.display()))?;
        println!("Table written to {}", path.display().to_string().bold());
    }

    if let Some(path) = &args.alignments_out {
        let alignments = trainer.best_alignments()?;
        let file = create(path)?;
        lexparse::write_alignments(file, &alignments)
            .with_context(|| format!("writing alignments {}", path.display()))?;
        println!("Alignments written to {}", path.display().to_string().bold());
    }

    if let Some(path) = &args.fst_out {
        write_fst(path, trainer.current_table())?;
        println!("Transducer written to {}", path.display().to_string().bold());
    }
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn write_fst(path: &Path, table: &EmissionTable) -> Result<()> {
    let (symt, fst) = table.to_fst()?;
    fst.write_text(path)
        .with_context(|| format!("writing transducer {}", path.display()))?;
    let syms_path = path.with_extension("syms");
    symt.write_text(&syms_path)
        .with_context(|| format!("writing symbols {}", syms_path.display()))?;
    Ok(())
}
