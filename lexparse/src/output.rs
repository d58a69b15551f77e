use std::io::Write;

use anyhow::{Context, Result};
use csv::Writer;
use serde::Serialize;
use viterbialigner::table::EmissionTable;
use viterbialigner::trainer::WordAlignment;

#[derive(Debug, Serialize)]
struct TableRow<'a> {
    letter: &'a str,
    phone: &'a str,
    log_prob: f64,
}

#[derive(Debug, Serialize)]
struct AlignmentRow<'a> {
    word: &'a str,
    alignment: String,
    log_prob: Option<f64>,
}

/// Write a trained table as CSV rows `letter,phone,log_prob`, in table order.
pub fn write_table<W: Write>(writer: W, table: &EmissionTable) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    for (letter, phone, log_prob) in table.iter() {
        wtr.serialize(TableRow {
            letter,
            phone,
            log_prob,
        })
        .with_context(|| format!("writing table row for {letter:?}"))?;
    }
    wtr.flush().context("flushing table")?;
    Ok(())
}

/// Write best alignments as CSV rows `word,alignment,log_prob`. Unalignable
/// words get an empty alignment and an empty log-probability.
pub fn write_alignments<W: Write>(writer: W, alignments: &[WordAlignment]) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    for alignment in alignments {
        wtr.serialize(AlignmentRow {
            word: &alignment.word,
            alignment: alignment.display_pairs(),
            log_prob: alignment.log_prob,
        })
        .with_context(|| format!("writing alignment of {:?}", alignment.word))?;
    }
    wtr.flush().context("flushing alignments")?;
    Ok(())
}
