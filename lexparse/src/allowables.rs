use std::collections::BTreeMap;
use std::io::Read;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use tracing::{debug, info};
use viterbialigner::table::{EmissionTable, UNWEIGHTED};

use crate::graphemeparse::decode_escapes;
use crate::normalize::{normalize_phone, normalize_word};

/// Read the table of allowed letter/phone pairs.
///
/// Each CSV row is a letter followed by every phone symbol it may emit, e.g.
/// `x,k-s,z,`. There is no header and rows may differ in length. An empty
/// cell allows the empty phone, and a row with an empty first cell gives the
/// phones allowed for letters missing from the table. Every pair gets the
/// same initial weight. When a letter appears on several rows the last one
/// wins.
pub fn read_allowables<R: Read>(reader: R) -> Result<EmissionTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut table = EmissionTable::new();
    for (i, result) in reader.deserialize::<Vec<String>>().enumerate() {
        let row = result.with_context(|| format!("reading allowables row {}", i + 1))?;
        let Some((letter, phones)) = row.split_first() else {
            continue;
        };
        let letter = normalize_word(&decode_escapes(letter));
        let phones: BTreeMap<String, f64> = phones
            .iter()
            .map(|cell| (normalize_phone(&decode_escapes(cell)), UNWEIGHTED))
            .collect();
        if table.contains_letter(&letter) {
            debug!(letter, row = i + 1, "allowables row replaces an earlier one");
        }
        table.set_letter(letter, phones);
    }

    info!(
        letters = table.len(),
        pairs = table.iter().count(),
        "read allowables"
    );
    Ok(table)
}
