//! ENA sequence report parser
//!
//! ```text
//! accession  sequence-name  sequence-length  sequence-role  replicon-name  replicon-type  assembly-unit
//! ```
//!
//! Reports for large assemblies run to millions of rows, so the parser is an
//! iterator and callers fold rows as they arrive.

use crate::error::ReportParseError;
use crate::models::{ContigType, SequenceRecord};
use std::collections::HashMap;
use std::io::{BufRead, Lines};

const COL_ACCESSION: usize = 0;
const COL_NAME: usize = 1;
const COL_ROLE: usize = 3;
const COL_REPLICON_TYPE: usize = 5;

/// Streaming reader over the rows of an ENA sequence report
pub struct EnaReportReader<R> {
    lines: Lines<R>,
}

impl<R: BufRead> EnaReportReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl<R: BufRead> Iterator for EnaReportReader<R> {
    type Item = Result<SequenceRecord, ReportParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            if line.starts_with("accession") || line.trim().is_empty() {
                continue;
            }
            if let Some(record) = parse_ena_line(&line) {
                return Some(Ok(record));
            }
        }
    }
}

/// Parse one data row; `None` when it carries no accession
pub fn parse_ena_line(line: &str) -> Option<SequenceRecord> {
    let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
    let accession = fields.get(COL_ACCESSION).filter(|a| !a.is_empty())?;

    let role = fields.get(COL_ROLE).copied().unwrap_or_default();
    let replicon_type = fields.get(COL_REPLICON_TYPE).copied().unwrap_or_default();
    let contig_type = if role == "assembled-molecule" && replicon_type == "Chromosome" {
        ContigType::Chromosome
    } else {
        ContigType::Scaffold
    };

    let mut record = SequenceRecord::new(*accession, contig_type);
    record.ena_sequence_name = fields
        .get(COL_NAME)
        .filter(|n| !n.is_empty())
        .map(|n| n.to_string());
    Some(record)
}

/// Fold a report into INSDC accession -> ENA sequence name
pub fn collect_ena_names<R: BufRead>(reader: R) -> Result<HashMap<String, String>, ReportParseError> {
    let mut names = HashMap::new();
    for record in EnaReportReader::new(reader) {
        let record = record?;
        if let Some(name) = record.ena_sequence_name {
            names.insert(record.insdc_accession, name);
        }
    }
    Ok(names)
}

/// Copy ENA names onto sequences matched by INSDC accession
///
/// Later values win; no other field is touched. Returns the number of
/// sequences that received a name.
pub fn merge_ena_names(sequences: &mut [SequenceRecord], names: &HashMap<String, String>) -> usize {
    let mut merged = 0;
    for sequence in sequences.iter_mut() {
        if let Some(name) = names.get(&sequence.insdc_accession) {
            sequence.ena_sequence_name = Some(name.clone());
            merged += 1;
        }
    }
    merged
}
