// Report parser tests over full-size synthetic reports

mod common;

use common::{chromosome_accession, ena_report, ncbi_report, scaffold_accession, ReportSpec};
use contig_alias_ingest::ingest::assembly::{collect_ena_names, parse_ncbi_report, EnaReportReader};
use contig_alias_ingest::{ContigType, ReportParseError};
use std::io::Cursor;

#[test]
fn test_parse_cattle_sized_report() {
    let report = ncbi_report(&ReportSpec {
        name: "Bos_taurus_UMD_3.1",
        insdc: Some("GCA_000003055.3"),
        refseq: Some("GCF_000003055.5"),
        chromosomes: 30,
        scaffolds: 3286,
    });

    let assembly = parse_ncbi_report(Cursor::new(report)).expect("Failed to parse report");

    assert_eq!(assembly.name, "Bos_taurus_UMD_3.1");
    assert_eq!(assembly.organism, "Bos taurus (cattle)");
    assert_eq!(assembly.taxonomy_id, 9913);
    assert_eq!(assembly.insdc_accession.as_deref(), Some("GCA_000003055.3"));
    assert_eq!(assembly.refseq_accession.as_deref(), Some("GCF_000003055.5"));
    assert!(!assembly.genbank_refseq_identical);

    assert_eq!(assembly.sequences.len(), 3316);
    assert_eq!(assembly.chromosomes().count(), 30);
    assert_eq!(assembly.scaffolds().count(), 3286);

    let first = &assembly.sequences[0];
    assert_eq!(first.insdc_accession, chromosome_accession(0));
    assert_eq!(first.contig_type, ContigType::Chromosome);
    assert_eq!(first.genbank_sequence_name.as_deref(), Some("1"));
    assert_eq!(first.ucsc_name.as_deref(), Some("chr1"));
    assert_eq!(first.seq_length, Some(1_000_000));

    let last = assembly.sequences.last().unwrap();
    assert_eq!(last.insdc_accession, scaffold_accession(3285));
    assert_eq!(last.contig_type, ContigType::Scaffold);
    assert_eq!(last.ucsc_name, None);
}

#[test]
fn test_report_without_accessions_is_rejected() {
    let report = ncbi_report(&ReportSpec {
        name: "Unnamed",
        insdc: None,
        refseq: None,
        chromosomes: 1,
        scaffolds: 0,
    });

    let err = parse_ncbi_report(Cursor::new(report)).unwrap_err();
    assert!(matches!(err, ReportParseError::MissingAssemblyAccession));
}

#[test]
fn test_ena_report_streams_rows() {
    let report = ena_report(30);

    let rows: Vec<_> = EnaReportReader::new(Cursor::new(report.clone()))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(rows.len(), 30);
    assert!(rows.iter().all(|r| r.contig_type == ContigType::Chromosome));

    let names = collect_ena_names(Cursor::new(report)).unwrap();
    assert_eq!(names.len(), 30);
    assert_eq!(names.get(&chromosome_accession(29)).map(String::as_str), Some("30"));
}
