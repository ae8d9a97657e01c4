//! Retrying FTP client against the in-memory archive

mod common;

use common::{FakeArchive, FakeTransportFactory};
use contig_alias_ingest::config::FtpEndpoint;
use contig_alias_ingest::ingest::common::{RetryPolicy, RetryingFtpClient};
use contig_alias_ingest::IngestError;
use std::fs;

const REMOTE: &str = "/genomes/all/GCA/000/003/055/GCA_000003055.3_Bos_taurus_UMD_3.1/report.txt";
const CONTENT: &str = "# Assembly name: Bos_taurus_UMD_3.1\nline one\nline two\n";

fn client(archive: &std::sync::Arc<FakeArchive>) -> RetryingFtpClient {
    RetryingFtpClient::new(
        FtpEndpoint::ncbi(),
        FakeTransportFactory::new(archive.clone()),
        RetryPolicy::immediate(5),
    )
}

#[test]
fn test_download_succeeds_on_fifth_attempt() {
    common::init_tracing();
    let archive = FakeArchive::new();
    archive.add_file(REMOTE, CONTENT);
    archive.fail_next_retrievals(4);

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("report.txt");
    let bytes = client(&archive).download_file(REMOTE, &local).unwrap();

    assert_eq!(bytes, CONTENT.len() as u64);
    assert_eq!(fs::read_to_string(&local).unwrap(), CONTENT);
    assert_eq!(archive.retrieval_count(), 5);
    // Every failed attempt drops its session
    assert_eq!(archive.connect_count(), 5);
}

#[test]
fn test_download_gives_up_after_five_failures() {
    let archive = FakeArchive::new();
    archive.add_file(REMOTE, CONTENT);
    archive.fail_next_retrievals(5);

    let dir = tempfile::tempdir().unwrap();
    let err = client(&archive)
        .download_file(REMOTE, &dir.path().join("report.txt"))
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(archive.retrieval_count(), 5);
}

#[test]
fn test_short_download_is_retried() {
    let archive = FakeArchive::new();
    archive.add_file(REMOTE, CONTENT);
    archive.truncate_next_retrievals(2);

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("report.txt");
    client(&archive).download_file(REMOTE, &local).unwrap();

    assert_eq!(archive.retrieval_count(), 3);
    assert_eq!(fs::read_to_string(&local).unwrap(), CONTENT);
}

#[test]
fn test_persistent_size_mismatch_is_reported() {
    let archive = FakeArchive::new();
    archive.add_file(REMOTE, CONTENT);
    archive.report_size(REMOTE, 4096);

    let dir = tempfile::tempdir().unwrap();
    let err = client(&archive)
        .download_file(REMOTE, &dir.path().join("report.txt"))
        .unwrap_err();

    match err {
        IngestError::DownloadSizeMismatch { expected, actual, .. } => {
            assert_eq!(expected, 4096);
            assert_eq!(actual, CONTENT.len() as u64);
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(archive.retrieval_count(), 5);
}

#[test]
fn test_session_is_reused_across_calls() {
    let archive = FakeArchive::new();
    archive.add_file(REMOTE, CONTENT);
    let mut client = client(&archive);

    assert!(!client.is_connected());
    let names = client
        .list_names("/genomes/all/GCA/000/003/055/GCA_000003055.3_Bos_taurus_UMD_3.1/")
        .unwrap();
    assert_eq!(names, vec!["report.txt".to_string()]);
    assert!(client.is_connected());

    let dir = tempfile::tempdir().unwrap();
    client.download_file(REMOTE, &dir.path().join("a.txt")).unwrap();
    client.download_file(REMOTE, &dir.path().join("b.txt")).unwrap();
    assert_eq!(archive.connect_count(), 1);

    client.disconnect();
    assert!(!client.is_connected());
}

#[test]
fn test_missing_directory_lists_empty() {
    let archive = FakeArchive::new();
    let names = client(&archive).list_names("/genomes/all/GCA/999/999/999/").unwrap();
    assert!(names.is_empty());
}

#[test]
fn test_connect_retries_refused_connections() {
    let archive = FakeArchive::new();
    archive.fail_next_connects(3);
    let mut client = client(&archive);

    client.connect().unwrap();

    assert!(client.is_connected());
    assert_eq!(archive.connect_count(), 4);
}

#[test]
fn test_connect_gives_up_after_policy_attempts() {
    let archive = FakeArchive::new();
    archive.fail_next_connects(10);

    let err = client(&archive).connect().unwrap_err();

    assert!(err.is_transient());
    assert_eq!(archive.connect_count(), 5);
}
