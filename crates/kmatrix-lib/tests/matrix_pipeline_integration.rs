//! Integration tests for the matrix pipeline
//!
//! These tests go from k-mer count text through per-sample stores to a
//! matrix store, then histogram and scan it.

use kmatrix_lib::store::text::{dump_store, import_counts};
use kmatrix_lib::{
    run_scan, HaplotypeScanner, KmerCodec, MatrixBuildConfig, MatrixBuilder, MatrixError,
    ProfileHistogram, ReadFormat, ScanConfig, ScanMode, StoreReader,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const K: usize = 5;

/// Write a `KMER count` listing and import it as a count store
fn count_store(dir: &Path, name: &str, counts: &[(&str, u64)]) -> PathBuf {
    let text_path = dir.join(format!("{name}.txt"));
    let text: String = counts
        .iter()
        .map(|(kmer, count)| format!("{kmer} {count}\n"))
        .collect();
    fs::write(&text_path, text).unwrap();

    let store_path = dir.join(format!("{name}.jf"));
    import_counts(&text_path, &store_path, KmerCodec::new(K).unwrap(), 4).unwrap();
    store_path
}

/// Samples A [5, 0, 2] and B [5, 1, 0], plus a k-mer absent from both
fn two_sample_fixture(dir: &Path) -> Vec<PathBuf> {
    vec![
        count_store(
            dir,
            "A",
            &[("AAAAC", 5), ("ACGTA", 0), ("CCCCA", 2), ("GGGGT", 0)],
        ),
        count_store(
            dir,
            "B",
            &[("AAAAC", 5), ("ACGTA", 1), ("CCCCA", 0), ("GGGGT", 0)],
        ),
    ]
}

fn build_matrix(inputs: Vec<PathBuf>, output: &Path, min: u32, max: u32) -> Result<(), MatrixError> {
    let mut config = MatrixBuildConfig::new(inputs, output).unwrap();
    config.min_prevalence = min;
    config.max_prevalence = max;
    config.num_threads = 2;
    MatrixBuilder::new(config)?.build().map(|_| ())
}

fn matrix_records(path: &Path) -> Vec<(String, u64)> {
    let codec = KmerCodec::new(K).unwrap();
    StoreReader::open(path)
        .unwrap()
        .map(|r| {
            let (key, value) = r.unwrap();
            (codec.encode(key), value)
        })
        .collect()
}

#[test]
fn test_end_to_end_two_samples() {
    let dir = TempDir::new().unwrap();
    let matrix = dir.path().join("matrix.jf");
    build_matrix(two_sample_fixture(dir.path()), &matrix, 1, u32::MAX).unwrap();

    let header = StoreReader::open(&matrix).unwrap().header().clone();
    assert_eq!(header.k(), K);
    assert_eq!(header.value_bit_length, 2);
    assert_eq!(header.counter_len, 1);
    assert_eq!(header.record_count, 3);

    assert_eq!(
        matrix_records(&matrix),
        vec![
            ("AAAAC".to_string(), 0b11),
            ("ACGTA".to_string(), 0b01),
            ("CCCCA".to_string(), 0b10),
        ]
    );
}

#[test]
fn test_prevalence_upper_bound() {
    let dir = TempDir::new().unwrap();
    let matrix = dir.path().join("matrix.jf");
    build_matrix(two_sample_fixture(dir.path()), &matrix, 1, 1).unwrap();

    let kmers: Vec<String> = matrix_records(&matrix).into_iter().map(|(k, _)| k).collect();
    assert_eq!(kmers, vec!["ACGTA", "CCCCA"]);
}

#[test]
fn test_default_thresholds_keep_everything() {
    let dir = TempDir::new().unwrap();
    let matrix = dir.path().join("matrix.jf");
    build_matrix(two_sample_fixture(dir.path()), &matrix, 0, u32::MAX).unwrap();

    let records = matrix_records(&matrix);
    assert_eq!(records.len(), 4);
    assert_eq!(records[3], ("GGGGT".to_string(), 0b00));
}

#[test]
fn test_misaligned_inputs_leave_no_output() {
    let dir = TempDir::new().unwrap();
    let mut inputs = two_sample_fixture(dir.path());
    inputs.push(count_store(
        dir.path(),
        "C",
        &[("AAAAC", 5), ("ACGTA", 1), ("CCCCA", 0), ("TTTTG", 0)],
    ));
    let matrix = dir.path().join("matrix.jf");

    let err = build_matrix(inputs, &matrix, 0, u32::MAX).unwrap_err();
    assert!(matches!(err, MatrixError::Format { .. }));
    assert!(err.to_string().contains("C.jf"));
    assert!(!matrix.exists());
}

#[test]
fn test_record_count_mismatch_leaves_no_output() {
    let dir = TempDir::new().unwrap();
    let mut inputs = two_sample_fixture(dir.path());
    inputs.push(count_store(dir.path(), "short", &[("AAAAC", 5)]));
    let matrix = dir.path().join("matrix.jf");

    let err = build_matrix(inputs, &matrix, 0, u32::MAX).unwrap_err();
    assert!(err.to_string().contains("record count"));
    assert!(!matrix.exists());
}

#[test]
fn test_missing_input() {
    let dir = TempDir::new().unwrap();
    let mut inputs = two_sample_fixture(dir.path());
    inputs.push(dir.path().join("absent.jf"));

    let err = build_matrix(inputs, &dir.path().join("matrix.jf"), 0, u32::MAX).unwrap_err();
    assert!(matches!(err, MatrixError::Io { .. }));
    assert!(err.to_string().contains("absent.jf"));
}

#[test]
fn test_histogram_of_built_matrix() {
    let dir = TempDir::new().unwrap();
    let matrix = dir.path().join("matrix.jf");
    build_matrix(two_sample_fixture(dir.path()), &matrix, 1, u32::MAX).unwrap();

    let histogram = ProfileHistogram::from_store(&matrix).unwrap();
    // 11 folds to 00; 01 and 10 both fold to 01
    assert_eq!(histogram.iter().collect::<Vec<_>>(), vec![(0, 1), (1, 2)]);
    assert_eq!(histogram.total(), 3);

    let mut out = Vec::new();
    histogram.write_tsv(&mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "value\tfrequency\n0\t1\n1\t2\n");
}

#[test]
fn test_dump_matrix() {
    let dir = TempDir::new().unwrap();
    let matrix = dir.path().join("matrix.jf");
    build_matrix(two_sample_fixture(dir.path()), &matrix, 1, u32::MAX).unwrap();

    let mut out = Vec::new();
    assert_eq!(dump_store(&matrix, &mut out).unwrap(), 3);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "AAAAC\t3\nACGTA\t1\nCCCCA\t2\n"
    );
}

#[test]
fn test_scan_built_matrix() {
    let dir = TempDir::new().unwrap();
    let matrix = dir.path().join("matrix.jf");
    build_matrix(two_sample_fixture(dir.path()), &matrix, 1, u32::MAX).unwrap();

    let scanner = HaplotypeScanner::load(&matrix).unwrap();
    assert_eq!(scanner.codec().k(), K);
    assert_eq!(scanner.width(), 2);

    // windows AAAAC, AAACG, AACGT, ACGTA
    let read = b"AAAACGTA";
    let values = scanner.enumerate_read(read);
    assert_eq!(values, vec![0b11, 0b01]);
    assert!(values.len() <= read.len() - K + 1);

    // the reverse strand finds the same canonical k-mers
    let mut reverse = scanner.enumerate_read(b"TACGTTTT");
    reverse.reverse();
    assert_eq!(reverse, values);

    // the last window (ACGTA) is not examined
    let summary = scanner.summarize_line(read);
    assert_eq!(summary.windows, read.len() - K);
    assert_eq!(summary.not_found, 2);
    assert_eq!(summary.distinct, 1);
    assert!(summary.distinct <= summary.found());
}

#[test]
fn test_run_scan_enumerate_fasta() {
    let dir = TempDir::new().unwrap();
    let matrix = dir.path().join("matrix.jf");
    build_matrix(two_sample_fixture(dir.path()), &matrix, 1, u32::MAX).unwrap();

    let reads = dir.path().join("reads.fa");
    fs::write(&reads, ">r1\nAAAACGTA\n>r2 short\nACG\n>r3\nCCCCANNNN\n").unwrap();

    let config = ScanConfig::new(
        &matrix,
        ScanMode::Enumerate {
            reads,
            format: ReadFormat::Fasta,
        },
    );
    let mut out = Vec::new();
    let stats = run_scan(&config, std::io::empty(), &mut out).unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        ">r1\n3\t1\t\n>r2 short\n\n>r3\n2\t\n"
    );
    assert_eq!(stats.records, 3);
    assert_eq!(stats.found, 3);
}

#[test]
fn test_run_scan_summary() {
    let dir = TempDir::new().unwrap();
    let matrix = dir.path().join("matrix.jf");
    build_matrix(two_sample_fixture(dir.path()), &matrix, 1, u32::MAX).unwrap();

    let mut config = ScanConfig::new(&matrix, ScanMode::Summary);
    config.num_threads = 2;
    config.batch_size = 1;

    let input = b"AAAACGTA\nGTTTT\nCCCCAA\n".as_slice();
    let mut out = Vec::new();
    let stats = run_scan(&config, input, &mut out).unwrap();

    // GTTTT is the reverse complement of AAAAC but is looked up as read;
    // with len == k it has no windows anyway
    assert_eq!(String::from_utf8(out).unwrap(), "1\t2\n0\t0\n1\t0\n");
    assert_eq!(stats.records, 3);
    assert_eq!(stats.windows, 3 + 0 + 1);
}

#[test]
fn test_scan_missing_matrix() {
    let config = ScanConfig::new("/nonexistent/matrix.jf", ScanMode::Summary);
    let mut out = Vec::new();
    let err = run_scan(&config, std::io::empty(), &mut out).unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/matrix.jf"));
    assert!(out.is_empty());
}
