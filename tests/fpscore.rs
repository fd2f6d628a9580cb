use approx::assert_relative_eq;
use fpcheck::concordance::{ConcordanceEngine, EngineConfig};
use fpcheck::fingerprint::{Control, Fingerprint, FingerprintCall};
use fpcheck::utils::Error;
use std::fs;
use std::process::Command;
use std::time::Duration;
use tempfile::tempdir;

fn fingerprint(sample_id: &str, calls: &[(&str, &str)]) -> Fingerprint {
    let mut fingerprint: Fingerprint = serde_json::from_str(&format!(
        r#"{{"sampleId": "{}", "disposition": "PASS", "platform": "FLUIDIGM",
            "genomeBuild": "HG38", "snpListName": "FP", "gender": "F",
            "dateGenerated": "2024-03-15T12:00:00", "calls": []}}"#,
        sample_id
    ))
    .unwrap();
    fingerprint.calls = calls
        .iter()
        .map(|(rsid, gt)| FingerprintCall::new(rsid, gt))
        .collect();
    fingerprint
}

fn engine() -> ConcordanceEngine {
    ConcordanceEngine::new(
        EngineConfig::new(env!("CARGO_BIN_EXE_fpscore")).with_timeout(Duration::from_secs(30)),
    )
}

fn same_individual() -> (Fingerprint, Fingerprint) {
    (
        fingerprint("A", &[("rs1", "AG"), ("rs2", "CC"), ("rs3", "TT")]),
        fingerprint("A-repeat", &[("rs3", "TT"), ("rs1", "GA"), ("rs2", "CC")]),
    )
}

fn other_individual() -> Fingerprint {
    fingerprint("B", &[("rs1", "AA"), ("rs2", "CT"), ("rs3", "GG")])
}

#[test]
fn engine_scores_one_to_one() {
    let (a, a_repeat) = same_individual();
    let b = other_individual();
    let engine = engine();

    let concordant = engine.score_one_to_one(&a, &a_repeat).unwrap();
    let expected = (0.99f64 / 0.5).log10() + 2.0 * (0.99f64 / 0.25).log10();
    assert_relative_eq!(concordant, expected, epsilon = 1e-9);
    assert!(engine.score_one_to_one(&a, &b).unwrap() < -4.0);
}

#[test]
fn engine_scores_matrix() {
    let (a, a_repeat) = same_individual();
    let b = other_individual();
    let scores = engine()
        .score_matrix(&[a, b], &[a_repeat.clone(), a_repeat])
        .unwrap();
    assert_eq!(scores.len(), 4);
    assert_eq!(scores[0].observed_sample, "A");
    assert_eq!(scores[0].expected_sample, "A-repeat");
    assert!(scores[0].lod_score > 0.0);
    assert_eq!(scores[2].observed_sample, "B");
    assert!(scores[2].lod_score < 0.0);
}

#[test]
fn engine_uses_map_frequencies() {
    let dir = tempdir().unwrap();
    let map = dir.path().join("map.txt");
    fs::write(
        &map,
        "@HD\tVN:1.6\n@SQ\tSN:1\tLN:100\n1\t10\trs1\tA\tG\t0.1\n",
    )
    .unwrap();
    let engine = ConcordanceEngine::new(
        EngineConfig::new(env!("CARGO_BIN_EXE_fpscore"))
            .with_args(["--haplotype-map", map.to_str().unwrap()]),
    );
    let minor = fingerprint("A", &[("rs1", "GG")]);
    assert_relative_eq!(
        engine.score_one_to_one(&minor, &minor).unwrap(),
        (0.99f64 / 0.01).log10(),
        epsilon = 1e-9
    );
}

#[test]
fn engine_rejects_invalid_arguments() {
    let engine = ConcordanceEngine::new(
        EngineConfig::new(env!("CARGO_BIN_EXE_fpscore")).with_args(["--error-rate", "2"]),
    );
    let (a, a_repeat) = same_individual();
    assert!(matches!(
        engine.score_one_to_one(&a, &a_repeat),
        Err(Error::Process(_))
    ));
}

#[test]
fn control_without_reference_fingerprint() {
    let (a, _) = same_individual();
    let control = Control {
        name: "NA12878".to_string(),
        reference_fingerprint: None,
    };
    match engine().score_against_control(&a, &control) {
        Err(Error::NoControlConfigured(name)) => assert_eq!(name, "NA12878"),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn score_command_writes_table() {
    let dir = tempdir().unwrap();
    let (a, a_repeat) = same_individual();
    let observed = dir.path().join("a.json");
    let expected = dir.path().join("a_repeat.json");
    fs::write(&observed, serde_json::to_string(&a).unwrap()).unwrap();
    fs::write(&expected, serde_json::to_string(&a_repeat).unwrap()).unwrap();
    let out = dir.path().join("scores.tsv");

    let status = Command::new(env!("CARGO_BIN_EXE_fpcheck"))
        .arg("score")
        .arg("--observed")
        .arg(&observed)
        .arg("--expected")
        .arg(&expected)
        .arg("--engine")
        .arg(env!("CARGO_BIN_EXE_fpscore"))
        .arg("--output")
        .arg(&out)
        .status()
        .unwrap();
    assert!(status.success());

    let table = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines[0], "observed\texpected\tlod");
    assert!(lines[1].starts_with("A\tA-repeat\t"));
    assert_eq!(lines.len(), 2);
}
