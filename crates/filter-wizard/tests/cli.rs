use std::fs;
use std::process::Command;

fn filter_design() -> Command {
    Command::new(env!("CARGO_BIN_EXE_filter-design"))
}

#[test]
fn test_writes_markdown_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sallen.md");

    let status = filter_design()
        .args(["--topology", "sallen-key", "--gain", "50", "--freq-exp", "3", "--c1", "10", "--r3", "2200"])
        .arg("--output")
        .arg(&path)
        .status()
        .unwrap();
    assert!(status.success());

    let report = fs::read_to_string(&path).unwrap();
    assert!(report.starts_with("# Sallen-Key Lowpass Design"));
    assert!(report.contains("| R3 | resistance_value | 2.2kΩ |"), "{report}");
}

#[test]
fn test_json_to_stdout() {
    let output = filter_design()
        .args(["--topology", "mfb", "--gain", "10", "--c5", "4.7", "--format", "json", "--stdout"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let values: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = values
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["component"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["c2", "c1", "r1", "r3", "r2"]);
    assert_eq!(values[0]["property"], "capacitance_value");
}

#[test]
fn test_rejects_parameter_of_another_topology() {
    let output = filter_design()
        .args(["--topology", "boctor", "--c5", "4.7", "--stdout"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("c5"));
}

#[test]
fn test_boctor_defaults_succeed() {
    let output = filter_design()
        .args(["--topology", "boctor", "--format", "json", "--stdout"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let values: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let r1 = values
        .as_array()
        .unwrap()
        .iter()
        .find(|v| v["component"] == "r1")
        .unwrap();
    assert!(r1["value"].as_f64().unwrap() < 0.0);
}
