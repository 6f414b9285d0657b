use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_root(tag: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should move forward")
        .as_nanos();
    let root = std::env::temp_dir().join(format!("imcc-cli-{tag}-{unique}"));
    std::fs::create_dir_all(&root).expect("failed to create temp root");
    root
}

const HASH_UNIT: &str = "\
.sub _main
    .local pmc h
    h = new .PerlHash
    h[\"answer\"] = 42
    $I0 = h[\"answer\"]
    end
.end
";

#[test]
fn no_args_prints_banner_and_help() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_imcc"));
    cmd.assert()
        .success()
        .stdout(contains("imcc, version"))
        .stdout(contains("Usage: imcc"))
        .stdout(contains("select"))
        .stdout(contains("ops"));
}

#[test]
fn help_flag_prints_help() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_imcc"));
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(contains("Instruction selection for register-VM intermediate code"))
        .stdout(contains("Usage: imcc"));
}

#[test]
fn bare_input_prints_listing() {
    let root = temp_root("listing");
    let input = root.join("hash.imc");
    std::fs::write(&input, HASH_UNIT).expect("failed to write input");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_imcc"));
    cmd.arg(&input)
        .assert()
        .success()
        .stdout(contains("_main:\n"))
        .stdout(contains("    set h[\"answer\"], 42\n"))
        .stdout(contains("    set $I0, h[\"answer\"]\n"))
        .stdout(contains("    end\n"));
}

#[test]
fn select_writes_json_records() {
    let root = temp_root("json");
    let input = root.join("hash.imc");
    let output = root.join("hash.json");
    std::fs::write(&input, HASH_UNIT).expect("failed to write input");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_imcc"));
    cmd.arg("select")
        .arg(&input)
        .arg("--emit")
        .arg("json")
        .arg("-o")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicates::str::is_empty());

    let json = std::fs::read_to_string(&output).expect("json output");
    let records: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    let records = records.as_array().expect("array of records");
    assert_eq!(records.len(), 5);
    assert_eq!(records[0]["kind"]["type"], "label");
    assert_eq!(records[2]["full_name"], "set_p_kc_ic");
    assert_eq!(records[2]["keyed"], serde_json::json!([0]));
    assert_eq!(records[2]["in_outs"], serde_json::json!([0]));
}

#[test]
fn selection_error_exits_with_rendered_diagnostic() {
    let root = temp_root("error");
    let input = root.join("bad.imc");
    std::fs::write(&input, "set $I0, 1\nfrobnicate $I0, $I0\n").expect("failed to write input");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_imcc"));
    cmd.env("NO_COLOR", "1")
        .arg(&input)
        .assert()
        .failure()
        .code(1)
        .stderr(contains("no opcode 'frobnicate_i_i'"))
        .stderr(contains("bad.imc"));
}

#[test]
fn unclosed_sub_warns_but_succeeds() {
    let root = temp_root("warn");
    let input = root.join("open.imc");
    std::fs::write(&input, ".sub _main\n    end\n").expect("failed to write input");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_imcc"));
    cmd.env("NO_COLOR", "1")
        .arg(&input)
        .assert()
        .success()
        .stdout(contains("_main:"))
        .stderr(contains("'.sub _main' is never closed"));
}

#[test]
fn rejects_unknown_extension() {
    let root = temp_root("ext");
    let input = root.join("unit.txt");
    std::fs::write(&input, "end\n").expect("failed to write input");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_imcc"));
    cmd.arg(&input)
        .assert()
        .failure()
        .stderr(contains("expected .imc or .pir source file"));
}

#[test]
fn config_file_limits_arity() {
    let root = temp_root("config");
    let input = root.join("add.imc");
    let config = root.join("selector.ron");
    std::fs::write(&input, "add $I0, $I1, 1\n").expect("failed to write input");
    std::fs::write(&config, "(max_arity: 2)").expect("failed to write config");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_imcc"));
    cmd.env("NO_COLOR", "1")
        .arg("select")
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(contains("too many operands, at most 2 are allowed"));
}

#[test]
fn invalid_config_is_reported_with_its_path() {
    let root = temp_root("bad-config");
    let input = root.join("unit.imc");
    let config = root.join("selector.ron");
    std::fs::write(&input, "end\n").expect("failed to write input");
    std::fs::write(&config, "(max_arity: 0)").expect("failed to write config");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_imcc"));
    cmd.arg("select")
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(contains("failed to load config"))
        .stderr(contains("max_arity must be between 1 and 16"));
}

#[test]
fn catalog_extension_adds_ops() {
    let root = temp_root("catalog");
    let input = root.join("frob.imc");
    let catalog = root.join("extra.ron");
    std::fs::write(&input, "frobnicate $I0, 7\n").expect("failed to write input");
    std::fs::write(
        &catalog,
        "(ops: [(mnemonic: \"frobnicate\", args: [(tag: \"i\", dir: Out), (tag: \"ic\", dir: In)])])",
    )
    .expect("failed to write catalog");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_imcc"));
    cmd.arg("select")
        .arg(&input)
        .arg("--catalog")
        .arg(&catalog)
        .assert()
        .success()
        .stdout(contains("    frobnicate $I0, 7\n"));
}

#[test]
fn ops_lists_entries_for_a_mnemonic() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_imcc"));
    cmd.arg("ops")
        .arg("unless")
        .assert()
        .success()
        .stdout(contains("unless_i_ic"))
        .stdout(contains("(in,in) jump"))
        .stdout(contains("set_i_i").not());
}

#[test]
fn ops_lists_aggregate_types() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_imcc"));
    cmd.arg("ops")
        .arg("--types")
        .assert()
        .success()
        .stdout(contains("Undef"))
        .stdout(contains("PerlHash"));
}

#[test]
fn ops_rejects_unknown_mnemonic() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_imcc"));
    cmd.arg("ops")
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(contains("no catalog entries for 'frobnicate'"));
}
