// CLI regression tests: output shape, configuration flags and miette diagnostics.

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn netmacro() -> Command {
    Command::cargo_bin("netmacro").unwrap()
}

#[test]
fn expand_prints_the_flat_netlist() {
    netmacro()
        .args(["expand", "tests/fixtures/amp.cir", "--strip"])
        .assert()
        .success()
        .stdout(
            contains("two stage amplifier")
                .and(contains("m1_x1_xa mid_xa input 0 0 nch_x1_xa w=2u"))
                .and(contains("r1_x2_xa vdd output 10k"))
                .and(contains("*xa input output amp").not()),
        );
}

#[test]
fn expand_keeps_disabled_lines_without_strip() {
    netmacro()
        .args(["expand", "tests/fixtures/amp.cir"])
        .assert()
        .success()
        .stdout(contains("*xa input output amp").and(contains("*.subckt stage in out")));
}

#[test]
fn set_overrides_catenation() {
    netmacro()
        .args([
            "expand",
            "tests/fixtures/amp.cir",
            "--strip",
            "--set",
            "subc_catmode=spice3",
            "--set",
            "subc_catchar=:",
        ])
        .assert()
        .success()
        .stdout(contains("r:xa:r:x2:r1 vdd output 10k"));
}

#[test]
fn config_file_is_loaded() {
    netmacro()
        .args([
            "expand",
            "tests/fixtures/amp.cir",
            "--strip",
            "--config",
            "tests/fixtures/spice3.yaml",
        ])
        .assert()
        .success()
        .stdout(contains("m:xa:m:x1:m1 xa:mid input 0 0 xa:x1:nch w=2u"));
}

#[test]
fn expand_json_has_lines_and_trace() {
    netmacro()
        .args(["expand", "tests/fixtures/amp.cir", "--json", "--strip"])
        .assert()
        .success()
        .stdout(
            contains("\"title\": \"two stage amplifier\"")
                .and(contains("\"trace\""))
                .and(contains("\"subckt\": \"stage\"")),
        );
}

#[test]
fn trace_shows_each_inlined_call() {
    netmacro()
        .args(["trace", "tests/fixtures/amp.cir"])
        .assert()
        .success()
        .stdout(contains("Step 0: x1 -> stage").and(contains("Step 2: xa -> amp")));
}

#[test]
fn list_shows_definitions() {
    netmacro()
        .args(["list", "tests/fixtures/amp.cir", "--json"])
        .assert()
        .success()
        .stdout(contains("\"name\": \"amp\"").and(contains("\"name\": \"stage\"")));
}

#[test]
fn errors_are_rendered_as_diagnostics() {
    netmacro()
        .args(["expand", "tests/fixtures/broken.cir"])
        .assert()
        .failure()
        .stderr(contains("netmacro::expand").or(contains("help:")));
}

#[test]
fn unknown_variable_is_rejected() {
    netmacro()
        .args(["expand", "tests/fixtures/amp.cir", "--set", "bogus=1"])
        .assert()
        .failure()
        .stderr(contains("bogus"));
}

#[test]
fn check_reports_each_file() {
    netmacro()
        .args(["check", "tests/fixtures"])
        .assert()
        .failure()
        .stdout(contains("amp.cir").and(contains("FAIL")));
}
