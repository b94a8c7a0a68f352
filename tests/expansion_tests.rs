//! End-to-end expansion behaviour through the public pipeline.

use netmacro::{
    CacheStore, CatMode, ErrorCategory, ErrorKind, ExpandConfig, ExpansionErrors,
    ExpansionPipeline, KeyPolicy, MergePolicy, PipelineOutput,
};

fn run_with(source: &str, config: ExpandConfig) -> Result<PipelineOutput, ExpansionErrors> {
    let store = CacheStore::new();
    ExpansionPipeline::new(config).with_cache(&store).run(source)
}

fn run(source: &str) -> Result<PipelineOutput, ExpansionErrors> {
    run_with(source, ExpandConfig::default())
}

fn live(out: &PipelineOutput) -> Vec<String> {
    out.live_lines().iter().map(|l| l.text.clone()).collect()
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn inverter_nodes_devices_and_model_are_renamed() {
    let out = run("scenario a\n.subckt INV in out\n.model pmod pmos\nm1 out in vdd vdd pmod\n.ends\nx1 a b INV\n")
        .unwrap();
    assert_eq!(
        live(&out),
        vec![".model pmod_x1 pmos", "m1_x1 b a vdd_x1 vdd_x1 pmod_x1"]
    );
}

#[test]
fn inverter_with_a_model_defined_elsewhere() {
    // `pmod` is not defined in the body, so it is taken as a global model
    // and keeps its name.
    let out = run("scenario a\n.subckt INV in out\nm1 out in vdd vdd pmod\n.ends\nx1 a b INV\n").unwrap();
    assert_eq!(live(&out), vec!["m1_x1 b a vdd_x1 vdd_x1 pmod"]);
}

#[test]
fn two_instances_never_share_internal_names() {
    let out = run("scenario b\n.subckt sub a\nr1 a n 1k\nc1 n 0 1p\n.ends\nx1 in1 sub\nx2 in2 sub\n")
        .unwrap();
    let lines = live(&out);
    assert_eq!(
        lines,
        vec![
            "r1_x1 in1 n_x1 1k",
            "c1_x1 n_x1 0 1p",
            "r1_x2 in2 n_x2 1k",
            "c1_x2 n_x2 0 1p",
        ]
    );
}

#[test]
fn unknown_subcircuit_is_reported_once_per_name() {
    let err = run("scenario c\nx1 a foo\nr1 a 0 1\nx2 b FOO\nx3 c bar\n").unwrap_err();
    let names: Vec<String> = err
        .errors
        .iter()
        .map(|e| match &e.kind {
            ErrorKind::UnknownSubckt { name } => name.to_lowercase(),
            other => panic!("unexpected error {other:?}"),
        })
        .collect();
    assert_eq!(names, vec!["foo", "bar"]);

    // Every offending line is annotated, the duplicate included.
    let deck = err.deck.expect("deck is returned with the errors");
    let annotated = deck.iter().filter(|l| l.error.is_some()).count();
    assert_eq!(annotated, 3);
}

// ============================================================================
// HYGIENE AND PASSTHROUGH
// ============================================================================

#[test]
fn repeated_formal_is_tied_with_a_dummy_source() {
    let out = run("hygiene\n.subckt tie a a\nr1 a 0 1k\n.ends\nx1 n1 n2 tie\n").unwrap();
    assert_eq!(live(&out), vec!["v__dup1_x1 n1 n2 0", "r1_x1 n1 0 1k"]);
}

#[test]
fn global_and_ground_nodes_pass_through_every_level() {
    let source = "globals\n.global vdd\n.subckt inner p\nr1 p vdd 1\n.ends\n.subckt outer q\nx1 q inner\nr2 vdd 0 1\n.ends\nx9 n outer\n";
    let out = run(source).unwrap();
    assert_eq!(live(&out), vec![".global vdd", "r1_x1_x9 n vdd 1", "r2_x9 vdd 0 1"]);

    let mut config = ExpandConfig::default();
    config.cat_mode = CatMode::Spice3;
    config.cat_char = ':';
    let out = run_with(source, config).unwrap();
    assert_eq!(
        live(&out),
        vec![".global vdd", "r:x9:r:x1:r1 n vdd 1", "r:x9:r2 vdd 0 1"]
    );
}

#[test]
fn nested_definitions_are_scoped_to_their_parent() {
    let source = "scope\n.subckt outer a\n.subckt inner b\nr1 b c 1\n.ends inner\nx1 a inner\n.ends outer\nx1 n outer\nx2 m inner\n";
    let err = run(source).unwrap_err();
    assert_eq!(err.errors.len(), 1);
    assert!(matches!(&err.errors[0].kind, ErrorKind::UnknownSubckt { name } if name == "inner"));

    let out = run("scope\n.subckt outer a\n.subckt inner b\nr1 b c 1\n.ends inner\nx1 a inner\n.ends outer\nx1 n outer\n")
        .unwrap();
    assert_eq!(live(&out), vec!["r1_x1_x1 n c_x1_x1 1"]);
    let trace: Vec<(usize, &str)> = out
        .expansion
        .trace
        .iter()
        .map(|s| (s.depth, s.subckt.as_str()))
        .collect();
    assert_eq!(trace, vec![(1, "inner"), (0, "outer")]);
}

#[test]
fn nested_body_params_belong_to_the_inner_definition() {
    let source = "scope\n.subckt outer a w=1\n.subckt inner b\n.param w=5\nr1 b 0 w\n.ends inner\nr2 a 0 w\nx1 a inner\n.ends outer\nx9 n outer\n";
    let out = run(source).unwrap();
    assert_eq!(live(&out), vec!["r2_x9 n 0 1", "r1_x1_x9 n 0 1"]);

    let mut config = ExpandConfig::default();
    config.param_merge = MergePolicy::Local;
    let out = run_with(source, config).unwrap();
    assert_eq!(live(&out), vec!["r2_x9 n 0 1", "r1_x1_x9 n 0 5"]);
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn self_instantiation_stops_at_the_depth_limit() {
    let mut config = ExpandConfig::default();
    config.max_depth = 5;
    let err = run_with("loop\n.subckt loop a\nx1 a loop\n.ends\nx1 n loop\n", config).unwrap_err();
    assert_eq!(err.categories(), vec![ErrorCategory::Depth]);
    assert!(matches!(err.errors[0].kind, ErrorKind::MaxCallDepth { limit: 5, .. }));
}

#[test]
fn depth_limit_counts_the_top_level() {
    let source = "chain\n.subckt l1 a\nx1 a l2\n.ends\n.subckt l2 a\nr1 a 0 1\n.ends\nx1 n l1\n";
    let mut config = ExpandConfig::default();
    config.max_depth = 3;
    assert!(run_with(source, config.clone()).is_ok());
    config.max_depth = 2;
    assert!(run_with(source, config).is_err());
}

#[test]
fn argument_count_must_match() {
    let def = "arity\n.subckt pair a b\nr1 a b 1\n.ends\n";
    let err = run(&format!("{def}x1 1 2 3 pair\n")).unwrap_err();
    assert!(matches!(
        err.errors[0].kind,
        ErrorKind::TooManyArgs { expected: 2, actual: 3, .. }
    ));
    let err = run(&format!("{def}x1 1 pair\n")).unwrap_err();
    assert!(matches!(
        err.errors[0].kind,
        ErrorKind::TooFewArgs { expected: 2, actual: 1, .. }
    ));
    assert_eq!(err.categories(), vec![ErrorCategory::Arity]);
    assert_eq!(
        err.errors[0].diagnostic_info.error_code,
        "netmacro::expand::too_few_args"
    );
}

#[test]
fn empty_body_drops_the_call_with_a_warning() {
    let out = run("empty\n.subckt nothing a\n* just a comment\n.ends\nx1 n nothing\nr1 n 0 1\n").unwrap();
    assert_eq!(live(&out), vec!["r1 n 0 1"]);
    assert_eq!(out.expansion.warnings.len(), 1);
    assert!(out.expansion.warnings[0].message.contains("empty body"));
}

#[test]
fn unterminated_definition_is_a_syntax_error() {
    let err = run("open\n.subckt open a\nr1 a 0 1\n").unwrap_err();
    assert_eq!(err.categories(), vec![ErrorCategory::Syntax]);
    assert!(matches!(err.errors[0].kind, ErrorKind::UnterminatedSubckt { .. }));
}

#[test]
fn missing_subcircuit_name_on_call() {
    let err = run("bad\nx1\n").unwrap_err();
    assert!(matches!(err.errors[0].kind, ErrorKind::MalformedCall { .. }));
}

#[test]
fn non_ascii_blank_before_call_parameters() {
    let source = "blank\n.subckt sub a w=1\nr1 a 0 w\n.ends\nx1 n sub\u{a0}w=2\n";
    let mut config = ExpandConfig::default();
    config.param_merge = MergePolicy::Local;
    let out = run_with(source, config).unwrap();
    assert_eq!(live(&out), vec!["r1_x1 n 0 2"]);
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[test]
fn prefix_map_turns_unknown_calls_into_devices() {
    let mut config = ExpandConfig::default();
    config.prefix_map.insert("xm".into(), 'm');
    let out = run_with("verilog\nxm1 d g s b nch w=1u\n", config).unwrap();
    assert_eq!(live(&out), vec!["mxm1 d g s b nch w=1u"]);
}

#[test]
fn merge_policy_decides_who_wins() {
    let source = "merge\n.param w=1\n.subckt res a b w=2\nr1 a b w\n.ends\nx1 n1 n2 res w=5\n";
    let out = run(source).unwrap();
    assert_eq!(live(&out), vec!["r1_x1 n1 n2 1"]);

    let mut config = ExpandConfig::default();
    config.param_merge = MergePolicy::Local;
    let out = run_with(source, config).unwrap();
    assert_eq!(live(&out), vec!["r1_x1 n1 n2 5"]);
}

#[test]
fn top_level_nodes_are_substituted_on_request() {
    let source = "nodes\n.param w=2u\nr1 w 0 1k\nm1 d g w w nch l=w\n";
    let out = run(source).unwrap();
    assert_eq!(live(&out), vec!["r1 w 0 1k", "m1 d g w w nch l=2u"]);

    let mut config = ExpandConfig::default();
    config.set_var("subst_nodes", "true").unwrap();
    let out = run_with(source, config).unwrap();
    assert_eq!(live(&out), vec!["r1 2u 0 1k", "m1 d g 2u 2u nch l=2u"]);
}

#[test]
fn case_policy_applies_to_node_names() {
    let source = "case\n.subckt sub A\nr1 a 0 1\n.ends\nx1 n SUB\n";
    assert_eq!(live(&run(source).unwrap()), vec!["r1_x1 n 0 1"]);

    // Subcircuit names still fold; nodes no longer do.
    let mut config = ExpandConfig::default();
    config.case_policy = KeyPolicy::Sensitive;
    let out = run_with(source, config).unwrap();
    assert_eq!(live(&out), vec!["r1_x1 a_x1 0 1"]);
}

#[test]
fn alternate_directive_spellings() {
    let mut config = ExpandConfig::default();
    config.set_var("substart", ".define").unwrap();
    config.set_var("subend", ".enddef").unwrap();
    let out = run_with("alt\n.define buf a\nr1 a 0 1\n.enddef\nx1 n buf\n", config).unwrap();
    assert_eq!(live(&out), vec!["r1_x1 n 0 1"]);

    // `.macro` / `.eom` are accepted by default.
    let out = run("alt\n.macro buf a\nr1 a 0 1\n.eom\nx1 n buf\n").unwrap();
    assert_eq!(live(&out), vec!["r1_x1 n 0 1"]);
}

#[test]
fn disabled_lines_are_kept_when_rendering() {
    let out = run("render\n.subckt sub a\nr1 a 0 1\n.ends\nx1 n sub\n").unwrap();
    let full = out.render(false);
    assert!(full.contains("*.subckt sub a"));
    assert!(full.contains("*x1 n sub"));
    assert!(!out.render(true).contains("x1 n sub"));
}
