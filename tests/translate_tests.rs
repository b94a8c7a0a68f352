//! Device-level renaming inside expanded bodies.

use netmacro::{
    CacheStore, DeviceCatalog, DeviceInfo, ErrorKind, ExpandConfig, ExpansionErrors,
    ExpansionPipeline, PipelineOutput, SpiceDevices,
};

fn expand_body(body: &str, call: &str, config: ExpandConfig) -> Result<PipelineOutput, ExpansionErrors> {
    let store = CacheStore::new();
    let source = format!("t\n{body}{call}\n");
    ExpansionPipeline::new(config).with_cache(&store).run(&source)
}

fn lines(out: &PipelineOutput) -> Vec<String> {
    out.live_lines().iter().map(|l| l.text.clone()).collect()
}

#[test]
fn dependent_sources_with_poly() {
    let body = ".subckt amp inp out\ne1 out 0 poly(2) inp 0 mid 0 0 1 1\nf1 mid 0 vs 2\nvs mid 0 0\n.ends\n";
    let out = expand_body(body, "x1 a b amp", ExpandConfig::default()).unwrap();
    assert_eq!(
        lines(&out),
        vec![
            "e1_x1 b 0 poly(2) a 0 mid_x1 0 0 1 1",
            "f1_x1 mid_x1 0 vs_x1 2",
            "vs_x1 mid_x1 0 0",
        ]
    );
}

#[test]
fn poly_with_a_spaced_dimension() {
    let body = ".subckt mix o\ng1 o 0 poly (2) p q r s 0 1 1\n.ends\n";
    let out = expand_body(body, "x2 y mix", ExpandConfig::default()).unwrap();
    assert_eq!(
        lines(&out),
        vec!["g1_x2 y 0 poly(2) p_x2 q_x2 r_x2 s_x2 0 1 1"]
    );
}

#[test]
fn poly_dimension_out_of_range_aborts() {
    let body = ".subckt bad o\ne1 o 0 poly(99) a b\n.ends\n";
    let err = expand_body(body, "x1 n bad", ExpandConfig::default()).unwrap_err();
    assert!(matches!(err.errors[0].kind, ErrorKind::MalformedPoly { .. }));
    // The call line carries the message.
    let deck = err.deck.unwrap();
    assert!(deck.iter().any(|l| l.text.starts_with("x1") && l.error.is_some()));
}

#[test]
fn behavioral_expressions_rename_references() {
    let body = ".subckt probe sense\n.param k=3\nb1 o 0 v=k*v(sense,int)+i(vm)\nvm int 0 0\n.ends\n";
    let out = expand_body(body, "xp s probe", ExpandConfig::default()).unwrap();
    assert_eq!(
        lines(&out),
        vec!["b1_xp o_xp 0 v=3*v(s,int_xp)+i(vm_xp)", "vm_xp int_xp 0 0"]
    );
}

#[test]
fn binned_models_keep_their_bin_suffix() {
    let body = ".subckt cell d g\n.model nch.1 nmos\n.model nch.2 nmos\nm1 d g 0 0 nch\nm2 d g 0 0 nch.2\n.ends\n";
    let out = expand_body(body, "x1 p q cell", ExpandConfig::default()).unwrap();
    assert_eq!(
        lines(&out),
        vec![
            ".model nch_x1.1 nmos",
            ".model nch_x1.2 nmos",
            "m1_x1 p q 0 0 nch_x1",
            "m2_x1 p q 0 0 nch_x1.2",
        ]
    );
}

#[test]
fn top_level_models_are_not_renamed() {
    let body = ".model dm d\n.subckt clamp a\nd1 a 0 dm\n.ends\n";
    let out = expand_body(body, "x1 n clamp", ExpandConfig::default()).unwrap();
    assert_eq!(lines(&out), vec![".model dm d", "d1_x1 n 0 dm"]);
}

#[test]
fn strict_models_reject_unknown_names() {
    let body = ".subckt clamp a\nd1 a 0 nowhere\n.ends\n";
    assert!(expand_body(body, "x1 n clamp", ExpandConfig::default()).is_ok());

    let mut config = ExpandConfig::default();
    config.set_var("strict_models", "on").unwrap();
    let err = expand_body(body, "x1 n clamp", config).unwrap_err();
    assert!(matches!(
        &err.errors[0].kind,
        ErrorKind::UnknownModel { model, .. } if model == "nowhere"
    ));
}

#[test]
fn node_parameters_are_substituted_on_request() {
    let body = ".subckt tap a node=mid\nr1 a node 1\n.ends\n";
    let out = expand_body(body, "x1 n tap", ExpandConfig::default()).unwrap();
    assert_eq!(lines(&out), vec!["r1_x1 n node_x1 1"]);

    let mut config = ExpandConfig::default();
    config.set_var("subst_nodes", "true").unwrap();
    let out = expand_body(body, "x1 n tap", config).unwrap();
    assert_eq!(lines(&out), vec!["r1_x1 n mid_x1 1"]);
}

struct WithTline;

impl DeviceCatalog for WithTline {
    fn info(&self, key: char) -> Option<DeviceInfo> {
        match key.to_ascii_lowercase() {
            'y' => Some(DeviceInfo::new(2, 2, 0, true)),
            other => SpiceDevices::new().info(other),
        }
    }
}

#[test]
fn custom_device_catalog() {
    let store = CacheStore::new();
    let catalog = WithTline;
    let pipeline = ExpansionPipeline::default()
        .with_cache(&store)
        .with_devices(&catalog);
    let out = pipeline
        .run("t\n.subckt line a\n.model lossy ltra\ny1 a far lossy\n.ends\nx1 in line\n")
        .unwrap();
    assert_eq!(lines(&out), vec![".model lossy_x1 ltra", "y1_x1 in far_x1 lossy_x1"]);
}
