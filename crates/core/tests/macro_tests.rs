use ppersist::{PersistError, PersistResult, Saver, Trust, Value};

#[test]
fn save_macro_names_values_after_variables() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out.ppst");
    let alpha = vec![1, 2, 3];
    let beta_2 = String::from("two");

    ppersist::save!(&path, alpha, beta_2).expect("save");

    let record = ppersist::load(&path, Trust::Gated).expect("load");
    assert_eq!(record.names(), ["alpha".to_string(), "beta_2".to_string()]);
    assert_eq!(record["alpha"], Value::from(vec![1, 2, 3]));
    assert_eq!(record["beta_2"], Value::from("two"));
    // saving clones
    assert_eq!(alpha.len(), 3);
}

#[test]
fn save_macro_refuses_expressions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("expr.ppst");
    let alpha = vec![1, 2, 3];
    let beta = 2;

    let err = ppersist::save!(&path, alpha[0] + 1, beta).expect_err("expression");
    match err {
        PersistError::NameResolution { position, .. } => assert_eq!(position, Some(1)),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!path.exists());
}

#[test]
fn duplicate_names_are_refused_before_writing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("dup.ppst");
    let alpha = 1;
    let err = ppersist::save!(&path, alpha, alpha).expect_err("duplicate");
    assert!(matches!(err, PersistError::NameResolution { .. }));
    assert!(!path.exists());
}

#[test]
fn multi_line_call_text_is_refused() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("lines.ppst");
    let err = ppersist::save_call(
        &path,
        "save(path, a,\n     b)",
        vec![Value::Int(1), Value::Int(2)],
    )
    .expect_err("two lines");
    assert!(matches!(err, PersistError::NameResolution { .. }));
    assert!(!path.exists());
}

#[test]
fn saver_collects_across_calls() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("saver.ppst");
    let gamma = 3;
    let delta = vec![0.5, 1.5];

    let mut saver = Saver::new(&path);
    ppersist::save_into!(saver, gamma).expect("gamma");
    ppersist::save_into!(saver, delta, gamma,).expect("delta");
    assert!(!path.exists());
    saver.finish().expect("finish");

    let document = ppersist::load_dict(&path, Trust::Gated).expect("load");
    assert_eq!(document.names().collect::<Vec<_>>(), vec!["gamma", "delta"]);
}

#[test]
fn mload_binds_listed_names() -> PersistResult<()> {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("m.ppst");
    let alpha = vec![1, 2];
    let beta_2 = 2.5;
    ppersist::save!(&path, alpha, beta_2)?;

    {
        ppersist::mload!(&path; alpha, beta_2);
        assert_eq!(alpha, Value::from(vec![1, 2]));
        assert_eq!(beta_2, Value::Float(2.5));
    }

    let missing = || -> PersistResult<()> {
        ppersist::mload!(&path, Trust::Trusted; gamma);
        let _ = gamma;
        Ok(())
    };
    assert!(matches!(missing(), Err(PersistError::MissingField(name)) if name == "gamma"));
    Ok(())
}
