use super::*;

fn destination_first() -> NameResolver {
    NameResolver::new(CallShape::DestinationFirst)
}

fn position_of(err: &PersistError) -> Option<usize> {
    match err {
        PersistError::NameResolution { position, .. } => *position,
        other => panic!("expected a name resolution error, got {other:?}"),
    }
}

#[test]
fn resolves_plain_names_after_destination() {
    let names = destination_first()
        .resolve(r#"save("out.pkl", alpha, beta_2)"#, 2)
        .expect("resolves");
    assert_eq!(names, vec!["alpha", "beta_2"]);
}

#[test]
fn destination_may_be_any_expression() {
    let names = destination_first()
        .resolve(r#"save(dir.join("a, b.pkl"), frame, [1, 2][0])"#, 2)
        .expect_err("the second name is an expression");
    assert_eq!(position_of(&names), Some(2));

    let names = destination_first()
        .resolve(r#"save(format!("{}(", x), a)"#, 1)
        .expect("quoted parens and commas are ignored");
    assert_eq!(names, vec!["a"]);
}

#[test]
fn expression_argument_is_rejected_with_its_position() {
    let err = destination_first()
        .resolve("save(path, a+1, b)", 2)
        .expect_err("a+1 is not a name");
    assert_eq!(position_of(&err), Some(1));
    match err {
        PersistError::NameResolution { span, src, .. } => {
            assert_eq!(src, "save(path, a+1, b)");
            assert_eq!(span.offset(), 11);
            assert_eq!(span.len(), 3);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn multi_line_calls_are_rejected() {
    let err = destination_first()
        .resolve("save(path, a,\n     b)", 2)
        .expect_err("two lines");
    assert_eq!(position_of(&err), None);

    let err = destination_first()
        .resolve("save(path, a,", 2)
        .expect_err("continued on the next line");
    assert!(err.to_string().contains("does not close"));
}

#[test]
fn trailing_comma_and_whitespace_are_accepted() {
    let names = destination_first()
        .resolve("save( out ,  a ,b , )\n", 2)
        .expect("trailing comma");
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn count_must_match() {
    let err = destination_first()
        .resolve("save(out, a, b)", 3)
        .expect_err("three values, two names");
    assert!(err.to_string().contains("expected 3 named arguments, found 2"));
}

#[test]
fn duplicates_are_rejected() {
    let err = destination_first()
        .resolve("save(out, a, b, a)", 3)
        .expect_err("a twice");
    assert_eq!(position_of(&err), Some(3));
}

#[test]
fn names_only_calls_have_no_destination() {
    let resolver = NameResolver::new(CallShape::NamesOnly);
    assert_eq!(
        resolver.resolve("saver.add(x, y)", 2).expect("names"),
        vec!["x", "y"]
    );
    let names = resolver.resolve("add(x, )", 1).expect("trailing comma");
    assert_eq!(names, vec!["x"]);
    let err = resolver.resolve("add(x, , y)", 2).expect_err("empty argument");
    assert_eq!(position_of(&err), Some(2));
}

#[test]
fn missing_destination_is_reported() {
    let err = destination_first()
        .resolve("save()", 0)
        .expect_err("no destination");
    assert!(err.to_string().contains("destination"));
}

#[test]
fn raw_strings_and_lifetimes_in_the_destination() {
    let names = destination_first()
        .resolve(r#"save(r"C:\out\", x)"#, 1)
        .expect("backslash ends a raw string");
    assert_eq!(names, vec!["x"]);

    let names = destination_first()
        .resolve(r##"save(r#"a"b, (.ppst"#, x, y)"##, 2)
        .expect("quote inside a hashed raw string");
    assert_eq!(names, vec!["x", "y"]);

    let names = destination_first()
        .resolve("save(pick::<'static>(','), x)", 1)
        .expect("lifetime then char literal");
    assert_eq!(names, vec!["x"]);

    let names = destination_first()
        .resolve(r"save(path_for('\'', b'('), x)", 1)
        .expect("escaped and byte char literals");
    assert_eq!(names, vec!["x"]);
}
