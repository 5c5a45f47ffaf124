use super::*;

#[test]
fn identifier_grammar() {
    assert!(is_identifier("alpha"));
    assert!(is_identifier("beta_2"));
    assert!(is_identifier("X"));
    assert_eq!(identifier_problem(""), Some("name is empty"));
    assert_eq!(
        identifier_problem("_private"),
        Some("name must start with a letter")
    );
    assert_eq!(identifier_problem("2x"), Some("name must start with a letter"));
    assert!(!is_identifier("a-b"));
    assert!(!is_identifier("naïve"));
}

#[test]
fn insert_keeps_order_and_refuses_duplicates() {
    let mut document = Document::new();
    document.insert("b", 1).expect("first");
    document.insert("a", 2).expect("second");
    assert_eq!(document.names().collect::<Vec<_>>(), vec!["b", "a"]);

    let err = document.insert("b", 3).expect_err("duplicate");
    assert!(matches!(err, PersistError::InvalidName { ref name, .. } if name == "b"));
    assert_eq!(document.get("b"), Some(&Value::Int(1)));
}

#[test]
fn set_replaces_in_place() {
    let mut document = Document::from_pairs([("a", 1), ("b", 2)]).expect("document");
    document.set("a", 10).expect("replace");
    document.set("c", 3).expect("append");
    assert_eq!(
        document.iter().collect::<Vec<_>>(),
        vec![
            ("a", &Value::Int(10)),
            ("b", &Value::Int(2)),
            ("c", &Value::Int(3)),
        ]
    );
    assert!(document.set("", 0).is_err());
}

#[test]
fn insert_refuses_non_identifiers() {
    let err = Document::new()
        .with("not valid", 1)
        .expect_err("space in name");
    assert!(matches!(err, PersistError::InvalidName { .. }));
}

#[test]
fn stored_names_are_format_errors() {
    let err = Document::from_stored(vec![("1bad".to_string(), Value::None)])
        .expect_err("bad stored name");
    assert!(matches!(
        err,
        PersistError::Format(FormatError::StoredName { .. })
    ));
}

#[test]
fn record_views_follow_stored_order() {
    let document = Document::from_pairs([("x", Value::Int(1)), ("y", Value::from(vec![1, 2, 3]))])
        .expect("document");
    let mut record = document.clone().into_record();
    assert_eq!(record.len(), 2);
    assert_eq!(record.names(), ["x".to_string(), "y".to_string()]);
    assert_eq!(record["x"], Value::Int(1));
    assert_eq!(record[1], Value::from(vec![1, 2, 3]));
    assert_eq!(record.to_string(), "Record with fields:\n  x\n  y");

    assert_eq!(record.clone().into_document(), document);

    assert_eq!(record.take("x").expect("present"), Value::Int(1));
    assert!(matches!(
        record.take("z"),
        Err(PersistError::MissingField(name)) if name == "z"
    ));
}

#[test]
fn record_destructures_by_field_count() {
    let record = Document::from_pairs([("a", 1), ("b", 2)])
        .expect("document")
        .into_record();
    let [a, b] = record.clone().into_array::<2>().expect("two fields");
    assert_eq!((a, b), (Value::Int(1), Value::Int(2)));

    let err = record.into_array::<3>().expect_err("wrong count");
    assert!(matches!(
        err,
        PersistError::FieldCount {
            expected: 3,
            found: 2
        }
    ));
}
