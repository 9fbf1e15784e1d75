mod common;

use common::{attrs, raw};
use paranoid_storage::{
    Configuration, DocumentType, Event, Field, FieldKind, Filter, Flow, Mapper, RestoreOptions,
    Value,
};
use serde_json::json;

fn mapper() -> Mapper {
    let mapper = Mapper::in_memory();
    mapper
        .register(
            DocumentType::builder("Note")
                .collection("notes")
                .field(Field::new("body", FieldKind::Text))
                .paranoid_with(&Configuration::default().with_flag())
                .build(),
        )
        .unwrap();
    mapper
        .register(
            DocumentType::builder("Locked")
                .collection("locked")
                .before(Event::Destroy, |_| Flow::Halt)
                .paranoid()
                .build(),
        )
        .unwrap();
    mapper
}

#[test]
fn test_flag_scopes() {
    let mapper = mapper();
    assert_eq!(
        mapper.query("Note").unwrap().selector(),
        vec![Filter::Eq("isDeleted".to_string(), Value::Bool(false))]
    );
    assert_eq!(
        mapper.query("Note").unwrap().deleted().unwrap().selector(),
        vec![Filter::Eq("isDeleted".to_string(), Value::Bool(true))]
    );
}

#[tokio::test]
async fn test_flag_mirrors_marker() {
    let mapper = mapper();
    let mut note = mapper
        .create("Note", attrs(json!({ "body": "hi" })))
        .await
        .unwrap();
    let id = note.id().unwrap().to_string();
    assert_eq!(note.get("isDeleted"), Some(&json!(false)));

    note.destroy(&mapper).await.unwrap();
    let stored = raw(&mapper, "notes", &id).await.unwrap();
    assert_eq!(stored.get("isDeleted"), Some(&json!(true)));
    assert!(stored.get("deletedAt").is_some_and(|at| !at.is_null()));

    let deleted = mapper.query("Note").unwrap().deleted().unwrap();
    assert_eq!(mapper.count(&deleted).await.unwrap(), 1);
    assert_eq!(mapper.count(&mapper.query("Note").unwrap()).await.unwrap(), 0);

    note.restore(&mapper, RestoreOptions::default()).await.unwrap();
    let stored = raw(&mapper, "notes", &id).await.unwrap();
    assert_eq!(stored.get("isDeleted"), Some(&json!(false)));
    assert!(stored.get("deletedAt").is_none_or(|at| at.is_null()));
    assert_eq!(mapper.count(&mapper.query("Note").unwrap()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_halting_before_hook_aborts_destroy() {
    let mapper = mapper();
    let mut locked = mapper.create("Locked", Default::default()).await.unwrap();

    assert!(!locked.destroy(&mapper).await.unwrap());
    assert!(!locked.is_destroyed());
    assert_eq!(mapper.count(&mapper.query("Locked").unwrap()).await.unwrap(), 1);
}
