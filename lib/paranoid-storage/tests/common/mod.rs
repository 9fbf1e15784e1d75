//! Shared fixtures for integration tests.

#![allow(dead_code)]

use paranoid_storage::{
    Attributes, Dependent, Document, DocumentType, Event, Field, FieldKind, Flow, Interceptor,
    Mapper, Relation, Timestamp,
};
use serde_json::{Value as JsonValue, json};

pub fn attrs(value: JsonValue) -> Attributes {
    match value {
        JsonValue::Object(map) => map,
        _ => Attributes::new(),
    }
}

/// Record in memory that a hook ran.
pub fn mark(document: &mut Document, name: &str) {
    document.assign(name, true);
}

pub fn called(document: &Document, name: &str) -> bool {
    document.get(name) == Some(&json!(true))
}

/// Whether a stored marker value is within one second of now.
pub fn is_recent(value: Option<&JsonValue>) -> bool {
    value
        .and_then(Timestamp::from_json)
        .map(|at| {
            Timestamp::now()
                .inner()
                .signed_duration_since(*at.inner())
                .num_milliseconds()
                .abs()
                < 1000
        })
        .unwrap_or(false)
}

pub async fn raw(mapper: &Mapper, collection: &str, id: &str) -> Option<Attributes> {
    mapper.store().find_raw(collection, id).await.unwrap()
}

pub async fn count(mapper: &Mapper, name: &str) -> u64 {
    mapper.count(&mapper.query(name).unwrap()).await.unwrap()
}

/// Sets one flag on enter and another on exit.
pub struct RecordingAround {
    pub enter: &'static str,
    pub exit: &'static str,
}

impl Interceptor for RecordingAround {
    fn enter(&self, document: &mut Document) -> Flow {
        mark(document, self.enter);
        Flow::Continue
    }

    fn exit(&self, document: &mut Document) {
        mark(document, self.exit);
    }
}

pub fn paranoid_post() -> DocumentType {
    DocumentType::builder("ParanoidPost")
        .collection("paranoid_posts")
        .field(Field::new("title", FieldKind::Text))
        .relation(Relation::belongs_to("person", "Person", "personId"))
        .relation(Relation::has_and_belongs_to_many("tags", "Tag", "tagIds"))
        .relation(Relation::has_many("authors", "Author", "postId").dependent(Dependent::Delete))
        .relation(Relation::has_many("titles", "Title", "postId").dependent(Dependent::Restrict))
        .before(Event::Destroy, |document| {
            mark(document, "beforeDestroyCalled");
            Flow::Continue
        })
        .after(Event::Destroy, |document| mark(document, "afterDestroyCalled"))
        .before(Event::Remove, |document| {
            mark(document, "beforeRemoveCalled");
            Flow::Continue
        })
        .after(Event::Remove, |document| mark(document, "afterRemoveCalled"))
        .before(Event::Restore, |document| {
            mark(document, "beforeRestoreCalled");
            Flow::Continue
        })
        .after(Event::Restore, |document| mark(document, "afterRestoreCalled"))
        .around(
            Event::Restore,
            RecordingAround {
                enter: "aroundBeforeRestoreCalled",
                exit: "aroundAfterRestoreCalled",
            },
        )
        .paranoid()
        .build()
}

pub fn paranoid_phone() -> DocumentType {
    DocumentType::builder("ParanoidPhone")
        .embedded()
        .field(Field::new("number", FieldKind::Text))
        .before(Event::Destroy, |document| {
            mark(document, "beforeDestroyCalled");
            Flow::Continue
        })
        .after(Event::Destroy, |document| mark(document, "afterDestroyCalled"))
        .paranoid()
        .build()
}

pub fn person() -> DocumentType {
    DocumentType::builder("Person")
        .collection("people")
        .field(Field::new("age", FieldKind::Integer).with_default(100))
        .field(Field::new("score", FieldKind::Integer))
        .relation(Relation::embeds_many("paranoidPhones", "ParanoidPhone"))
        .relation(Relation::has_many("paranoidPosts", "ParanoidPost", "personId"))
        .build()
}

/// Mapper with the post, person, phone, author, title and tag types.
pub fn blog() -> Mapper {
    let mapper = Mapper::in_memory();
    mapper.register(paranoid_post()).unwrap();
    mapper.register(paranoid_phone()).unwrap();
    mapper.register(person()).unwrap();
    mapper
        .register(
            DocumentType::builder("Author")
                .collection("authors")
                .field(Field::new("name", FieldKind::Text))
                .relation(Relation::belongs_to("post", "ParanoidPost", "postId"))
                .build(),
        )
        .unwrap();
    mapper
        .register(
            DocumentType::builder("Title")
                .collection("titles")
                .relation(Relation::belongs_to("post", "ParanoidPost", "postId"))
                .build(),
        )
        .unwrap();
    mapper
        .register(
            DocumentType::builder("Tag")
                .collection("tags")
                .field(Field::new("text", FieldKind::Text))
                .build(),
        )
        .unwrap();
    mapper
}

/// Create a post and a person holding one embedded paranoid phone.
pub async fn person_with_phone(mapper: &Mapper) -> (Document, Document) {
    let mut person = mapper.create("Person", Attributes::new()).await.unwrap();
    let phone = person
        .create_embedded(mapper, "paranoidPhones", attrs(json!({ "number": "911" })))
        .await
        .unwrap();
    (person, phone)
}
