mod common;

use common::{attrs, blog, called, count, is_recent, person_with_phone, raw};
use paranoid_storage::{Attributes, Document, Mapper, ParanoiaError, RestoreOptions, Timestamp};
use serde_json::json;

async fn post(mapper: &Mapper, title: &str) -> Document {
    mapper
        .create("ParanoidPost", attrs(json!({ "title": title })))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_destroy_soft_deletes_root() {
    let mapper = blog();
    let mut post = post(&mapper, "testing").await;
    let id = post.id().unwrap().to_string();

    assert!(post.destroy(&mapper).await.unwrap());

    let stored = raw(&mapper, "paranoid_posts", &id).await.unwrap();
    assert!(is_recent(stored.get("deletedAt")));
    assert!(post.is_persisted());
    assert!(post.is_destroyed());
    assert!(matches!(
        mapper.find("ParanoidPost", &id).await,
        Err(ParanoiaError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_destroy_runs_destroy_hooks_only() {
    let mapper = blog();
    let mut post = post(&mapper, "testing").await;

    post.destroy(&mapper).await.unwrap();

    assert!(called(&post, "beforeDestroyCalled"));
    assert!(called(&post, "afterDestroyCalled"));
    assert!(!called(&post, "beforeRemoveCalled"));
    assert!(!called(&post, "afterRemoveCalled"));
}

#[tokio::test]
async fn test_hard_destroy_removes_record_and_runs_both_chains() {
    let mapper = blog();
    let mut post = post(&mapper, "testing").await;
    let id = post.id().unwrap().to_string();

    assert!(post.hard_destroy(&mapper).await.unwrap());

    assert!(raw(&mapper, "paranoid_posts", &id).await.is_none());
    assert!(post.is_destroyed());
    assert!(called(&post, "beforeDestroyCalled"));
    assert!(called(&post, "afterDestroyCalled"));
    assert!(called(&post, "beforeRemoveCalled"));
    assert!(called(&post, "afterRemoveCalled"));
}

#[tokio::test]
async fn test_hard_destroy_cascades_dependents() {
    let mapper = blog();
    let mut post = post(&mapper, "test").await;
    let mut author = mapper
        .create(
            "Author",
            attrs(json!({ "name": "poe", "postId": post.id().unwrap() })),
        )
        .await
        .unwrap();

    post.hard_destroy(&mapper).await.unwrap();

    assert!(matches!(
        author.reload(&mapper).await,
        Err(ParanoiaError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_destroy_applies_delete_policy() {
    let mapper = blog();
    let mut post = post(&mapper, "test").await;
    let mut author = mapper
        .create(
            "Author",
            attrs(json!({ "name": "poe", "postId": post.id().unwrap() })),
        )
        .await
        .unwrap();

    post.destroy(&mapper).await.unwrap();

    assert!(author.reload(&mapper).await.is_err());
}

#[tokio::test]
async fn test_destroy_with_restricted_dependents_fails() {
    let mapper = blog();
    let mut post = post(&mapper, "test").await;
    let id = post.id().unwrap().to_string();
    mapper
        .create("Title", attrs(json!({ "postId": id.as_str() })))
        .await
        .unwrap();

    let result = post.destroy(&mapper).await;

    assert!(matches!(
        result,
        Err(ParanoiaError::DeleteRestriction { ref relation, .. }) if relation == "titles"
    ));
    assert!(!post.is_destroyed());
    assert!(!called(&post, "afterDestroyCalled"));
    let stored = raw(&mapper, "paranoid_posts", &id).await.unwrap();
    assert!(stored.get("deletedAt").is_none());
}

#[tokio::test]
async fn test_hard_destroy_with_restricted_dependents_keeps_record() {
    let mapper = blog();
    let mut post = post(&mapper, "test").await;
    let id = post.id().unwrap().to_string();
    mapper
        .create("Title", attrs(json!({ "postId": id.as_str() })))
        .await
        .unwrap();

    assert!(post.hard_destroy(&mapper).await.is_err());
    assert!(raw(&mapper, "paranoid_posts", &id).await.is_some());
    assert!(!post.is_destroyed());
}

#[tokio::test]
async fn test_delete_ignores_dependents_and_restrictions() {
    let mapper = blog();
    let mut post = post(&mapper, "test").await;
    let post_id = post.id().unwrap().to_string();
    let mut author = mapper
        .create("Author", attrs(json!({ "postId": post_id.as_str() })))
        .await
        .unwrap();
    mapper
        .create("Title", attrs(json!({ "postId": post_id.as_str() })))
        .await
        .unwrap();

    assert!(post.delete(&mapper).await.unwrap());

    assert!(post.is_destroyed());
    assert!(author.reload(&mapper).await.is_ok());
    let stored = raw(&mapper, "paranoid_posts", &post_id).await.unwrap();
    assert!(is_recent(stored.get("deletedAt")));
}

#[tokio::test]
async fn test_delete_runs_remove_hooks() {
    let mapper = blog();
    let mut post = post(&mapper, "testing").await;

    post.remove(&mapper).await.unwrap();

    assert!(called(&post, "beforeRemoveCalled"));
    assert!(called(&post, "afterRemoveCalled"));
    assert!(!called(&post, "beforeDestroyCalled"));
}

#[tokio::test]
async fn test_delete_keeps_non_dependent_relations() {
    let mapper = blog();
    let mut tag = mapper
        .create("Tag", attrs(json!({ "text": "tagie" })))
        .await
        .unwrap();
    let mut post = mapper
        .create(
            "ParanoidPost",
            attrs(json!({ "title": "test", "tagIds": [tag.id().unwrap()] })),
        )
        .await
        .unwrap();

    post.delete(&mapper).await.unwrap();

    tag.reload(&mapper).await.unwrap();
    assert_eq!(tag.get("text"), Some(&json!("tagie")));
}

#[tokio::test]
async fn test_remove_on_new_document_marks_destroyed() {
    let mapper = blog();
    let mut post = mapper.build("ParanoidPost", Attributes::new()).unwrap();

    assert!(post.remove(&mapper).await.unwrap());

    assert!(post.is_destroyed());
    assert!(post.deleted_at().is_some());
    assert_eq!(count(&mapper, "ParanoidPost").await, 0);
}

#[tokio::test]
async fn test_hard_delete_removes_record_without_hooks_or_cascade() {
    let mapper = blog();
    let mut post = post(&mapper, "testing").await;
    let post_id = post.id().unwrap().to_string();
    let mut author = mapper
        .create("Author", attrs(json!({ "postId": post_id.as_str() })))
        .await
        .unwrap();

    assert!(post.hard_delete(&mapper).await.unwrap());

    assert!(raw(&mapper, "paranoid_posts", &post_id).await.is_none());
    assert!(post.is_destroyed());
    assert!(post.is_deleted());
    assert!(!called(&post, "beforeDestroyCalled"));
    assert!(!called(&post, "beforeRemoveCalled"));
    assert!(author.reload(&mapper).await.is_ok());
}

#[tokio::test]
async fn test_restore_round_trip() {
    let mapper = blog();
    let mut post = post(&mapper, "testing").await;

    post.delete(&mapper).await.unwrap();
    assert!(post.restore(&mapper, RestoreOptions::default()).await.unwrap());

    assert!(post.deleted_at().is_none());
    assert!(!post.is_destroyed());
    assert!(post.is_persisted());

    post.reload(&mapper).await.unwrap();
    assert!(post.deleted_at().is_none());
    assert!(post.get("deletedAt").is_none());
    assert_eq!(count(&mapper, "ParanoidPost").await, 1);
}

#[tokio::test]
async fn test_restore_runs_hooks() {
    let mapper = blog();
    let mut post = post(&mapper, "testing").await;
    post.delete(&mapper).await.unwrap();

    post.restore(&mapper, RestoreOptions::default()).await.unwrap();

    assert!(called(&post, "beforeRestoreCalled"));
    assert!(called(&post, "afterRestoreCalled"));
    assert!(called(&post, "aroundBeforeRestoreCalled"));
    assert!(called(&post, "aroundAfterRestoreCalled"));
}

#[tokio::test]
async fn test_restore_of_active_document_is_idempotent() {
    let mapper = blog();
    let mut post = post(&mapper, "testing").await;
    let id = post.id().unwrap().to_string();

    assert!(post.restore(&mapper, RestoreOptions::default()).await.unwrap());

    assert!(called(&post, "beforeRestoreCalled"));
    assert!(!post.is_destroyed());
    let stored = raw(&mapper, "paranoid_posts", &id).await.unwrap();
    assert!(stored.get("deletedAt").is_none());
    assert_eq!(stored.get("title"), Some(&json!("testing")));
}

#[tokio::test]
async fn test_readonly_document_rejects_every_delete() {
    let mapper = blog();
    let mut post = post(&mapper, "testing").await;
    let id = post.id().unwrap().to_string();
    post.set_readonly(true);

    assert!(matches!(
        post.delete(&mapper).await,
        Err(ParanoiaError::ReadonlyDocument(_))
    ));
    assert!(post.remove(&mapper).await.is_err());
    assert!(post.hard_delete(&mapper).await.is_err());
    assert!(post.destroy(&mapper).await.is_err());
    assert!(post.hard_destroy(&mapper).await.is_err());

    assert!(!post.is_destroyed());
    assert!(!called(&post, "beforeDestroyCalled"));
    let stored = raw(&mapper, "paranoid_posts", &id).await.unwrap();
    assert!(stored.get("deletedAt").is_none());
}

#[tokio::test]
async fn test_to_param() {
    let mapper = blog();
    let unsaved = mapper.build("ParanoidPost", Attributes::new()).unwrap();
    assert_eq!(unsaved.to_param(), None);

    let mut post = post(&mapper, "testing").await;
    let id = post.id().map(str::to_string);
    assert_eq!(post.to_param(), id);

    post.delete(&mapper).await.unwrap();
    assert_eq!(post.to_param(), id);
}

#[tokio::test]
async fn test_set_persists_marker() {
    let mapper = blog();
    let mut post = post(&mapper, "testing").await;
    let earlier = Timestamp::from_json(&json!("2024-01-01T00:00:00.000000Z")).unwrap();

    post.set(&mapper, "deletedAt", earlier).await.unwrap();
    post.reload(&mapper).await.unwrap();

    assert_eq!(post.deleted_at(), Some(earlier));
    assert!(post.is_destroyed());
}

#[tokio::test]
async fn test_embedded_destroy_soft_deletes_in_place() {
    let mapper = blog();
    let (mut person, mut phone) = person_with_phone(&mapper).await;
    let person_id = person.id().unwrap().to_string();

    assert!(phone.destroy(&mapper).await.unwrap());

    let stored = raw(&mapper, "people", &person_id).await.unwrap();
    assert!(is_recent(stored["paranoidPhones"][0].get("deletedAt")));
    assert!(phone.is_destroyed());
    assert!(called(&phone, "beforeDestroyCalled"));
    assert!(called(&phone, "afterDestroyCalled"));

    assert!(person.embedded(&mapper, "paranoidPhones").await.unwrap().is_empty());
    assert_eq!(
        person
            .embedded_unscoped(&mapper, "paranoidPhones")
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_embedded_delete_soft_deletes_in_place() {
    let mapper = blog();
    let (mut person, mut phone) = person_with_phone(&mapper).await;

    phone.delete(&mapper).await.unwrap();

    person.reload(&mapper).await.unwrap();
    let stored = person.lookup("paranoidPhones.0.deletedAt");
    assert!(is_recent(stored));
    assert!(person.embedded(&mapper, "paranoidPhones").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_embedded_soft_delete_after_sibling_is_pulled() {
    let mapper = blog();
    let mut person = mapper.create("Person", Attributes::new()).await.unwrap();
    let person_id = person.id().unwrap().to_string();
    for number in ["a", "b", "c"] {
        person
            .create_embedded(&mapper, "paranoidPhones", attrs(json!({ "number": number })))
            .await
            .unwrap();
    }

    let mut phones = person.embedded(&mapper, "paranoidPhones").await.unwrap();
    let mut c = phones.pop().unwrap();
    let mut b = phones.pop().unwrap();
    let mut a = phones.pop().unwrap();

    a.hard_delete(&mapper).await.unwrap();
    b.delete(&mapper).await.unwrap();

    let stored = raw(&mapper, "people", &person_id).await.unwrap();
    let stored = stored["paranoidPhones"].as_array().unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0]["number"], json!("b"));
    assert!(is_recent(stored[0].get("deletedAt")));
    assert_eq!(stored[1]["number"], json!("c"));
    assert!(stored[1].get("deletedAt").is_none());

    let visible = person.embedded(&mapper, "paranoidPhones").await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].get("number"), Some(&json!("c")));

    b.restore(&mapper, RestoreOptions::default()).await.unwrap();
    c.destroy(&mapper).await.unwrap();
    let stored = raw(&mapper, "people", &person_id).await.unwrap();
    assert!(stored["paranoidPhones"][0].get("deletedAt").is_none());
    assert!(is_recent(stored["paranoidPhones"][1].get("deletedAt")));

    c.reload(&mapper).await.unwrap();
    assert_eq!(c.embedding().unwrap().index, Some(1));
    assert!(c.is_deleted());
}

#[tokio::test]
async fn test_embedded_hard_destroy_pulls_from_parent() {
    let mapper = blog();
    let (person, mut phone) = person_with_phone(&mapper).await;
    let person_id = person.id().unwrap().to_string();

    phone.hard_destroy(&mapper).await.unwrap();

    let stored = raw(&mapper, "people", &person_id).await.unwrap();
    assert_eq!(stored["paranoidPhones"], json!([]));
    assert!(phone.is_destroyed());
    assert!(called(&phone, "beforeDestroyCalled"));
}

#[tokio::test]
async fn test_embedded_hard_delete_pulls_from_parent() {
    let mapper = blog();
    let (person, mut phone) = person_with_phone(&mapper).await;
    let person_id = person.id().unwrap().to_string();

    phone.hard_delete(&mapper).await.unwrap();

    let stored = raw(&mapper, "people", &person_id).await.unwrap();
    assert_eq!(stored["paranoidPhones"], json!([]));
    assert!(phone.is_deleted());
}

#[tokio::test]
async fn test_embedded_restore_persists() {
    let mapper = blog();
    let (mut person, mut phone) = person_with_phone(&mapper).await;

    phone.delete(&mapper).await.unwrap();
    phone.restore(&mapper, RestoreOptions::default()).await.unwrap();

    assert!(phone.deleted_at().is_none());
    person.reload(&mapper).await.unwrap();
    let phones = person.embedded(&mapper, "paranoidPhones").await.unwrap();
    assert_eq!(phones.len(), 1);
    assert!(phones[0].deleted_at().is_none());
    assert_eq!(phones[0].get("number"), Some(&json!("911")));
}

#[tokio::test]
async fn test_ordinary_document_delete_is_permanent() {
    let mapper = blog();
    let mut tag = mapper
        .create("Tag", attrs(json!({ "text": "x" })))
        .await
        .unwrap();
    let id = tag.id().unwrap().to_string();

    assert!(tag.delete(&mapper).await.unwrap());

    assert!(raw(&mapper, "tags", &id).await.is_none());
    assert!(tag.is_destroyed());
    assert!(!tag.is_persisted());
    assert!(matches!(
        tag.restore(&mapper, RestoreOptions::default()).await,
        Err(ParanoiaError::NotParanoid(_))
    ));
}
