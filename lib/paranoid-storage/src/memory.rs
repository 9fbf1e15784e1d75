//! In-memory implementation of DocumentStore.
//!
//! Documents are kept as JSON maps per collection, in insertion order.
//! Each method takes the lock once, so a single update is atomic with
//! respect to other callers of the same store.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::document::{Attributes, ID_FIELD};
use crate::query::lookup;
use crate::{Delete, DocumentStore, Order, ParanoiaError, Query, Update, UpdateOp};

type Collections = HashMap<String, Vec<Attributes>>;

/// Shared in-memory document store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, ParanoiaError> {
        self.collections
            .read()
            .map_err(|e| ParanoiaError::StorageError(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, ParanoiaError> {
        self.collections
            .write()
            .map_err(|e| ParanoiaError::StorageError(e.to_string()))
    }
}

fn id_of(document: &Attributes) -> Option<&str> {
    document.get(ID_FIELD).and_then(JsonValue::as_str)
}

fn compare_json(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(JsonValue::Number(a)), Some(JsonValue::Number(b))) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b))
            .unwrap_or(Ordering::Equal),
        (Some(JsonValue::String(a)), Some(JsonValue::String(b))) => a.cmp(b),
        (Some(JsonValue::Bool(a)), Some(JsonValue::Bool(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

/// Walk `segments` from `root`, optionally creating missing objects.
fn container_mut<'a>(
    root: &'a mut JsonValue,
    segments: &[&str],
    create: bool,
) -> Option<&'a mut JsonValue> {
    let mut current = root;
    for segment in segments {
        current = match current {
            JsonValue::Object(map) => {
                if create && !map.contains_key(*segment) {
                    map.insert(segment.to_string(), JsonValue::Object(Map::new()));
                }
                map.get_mut(*segment)?
            }
            JsonValue::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn apply(root: &mut JsonValue, op: &UpdateOp) {
    match op {
        UpdateOp::Set(path, value) => {
            let segments: Vec<&str> = path.split('.').collect();
            let Some((last, parents)) = segments.split_last() else {
                return;
            };
            match container_mut(root, parents, true) {
                Some(JsonValue::Object(map)) => {
                    map.insert(last.to_string(), value.to_json());
                }
                Some(JsonValue::Array(items)) => {
                    if let Some(slot) = last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                        *slot = value.to_json();
                    }
                }
                _ => {}
            }
        }
        UpdateOp::Unset(path) => {
            let segments: Vec<&str> = path.split('.').collect();
            let Some((last, parents)) = segments.split_last() else {
                return;
            };
            if let Some(JsonValue::Object(map)) = container_mut(root, parents, false) {
                map.remove(*last);
            }
        }
        UpdateOp::Push(path, document) => {
            let segments: Vec<&str> = path.split('.').collect();
            let Some((last, parents)) = segments.split_last() else {
                return;
            };
            if let Some(JsonValue::Object(map)) = container_mut(root, parents, true) {
                let slot = map
                    .entry(last.to_string())
                    .or_insert_with(|| JsonValue::Array(Vec::new()));
                if let JsonValue::Array(items) = slot {
                    items.push(JsonValue::Object(document.clone()));
                }
            }
        }
        UpdateOp::Pull(path, id) => {
            let segments: Vec<&str> = path.split('.').collect();
            if let Some(JsonValue::Array(items)) = container_mut(root, &segments, false) {
                items.retain(|item| {
                    item.get(ID_FIELD).and_then(JsonValue::as_str) != Some(id.as_str())
                });
            }
        }
        UpdateOp::SetIn(container, id, field, value) => {
            if let Some(element) = element_mut(root, container, id) {
                apply(element, &UpdateOp::Set(field.clone(), value.clone()));
            }
        }
        UpdateOp::UnsetIn(container, id, field) => {
            if let Some(element) = element_mut(root, container, id) {
                apply(element, &UpdateOp::Unset(field.clone()));
            }
        }
    }
}

/// The element of the array at `container` whose `_id` is `id`.
fn element_mut<'a>(root: &'a mut JsonValue, container: &str, id: &str) -> Option<&'a mut JsonValue> {
    let segments: Vec<&str> = container.split('.').collect();
    match container_mut(root, &segments, false)? {
        JsonValue::Array(items) => items
            .iter_mut()
            .find(|item| item.get(ID_FIELD).and_then(JsonValue::as_str) == Some(id)),
        _ => None,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch(&self, query: &Query) -> Result<Vec<Attributes>, ParanoiaError> {
        let collections = self.read()?;
        let mut results: Vec<Attributes> = collections
            .get(query.collection())
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| query.matches(document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !query.order_by.is_empty() {
            results.sort_by(|a, b| {
                query
                    .order_by
                    .iter()
                    .map(|(field, order)| {
                        let ordering = compare_json(lookup(a, field), lookup(b, field));
                        match order {
                            Order::Asc => ordering,
                            Order::Desc => ordering.reverse(),
                        }
                    })
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let offset = query
            .offset
            .map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX));
        let limit = query
            .limit
            .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));

        Ok(results.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, query: &Query) -> Result<u64, ParanoiaError> {
        let collections = self.read()?;
        let count = collections.get(query.collection()).map_or(0, |documents| {
            documents
                .iter()
                .filter(|document| query.matches(document))
                .count()
        });
        Ok(count as u64)
    }

    async fn find_raw(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Attributes>, ParanoiaError> {
        let collections = self.read()?;
        Ok(collections.get(collection).and_then(|documents| {
            documents
                .iter()
                .find(|document| id_of(document) == Some(id))
                .cloned()
        }))
    }

    async fn insert(&self, collection: &str, document: &Attributes) -> Result<u64, ParanoiaError> {
        let id = id_of(document).ok_or_else(|| {
            ParanoiaError::StorageError(format!("document for {} has no {}", collection, ID_FIELD))
        })?;
        let mut collections = self.write()?;
        let documents = collections.entry(collection.to_string()).or_default();
        if documents.iter().any(|existing| id_of(existing) == Some(id)) {
            return Err(ParanoiaError::StorageError(format!(
                "duplicate key {} in {}",
                id, collection
            )));
        }
        documents.push(document.clone());
        Ok(1)
    }

    async fn update(&self, update: &Update) -> Result<u64, ParanoiaError> {
        let mut collections = self.write()?;
        let Some(document) = collections.get_mut(&update.collection).and_then(|documents| {
            documents
                .iter_mut()
                .find(|document| id_of(document) == Some(update.id.as_str()))
        }) else {
            return Ok(0);
        };

        let mut root = JsonValue::Object(std::mem::take(document));
        for op in &update.ops {
            apply(&mut root, op);
        }
        if let JsonValue::Object(map) = root {
            *document = map;
        }
        Ok(1)
    }

    async fn delete(&self, delete: &Delete) -> Result<u64, ParanoiaError> {
        let mut collections = self.write()?;
        let Some(documents) = collections.get_mut(&delete.collection) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|document| !delete.filters.iter().all(|f| f.matches(document)));
        Ok((before - documents.len()) as u64)
    }
}
