//! # Declarative document operations.
//!
//! A projection never touches a store directly: it describes *which* document
//! to change ([`Filter`]) and *how* ([`Update`]). The pair is an
//! [`UpdateOperation`], applied by the store as an upsert.
//!
//! Field names are dotted paths into the JSON form of the document
//! (`"address.city"`).

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A read-model document maintained by a projection.
///
/// # Example
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use subvisor::ProjectedDocument;
///
/// #[derive(Serialize, Deserialize)]
/// struct OrderView {
///     #[serde(rename = "_id")]
///     id: String,
///     total: i64,
///     position: Option<u64>,
/// }
///
/// impl ProjectedDocument for OrderView {
///     const COLLECTION: &'static str = "orders";
/// }
///
/// assert_eq!(OrderView::ID_FIELD, "_id");
/// ```
pub trait ProjectedDocument: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection holding documents of this type.
    const COLLECTION: &'static str;

    /// Primary key field.
    const ID_FIELD: &'static str = "_id";

    /// Field stamped with the position of the last projected event.
    const POSITION_FIELD: &'static str = "position";
}

/// Conjunction of equality clauses.
///
/// An empty filter matches every document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `field` to equal `value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// True if every clause holds for `doc`.
    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses
            .iter()
            .all(|(field, value)| lookup(doc, field) == Some(value))
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Op {
    Set(String, Value),
    SetOnInsert(String, Value),
    Unset(String),
    Inc(String, i64),
    Push(String, Value),
}

/// Ordered list of field modifications.
///
/// # Example
/// ```rust
/// use serde_json::json;
/// use subvisor::Update;
///
/// let update = Update::new().set("status", "paid").inc("payments", 1);
/// let mut doc = json!({ "status": "placed", "payments": 0 });
/// update.apply(&mut doc, false);
/// assert_eq!(doc, json!({ "status": "paid", "payments": 1 }));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update {
    ops: Vec<Op>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(Op::Set(field.into(), value.into()));
        self
    }

    /// Sets `field` only when the upsert inserts a new document.
    pub fn set_on_insert(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(Op::SetOnInsert(field.into(), value.into()));
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push(Op::Unset(field.into()));
        self
    }

    /// Adds `by` to a numeric field; a missing field counts as zero.
    pub fn inc(mut self, field: impl Into<String>, by: i64) -> Self {
        self.ops.push(Op::Inc(field.into(), by));
        self
    }

    /// Appends `value` to an array field, creating the array if needed.
    pub fn push(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(Op::Push(field.into(), value.into()));
        self
    }

    /// Overwrites the position stamp: any earlier modification of `field` is
    /// replaced by a single `set`.
    pub fn set_position(mut self, field: &str, position: Option<u64>) -> Self {
        self.ops.retain(|op| op.field() != field);
        self.ops.push(Op::Set(field.to_owned(), position.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Applies every modification to `doc` in order.
    ///
    /// `inserted` tells whether `doc` is a freshly inserted document, which
    /// enables the `set_on_insert` modifications.
    pub fn apply(&self, doc: &mut Value, inserted: bool) {
        for op in &self.ops {
            match op {
                Op::Set(field, value) => *slot(doc, field) = value.clone(),
                Op::SetOnInsert(field, value) => {
                    if inserted {
                        *slot(doc, field) = value.clone();
                    }
                }
                Op::Unset(field) => unset(doc, field),
                Op::Inc(field, by) => {
                    let target = slot(doc, field);
                    let next = match &*target {
                        Value::Number(n) => match n.as_i64() {
                            Some(i) => Value::from(i.saturating_add(*by)),
                            None => Value::from(n.as_f64().unwrap_or(0.0) + *by as f64),
                        },
                        _ => Value::from(*by),
                    };
                    *target = next;
                }
                Op::Push(field, value) => {
                    let target = slot(doc, field);
                    match target {
                        Value::Array(items) => items.push(value.clone()),
                        other => *other = Value::Array(vec![value.clone()]),
                    }
                }
            }
        }
    }
}

impl Op {
    fn field(&self) -> &str {
        match self {
            Op::Set(f, _) | Op::SetOnInsert(f, _) | Op::Unset(f) | Op::Inc(f, _) | Op::Push(f, _) => f,
        }
    }
}

/// Filter and update targeting one document of type `T`.
///
/// # Example
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use subvisor::{ProjectedDocument, UpdateOperation};
///
/// #[derive(Serialize, Deserialize)]
/// struct Cart { #[serde(rename = "_id")] id: String, items: Vec<String> }
///
/// impl ProjectedDocument for Cart {
///     const COLLECTION: &'static str = "carts";
/// }
///
/// let op = UpdateOperation::<Cart>::by_id("cart-1", |u| u.push("items", "apple"));
/// assert_eq!(op.filter.clauses()[0].0, "_id");
/// ```
#[derive(Clone, Debug)]
pub struct UpdateOperation<T> {
    pub filter: Filter,
    pub update: Update,
    _doc: PhantomData<fn() -> T>,
}

impl<T: ProjectedDocument> UpdateOperation<T> {
    /// Builds the operation from filter and update expressions.
    pub fn new(
        filter: impl FnOnce(Filter) -> Filter,
        update: impl FnOnce(Update) -> Update,
    ) -> Self {
        Self {
            filter: filter(Filter::new()),
            update: update(Update::new()),
            _doc: PhantomData,
        }
    }

    /// Operation on the document whose primary key is `id`.
    pub fn by_id(id: impl Into<Value>, update: impl FnOnce(Update) -> Update) -> Self {
        Self::new(|f| f.eq(T::ID_FIELD, id), update)
    }
}

/// Value at dotted `path`, if present.
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |cur, key| cur.as_object()?.get(key))
}

/// Mutable slot at dotted `path`, creating intermediate objects.
///
/// Non-object values on the way are replaced by objects.
fn slot<'a>(doc: &'a mut Value, path: &str) -> &'a mut Value {
    path.split('.').fold(doc, |cur, key| {
        if !cur.is_object() {
            *cur = Value::Object(Map::new());
        }
        match cur {
            Value::Object(map) => map.entry(key).or_insert(Value::Null),
            other => other,
        }
    })
}

fn unset(doc: &mut Value, path: &str) {
    let (parent, key) = match path.rsplit_once('.') {
        Some((parent, key)) => (lookup_mut(doc, parent), key),
        None => (Some(doc), path),
    };
    if let Some(Value::Object(map)) = parent {
        map.remove(key);
    }
}

fn lookup_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.')
        .try_fold(doc, |cur, key| cur.as_object_mut()?.get_mut(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Serialize, Deserialize)]
    struct Account {
        #[serde(rename = "_id")]
        id: String,
    }

    impl ProjectedDocument for Account {
        const COLLECTION: &'static str = "accounts";
        const POSITION_FIELD: &'static str = "meta.position";
    }

    #[test]
    fn filter_matches_dotted_paths() {
        let doc = json!({ "_id": "a-1", "owner": { "country": "NL" } });

        assert!(Filter::new().matches(&doc));
        assert!(Filter::new().eq("_id", "a-1").matches(&doc));
        assert!(
            Filter::new()
                .eq("_id", "a-1")
                .eq("owner.country", "NL")
                .matches(&doc)
        );
        assert!(!Filter::new().eq("owner.country", "DE").matches(&doc));
        assert!(!Filter::new().eq("owner.city", "Delft").matches(&doc));
    }

    #[test]
    fn update_creates_nested_fields() {
        let mut doc = json!({ "_id": "a-1" });
        Update::new()
            .set("owner.name", "Ada")
            .inc("stats.logins", 2)
            .push("tags", "vip")
            .apply(&mut doc, false);

        assert_eq!(
            doc,
            json!({
                "_id": "a-1",
                "owner": { "name": "Ada" },
                "stats": { "logins": 2 },
                "tags": ["vip"],
            })
        );
    }

    #[test]
    fn set_on_insert_only_applies_to_new_documents() {
        let update = Update::new().set_on_insert("created", 1).set("updated", 2);

        let mut existing = json!({ "created": 0 });
        update.apply(&mut existing, false);
        assert_eq!(existing, json!({ "created": 0, "updated": 2 }));

        let mut fresh = json!({});
        update.apply(&mut fresh, true);
        assert_eq!(fresh, json!({ "created": 1, "updated": 2 }));
    }

    #[test]
    fn unset_and_inc_on_existing_values() {
        let mut doc = json!({ "a": { "b": 1, "c": 2 }, "n": 1.5 });
        Update::new()
            .unset("a.b")
            .unset("missing.path")
            .inc("n", 1)
            .apply(&mut doc, false);
        assert_eq!(doc, json!({ "a": { "c": 2 }, "n": 2.5 }));
    }

    #[test]
    fn position_stamp_replaces_user_writes() {
        let update = Update::new()
            .set("meta.position", 99)
            .set("name", "x")
            .set_position("meta.position", Some(7));

        let mut doc = json!({});
        update.apply(&mut doc, true);
        assert_eq!(doc, json!({ "meta": { "position": 7 }, "name": "x" }));

        let cleared = Update::new().set_position("position", None);
        let mut doc = json!({ "position": 3 });
        cleared.apply(&mut doc, false);
        assert_eq!(doc, json!({ "position": null }));
    }

    #[test]
    fn by_id_filters_on_primary_key() {
        let op = UpdateOperation::<Account>::by_id("a-1", |u| u.set("active", true));
        assert_eq!(op.filter, Filter::new().eq("_id", "a-1"));
        assert_eq!(op.update, Update::new().set("active", true));
        assert_eq!(Account::POSITION_FIELD, "meta.position");
    }
}
