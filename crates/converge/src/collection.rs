//! Collection traits - the only capabilities the engine needs from a backend

use anyhow::Result;
use std::fmt;

/// Something with a unique name inside its collection
///
/// Equality of name is the sole criterion used to decide whether an
/// entity already exists at the destination.
pub trait Entity: Clone + Send + Sync + fmt::Debug {
    /// Identity key within one account
    fn name(&self) -> &str;
}

/// One page of a paginated listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Entities on this page, in listing order
    pub items: Vec<T>,
    /// Continuation token for the next page, if any
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// A page with no continuation
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// A handle to one collection of entities in one account
///
/// Implementations must never mutate anything other than through
/// [`Collection::create`], and the engine never calls `create` on a
/// source collection.
pub trait Collection: Send + Sync {
    /// Entity type stored in this collection
    type Item: Entity;

    /// Human-readable location of the collection (e.g. "account/transforms")
    fn describe(&self) -> String;

    /// Fetch one page; `token` is `None` for the first page
    fn list_page(&self, token: Option<&str>) -> Result<Page<Self::Item>>;

    /// Look up a single entity by name
    fn get(&self, name: &str) -> Result<Option<Self::Item>>;

    /// Create an entity, returning the stored representation
    fn create(&self, item: &Self::Item) -> Result<Self::Item>;

    /// Drain every page, preserving listing order
    fn list_all(&self) -> Result<Vec<Self::Item>> {
        let mut items = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self.list_page(token.as_deref())?;
            items.extend(page.items);

            match page.next {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => break,
            }
        }

        Ok(items)
    }
}

/// Collections that live underneath a parent entity
pub trait ChildCollections: Send + Sync {
    /// Collection type produced for one parent
    type Child: Collection;

    /// The child collection of the named parent
    fn scoped(&self, parent: &str) -> Self::Child;
}

/// Source and destination handles for one category
#[derive(Debug, Clone)]
pub struct CollectionPair<S, D> {
    pub source: S,
    pub destination: D,
}

impl<S, D> CollectionPair<S, D> {
    pub fn new(source: S, destination: D) -> Self {
        Self {
            source,
            destination,
        }
    }
}

/// Source and destination handles for a category's child collections
#[derive(Debug, Clone)]
pub struct ChildPair<S, D> {
    pub source: S,
    pub destination: D,
}

impl<S, D> ChildPair<S, D> {
    pub fn new(source: S, destination: D) -> Self {
        Self {
            source,
            destination,
        }
    }
}
