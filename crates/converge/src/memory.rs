//! In-memory collections for tests
//!
//! Handles are cheap clones sharing one store, so a test can keep a copy
//! and inspect what the engine created.

use crate::collection::{ChildCollections, Collection, Entity, Page};
use anyhow::{Result, bail};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Minimal named entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub name: String,
    pub value: String,
}

impl Item {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

impl Entity for Item {
    fn name(&self) -> &str {
        &self.name
    }
}

type CreateCheck<T> = Arc<dyn Fn(&T) -> Result<()> + Send + Sync>;

struct Store<T> {
    label: String,
    items: Mutex<Vec<T>>,
    page_size: Mutex<usize>,
    failing_creates: Mutex<HashMap<String, String>>,
    list_error: Mutex<Option<String>>,
    create_check: Mutex<Option<CreateCheck<T>>>,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A paginated collection held in memory
pub struct MemoryCollection<T = Item> {
    store: Arc<Store<T>>,
}

impl<T> Clone for MemoryCollection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<T: Entity> MemoryCollection<T> {
    pub fn named(label: &str) -> Self {
        Self {
            store: Arc::new(Store {
                label: label.to_string(),
                items: Mutex::new(Vec::new()),
                page_size: Mutex::new(0),
                failing_creates: Mutex::new(HashMap::new()),
                list_error: Mutex::new(None),
                create_check: Mutex::new(None),
                list_calls: AtomicUsize::new(0),
                create_calls: AtomicUsize::new(0),
            }),
        }
    }

    pub fn with_items(self, items: impl IntoIterator<Item = T>) -> Self {
        lock(&self.store.items).extend(items);
        self
    }

    /// Split listings into pages of `size` (0 returns everything at once)
    pub fn with_page_size(self, size: usize) -> Self {
        *lock(&self.store.page_size) = size;
        self
    }

    /// Make `create` fail for one name
    pub fn failing_create(self, name: &str, message: &str) -> Self {
        lock(&self.store.failing_creates).insert(name.to_string(), message.to_string());
        self
    }

    /// Make every listing fail
    pub fn failing_list(self, message: &str) -> Self {
        *lock(&self.store.list_error) = Some(message.to_string());
        self
    }

    /// Run `check` before accepting each create
    pub fn with_create_check(
        self,
        check: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        *lock(&self.store.create_check) = Some(Arc::new(check));
        self
    }

    pub fn items(&self) -> Vec<T> {
        lock(&self.store.items).clone()
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.store.items)
            .iter()
            .map(|i| i.name().to_string())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.store.items).iter().any(|i| i.name() == name)
    }

    pub fn len(&self) -> usize {
        lock(&self.store.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn create_calls(&self) -> usize {
        self.store.create_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.store.list_calls.load(Ordering::SeqCst)
    }
}

impl<T: Entity> Collection for MemoryCollection<T> {
    type Item = T;

    fn describe(&self) -> String {
        self.store.label.clone()
    }

    fn list_page(&self, token: Option<&str>) -> Result<Page<T>> {
        self.store.list_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = lock(&self.store.list_error).as_ref() {
            bail!("{message}");
        }

        let items = lock(&self.store.items);
        let page_size = *lock(&self.store.page_size);
        let start = match token {
            Some(t) => t.parse::<usize>()?,
            None => 0,
        };

        if page_size == 0 {
            return Ok(Page::last(items[start.min(items.len())..].to_vec()));
        }

        let end = (start + page_size).min(items.len());
        let next = (end < items.len()).then(|| end.to_string());

        Ok(Page {
            items: items[start.min(end)..end].to_vec(),
            next,
        })
    }

    fn get(&self, name: &str) -> Result<Option<T>> {
        Ok(lock(&self.store.items)
            .iter()
            .find(|i| i.name() == name)
            .cloned())
    }

    fn create(&self, item: &T) -> Result<T> {
        self.store.create_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = lock(&self.store.failing_creates).get(item.name()) {
            bail!("{message}");
        }

        let check = lock(&self.store.create_check).clone();
        if let Some(check) = check {
            check(item)?;
        }

        let mut items = lock(&self.store.items);
        if items.iter().any(|i| i.name() == item.name()) {
            bail!("Conflict: {} already exists in {}", item.name(), self.store.label);
        }
        items.push(item.clone());

        Ok(item.clone())
    }
}

type ParentCheck = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Child collections keyed by parent name
pub struct MemoryChildren<T = Item> {
    label: String,
    children: Arc<Mutex<HashMap<String, MemoryCollection<T>>>>,
    parent_exists: Option<ParentCheck>,
}

impl<T> Clone for MemoryChildren<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            children: Arc::clone(&self.children),
            parent_exists: self.parent_exists.clone(),
        }
    }
}

impl<T: Entity> MemoryChildren<T> {
    pub fn named(label: &str) -> Self {
        Self {
            label: label.to_string(),
            children: Arc::new(Mutex::new(HashMap::new())),
            parent_exists: None,
        }
    }

    /// Reject creates under a parent missing from `parents`
    pub fn requiring_parents<P: Entity + 'static>(mut self, parents: MemoryCollection<P>) -> Self {
        self.parent_exists = Some(Arc::new(move |name| parents.contains(name)));
        self
    }

    /// Seed the children of one parent
    pub fn insert(&self, parent: &str, items: impl IntoIterator<Item = T>) {
        let collection = self.scoped(parent);
        lock(&collection.store.items).extend(items);
    }

    pub fn names(&self, parent: &str) -> Vec<String> {
        lock(&self.children)
            .get(parent)
            .map(|c| c.names())
            .unwrap_or_default()
    }

    pub fn create_calls(&self) -> usize {
        lock(&self.children)
            .values()
            .map(|c| c.create_calls())
            .sum()
    }
}

impl<T: Entity> ChildCollections for MemoryChildren<T> {
    type Child = MemoryCollection<T>;

    fn scoped(&self, parent: &str) -> MemoryCollection<T> {
        let mut children = lock(&self.children);

        if let Some(existing) = children.get(parent) {
            return existing.clone();
        }

        let mut collection = MemoryCollection::named(&format!("{}/{parent}", self.label));
        if let Some(parent_exists) = self.parent_exists.clone() {
            let parent = parent.to_string();
            collection = collection.with_create_check(move |_| {
                if parent_exists(&parent) {
                    Ok(())
                } else {
                    bail!("NotFound: parent {parent} does not exist")
                }
            });
        }

        children.insert(parent.to_string(), collection.clone());
        collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_split_on_page_size() {
        let c = MemoryCollection::named("c")
            .with_items((0..5).map(|i| Item::new(&i.to_string(), "v")))
            .with_page_size(2);

        let first = c.list_page(None).unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next.as_deref(), Some("2"));

        let last = c.list_page(Some("4")).unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(last.next.is_none());
    }

    #[test]
    fn test_create_rejects_duplicate_name() {
        let c = MemoryCollection::named("c").with_items([Item::new("a", "1")]);
        assert!(c.create(&Item::new("a", "2")).is_err());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_children_require_parent() {
        let parents: MemoryCollection = MemoryCollection::named("assets");
        let children = MemoryChildren::named("filters").requiring_parents(parents.clone());

        let scoped = children.scoped("A1");
        assert!(scoped.create(&Item::new("f1", "x")).is_err());

        parents.create(&Item::new("A1", "asset")).unwrap();
        assert!(scoped.create(&Item::new("f1", "x")).is_ok());
        assert_eq!(children.names("A1"), vec!["f1"]);
    }
}
