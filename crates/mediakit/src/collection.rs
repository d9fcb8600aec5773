//! Collection handles over the management API.

use crate::client::MediaClient;
use crate::models::{ArmResource, ResourceKind, ResourceProperties};
use converge::{ChildCollections, Collection, Page};
use std::marker::PhantomData;
use std::sync::Arc;

/// One resource collection of one account.
pub struct MediaCollection<P> {
    client: Arc<MediaClient>,
    kind: ResourceKind,
    /// Account-relative path (e.g. `assets/a1/assetFilters`)
    path: String,
    _properties: PhantomData<fn() -> P>,
}

impl<P> Clone for MediaCollection<P> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            kind: self.kind,
            path: self.path.clone(),
            _properties: PhantomData,
        }
    }
}

impl<P: ResourceProperties> MediaCollection<P> {
    pub(crate) fn new(client: Arc<MediaClient>, kind: ResourceKind, path: String) -> Self {
        Self {
            client,
            kind,
            path,
            _properties: PhantomData,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn client(&self) -> &MediaClient {
        &self.client
    }

    fn item_path(&self, name: &str) -> String {
        format!("{}/{name}", self.path)
    }

    fn describe_item(&self, name: &str) -> String {
        format!("{}/{name}", self.describe())
    }
}

impl<P: ResourceProperties> Collection for MediaCollection<P> {
    type Item = ArmResource<P>;

    fn describe(&self) -> String {
        format!("{}/{}", self.client.account().name, self.path)
    }

    fn list_page(&self, token: Option<&str>) -> anyhow::Result<Page<ArmResource<P>>> {
        let (items, next) = self.client.list_page(&self.path, token)?;
        Ok(Page { items, next })
    }

    fn get(&self, name: &str) -> anyhow::Result<Option<ArmResource<P>>> {
        let url = self.client.url(&self.item_path(name), &[])?;
        Ok(self.client.get_optional(&url)?)
    }

    fn create(&self, item: &ArmResource<P>) -> anyhow::Result<ArmResource<P>> {
        let path = self.item_path(&item.name);
        let url = self.client.url(&path, self.kind.create_query())?;
        log::debug!("Creating {}", self.describe_item(&item.name));

        let created: ArmResource<P> = self.client.put_json(&url, item)?;

        if self.kind.is_long_running() {
            let status_url = self.client.url(&path, &[])?;
            self.client.wait_for_provisioning(&status_url, &item.name)?;
        }

        Ok(created)
    }
}

/// Child collections of one kind (asset filters, live outputs).
pub struct MediaChildren<P> {
    client: Arc<MediaClient>,
    kind: ResourceKind,
    _properties: PhantomData<fn() -> P>,
}

impl<P> Clone for MediaChildren<P> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            kind: self.kind,
            _properties: PhantomData,
        }
    }
}

impl<P: ResourceProperties> MediaChildren<P> {
    pub(crate) fn new(client: Arc<MediaClient>, kind: ResourceKind) -> Self {
        Self {
            client,
            kind,
            _properties: PhantomData,
        }
    }
}

impl<P: ResourceProperties> ChildCollections for MediaChildren<P> {
    type Child = MediaCollection<P>;

    fn scoped(&self, parent: &str) -> MediaCollection<P> {
        let parent_segment = self
            .kind
            .parent()
            .map(|k| k.segment())
            .unwrap_or_default();

        MediaCollection::new(
            Arc::clone(&self.client),
            self.kind,
            format!("{parent_segment}/{parent}/{}", self.kind.segment()),
        )
    }
}
