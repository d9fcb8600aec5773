//! Asset content transfer between blob containers.
//!
//! Two transfer modes:
//! - **Cloud copy**: the destination storage service pulls each blob from
//!   the source SAS URL (`Copy Blob`), and we poll until it finishes.
//! - **Local relay**: blobs are streamed through this machine and uploaded
//!   with `Put Block` / `Put Block List`, for networks where the storage
//!   accounts cannot reach each other.
//!
//! Either way only blobs the destination lacks (by name and size) move, so
//! an interrupted transfer resumes on the next run.

use crate::client::MediaClient;
use crate::error::{Error, Result};
use crate::models::ContainerPermission;
use crate::retry::{LogCallback, with_retry};
use crate::types::ClientOptions;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use ureq::Body;
use ureq::http::Response;
use url::Url;

/// Blob service REST version sent with every storage call.
pub const STORAGE_API_VERSION: &str = "2021-08-06";

/// Block size for local relay uploads.
pub const DEFAULT_BLOCK_SIZE: usize = 8 * 1024 * 1024;

/// How blob content moves between accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Server-side copy from the source SAS URL
    CloudCopy,
    /// Download and re-upload through the local machine
    LocalRelay,
}

impl TransferMode {
    pub fn from_local_network(copy_using_local_network: bool) -> Self {
        if copy_using_local_network {
            Self::LocalRelay
        } else {
            Self::CloudCopy
        }
    }
}

/// Totals for one container transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub blobs: usize,
    pub bytes: u64,
    /// Blobs already present at the destination
    pub skipped: usize,
}

/// A blob in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobItem {
    pub name: String,
    pub size: u64,
    pub content_type: Option<String>,
}

/// Blob operations on SAS-authorized container URLs.
pub struct AssetStorage {
    agent: ureq::Agent,
    options: ClientOptions,
    block_size: usize,
}

impl AssetStorage {
    pub fn new(options: &ClientOptions) -> Self {
        Self {
            agent: options.agent(),
            options: options.clone(),
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Override the relay block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    fn retry<T>(&self, operation: &str, f: impl FnMut() -> Result<T>) -> Result<T> {
        with_retry(&self.options.retry, Some(&LogCallback { operation }), f)
    }

    /// List every blob in a container, following continuation markers.
    pub fn list_blobs(&self, container: &Url) -> Result<Vec<BlobItem>> {
        let mut blobs = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut url = container.clone();
            {
                let mut pairs = url.query_pairs_mut();
                pairs.append_pair("restype", "container");
                pairs.append_pair("comp", "list");
                if let Some(m) = &marker {
                    pairs.append_pair("marker", m);
                }
            }

            let body = self.retry("list blobs", || {
                let response = self
                    .agent
                    .get(url.as_str())
                    .header("x-ms-version", STORAGE_API_VERSION)
                    .call()?;
                Ok(check(response)?.body_mut().read_to_string()?)
            })?;

            let page = parse_blob_list(&body)?;
            blobs.extend(page.blobs);

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(blobs)
    }

    /// Copy the blobs of `source` that `destination` is missing.
    pub fn copy_container(
        &self,
        mode: TransferMode,
        source: &Url,
        destination: &Url,
    ) -> Result<TransferStats> {
        let blobs = self.list_blobs(source)?;
        let present = self.list_blobs(destination)?;
        let pending = pending_blobs(&blobs, &present);
        let mut stats = TransferStats {
            skipped: blobs.len() - pending.len(),
            ..TransferStats::default()
        };

        for blob in pending {
            let source_blob = blob_url(source, &blob.name)?;
            let destination_blob = blob_url(destination, &blob.name)?;

            let bytes = match mode {
                TransferMode::CloudCopy => {
                    self.cloud_copy(&source_blob, &destination_blob, &blob.name)?;
                    blob.size
                }
                TransferMode::LocalRelay => self.relay(&source_blob, &destination_blob, blob)?,
            };

            log::debug!("Copied blob {} ({bytes} bytes)", blob.name);
            stats.blobs += 1;
            stats.bytes += bytes;
        }

        Ok(stats)
    }

    fn cloud_copy(&self, source: &Url, destination: &Url, name: &str) -> Result<()> {
        let response = self.retry("start blob copy", || {
            let response = self
                .agent
                .put(destination.as_str())
                .header("x-ms-version", STORAGE_API_VERSION)
                .header("x-ms-copy-source", source.as_str())
                .send_empty()?;
            check(response)
        })?;

        let poll = &self.options.poll;
        let started = Instant::now();
        let mut status = copy_status(&response);

        while status == "pending" {
            if started.elapsed() >= poll.timeout {
                return Err(Error::Timeout {
                    what: format!("copy of blob {name}"),
                    seconds: poll.timeout.as_secs(),
                });
            }
            thread::sleep(poll.interval.min(Duration::from_secs(5)));

            let head = self.retry("poll blob copy", || {
                let response = self
                    .agent
                    .head(destination.as_str())
                    .header("x-ms-version", STORAGE_API_VERSION)
                    .call()?;
                check(response)
            })?;
            status = copy_status(&head);
        }

        if status == "success" {
            Ok(())
        } else {
            Err(Error::CopyFailed {
                blob: name.to_string(),
                status,
            })
        }
    }

    fn relay(&self, source: &Url, destination: &Url, blob: &BlobItem) -> Result<u64> {
        let response = self.retry("download blob", || {
            let response = self
                .agent
                .get(source.as_str())
                .header("x-ms-version", STORAGE_API_VERSION)
                .call()?;
            check(response)
        })?;

        let mut reader = response.into_body().into_reader();
        let mut block_ids = Vec::new();
        let mut total: u64 = 0;

        loop {
            let mut chunk = Vec::with_capacity(self.block_size);
            (&mut reader)
                .take(self.block_size as u64)
                .read_to_end(&mut chunk)?;
            if chunk.is_empty() {
                break;
            }

            let id = block_id(block_ids.len());
            self.put_block(destination, &id, &chunk)?;
            total += chunk.len() as u64;
            block_ids.push(id);
        }

        self.commit(destination, &block_ids, blob.content_type.as_deref())?;
        Ok(total)
    }

    fn put_block(&self, destination: &Url, id: &str, chunk: &[u8]) -> Result<()> {
        let mut url = destination.clone();
        url.query_pairs_mut()
            .append_pair("comp", "block")
            .append_pair("blockid", id);

        self.retry("upload block", || {
            let response = self
                .agent
                .put(url.as_str())
                .header("x-ms-version", STORAGE_API_VERSION)
                .send(chunk)?;
            check(response).map(|_| ())
        })
    }

    /// Commit uploaded blocks, or create an empty blob when there are none.
    fn commit(
        &self,
        destination: &Url,
        block_ids: &[String],
        content_type: Option<&str>,
    ) -> Result<()> {
        let content_type = content_type.unwrap_or("application/octet-stream");

        if block_ids.is_empty() {
            return self.retry("create empty blob", || {
                let response = self
                    .agent
                    .put(destination.as_str())
                    .header("x-ms-version", STORAGE_API_VERSION)
                    .header("x-ms-blob-type", "BlockBlob")
                    .header("x-ms-blob-content-type", content_type)
                    .send_empty()?;
                check(response).map(|_| ())
            });
        }

        let mut url = destination.clone();
        url.query_pairs_mut().append_pair("comp", "blocklist");
        let body = block_list_xml(block_ids)?;

        self.retry("commit block list", || {
            let response = self
                .agent
                .put(url.as_str())
                .header("x-ms-version", STORAGE_API_VERSION)
                .header("x-ms-blob-content-type", content_type)
                .header("Content-Type", "application/xml")
                .send(body.as_bytes())?;
            check(response).map(|_| ())
        })
    }
}

/// Copies the blob content of assets between two accounts.
pub struct ContentCopier {
    source: Arc<MediaClient>,
    destination: Arc<MediaClient>,
    storage: AssetStorage,
    mode: TransferMode,
    sas_expiry: Duration,
}

impl ContentCopier {
    pub fn new(
        source: Arc<MediaClient>,
        destination: Arc<MediaClient>,
        mode: TransferMode,
        sas_expiry: Duration,
    ) -> Self {
        let storage = AssetStorage::new(destination.options());
        Self {
            source,
            destination,
            storage,
            mode,
            sas_expiry,
        }
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Copy the blobs a same-named destination asset is missing.
    pub fn copy_asset(&self, asset: &str) -> Result<TransferStats> {
        let expiry = Utc::now()
            + TimeDelta::from_std(self.sas_expiry).map_err(|e| Error::Other(e.to_string()))?;

        let source = first_sas(
            self.source
                .list_container_sas(asset, ContainerPermission::Read, expiry)?,
            asset,
        )?;
        let destination = first_sas(
            self.destination
                .list_container_sas(asset, ContainerPermission::ReadWrite, expiry)?,
            asset,
        )?;

        log::debug!("Copying content of asset {asset} ({:?})", self.mode);
        self.storage.copy_container(self.mode, &source, &destination)
    }
}

/// Source blobs absent from the destination or present with another size
fn pending_blobs<'a>(source: &'a [BlobItem], destination: &[BlobItem]) -> Vec<&'a BlobItem> {
    let present: HashMap<&str, u64> = destination
        .iter()
        .map(|b| (b.name.as_str(), b.size))
        .collect();

    source
        .iter()
        .filter(|b| present.get(b.name.as_str()) != Some(&b.size))
        .collect()
}

fn first_sas(urls: Vec<Url>, asset: &str) -> Result<Url> {
    urls.into_iter()
        .next()
        .ok_or_else(|| Error::Other(format!("no container SAS URL returned for asset {asset}")))
}

/// URL of a blob inside a container URL, keeping the container's SAS query.
pub fn blob_url(container: &Url, name: &str) -> Result<Url> {
    let mut url = container.clone();
    url.path_segments_mut()
        .map_err(|()| Error::Other(format!("not a container URL: {container}")))?
        .pop_if_empty()
        .extend(name.split('/'));
    Ok(url)
}

/// Fixed-width block id; every id of one blob must have the same length.
fn block_id(index: usize) -> String {
    STANDARD.encode(format!("block-{index:08}"))
}

fn check(mut response: Response<Body>) -> Result<Response<Body>> {
    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        return Ok(response);
    }
    let body = response.body_mut().read_to_string().unwrap_or_default();
    Err(Error::from_response(status, &body))
}

fn copy_status(response: &Response<Body>) -> String {
    response
        .headers()
        .get("x-ms-copy-status")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("success")
        .to_ascii_lowercase()
}

// =============================================================================
// Blob service XML bodies
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    #[serde(default)]
    blobs: BlobList,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BlobList {
    #[serde(default, rename = "Blob")]
    blob: Vec<BlobEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BlobEntry {
    name: String,
    properties: BlobEntryProperties,
}

#[derive(Debug, Deserialize)]
struct BlobEntryProperties {
    #[serde(default, rename = "Content-Length")]
    content_length: u64,
    #[serde(default, rename = "Content-Type")]
    content_type: Option<String>,
}

struct BlobPage {
    blobs: Vec<BlobItem>,
    next_marker: Option<String>,
}

fn parse_blob_list(xml: &str) -> Result<BlobPage> {
    let results: EnumerationResults = quick_xml::de::from_str(xml.trim_start_matches('\u{feff}'))?;

    let blobs = results
        .blobs
        .blob
        .into_iter()
        .map(|b| BlobItem {
            name: b.name,
            size: b.properties.content_length,
            content_type: b.properties.content_type.filter(|t| !t.is_empty()),
        })
        .collect();

    Ok(BlobPage {
        blobs,
        next_marker: results.next_marker.filter(|m| !m.is_empty()),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename = "BlockList")]
struct BlockList<'a> {
    #[serde(rename = "Latest")]
    latest: &'a [String],
}

fn block_list_xml(block_ids: &[String]) -> Result<String> {
    let body = quick_xml::se::to_string(&BlockList { latest: block_ids })
        .map_err(|e| Error::Xml(e.to_string()))?;
    Ok(format!("<?xml version=\"1.0\" encoding=\"utf-8\"?>{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_url_keeps_sas_and_encodes_name() {
        let container =
            Url::parse("https://store.blob.core.windows.net/asset-1b2c?sv=2021-08-06&sig=abc%2B")
                .unwrap();

        let url = blob_url(&container, "video/clip one.mp4").unwrap();

        assert_eq!(url.path(), "/asset-1b2c/video/clip%20one.mp4");
        assert_eq!(url.query(), Some("sv=2021-08-06&sig=abc%2B"));
    }

    #[test]
    fn test_blob_url_trailing_slash_container() {
        let container = Url::parse("https://store.blob.core.windows.net/asset-1/?sig=x").unwrap();
        let url = blob_url(&container, "a.ism").unwrap();
        assert_eq!(url.path(), "/asset-1/a.ism");
    }

    #[test]
    fn test_parse_blob_list_with_marker() {
        let xml = "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?>\
            <EnumerationResults ServiceEndpoint=\"https://store.blob.core.windows.net/\" ContainerName=\"asset-1\">\
              <Blobs>\
                <Blob><Name>video.mp4</Name><Properties><Content-Length>1024</Content-Length><Content-Type>video/mp4</Content-Type></Properties></Blob>\
                <Blob><Name>manifest.ism</Name><Properties><Content-Length>12</Content-Length><Content-Type /></Properties></Blob>\
              </Blobs>\
              <NextMarker>2!72!MDAwMDA</NextMarker>\
            </EnumerationResults>";

        let page = parse_blob_list(xml).unwrap();

        assert_eq!(page.blobs.len(), 2);
        assert_eq!(page.blobs[0].size, 1024);
        assert_eq!(page.blobs[0].content_type.as_deref(), Some("video/mp4"));
        assert_eq!(page.blobs[1].content_type, None);
        assert_eq!(page.next_marker.as_deref(), Some("2!72!MDAwMDA"));
    }

    #[test]
    fn test_parse_empty_blob_list() {
        let xml = "<EnumerationResults><Blobs /><NextMarker /></EnumerationResults>";

        let page = parse_blob_list(xml).unwrap();

        assert!(page.blobs.is_empty());
        assert!(page.next_marker.is_none());
    }

    fn blob(name: &str, size: u64) -> BlobItem {
        BlobItem {
            name: name.to_string(),
            size,
            content_type: None,
        }
    }

    #[test]
    fn test_pending_blobs_skips_complete_ones() {
        let source = [blob("video.mp4", 1024), blob("audio.mp4", 512), blob("manifest.ism", 12)];
        let destination = [blob("video.mp4", 1024), blob("audio.mp4", 100)];

        let pending: Vec<&str> = pending_blobs(&source, &destination)
            .iter()
            .map(|b| b.name.as_str())
            .collect();

        assert_eq!(pending, vec!["audio.mp4", "manifest.ism"]);
    }

    #[test]
    fn test_pending_blobs_empty_destination() {
        let source = [blob("a", 1), blob("b", 2)];
        assert_eq!(pending_blobs(&source, &[]).len(), 2);
        assert!(pending_blobs(&[], &source).is_empty());
    }

    #[test]
    fn test_block_ids_have_equal_length() {
        assert_eq!(block_id(0).len(), block_id(12_345).len());
        assert_ne!(block_id(1), block_id(2));
    }

    #[test]
    fn test_block_list_xml() {
        let ids = vec![block_id(0), block_id(1)];
        let xml = block_list_xml(&ids).unwrap();

        assert!(xml.starts_with("<?xml"));
        let expected = format!(
            "<BlockList><Latest>{}</Latest><Latest>{}</Latest></BlockList>",
            ids[0], ids[1]
        );
        assert!(xml.contains(&expected));
    }

    #[test]
    fn test_transfer_mode_from_flag() {
        assert_eq!(TransferMode::from_local_network(true), TransferMode::LocalRelay);
        assert_eq!(TransferMode::from_local_network(false), TransferMode::CloudCopy);
    }
}
