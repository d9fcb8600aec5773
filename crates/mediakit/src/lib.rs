//! # Mediakit
//!
//! Blocking client for Azure Media Services accounts.
//!
//! - [`MediaClient`]: token acquisition and Resource Manager calls for one account
//! - [`MediaCollection`] / [`MediaChildren`]: resource collections implementing
//!   the `converge` collection traits
//! - [`AccountTranslator`]: rewrites account-specific references in copied resources
//! - [`ContentCopier`]: moves asset blobs between the accounts' storage
//!
//! ## Example
//!
//! ```ignore
//! use mediakit::{ClientOptions, MediaClient, ResourceKind, TransformProperties};
//! use converge::Collection;
//!
//! let client = MediaClient::connect(&context, &ClientOptions::default())?;
//! let transforms = client.collection::<TransformProperties>(ResourceKind::Transform);
//! for transform in transforms.list_all()? {
//!     println!("{}", transform.name);
//! }
//! ```

pub mod account;
pub mod auth;
pub mod client;
pub mod collection;
pub mod error;
pub mod models;
pub mod retry;
pub mod storage;
pub mod translate;
pub mod types;

pub use account::{AccountContext, AccountInfo, AuthSettings};
pub use client::MediaClient;
pub use collection::{MediaChildren, MediaCollection};
pub use error::{Error, ErrorCategory, Result};
pub use models::*;
pub use storage::{AssetStorage, BlobItem, ContentCopier, TransferMode, TransferStats};
pub use translate::AccountTranslator;
pub use types::{ClientOptions, PollConfig, RetryConfig};
