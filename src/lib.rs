//! # Showcase Images
//!
//! Image resolution rules for the showcase site: model profiles, gallery slots, blog covers.
//!
//!
//!
//! # General Flow
//! - Content records hand the frontend up to three candidates per image slot (local, external, placeholder)
//! - Resolver picks one candidate using the current preference, skipping anything malformed
//! - Annotator optionally appends a freshness token when the URL points at our own storage
//! - Browser fetches either straight from the storage CDN or through the delivery proxy (`/api/i/{key}`)
//! - Sync function is run out-of-band by admins to copy an external image into the local cache area
//!
//!
//!
//! # Notes
//!
//! ## Preference
//! One boolean decides whether local copies win over external URLs. It lives behind an injectable
//! key-value store instead of ambient browser storage so the resolver can be tested without stubs.
//! Reads never write. Seeding the default is an explicit `initialize_with_default` call at startup.
//!
//! ## Cache-busting
//! Two kinds of token:
//! - **Stable** `v=` token, last-modified time of the owning content record. Only changes when the record changes.
//! - **Unstable** `t=` + `cb=` token for mobile clients that were seen serving stale bytes. Defeats caching entirely.
//!
//! Mobile detection is a best-effort user-agent match done once at the edge, then passed down as [`ClientContext`].
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```

pub mod cache_bust;
pub mod candidates;
pub mod client;
pub mod content_type;
pub mod preference;
pub mod resolver;

pub use cache_bust::{AnnotateOptions, Annotator, CacheToken, ContentRef, VersionLookup};
pub use candidates::{ImageCandidateSet, is_well_formed};
pub use client::ClientContext;
pub use preference::{FileStore, ImagePreference, KeyValueStore, MemoryStore, PreferenceStore};
pub use resolver::resolve;
