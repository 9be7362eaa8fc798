//! Semantic retrieval of checker implementation fragments
//!
//! Resolves natural-language checking steps in two tiers:
//! - A curated meta-operation catalog, trusted only above a similarity threshold
//! - A broader API catalog scoped to the structural node kinds in play
//!
//! # Example
//!
//! ```rust,ignore
//! use ckg_retrieval::prelude::*;
//! use std::sync::Arc;
//!
//! let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
//! let meta = MetaIndex::build(load_meta_catalog(meta_path)?, embedder.as_ref())?;
//! let api = ApiIndex::build(load_api_catalog(api_path)?, embedder.as_ref())?;
//! let mut index = RetrievalIndex::new(Arc::new(meta), api, embedder, RetrievalConfig::default());
//!
//! index.register_kinds(&["NumericLiteral"])?;
//! let evidence = Evidence::gather(&index, &steps, &["NumericLiteral"])?;
//! println!("{}", evidence.render_apis());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod api;
pub mod catalog;
pub mod embed;
pub mod error;
pub mod evidence;
pub mod index;
pub mod meta;

pub use api::ApiIndex;
pub use catalog::{
    load_api_catalog, load_meta_catalog, parse_api_catalog, parse_meta_catalog, ApiClass,
    ApiMethod, CatalogEntry, EntryKind,
};
pub use embed::{cosine_similarity, Embedder, Embedding, HashingEmbedder};
pub use error::RetrievalError;
pub use evidence::{strip_api_comment, Evidence};
pub use index::{Resolution, RetrievalConfig, RetrievalIndex, Tier};
pub use meta::{MetaIndex, RetrievalHit, DEFAULT_META_THRESHOLD};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for retrieval
    pub use crate::{
        load_api_catalog, load_meta_catalog, ApiIndex, CatalogEntry, Embedder, Evidence,
        HashingEmbedder, MetaIndex, RetrievalConfig, RetrievalIndex, Tier,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
