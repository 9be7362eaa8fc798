//! CKG Backends - production capability adapters
//!
//! Concrete implementations of the capability traits in `ckg-core`:
//! - [`OpenAiOracle`]: chat-completions code oracle over HTTP
//! - [`OpenAiEmbedder`]: embeddings-model backend for the retrieval index
//! - [`JarAstExtractor`]: AST extraction and syntax validation through the
//!   parser jar
//! - [`MavenHarness`]: checker staging, case publication, compile and test
//!   runs in the target Maven project
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ckg_backends::prelude::*;
//! use ckg_core::{Capabilities, MavenDiagnosticParser};
//!
//! let caps = Capabilities {
//!     oracle: Arc::new(OpenAiOracle::from_env(OracleSettings::default())?),
//!     extractor: Arc::new(JarAstExtractor::new("tool/ast.jar", "tool/work")),
//!     harness: Arc::new(MavenHarness::for_rule("pmd-java", &rule)),
//!     diagnostics: Arc::new(MavenDiagnosticParser),
//! };
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod ast;
pub mod embedder;
pub mod maven;
pub mod oracle;
pub mod process;

pub use ast::{parse_ast_output, JarAstExtractor};
pub use embedder::{EmbeddingSettings, OpenAiEmbedder, DEFAULT_EMBEDDINGS_ENDPOINT};
pub use maven::MavenHarness;
pub use oracle::{OpenAiOracle, OracleSettings, DEFAULT_API_KEY_ENV, DEFAULT_ENDPOINT};
pub use process::{run_tool, ToolRun};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for wiring production capabilities
    pub use crate::{
        EmbeddingSettings, JarAstExtractor, MavenHarness, OpenAiEmbedder, OpenAiOracle,
        OracleSettings,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
