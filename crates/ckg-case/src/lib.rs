//! Case store for checker synthesis
//!
//! Holds the labeled test cases of one rule and everything the synthesis
//! loop needs to ask of them:
//! - Parsing PMD case-set documents into [`CaseSet`]
//! - Selecting the next negative case to bootstrap from
//! - Tracking candidate, skipped and passed cases in [`WorkingSets`]
//! - Publishing the active subset the harness will run
//!
//! # Example
//!
//! ```rust,ignore
//! use ckg_case::{CaseSet, WorkingSets, select_next_negative};
//!
//! let cases = CaseSet::load("AvoidUsingOctalValues.xml")?;
//! let mut sets = WorkingSets::new();
//! if let Some(anchor) = select_next_negative(cases.cases(), sets.skipped()) {
//!     sets.begin_attempt(anchor.id(), &cases);
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod case;
pub mod digest;
pub mod error;
pub mod store;
pub mod working;
pub mod xml;

pub use case::{
    count_all, count_negative, passed_cases_summary, select_next_negative, CaseId,
    CaseMembership, CaseSet, TestCase,
};
pub use digest::{DigestError, SourceDigest};
pub use error::CaseError;
pub use store::{publish_active_subset, ActiveSubset};
pub use working::WorkingSets;
pub use xml::{filter_case_document, single_case_document};

/// Insertion-ordered set of case ids
pub type CaseIdSet = indexmap::IndexSet<CaseId>;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with case sets
    pub use crate::{
        ActiveSubset, CaseError, CaseId, CaseIdSet, CaseSet, SourceDigest, TestCase, WorkingSets,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
