//! Regulatory reference-table indexing and applicability filtering.
//!
//! `RuleIndex` parses the semicolon-delimited BDCstatut table into a
//! per-taxon rule list; `relevant_rules` narrows a taxon's rules down to
//! those that apply at a resolved department/region and survive the
//! non-patrimonial exclusions.

mod filter;
mod index;

pub use filter::relevant_rules;
pub use index::{RuleIndex, RuleTableError};
