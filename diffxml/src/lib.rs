//! XML diffing based on fmes.
//!
//! diffxml provides:
//! - **Parsing**: XML text to [`fmes::Document`] via quick-xml
//! - **Diffing**: insert/delete/move edit scripts addressed by XPath
//! - **Serialization**: documents and deltas back to XML
//!
//! # Example
//!
//! ```rust
//! use diffxml::{DiffOptions, diff_xml_to_string};
//!
//! let delta = diff_xml_to_string(
//!     "<list><item>a</item></list>",
//!     "<list><item>a</item><item>b</item></list>",
//!     &DiffOptions::default(),
//! )
//! .unwrap();
//! assert!(delta.contains(r#"<insert parent="/node()[1]" nodetype="1" childno="2" name="item"/>"#));
//! assert!(delta.contains(r#"<insert parent="/node()[1]/node()[2]" nodetype="3" childno="1">b</insert>"#));
//! ```

use std::path::Path;

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

mod error;
mod parser;
pub mod serialize;

pub use error::{Error, Result};
pub use fmes::{Delta, DeltaOp, DiffConfig, Document};
pub use parser::{ParseOptions, parse_file, parse_str};
pub use serialize::{write_delta, write_document};

/// Parsing and diffing settings for the one-call entry points.
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    pub parse: ParseOptions,
    pub diff: DiffConfig,
}

/// Diff two parsed documents. `old` is mutated into a copy of `new`.
pub fn diff_documents(
    old: &mut Document,
    new: &mut Document,
    options: &DiffOptions,
) -> Result<Delta> {
    let delta = fmes::diff_documents(old, new, &options.diff)?;
    debug!(
        ops = delta.len(),
        dummy_root = delta.dummy_root(),
        "diff_documents done"
    );
    Ok(delta)
}

/// Parse both inputs and compute the delta from `old` to `new`.
pub fn diff_xml(old: &str, new: &str, options: &DiffOptions) -> Result<Delta> {
    let mut old_doc = parse_str(old, &options.parse)?;
    let mut new_doc = parse_str(new, &options.parse)?;
    diff_documents(&mut old_doc, &mut new_doc, options)
}

/// [`diff_xml`], rendered with [`write_delta`].
pub fn diff_xml_to_string(old: &str, new: &str, options: &DiffOptions) -> Result<String> {
    write_delta(&diff_xml(old, new, options)?)
}

/// Parse two files and compute the delta between them.
pub fn diff_files<P: AsRef<Path>, Q: AsRef<Path>>(
    old: P,
    new: Q,
    options: &DiffOptions,
) -> Result<Delta> {
    let mut old_doc = parse_file(old, &options.parse)?;
    let mut new_doc = parse_file(new, &options.parse)?;
    diff_documents(&mut old_doc, &mut new_doc, options)
}
