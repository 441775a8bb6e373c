//! Subtree filter collaborator.
//!
//! The filter expression language is owned by the implementation; the
//! engine only distinguishes a match, a miss and an evaluation error.

#[cfg(test)]
use mockall::automock;

use crate::Document;
use crate::FilterSpec;
use crate::Result;

#[cfg_attr(test, automock)]
pub trait SubtreeFilter: Send + Sync + 'static {
    /// Returns the filtered document, or `Ok(None)` when nothing matches.
    ///
    /// # Errors
    /// [`FilterError`](crate::FilterError) for a malformed filter or a
    /// document the filter cannot be evaluated against.
    fn apply(
        &self,
        filter: &FilterSpec,
        document: &Document,
    ) -> Result<Option<Document>>;
}
