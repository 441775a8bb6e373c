//! Notification composition
//!
//! Turns a raw subtree snapshot into an immutable [`Notification`]:
//!
//! ```text
//! DataNode ──► DocumentWriter ──► Document ──► SubtreeFilter ──► Notification
//!                  │ error                          │ no match / error
//!                  ▼                                ▼
//!            empty document                 unfiltered document
//! ```
//!
//! Composition never fails: a subscriber always receives some signal
//! rather than silence when serialization or filtering goes wrong.

use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::DocumentWriter;
use crate::metrics::DELIVERY_FAILURES;
use crate::metrics::FILTER_FALLBACKS;
use crate::DataNode;
use crate::Document;
use crate::FilterSpec;
use crate::Notification;
use crate::NotificationPayload;
use crate::OamStatus;
use crate::SubtreeFilter;

/// Which update notification a data-carrying trigger produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Periodic,
    OnChange,
}

#[derive(Clone)]
pub struct NotificationComposer {
    writer: Arc<dyn DocumentWriter>,
    filter: Option<Arc<dyn SubtreeFilter>>,
}

impl NotificationComposer {
    pub fn new(
        writer: Arc<dyn DocumentWriter>,
        filter: Option<Arc<dyn SubtreeFilter>>,
    ) -> Self {
        Self { writer, filter }
    }

    pub fn compose(
        &self,
        kind: UpdateKind,
        raw: Option<&DataNode>,
        filter: Option<&FilterSpec>,
        subscription_id: &str,
    ) -> Notification {
        let document = self.serialize(raw, subscription_id);
        let document = match filter {
            Some(spec) => self.apply_filter(spec, document, subscription_id),
            None => document,
        };

        let payload = match kind {
            UpdateKind::Periodic => NotificationPayload::PeriodicUpdate(document),
            UpdateKind::OnChange => NotificationPayload::OnChangeUpdate(document),
        };
        Notification::new(subscription_id, payload)
    }

    /// Builds an OAM notification. `reason` is dropped unless the status
    /// is a suspension or termination.
    pub fn compose_oam(
        &self,
        subscription_id: &str,
        status: OamStatus,
        reason: Option<&str>,
    ) -> Notification {
        let reason = if status.carries_reason() {
            reason.map(str::to_string)
        } else {
            None
        };
        Notification::new(subscription_id, NotificationPayload::OamStatus { status, reason })
    }

    fn serialize(
        &self,
        raw: Option<&DataNode>,
        subscription_id: &str,
    ) -> Document {
        match self.writer.write(raw) {
            Ok(document) => {
                debug!(subscription_id, "data transformed to document");
                document
            }
            Err(e) => {
                warn!(
                    subscription_id,
                    "transforming data tree to document failed, sending empty document: {:?}", e
                );
                DELIVERY_FAILURES.with_label_values(&["serialize"]).inc();
                Document::empty()
            }
        }
    }

    fn apply_filter(
        &self,
        spec: &FilterSpec,
        document: Document,
        subscription_id: &str,
    ) -> Document {
        let Some(filter) = &self.filter else {
            warn!(
                subscription_id,
                "subtree filter set but no filter evaluator configured, proceeding with unfiltered content"
            );
            FILTER_FALLBACKS.with_label_values(&["unavailable"]).inc();
            return document;
        };

        match filter.apply(spec, &document) {
            Ok(Some(filtered)) => filtered,
            Ok(None) => {
                warn!(
                    subscription_id,
                    "no match for subtree filter, proceeding with unfiltered content"
                );
                FILTER_FALLBACKS.with_label_values(&["no_match"]).inc();
                document
            }
            Err(e) => {
                warn!(
                    subscription_id,
                    "applying subtree filter failed, proceeding with unfiltered content: {:?}", e
                );
                FILTER_FALLBACKS.with_label_values(&["error"]).inc();
                document
            }
        }
    }
}
