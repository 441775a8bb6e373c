// -
// Stream names

/// Composite stream: operational and configuration partitions
pub const YANG_PUSH_STREAM: &str = "YANG-PUSH";
pub const CONFIGURATION_STREAM: &str = "CONFIGURATION";
pub const OPERATIONAL_STREAM: &str = "OPERATIONAL";

// -
// Subscription mirror layout

/// Container holding every mirrored subscription record
pub(crate) const MIRROR_CONTAINER: &str = "subscriptions";

/// Leaf names of a mirrored subscription record
pub(crate) const MIRROR_LEAF_ID: &str = "subscription-id";
pub(crate) const MIRROR_LEAF_STREAM: &str = "stream";
pub(crate) const MIRROR_LEAF_ENCODING: &str = "encoding";
pub(crate) const MIRROR_LEAF_MODE: &str = "update-trigger";
pub(crate) const MIRROR_LEAF_START_TIME: &str = "start-time";
pub(crate) const MIRROR_LEAF_STOP_TIME: &str = "stop-time";
pub(crate) const MIRROR_LEAF_STATUS: &str = "subscription-status";
