use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use std::time::SystemTime;

use serde::Deserialize;
use serde::Serialize;

use super::Datastore;
use super::FilterSpec;
use crate::constants::CONFIGURATION_STREAM;
use crate::constants::OPERATIONAL_STREAM;
use crate::constants::YANG_PUSH_STREAM;
use crate::Result;
use crate::SubscriptionError;

/// Data set a subscription targets.
///
/// `YangPush` is the composite stream: every read fans out into one read
/// per partition, each producing its own notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    YangPush,
    Configuration,
    Operational,
}

impl Stream {
    /// Partitions read for this stream, in emission order.
    pub fn partitions(&self) -> &'static [Datastore] {
        match self {
            Stream::YangPush => &[Datastore::Operational, Datastore::Configuration],
            Stream::Configuration => &[Datastore::Configuration],
            Stream::Operational => &[Datastore::Operational],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::YangPush => YANG_PUSH_STREAM,
            Stream::Configuration => CONFIGURATION_STREAM,
            Stream::Operational => OPERATIONAL_STREAM,
        }
    }
}

impl FromStr for Stream {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            YANG_PUSH_STREAM => Ok(Stream::YangPush),
            CONFIGURATION_STREAM => Ok(Stream::Configuration),
            OPERATIONAL_STREAM => Ok(Stream::Operational),
            other => Err(SubscriptionError::UnknownStream(other.to_string())),
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Update trigger of a subscription. Fixed once established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionMode {
    Periodic {
        period: Duration,
        /// Stored but not used for phase alignment.
        anchor_time: Option<SystemTime>,
    },
    OnChange {
        dampening_period: Duration,
        no_initial_sync: bool,
    },
}

impl SubscriptionMode {
    pub fn name(&self) -> &'static str {
        match self {
            SubscriptionMode::Periodic { .. } => "periodic",
            SubscriptionMode::OnChange { .. } => "on-change",
        }
    }

    pub fn is_periodic(&self) -> bool {
        matches!(self, SubscriptionMode::Periodic { .. })
    }
}

/// Streaming status, consulted before every delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Active,
    Suspended,
    Terminated,
}

impl StreamStatus {
    pub const ALL: &'static [StreamStatus] = &[
        StreamStatus::Active,
        StreamStatus::Suspended,
        StreamStatus::Terminated,
    ];
}

impl fmt::Display for StreamStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            StreamStatus::Active => write!(f, "active"),
            StreamStatus::Suspended => write!(f, "suspended"),
            StreamStatus::Terminated => write!(f, "terminated"),
        }
    }
}

/// Encoding requested by the subscriber. Carried and mirrored only; the
/// transport owns the actual wire encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Xml,
    #[default]
    Json,
}

impl fmt::Display for Encoding {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Encoding::Xml => write!(f, "encode-xml"),
            Encoding::Json => write!(f, "encode-json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: String,
    /// Raw stream name as requested; resolved with [`Stream::from_str`] on
    /// every trigger so an unsupported name only aborts that cycle.
    pub stream: String,
    pub mode: SubscriptionMode,
    pub start_time: Option<SystemTime>,
    pub stop_time: Option<SystemTime>,
    pub filter: Option<FilterSpec>,
    pub encoding: Encoding,
    pub status: StreamStatus,
}

impl Subscription {
    pub fn periodic(
        id: impl Into<String>,
        stream: impl Into<String>,
        period: Duration,
    ) -> Self {
        Self::new(
            id,
            stream,
            SubscriptionMode::Periodic {
                period,
                anchor_time: None,
            },
        )
    }

    pub fn on_change(
        id: impl Into<String>,
        stream: impl Into<String>,
        dampening_period: Duration,
        no_initial_sync: bool,
    ) -> Self {
        Self::new(
            id,
            stream,
            SubscriptionMode::OnChange {
                dampening_period,
                no_initial_sync,
            },
        )
    }

    fn new(
        id: impl Into<String>,
        stream: impl Into<String>,
        mode: SubscriptionMode,
    ) -> Self {
        Self {
            id: id.into(),
            stream: stream.into(),
            mode,
            start_time: None,
            stop_time: None,
            filter: None,
            encoding: Encoding::default(),
            status: StreamStatus::Active,
        }
    }

    pub fn with_start_time(
        mut self,
        start_time: SystemTime,
    ) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_stop_time(
        mut self,
        stop_time: SystemTime,
    ) -> Self {
        self.stop_time = Some(stop_time);
        self
    }

    pub fn with_filter(
        mut self,
        filter: FilterSpec,
    ) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_encoding(
        mut self,
        encoding: Encoding,
    ) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_status(
        mut self,
        status: StreamStatus,
    ) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == StreamStatus::Active
    }

    /// Rejects zero cadences and inverted delivery windows.
    pub fn validate(&self) -> Result<()> {
        let zero = match &self.mode {
            SubscriptionMode::Periodic { period, .. } => period.is_zero(),
            SubscriptionMode::OnChange { .. } => false,
        };
        if zero {
            return Err(SubscriptionError::InvalidPeriod { id: self.id.clone() }.into());
        }

        if let (Some(start), Some(stop)) = (self.start_time, self.stop_time) {
            if stop < start {
                return Err(SubscriptionError::InvalidTimeWindow { id: self.id.clone() }.into());
            }
        }
        Ok(())
    }
}
