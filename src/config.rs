//! Scheduler configuration.
//!
//! A [`SchedulerConfig`] says which job backends the host offers, in what
//! order they are probed, and how large the job buffer starts out. Build one
//! with [`SchedulerConfig::builder`]; invalid combinations are rejected by
//! [`SchedulerConfigBuilder::build`] rather than at first use.
//!
//! ```
//! use promise_core::config::{BackendKind, SchedulerConfig};
//!
//! let config = SchedulerConfig::builder()
//!     .initial_capacity(16)
//!     .without_backend(BackendKind::Immediate)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.initial_capacity, 16);
//! ```

use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;

/// Buffer capacity hint used when none is configured.
pub const DEFAULT_CAPACITY: usize = 100;

/// Minimum delay of the timer backend when none is configured.
pub const DEFAULT_TIMER_MIN_DELAY: Duration = Duration::from_millis(1);

/// The closed set of job backends, listed in default probe order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Same-thread ready queue drained on the next turn.
    Immediate,
    /// Zero-delay emulation over a message channel and a handle table.
    MessageChannel,
    /// Tasks spawned onto a local single-threaded executor.
    LocalPool,
    /// Minimum-delay timer. Last resort.
    Timer,
}

impl BackendKind {
    /// Default probe order.
    pub const RANKED: [BackendKind; 4] = [
        BackendKind::Immediate,
        BackendKind::MessageChannel,
        BackendKind::LocalPool,
        BackendKind::Timer,
    ];
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Immediate => "immediate",
            BackendKind::MessageChannel => "message-channel",
            BackendKind::LocalPool => "local-pool",
            BackendKind::Timer => "timer",
        };
        f.write_str(name)
    }
}

/// Whether the host provides a backend's two primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPrimitives {
    pub schedule: bool,
    pub cancel: bool,
}

impl HostPrimitives {
    pub const AVAILABLE: HostPrimitives = HostPrimitives {
        schedule: true,
        cancel: true,
    };
    pub const MISSING: HostPrimitives = HostPrimitives {
        schedule: false,
        cancel: false,
    };

    /// A backend is only usable when it can both schedule and cancel.
    pub fn is_complete(&self) -> bool {
        self.schedule && self.cancel
    }
}

/// Primitive availability for every backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    pub immediate: HostPrimitives,
    pub message_channel: HostPrimitives,
    pub local_pool: HostPrimitives,
    pub timer: HostPrimitives,
}

impl HostCapabilities {
    pub fn get(&self, kind: BackendKind) -> HostPrimitives {
        match kind {
            BackendKind::Immediate => self.immediate,
            BackendKind::MessageChannel => self.message_channel,
            BackendKind::LocalPool => self.local_pool,
            BackendKind::Timer => self.timer,
        }
    }

    fn slot(&mut self, kind: BackendKind) -> &mut HostPrimitives {
        match kind {
            BackendKind::Immediate => &mut self.immediate,
            BackendKind::MessageChannel => &mut self.message_channel,
            BackendKind::LocalPool => &mut self.local_pool,
            BackendKind::Timer => &mut self.timer,
        }
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            immediate: HostPrimitives::AVAILABLE,
            message_channel: HostPrimitives::AVAILABLE,
            local_pool: HostPrimitives::AVAILABLE,
            timer: HostPrimitives::AVAILABLE,
        }
    }
}

/// Settings a [`Scheduler`](crate::Scheduler) is constructed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Starting capacity of the job buffer. The buffer doubles when full.
    pub initial_capacity: usize,

    /// Backends in the order they are probed.
    pub ranking: Vec<BackendKind>,

    /// Which primitives the host provides.
    pub host: HostCapabilities,

    /// Delay applied by the timer backend to every scheduled callback.
    pub timer_min_delay: Duration,
}

impl SchedulerConfig {
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            ranking: BackendKind::RANKED.to_vec(),
            host: HostCapabilities::default(),
            timer_min_delay: DEFAULT_TIMER_MIN_DELAY,
        }
    }
}

/// Builder for [`SchedulerConfig`].
#[derive(Debug, Default)]
pub struct SchedulerConfigBuilder {
    initial_capacity: Option<usize>,
    ranking: Option<Vec<BackendKind>>,
    host: HostCapabilities,
    timer_min_delay: Option<Duration>,
}

impl SchedulerConfigBuilder {
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = Some(capacity);
        self
    }

    /// Replace the probe order.
    pub fn ranking(mut self, ranking: impl IntoIterator<Item = BackendKind>) -> Self {
        self.ranking = Some(ranking.into_iter().collect());
        self
    }

    pub fn host_primitives(mut self, kind: BackendKind, primitives: HostPrimitives) -> Self {
        *self.host.slot(kind) = primitives;
        self
    }

    /// Mark both primitives of `kind` as missing on this host.
    pub fn without_backend(self, kind: BackendKind) -> Self {
        self.host_primitives(kind, HostPrimitives::MISSING)
    }

    pub fn timer_min_delay(mut self, delay: Duration) -> Self {
        self.timer_min_delay = Some(delay);
        self
    }

    pub fn build(self) -> Result<SchedulerConfig> {
        let initial_capacity = self.initial_capacity.unwrap_or(DEFAULT_CAPACITY);
        if initial_capacity == 0 {
            return Err(Error::Config(
                "initial_capacity must be at least 1".to_string(),
            ));
        }

        let ranking = self
            .ranking
            .unwrap_or_else(|| BackendKind::RANKED.to_vec());
        if ranking.is_empty() {
            return Err(Error::Config(
                "ranking must name at least one backend".to_string(),
            ));
        }
        for (i, kind) in ranking.iter().enumerate() {
            if ranking[..i].contains(kind) {
                return Err(Error::Config(format!(
                    "backend {kind} appears more than once in ranking"
                )));
            }
        }

        Ok(SchedulerConfig {
            initial_capacity,
            ranking,
            host: self.host,
            timer_min_delay: self.timer_min_delay.unwrap_or(DEFAULT_TIMER_MIN_DELAY),
        })
    }
}
