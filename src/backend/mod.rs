//! Job backends: host primitives that run a callback "soon" and can retract
//! a scheduled callback.
//!
//! Every backend implements [`JobBackend`]. The set of backends is closed and
//! wrapped in the [`Backend`] enum; a [`Scheduler`](crate::Scheduler) probes
//! them once, in ranked order, and keeps the first supported one.
//!
//! Backends never run a callback from inside `schedule`. Callbacks run only
//! when the owner drives the backend with [`JobBackend::run_once`].

mod channel;
mod immediate;
mod local_pool;
mod timer;

pub use channel::ChannelBackend;
pub use immediate::ImmediateBackend;
pub use local_pool::LocalPoolBackend;
pub use timer::TimerBackend;

use crate::config::{BackendKind, SchedulerConfig};

/// A callback handed to a backend.
pub type Callback = Box<dyn FnOnce()>;

/// Backend-issued handle for a scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub(crate) u64);

/// The capability interface shared by all backends.
pub trait JobBackend {
    /// Both primitives exist on this host.
    fn is_supported(&self) -> bool;

    /// Arrange for `callback` to run on a later turn.
    fn schedule(&self, callback: Callback) -> Token;

    /// Retract a callback. Unknown or already-run tokens are ignored.
    fn cancel(&self, token: Token);

    /// Run the callbacks that are due, returning how many ran.
    fn run_once(&self) -> usize;

    /// Whether any scheduled callback is still outstanding.
    fn has_pending(&self) -> bool;
}

/// The closed set of backend variants.
pub enum Backend {
    Immediate(ImmediateBackend),
    MessageChannel(ChannelBackend),
    LocalPool(LocalPoolBackend),
    Timer(TimerBackend),
}

impl Backend {
    /// Build the backend of `kind` against the host described by `config`.
    pub fn probe(kind: BackendKind, config: &SchedulerConfig) -> Self {
        let primitives = config.host.get(kind);
        match kind {
            BackendKind::Immediate => Backend::Immediate(ImmediateBackend::new(primitives)),
            BackendKind::MessageChannel => {
                Backend::MessageChannel(ChannelBackend::new(primitives))
            }
            BackendKind::LocalPool => Backend::LocalPool(LocalPoolBackend::new(primitives)),
            BackendKind::Timer => {
                Backend::Timer(TimerBackend::new(primitives, config.timer_min_delay))
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Immediate(_) => BackendKind::Immediate,
            Backend::MessageChannel(_) => BackendKind::MessageChannel,
            Backend::LocalPool(_) => BackendKind::LocalPool,
            Backend::Timer(_) => BackendKind::Timer,
        }
    }

    fn inner(&self) -> &dyn JobBackend {
        match self {
            Backend::Immediate(b) => b,
            Backend::MessageChannel(b) => b,
            Backend::LocalPool(b) => b,
            Backend::Timer(b) => b,
        }
    }
}

impl JobBackend for Backend {
    fn is_supported(&self) -> bool {
        self.inner().is_supported()
    }

    fn schedule(&self, callback: Callback) -> Token {
        self.inner().schedule(callback)
    }

    fn cancel(&self, token: Token) {
        self.inner().cancel(token)
    }

    fn run_once(&self) -> usize {
        self.inner().run_once()
    }

    fn has_pending(&self) -> bool {
        self.inner().has_pending()
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("kind", &self.kind())
            .field("supported", &self.is_supported())
            .finish()
    }
}
