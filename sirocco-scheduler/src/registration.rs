use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use sirocco_core::error::MailboxError;
use sirocco_core::identifiers::Address;
use sirocco_core::mailbox::Endpoint;
use tracing::{error, warn};

use crate::Cancelable;

type Deliver = Box<dyn FnMut() -> Result<(), MailboxError> + Send>;

/// Work performed when a registration fires.
pub enum ScheduledAction {
    /// Invoke a closure.
    Run(Box<dyn FnMut() + Send>),
    /// Deliver a message to an endpoint.
    Tell {
        /// Path of the receiving endpoint, for logs.
        receiver: String,
        /// Performs the delivery.
        deliver: Deliver,
    },
}

impl ScheduledAction {
    /// Wraps a closure.
    pub fn run<F>(f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::Run(Box::new(f))
    }

    /// Wraps a closure that runs at most once.
    pub fn once<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let mut f = Some(f);
        Self::Run(Box::new(move || {
            if let Some(f) = f.take() {
                f();
            }
        }))
    }

    /// Delivers `message` to `receiver` once.
    pub fn tell_once<M>(receiver: Arc<dyn Endpoint<M>>, message: M, sender: Option<Address>) -> Self
    where
        M: Send + 'static,
    {
        let path = receiver.path().to_string();
        let mut pending = Some((message, sender));
        Self::Tell {
            receiver: path,
            deliver: Box::new(move || match pending.take() {
                Some((message, sender)) => receiver.tell(message, sender),
                None => Ok(()),
            }),
        }
    }

    /// Delivers a clone of `message` to `receiver` every time it fires.
    pub fn tell_repeatedly<M>(
        receiver: Arc<dyn Endpoint<M>>,
        message: M,
        sender: Option<Address>,
    ) -> Self
    where
        M: Clone + Send + 'static,
    {
        let path = receiver.path().to_string();
        Self::Tell {
            receiver: path,
            deliver: Box::new(move || receiver.tell(message.clone(), sender.clone())),
        }
    }

    fn execute(&mut self) {
        match self {
            Self::Run(f) => f(),
            Self::Tell { receiver, deliver } => {
                if let Err(e) = deliver() {
                    warn!(
                        receiver = %receiver,
                        error = %e,
                        "Scheduled message could not be delivered"
                    );
                }
            }
        }
    }
}

impl fmt::Debug for ScheduledAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run(_) => f.write_str("Run(..)"),
            Self::Tell { receiver, .. } => write!(f, "Tell({receiver})"),
        }
    }
}

/// One scheduled action and its timing state.
///
/// Deadlines are measured in nanoseconds since the scheduler worker
/// started. A registration with a non-zero offset repeats.
#[derive(Debug)]
pub struct Registration {
    pub(crate) deadline: u64,
    pub(crate) offset: u64,
    pub(crate) remaining_rounds: u64,
    action: ScheduledAction,
    cancel: Cancelable,
}

impl Registration {
    pub(crate) fn new(
        deadline: u64,
        offset: u64,
        action: ScheduledAction,
        cancel: Cancelable,
    ) -> Self {
        Self {
            deadline,
            offset,
            remaining_rounds: 0,
            action,
            cancel,
        }
    }

    /// Deadline relative to scheduler start.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        Duration::from_nanos(self.deadline)
    }

    /// Repeat interval, if this registration repeats.
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        (self.offset > 0).then(|| Duration::from_nanos(self.offset))
    }

    /// Returns true if this registration repeats.
    #[must_use]
    pub fn is_repeating(&self) -> bool {
        self.offset > 0
    }

    /// Full wheel rotations left before the registration is due.
    #[must_use]
    pub fn remaining_rounds(&self) -> u64 {
        self.remaining_rounds
    }

    /// Returns true once the registration has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels the registration.
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    /// Runs the action once, containing any panic it raises.
    ///
    /// Returns false if the action panicked.
    pub fn run(&mut self) -> bool {
        let result = catch_unwind(AssertUnwindSafe(|| self.action.execute()));
        match result {
            Ok(()) => true,
            Err(e) => {
                let msg = e.downcast_ref::<&str>().map_or_else(
                    || {
                        e.downcast_ref::<String>()
                            .map_or_else(|| "Unknown panic".to_string(), ToString::to_string)
                    },
                    ToString::to_string,
                );
                error!(action = ?self.action, panic = %msg, "Scheduled action panicked");
                false
            }
        }
    }
}
