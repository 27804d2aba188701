//! The "current session" capability.
//!
//! Views that care about the running kernel (the toolbar countdown, the
//! (Re)Start action of the dialog) receive a [`SessionContext`] explicitly
//! instead of reaching for global state.

use std::fmt;

use tokio::sync::watch;

use crate::models::SLURM_KERNEL_NAME;

/// Kernel currently attached to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Connected,
    Connecting,
    #[default]
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connected => "connected",
            Self::Connecting => "connecting",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

pub trait SessionContext: Send + Sync {
    fn current_kernel_name(&self) -> Option<String>;

    fn current_kernel_id(&self) -> Option<String>;

    /// Fires whenever the session switches kernels.
    fn kernel_changed(&self) -> watch::Receiver<Option<KernelRef>>;

    fn connection_status_changed(&self) -> watch::Receiver<ConnectionStatus>;

    /// Switch the session to the kernel spec `name`.
    fn change_kernel(&self, name: &str);
}

/// Session state held locally and published over watch channels.
#[derive(Debug)]
pub struct LocalSession {
    kernel: watch::Sender<Option<KernelRef>>,
    status: watch::Sender<ConnectionStatus>,
}

impl LocalSession {
    #[must_use]
    pub fn new(kernel: Option<KernelRef>) -> Self {
        let status = if kernel.is_some() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };
        Self {
            kernel: watch::Sender::new(kernel),
            status: watch::Sender::new(status),
        }
    }

    /// Record the kernel the session now runs (e.g. after a restart).
    pub fn set_kernel(&self, kernel: Option<KernelRef>) {
        self.kernel.send_if_modified(|current| {
            if *current == kernel {
                return false;
            }
            *current = kernel;
            true
        });
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            let changed = *current != status;
            *current = status;
            changed
        });
    }
}

impl SessionContext for LocalSession {
    fn current_kernel_name(&self) -> Option<String> {
        self.kernel.borrow().as_ref().map(|k| k.name.clone())
    }

    fn current_kernel_id(&self) -> Option<String> {
        self.kernel
            .borrow()
            .as_ref()
            .filter(|k| !k.id.is_empty())
            .map(|k| k.id.clone())
    }

    fn kernel_changed(&self) -> watch::Receiver<Option<KernelRef>> {
        self.kernel.subscribe()
    }

    fn connection_status_changed(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// The new kernel's id is not known here; it stays empty until the
    /// owner records it with [`LocalSession::set_kernel`].
    fn change_kernel(&self, name: &str) {
        tracing::info!(kernel = %name, "changing session kernel");
        self.set_status(ConnectionStatus::Connecting);
        self.set_kernel(Some(KernelRef {
            id: String::new(),
            name: name.to_string(),
        }));
        self.set_status(ConnectionStatus::Connected);
    }
}

/// After a (Re)Start submit, move the session onto the Slurm kernel.
///
/// Returns whether a kernel change was requested.
pub fn ensure_slurm_kernel(session: &dyn SessionContext) -> bool {
    if session.current_kernel_name().as_deref() == Some(SLURM_KERNEL_NAME) {
        return false;
    }
    session.change_kernel(SLURM_KERNEL_NAME);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_session() -> LocalSession {
        LocalSession::new(Some(KernelRef {
            id: "k-1".to_string(),
            name: "python3".to_string(),
        }))
    }

    #[test]
    fn test_ensure_slurm_kernel_switches_once() {
        let session = python_session();
        let mut changes = session.kernel_changed();
        changes.borrow_and_update();

        assert!(ensure_slurm_kernel(&session));
        assert!(changes.has_changed().unwrap());
        assert_eq!(session.current_kernel_name().as_deref(), Some(SLURM_KERNEL_NAME));
        // the old kernel's id does not carry over to the new kernel
        assert_eq!(session.current_kernel_id(), None);
        assert_eq!(
            *session.connection_status_changed().borrow(),
            ConnectionStatus::Connected
        );

        assert!(!ensure_slurm_kernel(&session));
    }

    #[test]
    fn test_recorded_id_after_kernel_change() {
        let session = python_session();
        session.change_kernel(SLURM_KERNEL_NAME);
        session.set_kernel(Some(KernelRef {
            id: "k-2".to_string(),
            name: SLURM_KERNEL_NAME.to_string(),
        }));
        assert_eq!(session.current_kernel_id().as_deref(), Some("k-2"));
    }

    #[test]
    fn test_set_kernel_only_notifies_on_change() {
        let session = python_session();
        let mut changes = session.kernel_changed();
        changes.borrow_and_update();

        session.set_kernel(Some(KernelRef {
            id: "k-1".to_string(),
            name: "python3".to_string(),
        }));
        assert!(!changes.has_changed().unwrap());

        session.set_kernel(None);
        assert!(changes.has_changed().unwrap());
        assert_eq!(session.current_kernel_id(), None);
    }

    #[test]
    fn test_new_session_status() {
        assert_eq!(
            *LocalSession::new(None).connection_status_changed().borrow(),
            ConnectionStatus::Disconnected
        );
        assert_eq!(
            *python_session().connection_status_changed().borrow(),
            ConnectionStatus::Connected
        );
    }
}
