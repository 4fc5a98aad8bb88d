//! Error Manager
//! Routes errors to the user-visible notifier

use std::rc::Rc;

use crate::error::{ErrorSeverity, RoamError};
use crate::notification::Notifier;

/// Manages errors and their presentation to the user
#[derive(Clone)]
pub struct ErrorManager {
    notifier: Rc<dyn Notifier>,
}

impl ErrorManager {
    /// Create a new error manager reporting through `notifier`
    #[must_use]
    pub fn new(notifier: Rc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Report an error. Never fails and never propagates.
    pub fn handle(&self, err: &RoamError) {
        match err.severity {
            ErrorSeverity::Critical => {
                tracing::error!(code = %err.code, kind = %err.kind, "{}", err.message);
                self.notifier.notify(&err.message, true, &err.kind.to_string());
            }
            ErrorSeverity::Error => {
                tracing::warn!(code = %err.code, kind = %err.kind, "{}", err.message);
                self.notifier.notify(&err.message, false, &err.kind.to_string());
            }
            ErrorSeverity::Warning | ErrorSeverity::Info => {
                tracing::info!(code = %err.code, kind = %err.kind, "{}", err.message);
                self.notifier.notify(&err.message, false, "");
            }
        }
    }

    /// Report a failure with a short context prefix, e.g. the command name
    pub fn report(&self, context: &str, err: &RoamError) {
        let scoped = RoamError {
            message: format!("{context}: {}", err.message),
            ..err.clone()
        };
        self.handle(&scoped);
    }

    /// The notifier errors are routed to
    #[must_use]
    pub fn notifier(&self) -> &Rc<dyn Notifier> {
        &self.notifier
    }
}
