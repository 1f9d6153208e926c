//! One-shot result delivery to the embedding host.

use std::sync::Mutex;

use tracing::debug;

use crate::error::MobileError;

/// Host-supplied notification target for one readiness milestone.
///
/// Exactly one of the two methods is invoked, exactly once, per milestone.
pub trait Callback: Send + 'static {
    /// The milestone was reached. `payload` is empty today.
    fn on_response(&self, payload: Vec<u8>);

    /// The operation gating the milestone failed.
    fn on_error(&self, error: MobileError);
}

/// Wraps a [`Callback`] so racing branches can each attempt terminal
/// notification while only the first attempt is delivered.
pub(crate) struct OnceCallback<C> {
    milestone: &'static str,
    inner: Mutex<Option<C>>,
}

impl<C: Callback> OnceCallback<C> {
    pub(crate) fn new(milestone: &'static str, callback: C) -> Self {
        Self {
            milestone,
            inner: Mutex::new(Some(callback)),
        }
    }

    pub(crate) fn resolve(&self, payload: Vec<u8>) {
        match self.take() {
            Some(callback) => callback.on_response(payload),
            None => debug!(milestone = self.milestone, "callback already delivered"),
        }
    }

    pub(crate) fn reject(&self, error: MobileError) {
        match self.take() {
            Some(callback) => callback.on_error(error),
            None => debug!(
                milestone = self.milestone,
                error = %error,
                "late error after callback delivery"
            ),
        }
    }

    fn take(&self) -> Option<C> {
        self.inner.lock().expect("callback slot poisoned").take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DaemonError;
    use std::sync::mpsc;

    struct Recording(mpsc::Sender<Result<Vec<u8>, String>>);

    impl Callback for Recording {
        fn on_response(&self, payload: Vec<u8>) {
            self.0.send(Ok(payload)).unwrap();
        }

        fn on_error(&self, error: MobileError) {
            self.0.send(Err(error.to_string())).unwrap();
        }
    }

    #[test]
    fn delivers_at_most_once() {
        let (tx, rx) = mpsc::channel();
        let slot = OnceCallback::new("rpc", Recording(tx));

        slot.resolve(Vec::new());
        slot.reject(MobileError::Daemon(DaemonError::Startup("late".into())));

        assert_eq!(rx.try_recv().unwrap(), Ok(Vec::new()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn error_path_counts_as_delivery() {
        let (tx, rx) = mpsc::channel();
        let slot = OnceCallback::new("rpc", Recording(tx));

        slot.reject(MobileError::Daemon(DaemonError::Startup("boom".into())));
        slot.resolve(Vec::new());

        assert!(rx.try_recv().unwrap().is_err());
        assert!(rx.try_recv().is_err());
    }
}
