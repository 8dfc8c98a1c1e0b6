//! User-id resolution.
//!
//! Pyrogram-shaped outputs carry the account's user id, which no Telethon file
//! stores. The only way to learn it is to log in with the key and ask
//! Telegram, which this crate does not do itself: callers inject a
//! [`UserIdResolver`] and the engine runs it under a deadline.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::config::DeviceInfo;
use crate::session::{ApiCredentials, AuthSession};

/// Everything a resolver gets to work with.
#[derive(Clone, Debug)]
pub struct ResolveRequest {
    pub session:     AuthSession,
    pub credentials: ApiCredentials,
    pub device:      DeviceInfo,
}

/// A resolver could not produce a user id.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ResolveError(pub String);

impl ResolveError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Looks up the user id behind an authorized session.
///
/// Implementations may block (network login); the engine calls them from a
/// helper thread.
pub trait UserIdResolver: Send + Sync + 'static {
    fn resolve_user_id(&self, request: &ResolveRequest) -> Result<i64, ResolveError>;
}

impl<F> UserIdResolver for F
where
    F: Fn(&ResolveRequest) -> Result<i64, ResolveError> + Send + Sync + 'static,
{
    fn resolve_user_id(&self, request: &ResolveRequest) -> Result<i64, ResolveError> {
        self(request)
    }
}

/// Outcome of a bounded resolver call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Resolved(i64),
    Failed(ResolveError),
    TimedOut,
}

/// Run `resolver` on a helper thread and wait at most `timeout`.
///
/// On timeout the thread is left to finish on its own; its result is dropped.
pub fn resolve_with_timeout(
    resolver: Arc<dyn UserIdResolver>,
    request: ResolveRequest,
    timeout: Duration,
) -> Resolution {
    let (tx, rx) = mpsc::sync_channel(1);
    let spawned = thread::Builder::new()
        .name("tgconv-resolver".into())
        .spawn(move || {
            // The receiver is gone after a timeout.
            let _ = tx.send(resolver.resolve_user_id(&request));
        });
    if let Err(e) = spawned {
        return Resolution::Failed(ResolveError::new(format!("cannot spawn resolver thread: {e}")));
    }

    match rx.recv_timeout(timeout) {
        Ok(Ok(id)) => Resolution::Resolved(id),
        Ok(Err(e)) => Resolution::Failed(e),
        Err(mpsc::RecvTimeoutError::Timeout) => Resolution::TimedOut,
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Resolution::Failed(ResolveError::new("resolver panicked"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ResolveRequest {
        ResolveRequest {
            session:     AuthSession::builder(1, vec![0; 256]).build().unwrap(),
            credentials: ApiCredentials::new(1, "h"),
            device:      DeviceInfo::default(),
        }
    }

    fn resolver(
        f: impl Fn(&ResolveRequest) -> Result<i64, ResolveError> + Send + Sync + 'static,
    ) -> Arc<dyn UserIdResolver> {
        Arc::new(f)
    }

    #[test]
    fn resolved() {
        let r = resolver(|_| Ok(42));
        assert_eq!(resolve_with_timeout(r, request(), Duration::from_secs(5)), Resolution::Resolved(42));
    }

    #[test]
    fn failed() {
        let r = resolver(|_| Err(ResolveError::new("no network")));
        assert_eq!(
            resolve_with_timeout(r, request(), Duration::from_secs(5)),
            Resolution::Failed(ResolveError::new("no network"))
        );
    }

    #[test]
    fn timed_out() {
        let r = resolver(|_| {
            thread::sleep(Duration::from_millis(500));
            Ok(1)
        });
        assert_eq!(resolve_with_timeout(r, request(), Duration::from_millis(20)), Resolution::TimedOut);
    }

    #[test]
    fn panicking_resolver_is_a_failure() {
        let r = resolver(|_| panic!("boom"));
        assert!(matches!(
            resolve_with_timeout(r, request(), Duration::from_secs(5)),
            Resolution::Failed(_)
        ));
    }
}
