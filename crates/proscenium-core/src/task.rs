//! Supervised detached tasks.
//!
//! Fire-and-forget workflows (a transition kicked off from an input
//! handler, a timeout valve) run as detached tasks whose failures are
//! captured by a supervising boundary instead of vanishing. Errors are
//! logged at error level, panics are reported as panics, and cancellation
//! is distinguished from failure.

use std::fmt::Display;
use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Spawns `future` detached and supervises its outcome.
///
/// The returned handle joins the *supervisor*; dropping it detaches the
/// work, which is the intended use.
pub fn spawn_supervised<F, E>(name: impl Into<String>, future: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let name = name.into();
    let inner = tokio::spawn(future);
    tokio::spawn(async move {
        match inner.await {
            Ok(Ok(())) => debug!(task = %name, "detached task finished"),
            Ok(Err(err)) => error!(task = %name, error = %err, "detached task failed"),
            Err(join_err) if join_err.is_panic() => {
                error!(task = %name, "detached task panicked");
            }
            Err(_) => warn!(task = %name, "detached task cancelled"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::spawn_supervised;

    #[tokio::test]
    async fn supervisor_joins_after_success() {
        let handle = spawn_supervised("ok", async { Ok::<(), String>(()) });
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn supervisor_absorbs_errors() {
        let handle = spawn_supervised("fails", async { Err("boom".to_string()) });
        // The supervisor itself completes normally.
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn supervisor_absorbs_panics() {
        let handle = spawn_supervised("panics", async {
            panic!("boom");
            #[allow(unreachable_code)]
            Ok::<(), String>(())
        });
        handle.await.unwrap();
    }
}
