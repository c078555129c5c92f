//! Pass runner wiring the engine to the notification sink.

use crate::notify::Notifier;
use crate::store::{SourceStore, TargetStore};
use crate::sync::engine::Reconciler;
use crate::sync::error::PassAbortError;
use crate::sync::report::{abort_message, SyncReport};
use log::warn;

/// Runs one pass and sends its summary (or abort notice) to `notifier`.
///
/// Notification failures are logged and never change the pass result.
pub fn run_pass_and_notify<S, T, N>(
    engine: &mut Reconciler<S, T>,
    notifier: &N,
) -> Result<SyncReport, PassAbortError>
where
    S: SourceStore,
    T: TargetStore,
    N: Notifier + ?Sized,
{
    let result = engine.run_pass();
    let message = match &result {
        Ok(report) => report.summary_message(),
        Err(err) => abort_message(err),
    };

    if let Err(err) = notifier.notify(&message) {
        warn!(
            "event=notify module=sync status=error channel={} error={}",
            err.channel, err.message
        );
    }
    result
}
