//! Real-time BlueZ object monitoring.
//!
//! Waits on the merged `InterfacesAdded` / `InterfacesRemoved` /
//! `PropertiesChanged` stream and runs a handler once per burst of signals.
//! BlueZ tends to emit several property changes back to back (for example
//! `Connected`, `ServicesResolved` and `RSSI` on a connect), so signals that
//! are already queued when the handler is about to run are folded into the
//! same call.

use futures::stream::{BoxStream, StreamExt};
use futures::{FutureExt, select};
use log::{debug, warn};
use std::future::Future;
use std::pin::pin;
use tokio::sync::watch;

use crate::Result;
use crate::api::models::BluetoothError;

/// Runs `on_change` for every burst of BlueZ change signals.
///
/// Returns `Ok(())` when `shutdown` fires (or its sender is dropped) or
/// `session_closed` turns `true`. Fails with `Unavailable` if the signal
/// stream ends, which happens when the bus connection is lost.
pub(crate) async fn monitor_object_changes<F, Fut>(
    signals: BoxStream<'static, ()>,
    mut shutdown: watch::Receiver<()>,
    mut session_closed: watch::Receiver<bool>,
    mut on_change: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut signals = signals.fuse();
    debug!("Monitoring BlueZ object changes");

    loop {
        if *session_closed.borrow() {
            debug!("Session closed, stopping object monitor");
            return Ok(());
        }

        let next = {
            let mut stop = pin!(shutdown.changed().fuse());
            let mut closed = pin!(session_closed.changed().fuse());
            let mut signal = signals.next().fuse();

            select! {
                s = signal => s,
                _ = stop => {
                    debug!("Object monitor shut down");
                    return Ok(());
                }
                res = closed => {
                    if res.is_err() {
                        return Ok(());
                    }
                    continue;
                }
            }
        };

        if next.is_none() {
            warn!("BlueZ signal stream ended unexpectedly");
            return Err(BluetoothError::Unavailable(
                "BlueZ signal stream ended".into(),
            ));
        }

        let folded = drain_ready(&mut signals);
        debug!("BlueZ objects changed ({} signal(s))", folded + 1);
        on_change().await;
    }
}

/// Consumes every signal that is already queued. Returns how many there were.
fn drain_ready<S>(signals: &mut S) -> usize
where
    S: futures::Stream<Item = ()> + Unpin,
{
    let mut drained = 0;
    while let Some(Some(())) = signals.next().now_or_never() {
        drained += 1;
    }
    drained
}
