use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, info, warn};

use common::logger::{TraceId, connection_span};

use super::backoff::Backoff;
use super::{ConnectionState, LinkStatus, StreamError, StreamSource};
use crate::error::MarketError;
use crate::time::now_ms;

/// Running adapter task plus its observable status.
pub struct AdapterHandle {
    task: JoinHandle<()>,
    status: Arc<watch::Sender<LinkStatus>>,
}

impl AdapterHandle {
    pub fn status(&self) -> LinkStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkStatus> {
        self.status.subscribe()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the loop and wait until the connection is dropped.
    pub async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
        set_state(&self.status, ConnectionState::Disconnected);
    }
}

/// How one connection ended.
enum SessionEnd {
    /// The consumer dropped its receiver.
    ConsumerGone,
    /// The connection failed or closed; reconnect.
    Lost(MarketError),
}

fn set_state(status: &watch::Sender<LinkStatus>, state: ConnectionState) {
    status.send_modify(|s| {
        if state == ConnectionState::Streaming {
            s.connects += 1;
        }
        s.state = state;
        s.last_change_ms = now_ms();
    });
}

/// Run `source` forever, forwarding every decoded item into `sink`.
///
/// - decode failures are logged and skipped; the connection stays up
/// - any other failure or the end of the stream triggers a reconnect after
///   the next backoff delay; the delay resets once a connection succeeds
/// - the loop exits when `sink` is closed
pub fn spawn_adapter<S, T>(
    source: S,
    mut backoff: Backoff,
    sink: mpsc::Sender<T>,
    span: Span,
) -> AdapterHandle
where
    S: StreamSource,
    T: From<S::Item> + Send + 'static,
{
    let status = Arc::new(watch::Sender::new(LinkStatus::default()));
    let task_status = status.clone();

    let task = tokio::spawn(
        async move {
            let name = source.describe();
            info!(stream = %name, "stream adapter started");

            loop {
                let trace_id = TraceId::new();
                let conn_span = connection_span(&name, &trace_id);

                let end = async {
                    set_state(&task_status, ConnectionState::Connecting);
                    debug!("connecting");

                    let mut items = match source.connect().await {
                        Ok(items) => items,
                        Err(e) => {
                            warn!(error = %e, "connect failed");
                            return SessionEnd::Lost(e.into());
                        }
                    };

                    backoff.reset();
                    set_state(&task_status, ConnectionState::Streaming);
                    info!(connects = task_status.borrow().connects, "streaming");

                    let mut forwarded: u64 = 0;
                    while let Some(item) = items.next().await {
                        match item {
                            Ok(item) => {
                                if sink.send(T::from(item)).await.is_err() {
                                    return SessionEnd::ConsumerGone;
                                }
                                forwarded += 1;
                            }
                            Err(e) if e.is_message_local() => {
                                warn!(error = %e, "skipping undecodable message");
                            }
                            Err(e) => {
                                warn!(error = %e, forwarded, "stream failed");
                                return SessionEnd::Lost(e.into());
                            }
                        }
                    }

                    warn!(forwarded, "stream ended");
                    SessionEnd::Lost(StreamError::Closed("end of stream".into()).into())
                }
                .instrument(conn_span)
                .await;

                set_state(&task_status, ConnectionState::Disconnected);

                let reason = match end {
                    SessionEnd::ConsumerGone => {
                        info!(stream = %name, "consumer gone; stream adapter stopping");
                        return;
                    }
                    SessionEnd::Lost(reason) => reason,
                };

                let delay = backoff.next_delay();
                warn!(
                    stream = %name,
                    reason = %reason,
                    delay_ms = delay.as_millis() as u64,
                    attempt = backoff.attempt(),
                    "disconnected; reconnecting after backoff"
                );
                tokio::time::sleep(delay).await;
            }
        }
        .instrument(span),
    );

    AdapterHandle { task, status }
}
