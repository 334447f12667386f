//! Wires the stream listener to a dispatcher.
//!
//! The listener runs on its own task and forwards events over a bounded
//! channel; the dispatcher is driven from the caller's task, one event at a
//! time, so the DOM is only ever touched from one place.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::dom::{DomPort, Enhancer};
use crate::error::StreamError;
use crate::sse::SseEvent;
use crate::stream::StreamListener;

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub applied: u64,
    pub ignored: u64,
    pub failed: u64,
}

impl RunStats {
    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Applied => self.applied += 1,
            DispatchOutcome::Ignored => self.ignored += 1,
            DispatchOutcome::Failed => self.failed += 1,
        }
    }
}

/// Apply every event from `rx` in arrival order until the channel closes.
pub async fn drain<D: DomPort, E: Enhancer>(
    dispatcher: &mut Dispatcher<D, E>,
    rx: &mut mpsc::Receiver<SseEvent>,
) -> RunStats {
    let mut stats = RunStats::default();
    while let Some(event) = rx.recv().await {
        let outcome = dispatcher.handle_event(&event.event, &event.data);
        debug!(event = %event.event, ?outcome, "event dispatched");
        stats.record(outcome);
    }
    stats
}

/// Subscribe with `listener` and feed `dispatcher` until `cancel` fires or the
/// subscription fails permanently.
pub async fn run<D: DomPort, E: Enhancer>(
    listener: StreamListener,
    dispatcher: &mut Dispatcher<D, E>,
    capacity: usize,
    cancel: CancellationToken,
) -> Result<RunStats, StreamError> {
    let (tx, mut rx) = mpsc::channel(capacity.max(1));
    info!(url = %listener.url(), "starting reflexive UI runtime");
    let task = tokio::spawn(listener.run(tx, cancel));

    let stats = drain(dispatcher, &mut rx).await;
    info!(
        applied = stats.applied,
        ignored = stats.ignored,
        failed = stats.failed,
        "event stream closed"
    );

    match task.await {
        Ok(result) => result.map(|()| stats),
        Err(e) => Err(StreamError::Task(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_dom::MemoryDom;

    fn event(name: &str, data: &str) -> SseEvent {
        SseEvent {
            event: name.to_string(),
            data: data.to_string(),
            id: None,
        }
    }

    #[tokio::test]
    async fn test_drain_counts_outcomes() {
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(event("CSS", "{broken")).await.unwrap();
        tx.send(event("CSS", r#"{"render":"AddDynamicCss","key":"k","css":"a{}"}"#))
            .await
            .unwrap();
        tx.send(event("message", "{}")).await.unwrap();
        drop(tx);

        let mut dispatcher = Dispatcher::new(MemoryDom::new());
        let stats = drain(&mut dispatcher, &mut rx).await;
        assert_eq!(
            stats,
            RunStats {
                applied: 1,
                ignored: 1,
                failed: 1
            }
        );
        assert_eq!(dispatcher.dom().query_all("style.dynamic-css-block").len(), 1);
    }
}
