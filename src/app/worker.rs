// MecmLog - app/worker.rs
//
// Dedicated filter worker thread.
//
// Architecture:
//   - `FilterWorker` lives on the interaction thread; `run_worker` runs on a
//     background thread.
//   - Requests carry an immutable row snapshot plus a FilterSpec; responses
//     carry an owned result vector. Nothing is shared mutably.
//   - Requests that queue up while a pass runs are coalesced: only the newest
//     waiting request is evaluated. Older ones would be discarded on arrival
//     anyway.
//   - A pass that panics is caught and reported as `FilterResponse::Failed`;
//     the worker keeps serving.
//   - Dropping the `FilterWorker` closes the request channel, which ends the
//     thread; the handle is joined on drop.

use crate::core::filter::{self, FilterRow, FilterSpec};
use crate::core::model::VisibilityResult;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

/// One filter pass to evaluate.
#[derive(Debug, Clone)]
pub struct FilterRequest {
    /// Monotonic sequence number assigned by the controller.
    pub seq: u64,
    pub rows: Arc<[FilterRow]>,
    pub spec: FilterSpec,
}

/// Outcome of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterResponse {
    /// One result per row of the request's snapshot, in row order.
    Completed {
        seq: u64,
        results: Vec<VisibilityResult>,
    },
    /// The pass aborted; the view should keep its previous state.
    Failed { seq: u64, reason: String },
}

impl FilterResponse {
    pub fn seq(&self) -> u64 {
        match self {
            Self::Completed { seq, .. } | Self::Failed { seq, .. } => *seq,
        }
    }
}

/// Execution substrate for filter passes.
///
/// Dispatch is fire-and-forget and must not block; responses are polled.
/// Responses may arrive in any order.
pub trait PassDispatcher {
    fn dispatch(&mut self, request: FilterRequest);
    fn try_recv(&mut self) -> Option<FilterResponse>;
}

type Evaluate = fn(&[FilterRow], &FilterSpec) -> Vec<VisibilityResult>;

/// Handle to the background filter thread.
pub struct FilterWorker {
    request_tx: Option<mpsc::Sender<FilterRequest>>,
    response_rx: mpsc::Receiver<FilterResponse>,

    /// Failures produced locally (worker unreachable), delivered before
    /// anything from the channel.
    local: VecDeque<FilterResponse>,

    handle: Option<JoinHandle<()>>,
}

impl FilterWorker {
    /// Spawn the worker thread.
    pub fn spawn() -> Self {
        Self::spawn_with(filter::execute)
    }

    fn spawn_with(evaluate: Evaluate) -> Self {
        let (request_tx, request_rx) = mpsc::channel();
        let (response_tx, response_rx) = mpsc::channel();

        let handle = std::thread::Builder::new()
            .name("filter-worker".to_string())
            .spawn(move || run_worker(request_rx, response_tx, evaluate));

        let handle = match handle {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::error!(error = %e, "Failed to spawn filter worker");
                None
            }
        };

        tracing::debug!("Filter worker started");

        Self {
            request_tx: Some(request_tx),
            response_rx,
            local: VecDeque::new(),
            handle,
        }
    }

    /// Block up to `timeout` for the next response.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<FilterResponse> {
        if let Some(local) = self.local.pop_front() {
            return Some(local);
        }
        self.response_rx.recv_timeout(timeout).ok()
    }
}

impl PassDispatcher for FilterWorker {
    fn dispatch(&mut self, request: FilterRequest) {
        let seq = request.seq;
        let sent = match &self.request_tx {
            Some(tx) => tx.send(request).is_ok(),
            None => false,
        };
        if !sent {
            tracing::warn!(seq, "Filter worker is not running; pass dropped");
            self.local.push_back(FilterResponse::Failed {
                seq,
                reason: "filter worker is not running".to_string(),
            });
        }
    }

    fn try_recv(&mut self) -> Option<FilterResponse> {
        if let Some(local) = self.local.pop_front() {
            return Some(local);
        }
        self.response_rx.try_recv().ok()
    }
}

impl Drop for FilterWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.request_tx = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Filter worker thread terminated abnormally");
            }
        }
    }
}

fn run_worker(
    requests: mpsc::Receiver<FilterRequest>,
    responses: mpsc::Sender<FilterResponse>,
    evaluate: Evaluate,
) {
    while let Ok(mut request) = requests.recv() {
        let mut skipped = 0usize;
        while let Ok(newer) = requests.try_recv() {
            request = newer;
            skipped += 1;
        }
        if skipped > 0 {
            tracing::trace!(skipped, seq = request.seq, "Coalesced queued filter requests");
        }

        let seq = request.seq;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            evaluate(&request.rows, &request.spec)
        }));

        let response = match outcome {
            Ok(results) => {
                tracing::trace!(seq, rows = results.len(), "Filter pass complete");
                FilterResponse::Completed { seq, results }
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                tracing::warn!(seq, reason = %reason, "Filter pass aborted");
                FilterResponse::Failed { seq, reason }
            }
        };

        if responses.send(response).is_err() {
            break;
        }
    }
    tracing::debug!("Filter worker exiting");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "filter pass panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::{snapshot_rows, FilterInputs};
    use crate::core::model::{LogEntry, LogType};

    const WAIT: Duration = Duration::from_secs(5);

    fn rows() -> Arc<[FilterRow]> {
        let entry = |message: &str| LogEntry {
            message: message.to_string(),
            timestamp: "01-15-2024 10:00:00.000+000".to_string(),
            component: "CcmExec".to_string(),
            log_type: LogType::Info,
            thread: "1".to_string(),
            source: "CcmExec.log".to_string(),
            line_number: 1,
        };
        snapshot_rows(&[entry("disk full"), entry("network down")])
    }

    fn request(seq: u64, text: &str) -> FilterRequest {
        let inputs = FilterInputs {
            search_text: text.to_string(),
            ..Default::default()
        };
        FilterRequest {
            seq,
            rows: rows(),
            spec: FilterSpec::build(&inputs, 300).unwrap(),
        }
    }

    #[test]
    fn test_worker_completes_pass() {
        let mut worker = FilterWorker::spawn();
        worker.dispatch(request(1, "disk"));
        match worker.recv_timeout(WAIT) {
            Some(FilterResponse::Completed { seq, results }) => {
                assert_eq!(seq, 1);
                assert_eq!(
                    results.iter().map(|r| r.visible).collect::<Vec<_>>(),
                    vec![true, false]
                );
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_latest_request_always_answered() {
        let mut worker = FilterWorker::spawn();
        for seq in 1..=20 {
            worker.dispatch(request(seq, "network"));
        }
        let mut last = 0;
        while last != 20 {
            let response = worker.recv_timeout(WAIT).expect("worker stalled");
            assert!(response.seq() > last, "responses are issued in order");
            last = response.seq();
        }
    }

    #[test]
    fn test_panicking_pass_is_reported_and_worker_survives() {
        fn explode(_: &[FilterRow], _: &FilterSpec) -> Vec<VisibilityResult> {
            panic!("boom");
        }
        let mut worker = FilterWorker::spawn_with(explode);
        worker.dispatch(request(1, "x"));
        assert_eq!(
            worker.recv_timeout(WAIT),
            Some(FilterResponse::Failed {
                seq: 1,
                reason: "boom".to_string()
            })
        );
        worker.dispatch(request(2, "x"));
        assert_eq!(worker.recv_timeout(WAIT).map(|r| r.seq()), Some(2));
    }
}
