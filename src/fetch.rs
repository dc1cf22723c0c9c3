//! Background record fetch so the UI keeps drawing while the source answers.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::source::{CancelToken, FetchError, FetchRequest, RecordPage, RecordSource};

/// Outcome of polling an in-flight fetch.
#[derive(Debug)]
pub enum FetchPoll {
    Pending,
    Done(Result<RecordPage, FetchError>),
}

/// Handle to a fetch running on a worker thread.
///
/// Dropping the handle, or letting it time out, cancels the fetch. The source
/// gets to clean up on the worker thread and its result is discarded.
pub struct FetchJob {
    rx: Receiver<Result<RecordPage, FetchError>>,
    cancel: CancelToken,
    started_at: Instant,
    timeout: Option<Duration>,
    finished: bool,
}

impl FetchJob {
    /// Spawn the worker. `timeout` of `None` waits for as long as the source takes.
    pub fn spawn(
        source: Arc<dyn RecordSource>,
        request: FetchRequest,
        timeout: Option<Duration>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        tracing::debug!(source = %source.describe(), ?request, "starting record fetch");
        thread::spawn(move || {
            let result = source.fetch_with_cancel(&request, &worker_cancel);
            let _ = tx.send(result);
        });
        Self {
            rx,
            cancel,
            started_at: Instant::now(),
            timeout,
            finished: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Non-blocking check. Yields `Done` exactly once.
    pub fn poll(&mut self) -> FetchPoll {
        self.poll_at(Instant::now())
    }

    fn poll_at(&mut self, now: Instant) -> FetchPoll {
        if self.finished {
            return FetchPoll::Pending;
        }
        let outcome = match self.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Disconnected) => Err(FetchError::Disconnected),
            Err(TryRecvError::Empty) => match self.timeout {
                Some(limit) if now.duration_since(self.started_at) >= limit => {
                    self.cancel.cancel();
                    Err(FetchError::Timeout(limit))
                }
                _ => return FetchPoll::Pending,
            },
        };
        self.finished = true;
        FetchPoll::Done(outcome)
    }

    /// Block until the fetch completes or times out.
    pub fn wait(self) -> Result<RecordPage, FetchError> {
        match self.timeout {
            Some(limit) => {
                let remaining = limit.saturating_sub(self.elapsed());
                match self.rx.recv_timeout(remaining) {
                    Ok(result) => result,
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        self.cancel.cancel();
                        Err(FetchError::Timeout(limit))
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => Err(FetchError::Disconnected),
                }
            }
            None => self.rx.recv().unwrap_or(Err(FetchError::Disconnected)),
        }
    }
}

impl Drop for FetchJob {
    fn drop(&mut self) {
        if !self.finished {
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Record;
    use std::sync::Mutex;

    struct SlowSource {
        delay: Duration,
        rows: usize,
    }

    impl RecordSource for SlowSource {
        fn describe(&self) -> String {
            "slow".into()
        }

        fn fetch_records(&self, _request: &FetchRequest) -> Result<RecordPage, FetchError> {
            thread::sleep(self.delay);
            Ok(RecordPage {
                data: vec![Record::new(); self.rows],
            })
        }
    }

    struct FailingSource {
        calls: Mutex<usize>,
    }

    impl RecordSource for FailingSource {
        fn describe(&self) -> String {
            "failing".into()
        }

        fn fetch_records(&self, _request: &FetchRequest) -> Result<RecordPage, FetchError> {
            *self.calls.lock().unwrap() += 1;
            Err(FetchError::Command("host unavailable".into()))
        }
    }

    fn request() -> FetchRequest {
        FetchRequest::first_page("table", None)
    }

    #[test]
    fn wait_returns_page() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_millis(5),
            rows: 3,
        });
        let job = FetchJob::spawn(source, request(), Some(Duration::from_secs(5)));
        assert_eq!(job.wait().unwrap().data.len(), 3);
    }

    #[test]
    fn poll_reports_timeout_once() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_secs(2),
            rows: 1,
        });
        let mut job = FetchJob::spawn(source, request(), Some(Duration::from_millis(10)));
        let later = job.started_at + Duration::from_millis(20);
        assert!(matches!(
            job.poll_at(later),
            FetchPoll::Done(Err(FetchError::Timeout(_)))
        ));
        assert!(matches!(job.poll_at(later), FetchPoll::Pending));
    }

    #[test]
    fn poll_is_pending_before_deadline() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_secs(2),
            rows: 1,
        });
        let mut job = FetchJob::spawn(source, request(), Some(Duration::from_secs(60)));
        assert!(matches!(job.poll(), FetchPoll::Pending));
    }

    #[test]
    fn source_errors_are_delivered() {
        let source = Arc::new(FailingSource {
            calls: Mutex::new(0),
        });
        let job = FetchJob::spawn(source.clone(), request(), None);
        assert!(matches!(job.wait(), Err(FetchError::Command(_))));
        assert_eq!(*source.calls.lock().unwrap(), 1);
    }

    #[cfg(unix)]
    fn process_alive(pid: &str) -> bool {
        std::process::Command::new("kill")
            .args(["-0", pid])
            .stderr(std::process::Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    #[cfg(unix)]
    #[test]
    fn timed_out_command_is_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let source = Arc::new(crate::source::CommandSource::new(format!(
            "echo $$ > '{}'; sleep 30; echo '[]'",
            pid_file.display()
        )));
        let job = FetchJob::spawn(source, request(), Some(Duration::from_millis(300)));
        assert!(matches!(job.wait(), Err(FetchError::Timeout(_))));

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut shell = None;
        while Instant::now() < deadline {
            let written = std::fs::read_to_string(&pid_file).unwrap_or_default();
            let pid = written.trim().to_string();
            if !pid.is_empty() && !process_alive(&pid) {
                shell = Some(pid);
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert!(shell.is_some(), "record command outlived its fetch");
    }

    #[cfg(unix)]
    #[test]
    fn dropping_a_job_stops_its_command() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let source = Arc::new(crate::source::CommandSource::new(format!(
            "echo $$ > '{}'; sleep 30",
            pid_file.display()
        )));
        let job = FetchJob::spawn(source, request(), None);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut pid = String::new();
        while pid.is_empty() && Instant::now() < deadline {
            pid = std::fs::read_to_string(&pid_file)
                .unwrap_or_default()
                .trim()
                .to_string();
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!pid.is_empty());
        drop(job);

        let deadline = Instant::now() + Duration::from_secs(5);
        while process_alive(&pid) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(!process_alive(&pid));
    }
}
