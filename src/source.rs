//! Record sources: the capability the resolver uses to pull rows from the host
//! table. A source answers one page request at a time.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;

use crate::value::RawValue;

/// Rows requested per page. The resolver only ever asks for the first page.
pub const PAGE_SIZE: usize = 100;

pub type Record = BTreeMap<String, RawValue>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub table_id: String,
    pub view_id: Option<String>,
    pub page_size: usize,
    /// 1-based.
    pub page_index: usize,
}

impl FetchRequest {
    pub fn first_page(table_id: impl Into<String>, view_id: Option<String>) -> Self {
        Self {
            table_id: table_id.into(),
            view_id,
            page_size: PAGE_SIZE,
            page_index: 1,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordPage {
    pub data: Vec<Record>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read records from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("record payload is not valid: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("record command failed: {0}")]
    Command(String),
    #[error("record fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("record fetch worker exited without a result")]
    Disconnected,
    #[error("no record source is configured")]
    Unavailable,
    #[error("record fetch was cancelled")]
    Cancelled,
}

/// Shared flag telling a running fetch to give up.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Host-provided capability for reading table rows.
pub trait RecordSource: Send + Sync {
    /// Short label shown in the status line and logs.
    fn describe(&self) -> String;

    fn fetch_records(&self, request: &FetchRequest) -> Result<RecordPage, FetchError>;

    /// Like `fetch_records`, but stops early once `cancel` fires. Sources that
    /// hold external resources override this; the rest just run to completion.
    fn fetch_with_cancel(
        &self,
        request: &FetchRequest,
        _cancel: &CancelToken,
    ) -> Result<RecordPage, FetchError> {
        self.fetch_records(request)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PagePayload {
    Bare(Vec<RawValue>),
    Wrapped {
        #[serde(default)]
        data: Vec<RawValue>,
    },
}

/// Decode `{"data": [...]}` or a bare array of records. Non-object rows are ignored.
pub fn parse_records(payload: &str) -> Result<Vec<Record>, FetchError> {
    let rows = match serde_json::from_str::<PagePayload>(payload)? {
        PagePayload::Bare(rows) => rows,
        PagePayload::Wrapped { data } => data,
    };
    let total = rows.len();
    let records: Vec<Record> = rows
        .into_iter()
        .filter_map(|row| match row {
            RawValue::Map(record) => Some(record),
            _ => None,
        })
        .collect();
    if records.len() != total {
        tracing::debug!(
            skipped = total - records.len(),
            "ignoring record rows that are not objects"
        );
    }
    Ok(records)
}

fn page_of(records: Vec<Record>, request: &FetchRequest) -> RecordPage {
    let skip = request.page_index.saturating_sub(1) * request.page_size;
    RecordPage {
        data: records
            .into_iter()
            .skip(skip)
            .take(request.page_size)
            .collect(),
    }
}

/// Reads a whole table export from a JSON file and serves it page by page.
#[derive(Clone, Debug)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for JsonFileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn fetch_records(&self, request: &FetchRequest) -> Result<RecordPage, FetchError> {
        let payload = fs::read_to_string(&self.path).map_err(|source| FetchError::Io {
            path: self.path.clone(),
            source,
        })?;
        let records = parse_records(&payload)?;
        Ok(page_of(records, request))
    }
}

/// Runs a shell command that prints one page of records as JSON on stdout.
///
/// The request is passed through `MENU_TABLE_ID`, `MENU_VIEW_ID`,
/// `MENU_PAGE_SIZE` and `MENU_PAGE_INDEX`.
#[derive(Clone, Debug)]
pub struct CommandSource {
    command: String,
}

impl CommandSource {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl RecordSource for CommandSource {
    fn describe(&self) -> String {
        format!("command `{}`", self.command)
    }

    fn fetch_records(&self, request: &FetchRequest) -> Result<RecordPage, FetchError> {
        self.fetch_with_cancel(request, &CancelToken::new())
    }

    fn fetch_with_cancel(
        &self,
        request: &FetchRequest,
        cancel: &CancelToken,
    ) -> Result<RecordPage, FetchError> {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.command)
            .env("MENU_TABLE_ID", &request.table_id)
            .env("MENU_VIEW_ID", request.view_id.as_deref().unwrap_or_default())
            .env("MENU_PAGE_SIZE", request.page_size.to_string())
            .env("MENU_PAGE_INDEX", request.page_index.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so cancelling also reaches whatever the shell started.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);

        let child = command
            .spawn()
            .map_err(|err| FetchError::Command(format!("could not start: {err}")))?;
        let output = wait_child_with_cancel(child, cancel)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Command(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut records = parse_records(stdout.trim())?;
        records.truncate(request.page_size);
        Ok(RecordPage { data: records })
    }
}

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Grace period between SIGTERM and SIGKILL.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// Collect the child's output, terminating its process group if `cancel` fires first.
fn wait_child_with_cancel(child: Child, cancel: &CancelToken) -> Result<Output, FetchError> {
    let pid = child.id();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(child.wait_with_output());
    });

    let mut cancel_requested_at: Option<Instant> = None;
    let mut kill_sent = false;
    loop {
        match rx.try_recv() {
            Ok(_) if cancel_requested_at.is_some() => return Err(FetchError::Cancelled),
            Ok(Ok(output)) => return Ok(output),
            Ok(Err(err)) => return Err(FetchError::Command(format!("could not collect output: {err}"))),
            Err(TryRecvError::Disconnected) => return Err(FetchError::Disconnected),
            Err(TryRecvError::Empty) => {}
        }

        if cancel.is_cancelled() {
            match cancel_requested_at {
                None => {
                    tracing::debug!(pid, "record command cancelled, sending SIGTERM");
                    signal_group(pid, Signal::Term);
                    cancel_requested_at = Some(Instant::now());
                }
                Some(at) if !kill_sent && at.elapsed() >= KILL_GRACE => {
                    tracing::debug!(pid, "record command still running, sending SIGKILL");
                    signal_group(pid, Signal::Kill);
                    kill_sent = true;
                }
                Some(_) => {}
            }
        }

        thread::sleep(CANCEL_POLL_INTERVAL);
    }
}

enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: Signal) {
    let signo = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // A negative pid addresses the whole process group.
    if unsafe { libc::kill(-pgid, signo) } != 0 {
        tracing::debug!(
            pid,
            signo,
            error = %io::Error::last_os_error(),
            "failed to signal record command"
        );
    }
}

#[cfg(not(unix))]
fn signal_group(pid: u32, _signal: Signal) {
    tracing::warn!(pid, "cannot stop the record command on this platform");
}
