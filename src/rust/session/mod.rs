// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prover session
//!
//! Owns one long-running prover server and multiplexes requests over its
//! stdin/stdout. A single reader task decodes every output line, resolves
//! the waiter registered under the reply's `seq_num`, and broadcasts
//! messages and running-state transitions to subscribers.

pub mod protocol;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command as ProcessCommand};
use tokio::sync::{broadcast, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ProverConfig;
use crate::error::{SessionError, SessionResult};
use protocol::{Command, CommandReply, ProverMessage, Request, Response, FILE_UNCHANGED};

/// Name of the path-file listing library search paths
pub const PATH_FILE: &str = "leanpkg.path";

/// Default name of the checked file
pub const DEFAULT_FILE_NAME: &str = "exercise.lean";

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    /// Not processing anything
    Ready,
    /// Processing a file
    Active,
    Stopped,
}

/// Unsolicited output of the prover
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// One `all_messages` batch
    Messages(Vec<ProverMessage>),
    /// Edge-triggered `Ready`/`Active` transitions, and `Stopped`
    State(SessionState),
    /// Every task report, transition or not
    Tasks { is_running: bool },
    /// The prover closed its output
    Exited,
}

type Waiter = oneshot::Sender<SessionResult<CommandReply>>;

struct Shared {
    waiters: Mutex<HashMap<u64, Waiter>>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn set_state(&self, new: SessionState) -> bool {
        let mut state = lock(&self.state);
        if *state == new {
            return false;
        }
        debug!(from = ?*state, to = ?new, "session state change");
        *state = new;
        true
    }

    fn emit(&self, event: SessionEvent) {
        // No subscriber is fine
        let _ = self.events.send(event);
    }

    fn dispatch(&self, response: Response) {
        match response {
            Response::Ok { seq_num, message } => {
                self.resolve(seq_num, Ok(CommandReply { seq_num, message }));
            }
            Response::Error {
                seq_num: Some(seq_num),
                message,
            } => {
                self.resolve(seq_num, Err(SessionError::RequestError(message)));
            }
            Response::Error {
                seq_num: None,
                message,
            } => {
                warn!("prover error without seq_num: {}", message);
            }
            Response::AllMessages { msgs } => {
                debug!(count = msgs.len(), "prover messages");
                self.emit(SessionEvent::Messages(msgs));
            }
            Response::CurrentTasks { is_running, .. } => {
                let new = if is_running {
                    SessionState::Active
                } else {
                    SessionState::Ready
                };
                if self.set_state(new) {
                    self.emit(SessionEvent::State(new));
                }
                self.emit(SessionEvent::Tasks { is_running });
            }
            Response::Unknown => debug!("ignoring unknown prover response"),
        }
    }

    fn resolve(&self, seq_num: u64, result: SessionResult<CommandReply>) {
        match lock(&self.waiters).remove(&seq_num) {
            Some(waiter) => {
                // The caller may have given up already
                let _ = waiter.send(result);
            }
            None => debug!(seq_num, "reply for a request nobody waits for"),
        }
    }

    fn close(&self) {
        self.set_state(SessionState::Stopped);
        // Dropping the senders fails every in-flight request with ChannelClosed
        lock(&self.waiters).clear();
        self.emit(SessionEvent::State(SessionState::Stopped));
        self.emit(SessionEvent::Exited);
    }
}

async fn read_loop<R>(reader: R, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("error reading prover output: {}", e);
                break;
            }
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!(
                    "dropping malformed UTF-8 from prover ({}): {:?}",
                    e,
                    String::from_utf8_lossy(&buf)
                );
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Response>(line) {
            Ok(response) => shared.dispatch(response),
            Err(e) => warn!("dropping undecodable prover line ({}): {}", e, line),
        }
    }
    info!("prover output closed");
    shared.close();
}

/// Removes the waiter of a request that ended without a reply
struct WaiterGuard<'a> {
    shared: &'a Shared,
    seq_num: u64,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        lock(&self.shared.waiters).remove(&self.seq_num);
    }
}

/// A running prover with its working directory
struct Process {
    child: Child,
    _workdir: TempDir,
}

/// Handle on the prover server
pub struct ProverSession {
    config: ProverConfig,
    file_name: String,
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    shared: Arc<Shared>,
    pool: Semaphore,
    next_seq: AtomicU64,
    reader: JoinHandle<()>,
    process: Option<Process>,
    last_messages: Mutex<Vec<ProverMessage>>,
}

impl ProverSession {
    /// Session over an arbitrary transport; `reader` is the prover's stdout
    pub fn from_transport<R, W>(reader: R, writer: W, config: ProverConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (events, _) = broadcast::channel(config.listener_capacity.max(1));
        let shared = Arc::new(Shared {
            waiters: Mutex::new(HashMap::new()),
            state: Mutex::new(SessionState::Idle),
            events,
        });
        let reader = tokio::spawn(read_loop(reader, Arc::clone(&shared)));
        let file_name = config
            .file_name
            .clone()
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
        ProverSession {
            pool: Semaphore::new(config.seq_pool_capacity.max(1)),
            file_name,
            config,
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            shared,
            next_seq: AtomicU64::new(0),
            reader,
            process: None,
            last_messages: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the prover and wait for its first ready state
    pub async fn start(config: ProverConfig) -> SessionResult<Self> {
        let workdir = tempfile::tempdir()?;
        write_path_file(workdir.path(), &config.library_paths)?;

        info!(
            "starting prover: {} {}",
            config.executable.display(),
            config.args.join(" ")
        );
        let mut child = ProcessCommand::new(&config.executable)
            .args(&config.args)
            .current_dir(workdir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SessionError::StartupFailed(format!("cannot spawn {}: {}", config.executable.display(), e))
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(SessionError::StartupFailed(
                "prover pipes unavailable".to_string(),
            ));
        };
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "proofdriver::prover_stderr", "{}", line);
                }
            });
        }

        let startup = config.startup_timeout();
        let mut session = ProverSession::from_transport(stdout, stdin, config);
        session.process = Some(Process {
            child,
            _workdir: workdir,
        });
        session.wait_ready(startup).await?;
        Ok(session)
    }

    /// Sync an empty file and wait until the prover reports it idle
    pub async fn wait_ready(&self, timeout: Duration) -> SessionResult<()> {
        self.shared.set_state(SessionState::Starting);
        match self.check_file("", timeout).await {
            Ok(_) => {
                info!("prover ready");
                Ok(())
            }
            Err(e) => Err(SessionError::StartupFailed(e.to_string())),
        }
    }

    pub fn config(&self) -> &ProverConfig {
        &self.config
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.shared.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Free sequence slots
    pub fn available_slots(&self) -> usize {
        self.pool.available_permits()
    }

    /// Requests waiting for a reply
    pub fn outstanding(&self) -> usize {
        lock(&self.shared.waiters).len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Submit a command under the configured timeout
    pub async fn submit(&self, command: Command) -> SessionResult<CommandReply> {
        self.submit_within(command, self.config.timeout()).await
    }

    /// Submit a command; suspends while every sequence slot is taken
    pub async fn submit_within(
        &self,
        command: Command,
        timeout: Duration,
    ) -> SessionResult<CommandReply> {
        let _slot = self
            .pool
            .acquire()
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        if self.state() == SessionState::Stopped {
            return Err(SessionError::ChannelClosed);
        }

        let seq_num = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.shared.waiters).insert(seq_num, tx);
        let _guard = WaiterGuard {
            shared: &self.shared,
            seq_num,
        };

        let name = command.name();
        let line = Request { seq_num, command }.to_line()?;
        debug!(seq_num, command = name, "submitting request");
        {
            let mut writer = self.writer.lock().await;
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SessionError::ChannelClosed),
            Err(_) => {
                warn!(seq_num, "request timed out after {:?}", timeout);
                Err(SessionError::timeout(seq_num, timeout))
            }
        }
    }

    /// Information request at a position of the checked file
    pub async fn info(&self, line: usize, column: usize) -> SessionResult<CommandReply> {
        self.submit(Command::Info {
            file_name: self.file_name.clone(),
            line,
            column,
        })
        .await
    }

    /// Sync `content` and return the messages of the finished check
    ///
    /// Completes when the `ok` reply arrived and the prover reported that
    /// it is idle again after having started on this file, both under the
    /// same deadline. Idle reports seen before the prover starts are stale.
    pub async fn check_file(
        &self,
        content: &str,
        timeout: Duration,
    ) -> SessionResult<Vec<ProverMessage>> {
        let mut events = self.subscribe();
        let deadline = Instant::now() + timeout;

        let reply = self
            .submit_within(
                Command::Sync {
                    file_name: self.file_name.clone(),
                    content: content.to_string(),
                },
                timeout,
            )
            .await?;
        if reply.message.as_deref() == Some(FILE_UNCHANGED) {
            debug!("file unchanged, reusing previous messages");
            return Ok(lock(&self.last_messages).clone());
        }

        // Idle reports only count once the prover has started on this file
        let mut started = false;
        let mut messages = Vec::new();
        loop {
            let event = match tokio::time::timeout_at(deadline, events.recv()).await {
                Err(_) => return Err(SessionError::timeout(reply.seq_num, timeout)),
                Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                    warn!("missed {} prover events", n);
                    continue;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(SessionError::ChannelClosed)
                }
                Ok(Ok(event)) => event,
            };
            match event {
                SessionEvent::Messages(msgs) => {
                    messages = msgs
                        .into_iter()
                        .filter(|m| m.file_name.is_empty() || m.file_name == self.file_name)
                        .collect();
                }
                SessionEvent::Tasks { is_running: true }
                | SessionEvent::State(SessionState::Active) => started = true,
                SessionEvent::Tasks { is_running: false }
                | SessionEvent::State(SessionState::Ready) => {
                    if started {
                        break;
                    }
                    debug!("ignoring idle report from before the sync");
                }
                SessionEvent::Exited | SessionEvent::State(SessionState::Stopped) => {
                    return Err(SessionError::ChannelClosed)
                }
                _ => {}
            }
        }

        *lock(&self.last_messages) = messages.clone();
        Ok(messages)
    }

    /// Kill the prover; in-flight requests fail with `ChannelClosed`
    pub async fn stop(&mut self) {
        if let Some(mut process) = self.process.take() {
            if let Err(e) = process.child.kill().await {
                warn!("failed to kill prover: {}", e);
            }
        }
        self.reader.abort();
        self.shared.close();
    }
}

impl Drop for ProverSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Write the path-file; paths under `dir` are written relative to it
pub fn write_path_file(dir: &Path, library_paths: &[PathBuf]) -> std::io::Result<PathBuf> {
    let mut content = String::from("builtin_path\n");
    for path in library_paths {
        let encoded = path
            .strip_prefix(dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| std::path::absolute(path).unwrap_or_else(|_| path.clone()));
        content.push_str(&format!("path {}\n", encoded.display()));
    }
    let file = dir.join(PATH_FILE);
    std::fs::write(&file, content)?;
    Ok(file)
}

/// What the coordinator needs from a prover
#[async_trait]
pub trait ProofChecker: Send {
    /// Check a complete file and return its messages
    async fn check(&mut self, content: &str, timeout: Duration)
        -> SessionResult<Vec<ProverMessage>>;

    /// Replace a crashed prover with a fresh one
    async fn restart(&mut self) -> SessionResult<()>;

    /// Running-state events
    fn events(&self) -> broadcast::Receiver<SessionEvent>;

    /// Deadline for one check
    fn timeout(&self) -> Duration;
}

#[async_trait]
impl ProofChecker for ProverSession {
    async fn check(
        &mut self,
        content: &str,
        timeout: Duration,
    ) -> SessionResult<Vec<ProverMessage>> {
        self.check_file(content, timeout).await
    }

    async fn restart(&mut self) -> SessionResult<()> {
        if self.process.is_none() {
            return Err(SessionError::StartupFailed(
                "session has no process to restart".to_string(),
            ));
        }
        warn!("restarting prover");
        self.stop().await;
        let fresh = ProverSession::start(self.config.clone()).await?;
        *self = fresh;
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.subscribe()
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::Severity;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn quick_config() -> ProverConfig {
        ProverConfig {
            seq_pool_capacity: 2,
            ..ProverConfig::default()
        }
    }

    /// Fake prover that answers every request with `ok`, wrapped in task reports
    fn spawn_echo_prover() -> ProverSession {
        let (client_out, server_in) = duplex(4096);
        let (server_out, client_in) = duplex(4096);
        tokio::spawn(async move {
            let mut lines = BufReader::new(server_in).lines();
            let mut out = server_out;
            while let Ok(Some(line)) = lines.next_line().await {
                let req: serde_json::Value = serde_json::from_str(&line).unwrap();
                let seq = req["seq_num"].as_u64().unwrap();
                let replies = [
                    r#"{"response":"current_tasks","is_running":true,"tasks":[]}"#.to_string(),
                    "not json at all".to_string(),
                    format!(
                        r#"{{"response":"all_messages","msgs":[{{"file_name":"exercise.lean","pos_line":1,"pos_col":0,"severity":"information","caption":"","text":"seq {}"}}]}}"#,
                        seq
                    ),
                    format!(r#"{{"response":"ok","seq_num":{},"message":"file invalidated"}}"#, seq),
                    r#"{"response":"current_tasks","is_running":false,"tasks":[]}"#.to_string(),
                ];
                for r in replies {
                    out.write_all(r.as_bytes()).await.unwrap();
                    out.write_all(b"\n").await.unwrap();
                }
            }
        });
        ProverSession::from_transport(client_in, client_out, quick_config())
    }

    #[tokio::test]
    async fn test_check_file_collects_messages() {
        let session = spawn_echo_prover();
        let msgs = session
            .check_file("theorem t : true := trivial", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].severity, Severity::Information);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.available_slots(), 2);
        assert_eq!(session.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_state_transitions_are_edge_triggered() {
        let session = spawn_echo_prover();
        let mut events = session.subscribe();
        session.check_file("a", Duration::from_secs(5)).await.unwrap();

        let mut states = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::State(s) = event {
                states.push(s);
            }
        }
        assert_eq!(states, vec![SessionState::Active, SessionState::Ready]);
    }

    #[tokio::test]
    async fn test_closed_output_fails_waiters() {
        let (client_out, _server_in) = duplex(4096);
        let (server_out, client_in) = duplex(4096);
        let session = ProverSession::from_transport(client_in, client_out, quick_config());
        let mut events = session.subscribe();
        drop(server_out);

        loop {
            if let Ok(SessionEvent::Exited) = events.recv().await {
                break;
            }
        }
        assert_eq!(session.state(), SessionState::Stopped);
        let err = session
            .submit(Command::Info {
                file_name: "f".into(),
                line: 1,
                column: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ChannelClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_releases_slot() {
        let (client_out, _server_in) = duplex(4096);
        let (_server_out, client_in) = duplex(4096);
        let session = ProverSession::from_transport(client_in, client_out, quick_config());
        let err = session
            .submit_within(
                Command::Sync {
                    file_name: "f".into(),
                    content: String::new(),
                },
                Duration::from_secs(30),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Timeout { seq_num: 0, .. }));
        assert_eq!(session.available_slots(), 2);
        assert_eq!(session.outstanding(), 0);
    }

    #[test]
    fn test_path_file_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("lib");
        let outer = PathBuf::from("/opt/mathlib/src");
        let file = write_path_file(dir.path(), &[inner, outer]).unwrap();
        let content = std::fs::read_to_string(file).unwrap();
        assert_eq!(content, "builtin_path\npath lib\npath /opt/mathlib/src\n");
    }
}
