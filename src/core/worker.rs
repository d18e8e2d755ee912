//! # Worker Process Manager / 工作进程管理器
//!
//! Owns one OS-level child process per test run: launches it from an opaque
//! command line, performs a bounded-retry startup handshake, and exposes its
//! combined console output as a lazy, timeout-disciplined line sequence.
//!
//! Launch failures are absorbed here, never raised: a worker that cannot be
//! started (or that fails the handshake) leaves the manager in the
//! "no active process" state, observable only as a run that never produces
//! output. Failures inside the child surface solely as text on the output
//! stream.
//!
//! 每个测试运行拥有一个操作系统级子进程：从不透明的命令行启动它，
//! 执行有界重试的启动握手，并将其合并的控制台输出暴露为惰性的、
//! 受超时约束的行序列。启动失败在此被吸收，绝不抛出。

use futures::stream::Stream;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::infra::command;

/// Fixed number of attempts to receive the startup handshake message, each
/// bounded by the manager's configured timeout.
/// 接收启动握手消息的固定尝试次数，每次都受管理器配置的超时约束。
pub const HANDSHAKE_RETRIES: u32 = 3;

/// Default bound for each startup-handshake wait.
/// 每次启动握手等待的默认上限。
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(120);

/// One polled read from the worker's output channel.
///
/// `Timeout` means "quiet for now" and `Eof` means the channel is closed
/// (the child exited or closed its pipes); neither is an error. Callers
/// that need to distinguish the two inspect the event rather than catching
/// anything.
///
/// 从工作进程输出通道进行的一次轮询读取。
/// `Timeout` 表示“暂时安静”，`Eof` 表示通道已关闭；两者都不是错误。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// One console line, in the order the child emitted it.
    /// 一条控制台行，按子进程发出的顺序。
    Line(String),
    /// No data arrived within the per-call window; the worker is quiet.
    /// 在单次调用窗口内没有数据到达；工作进程处于安静状态。
    Timeout,
    /// The output channel is closed; no further lines will ever arrive.
    /// 输出通道已关闭；不会再有任何行到达。
    Eof,
}

/// State of a successfully launched worker.
/// 一个已成功启动的工作进程的状态。
struct ActiveWorker {
    child: Child,
    pid: u32,
    lines: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
}

/// Manages the single OS child process of one test run.
///
/// A manager is never reused across runs: it is created unstarted, started
/// at most once by [`WorkerProcess::run_command`], and drained/closed by its
/// owning run controller.
///
/// 管理一个测试运行的唯一操作系统子进程。管理器绝不跨运行复用。
pub struct WorkerProcess {
    timeout: Duration,
    work_dir: Option<PathBuf>,
    active: Option<ActiveWorker>,
}

impl WorkerProcess {
    /// Creates an unstarted manager whose startup handshake is bounded by
    /// `timeout` per attempt.
    /// 创建一个未启动的管理器，其启动握手每次尝试受 `timeout` 约束。
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            work_dir: None,
            active: None,
        }
    }

    /// Sets the fixed working directory the worker command runs in.
    /// 设置工作进程命令运行所在的固定工作目录。
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }

    /// The worker's OS process id, once the startup handshake has completed.
    /// 启动握手完成后，工作进程的操作系统进程 id。
    pub fn process_id(&self) -> Option<u32> {
        self.active.as_ref().map(|worker| worker.pid)
    }

    /// True while the manager holds a launched worker whose output channel
    /// has not yet been observed to close.
    /// 当管理器持有一个已启动且其输出通道尚未被观察到关闭的工作进程时为 true。
    pub fn is_started(&self) -> bool {
        self.active.is_some()
    }

    /// Launches `command_line` as this manager's one child process.
    ///
    /// The child is spawned with fresh pipes and no shared mutable state,
    /// then the manager waits for exactly one process-id message on the
    /// handshake channel, retrying up to [`HANDSHAKE_RETRIES`] times with
    /// each wait bounded by the configured timeout. If the handshake never
    /// completes, any half-started child is killed and the manager stays
    /// unstarted; the failure is logged, never raised.
    ///
    /// 将 `command_line` 作为此管理器唯一的子进程启动。
    /// 握手最终失败时，任何半启动的子进程会被杀死，管理器保持未启动状态；
    /// 失败会被记录，绝不抛出。
    pub async fn run_command(&mut self, command_line: &str) {
        if self.active.is_some() {
            warn!(command_line, "worker already started; ignoring run_command");
            return;
        }

        match self.try_spawn(command_line).await {
            Ok(worker) => {
                info!(pid = worker.pid, "worker process started");
                self.active = Some(worker);
            }
            Err(e) => {
                warn!(command_line, error = %e, "failed to launch worker process; run abandoned");
            }
        }
    }

    async fn try_spawn(&self, command_line: &str) -> anyhow::Result<ActiveWorker> {
        let argv = command::split_command_line(command_line)?;
        let cancel = CancellationToken::new();

        let mut spawned =
            command::spawn_streaming(&argv, self.work_dir.as_deref(), cancel.clone())?;

        // Bounded-retry startup handshake: one process-id message must
        // arrive before the worker counts as started.
        let mut pid = None;
        for attempt in 1..=HANDSHAKE_RETRIES {
            match timeout(self.timeout, spawned.handshake.recv()).await {
                Ok(Some(received)) => {
                    pid = Some(received);
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(attempt, "no worker handshake within timeout");
                }
            }
        }

        let Some(pid) = pid else {
            cancel.cancel();
            let _ = spawned.child.start_kill();
            let _ = spawned.child.wait().await;
            anyhow::bail!(
                "worker failed the startup handshake after {HANDSHAKE_RETRIES} attempts"
            );
        };

        Ok(ActiveWorker {
            child: spawned.child,
            pid,
            lines: spawned.lines,
            cancel,
        })
    }

    /// Polls the output channel for one line, waiting at most
    /// `per_call_timeout`. Never blocks beyond that bound.
    /// 从输出通道轮询一行，最多等待 `per_call_timeout`。绝不阻塞超过该上限。
    pub async fn next_line(&mut self, per_call_timeout: Duration) -> OutputEvent {
        let Some(worker) = self.active.as_mut() else {
            return OutputEvent::Eof;
        };

        match timeout(per_call_timeout, worker.lines.recv()).await {
            Ok(Some(line)) => OutputEvent::Line(line),
            Ok(None) => OutputEvent::Eof,
            Err(_) => OutputEvent::Timeout,
        }
    }

    /// Produces a lazy, one-shot sequence of output lines.
    ///
    /// Each line is polled with `per_call_timeout`; the sequence ends
    /// (without error) when no data arrives within that window or when the
    /// output channel reports end-of-stream. Callers that need to tell
    /// "quiet for now" from "process has ended" use
    /// [`WorkerProcess::next_line`] and inspect the event.
    ///
    /// 产生惰性的一次性输出行序列。每行以 `per_call_timeout` 轮询；
    /// 在窗口内没有数据或通道到达流末尾时序列结束（无错误）。
    pub fn get_output(
        &mut self,
        per_call_timeout: Duration,
    ) -> impl Stream<Item = String> + Send + '_ {
        futures::stream::unfold(self, move |worker| async move {
            match worker.next_line(per_call_timeout).await {
                OutputEvent::Line(line) => Some((line, worker)),
                OutputEvent::Timeout | OutputEvent::Eof => None,
            }
        })
    }

    /// Releases the output endpoints and reaps the child process, killing it
    /// first if it is still running. Idempotent and safe to call repeatedly.
    ///
    /// 释放输出端点并回收子进程，若其仍在运行则先将其杀死。幂等。
    pub async fn close(&mut self) {
        let Some(mut worker) = self.active.take() else {
            return;
        };

        worker.cancel.cancel();
        worker.lines.close();
        let _ = worker.child.start_kill();
        match worker.child.wait().await {
            Ok(status) => debug!(pid = worker.pid, %status, "worker process reaped"),
            Err(e) => warn!(pid = worker.pid, error = %e, "failed to reap worker process"),
        }
    }
}
