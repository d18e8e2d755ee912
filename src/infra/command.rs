//! # Command Spawning Module / 命令派生模块
//!
//! Turns an opaque command-line string into a running child process whose
//! combined stdout/stderr is bridged, line by line, onto an in-process
//! channel. The command line is expanded (`~`, `$VARS`) and split into argv
//! form before spawning; the child never shares mutable state with the
//! parent beyond its own pipes.
//!
//! 将不透明的命令行字符串转换为正在运行的子进程，其合并的 stdout/stderr
//! 被逐行桥接到进程内通道上。命令行在派生前会被展开（`~`、`$VARS`）
//! 并拆分为 argv 形式；子进程除了自己的管道外不与父进程共享任何可变状态。

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A freshly spawned worker command with its communication endpoints.
///
/// The handshake channel carries exactly one message, the worker's OS
/// process id, pushed at startup; the line channel then carries the
/// worker's console output in emission order until end-of-stream.
///
/// 一个刚刚派生的工作进程命令及其通信端点。
/// 握手通道恰好承载一条消息（工作进程的操作系统进程 id），在启动时推送；
/// 之后行通道按发出顺序承载工作进程的控制台输出，直到流末尾。
pub struct SpawnedCommand {
    /// The child process handle / 子进程句柄
    pub child: Child,
    /// Receiver of the one startup handshake message / 唯一启动握手消息的接收端
    pub handshake: mpsc::Receiver<u32>,
    /// Receiver of the combined stdout/stderr lines / 合并的 stdout/stderr 行接收端
    pub lines: mpsc::UnboundedReceiver<String>,
}

/// Expands and splits an opaque command line into argv form.
///
/// # Arguments
/// * `command_line` - The raw command string, possibly containing `~` or
///   environment variables.
///
/// # Returns
/// The argv vector, never empty.
///
/// 将不透明的命令行展开并拆分为 argv 形式。
pub fn split_command_line(command_line: &str) -> Result<Vec<String>> {
    let expanded = shellexpand::full(command_line)
        .with_context(|| format!("Failed to expand command: {command_line}"))?
        .to_string();

    let parts = shlex::split(&expanded)
        .ok_or_else(|| anyhow::anyhow!("Failed to parse command: {}", expanded))?;

    if parts.is_empty() {
        return Err(anyhow::anyhow!("Empty command after parsing."));
    }
    Ok(parts)
}

/// Spawns `argv` as a detached child with piped stdio and bridges both
/// output pipes into a single FIFO line channel.
///
/// One reader task is spawned per pipe; both end silently on end-of-stream
/// or broken pipe (the child exited), or when `cancel` fires. The returned
/// handshake receiver yields the child's process id exactly once.
///
/// 以分离的子进程形式派生 `argv`，stdio 通过管道捕获，
/// 两个输出管道被桥接到单一的 FIFO 行通道中。
pub fn spawn_streaming(
    argv: &[String],
    work_dir: Option<&Path>,
    cancel: CancellationToken,
) -> Result<SpawnedCommand> {
    let (program, args) = argv
        .split_first()
        .context("Cannot spawn an empty command")?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = work_dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn worker command '{program}'"))?;

    let stdout = child
        .stdout
        .take()
        .context("Failed to capture worker stdout")?;
    let stderr = child
        .stderr
        .take()
        .context("Failed to capture worker stderr")?;
    let pid = child
        .id()
        .context("Worker exited before its process id could be read")?;

    // The startup handshake: exactly one process-id message, on its own
    // channel, separate from the output pipe.
    let (handshake_tx, handshake_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let _ = handshake_tx.send(pid).await;
    });

    // One reader task per pipe; both feed the same line channel.
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    let stdout_tx = line_tx.clone();
    let stdout_cancel = cancel.clone();
    tokio::spawn(async move {
        read_lines(stdout, stdout_tx, stdout_cancel).await;
    });
    tokio::spawn(async move {
        read_lines(stderr, line_tx, cancel).await;
    });

    Ok(SpawnedCommand {
        child,
        handshake: handshake_rx,
        lines: line_rx,
    })
}

/// Reads one pipe line by line into the shared channel until end-of-stream,
/// a read error (broken pipe), a closed receiver, or cancellation.
/// 将一个管道逐行读入共享通道，直到流末尾、读错误（管道破裂）、
/// 接收端关闭或取消。
async fn read_lines<R>(pipe: R, tx: mpsc::UnboundedSender<String>, cancel: CancellationToken)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(pipe).lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = lines.next_line() => match next {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                // End-of-stream and broken pipes both end the sequence
                // without error; the channel closing is the signal.
                Ok(None) | Err(_) => break,
            },
        }
    }
}
