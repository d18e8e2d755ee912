//! # Worker Process Manager Unit Tests / 工作进程管理器单元测试
//!
//! This module contains unit tests for the `worker.rs` module, covering the
//! startup handshake, timeout-disciplined output polling and closing.
//!
//! 此模块包含 `worker.rs` 模块的单元测试，
//! 覆盖启动握手、受超时约束的输出轮询和关闭。

use futures::StreamExt;
use std::time::Duration;

use onehop_runner::core::worker::{OutputEvent, WorkerProcess};

#[cfg(test)]
mod run_command_tests {
    use super::*;

    #[tokio::test]
    async fn test_run_command_completes_handshake() {
        // 成功派生后，恰好一条进程 id 消息到达
        #[cfg(target_os = "windows")]
        let command = r#"cmd /C "echo hello""#;
        #[cfg(not(target_os = "windows"))]
        let command = "echo hello";

        let mut worker = WorkerProcess::new(Duration::from_secs(5));
        worker.run_command(command).await;

        assert!(worker.is_started());
        assert!(worker.process_id().is_some());
        worker.close().await;
    }

    #[tokio::test]
    async fn test_unspawnable_command_leaves_manager_unstarted() {
        // 测试不存在的命令：失败被吸收，管理器保持未启动状态
        let mut worker = WorkerProcess::new(Duration::from_secs(1));
        worker
            .run_command("this_command_does_not_exist_12345")
            .await;

        assert!(!worker.is_started());
        assert!(worker.process_id().is_none());

        // 从未产生任何输出
        assert_eq!(
            worker.next_line(Duration::from_millis(100)).await,
            OutputEvent::Eof
        );
        let lines: Vec<String> = worker.get_output(Duration::from_millis(100)).collect().await;
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_run_command_is_ignored() {
        #[cfg(target_os = "windows")]
        let command = r#"cmd /C "echo hello""#;
        #[cfg(not(target_os = "windows"))]
        let command = "sleep 5";

        let mut worker = WorkerProcess::new(Duration::from_secs(5));
        worker.run_command(command).await;
        let first_pid = worker.process_id();
        assert!(first_pid.is_some());

        // 第二次调用是空操作，不会替换已启动的子进程
        worker.run_command(command).await;
        assert_eq!(worker.process_id(), first_pid);
        worker.close().await;
    }
}

#[cfg(test)]
mod get_output_tests {
    use super::*;

    #[tokio::test]
    #[cfg(not(target_os = "windows"))]
    async fn test_get_output_yields_lines_in_order() {
        let mut worker = WorkerProcess::new(Duration::from_secs(5));
        worker
            .run_command(r#"sh -c "echo one; echo two; echo three""#)
            .await;

        let lines: Vec<String> = worker.get_output(Duration::from_secs(5)).collect().await;
        assert_eq!(lines, vec!["one", "two", "three"]);
        worker.close().await;
    }

    #[tokio::test]
    #[cfg(not(target_os = "windows"))]
    async fn test_slow_output_ends_sequence_without_lines() {
        // 在轮询窗口内保持安静的命令：序列结束且没有行，这是超时而非失败
        let mut worker = WorkerProcess::new(Duration::from_secs(1));
        worker.run_command(r#"sh -c "sleep 2; echo late""#).await;

        let lines: Vec<String> = worker.get_output(Duration::from_secs(1)).collect().await;
        assert!(lines.is_empty());

        // 管理器本身仍然持有活动进程；安静不等于结束
        assert!(worker.is_started());
        worker.close().await;
    }

    #[tokio::test]
    #[cfg(not(target_os = "windows"))]
    async fn test_next_line_distinguishes_timeout_from_eof() {
        let mut worker = WorkerProcess::new(Duration::from_secs(5));
        worker.run_command(r#"sh -c "echo only; sleep 2""#).await;

        assert_eq!(
            worker.next_line(Duration::from_secs(5)).await,
            OutputEvent::Line("only".to_string())
        );
        // 子进程还在睡眠：这是 Timeout 而不是 Eof
        assert_eq!(
            worker.next_line(Duration::from_millis(100)).await,
            OutputEvent::Timeout
        );
        worker.close().await;
    }

    #[tokio::test]
    #[cfg(not(target_os = "windows"))]
    async fn test_exited_process_reports_eof() {
        let mut worker = WorkerProcess::new(Duration::from_secs(5));
        worker.run_command("true").await;

        // 等待管道关闭后，轮询报告流结束
        let mut saw_eof = false;
        for _ in 0..50 {
            match worker.next_line(Duration::from_millis(100)).await {
                OutputEvent::Eof => {
                    saw_eof = true;
                    break;
                }
                OutputEvent::Line(_) | OutputEvent::Timeout => continue,
            }
        }
        assert!(saw_eof);
        worker.close().await;
    }
}

#[cfg(test)]
mod close_tests {
    use super::*;

    #[tokio::test]
    #[cfg(not(target_os = "windows"))]
    async fn test_close_is_idempotent() {
        let mut worker = WorkerProcess::new(Duration::from_secs(5));
        worker.run_command("sleep 30").await;
        assert!(worker.is_started());

        worker.close().await;
        assert!(!worker.is_started());
        assert!(worker.process_id().is_none());

        // 再次关闭是安全的
        worker.close().await;
        assert!(!worker.is_started());
    }

    #[tokio::test]
    async fn test_close_before_start_is_safe() {
        let mut worker = WorkerProcess::new(Duration::from_secs(1));
        worker.close().await;
        assert!(!worker.is_started());
    }
}
