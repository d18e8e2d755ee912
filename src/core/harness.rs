//! # Test Harness / 测试编排器
//!
//! The run controller: ties one run identifier to exactly one worker
//! process and one report namespace, and answers status/result queries
//! without ever blocking beyond a short per-poll timeout.
//!
//! The harness never waits for a run to finish. Callers poll
//! [`TestHarness::get_status`] and read documents as they materialize;
//! "not ready yet" is a first-class non-error outcome everywhere except
//! [`TestHarness::get_streamed_response_file`], the one accessor that
//! represents a one-shot download and therefore raises on absence.
//!
//! 运行控制器：将一个运行标识符与恰好一个工作进程和一个报告命名空间
//! 绑定，并在不超过短轮询超时的情况下回答状态/结果查询。
//! “尚未就绪”在所有地方都是一等的非错误结果，唯一的例外是
//! 一次性下载访问器，它在缺失时抛出。

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::core::config::WorkerConfig;
use crate::core::models::{RunState, TestRunParameters};
use crate::core::registry::{RunEntry, RunRegistry};
use crate::core::worker::{OutputEvent, WorkerProcess};
use crate::report::addressing::{build_key, Component};
use crate::report::store::{get_report, DocumentStream, ReportStore, StoreError, TestReport};

/// Document key of the run-wide index of tested resources.
/// 运行范围内被测资源索引的文档键。
pub const TEST_RUN_INDEX: &str = "index";

/// Document key of the run-wide summary document.
/// 运行范围内摘要文档的文档键。
pub const TEST_RUN_SUMMARY: &str = "test_run_summary";

/// Trailing key segment of a per-resource summary document.
/// 按资源摘要文档的尾部键段。
pub const RESOURCE_SUMMARY_SEGMENT: &str = "resource_summary";

/// Errors surfaced by the harness read interface.
///
/// Only the streamed-response accessor raises; every polled accessor
/// treats absence as `None`.
///
/// 编排器读取接口暴露的错误。
/// 只有流式响应访问器会抛出；每个轮询型访问器都把缺失当作 `None`。
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Terminal "not found" for a one-shot response-file download; the web
    /// layer maps this to a 404.
    /// 一次性响应文件下载的终态“未找到”；web 层将其映射为 404。
    #[error("no response file found under key '{key}' in test run '{run_id}'")]
    DocumentNotFound { run_id: String, key: String },

    #[error(transparent)]
    Address(#[from] crate::report::addressing::AddressError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The run controller for one test run.
///
/// Constructed either fresh (generating a new sortable run id) or bound to
/// an existing id for read-only resumption. The registry is injected so the
/// hosting process decides its scope and lifetime; nothing here is global.
///
/// 一个测试运行的运行控制器。要么新建（生成一个可排序的新运行 id），
/// 要么绑定到已有 id 进行只读恢复。注册表是注入的，托管进程决定其
/// 作用域和生命周期；这里没有任何全局状态。
pub struct TestHarness {
    run_id: String,
    report: TestReport,
    store: Arc<dyn ReportStore>,
    registry: Arc<RunRegistry>,
    worker_config: WorkerConfig,
}

impl TestHarness {
    /// Creates a controller for a brand-new run id.
    /// 为一个全新的运行 id 创建控制器。
    pub fn new(
        store: Arc<dyn ReportStore>,
        registry: Arc<RunRegistry>,
        worker_config: WorkerConfig,
    ) -> Result<Self, StoreError> {
        let run_id = generate_run_id();
        Self::bind(store, registry, worker_config, &run_id)
    }

    /// Binds a controller to an existing run id, typically to resume
    /// read-only access to a run started by another controller instance.
    /// 将控制器绑定到已有运行 id，通常用于恢复对另一个控制器实例
    /// 所启动运行的只读访问。
    pub fn bind(
        store: Arc<dyn ReportStore>,
        registry: Arc<RunRegistry>,
        worker_config: WorkerConfig,
        run_id: &str,
    ) -> Result<Self, StoreError> {
        let report = get_report(&store, run_id)?;
        Ok(Self {
            run_id: run_id.to_string(),
            report,
            store,
            registry,
            worker_config,
        })
    }

    /// The run id this controller is bound to.
    /// 此控制器绑定的运行 id。
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The run-scoped report handle this controller reads from.
    /// 此控制器据以读取的运行范围报告句柄。
    pub fn report(&self) -> &TestReport {
        &self.report
    }

    /// Launches the test run: composes the worker command line (embedding
    /// the run id so the spawned test process can self-address its report
    /// writes) and starts exactly one worker bound to this run.
    ///
    /// Invoking `run` again while this run id is registered is a no-op:
    /// it logs one warning and never spawns a second worker for the id.
    /// Launch failures are absorbed by the worker manager; they leave an
    /// abandoned registry entry and a run that never progresses.
    ///
    /// 启动测试运行：组合工作进程命令行（嵌入运行 id），并启动恰好一个
    /// 绑定到此运行的工作进程。对同一活动运行 id 重复调用是空操作。
    #[instrument(skip(self, params), fields(run_id = %self.run_id))]
    pub async fn run(&self, params: &TestRunParameters) -> &str {
        let command_line = self.build_command_line(params);
        let timeout = params
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.worker_config.timeout());

        let mut worker = WorkerProcess::new(timeout);
        if let Some(work_dir) = &self.worker_config.work_dir {
            worker = worker.with_work_dir(work_dir);
        }

        let entry = RunEntry {
            command_line: command_line.clone(),
            worker,
            timeout,
            percentage: None,
            state: RunState::Created,
        };

        if !self.registry.register(&self.run_id, entry).await {
            warn!(run_id = %self.run_id, "test run already started; ignoring duplicate run request");
            return &self.run_id;
        }

        // The entry is registered before the launch so a concurrent caller
        // hits the duplicate-run path instead of spawning a second worker.
        if let Some(entry) = self.registry.get(&self.run_id).await {
            let mut entry = entry.lock().await;
            entry.worker.run_command(&command_line).await;
            entry.state = if entry.worker.process_id().is_some() {
                RunState::Started
            } else {
                RunState::Abandoned
            };
        }

        &self.run_id
    }

    /// Completion percentage of this run, 0..=100.
    ///
    /// Returns 100 immediately when the run id already appears in the
    /// store's report listing (the report is fully materialized). Otherwise
    /// drains any pending percentage-complete lines (bare integers) from
    /// the worker's output under the per-poll timeout, caching the latest
    /// value, and forces 100 once the worker reaches end-of-stream even
    /// without an explicit `100` line. Never blocks beyond the per-poll
    /// timeout; an unknown percentage reads as 0.
    ///
    /// 此运行的完成百分比（0..=100）。绝不会阻塞超过单次轮询超时。
    #[instrument(skip(self), fields(run_id = %self.run_id))]
    pub async fn get_status(&self) -> u8 {
        if self.report.exists().await {
            return 100;
        }

        let Some(entry) = self.registry.get(&self.run_id).await else {
            // Bound read-only and nothing persisted yet.
            return 0;
        };
        let mut entry = entry.lock().await;

        match entry.state {
            RunState::Completed => return 100,
            RunState::Abandoned => return entry.percentage.unwrap_or(0),
            RunState::Created | RunState::Started => {}
        }

        let poll_timeout = self.worker_config.poll_timeout();
        loop {
            match entry.worker.next_line(poll_timeout).await {
                OutputEvent::Line(line) => {
                    // Progress protocol: bare integers on their own line.
                    // Anything else is ordinary console output.
                    if let Ok(percent) = line.trim().parse::<u8>() {
                        entry.percentage = Some(percent.min(100));
                    }
                }
                OutputEvent::Timeout => break,
                OutputEvent::Eof => {
                    entry.state = RunState::Completed;
                    return 100;
                }
            }
        }

        entry.percentage.unwrap_or(0)
    }

    /// The run-wide index of tested resources, or `None` while absent.
    /// 运行范围内被测资源的索引，缺失时为 `None`。
    pub async fn get_index(&self) -> Option<Value> {
        self.report.retrieve_document("Index", TEST_RUN_INDEX).await
    }

    /// The run-wide summary document, or `None` while absent.
    /// 运行范围内的摘要文档，缺失时为 `None`。
    pub async fn get_summary(&self) -> Option<Value> {
        self.report
            .retrieve_document("Summary", TEST_RUN_SUMMARY)
            .await
    }

    /// The per-resource summary document, or `None` while absent.
    /// 按资源的摘要文档，缺失时为 `None`。
    pub async fn get_resource_summary(
        &self,
        component: Component,
        secondary_id: Option<&str>,
        primary_id: &str,
    ) -> Option<Value> {
        let key = match build_key(component, secondary_id, primary_id, None, None) {
            Ok(key) => format!("{key}/{RESOURCE_SUMMARY_SEGMENT}"),
            Err(e) => {
                warn!(run_id = %self.run_id, error = %e, "invalid resource summary address");
                return None;
            }
        };
        self.report.retrieve_document("Resource Summary", &key).await
    }

    /// The per-edge details document, or `None` while absent.
    /// 按边的详情文档，缺失时为 `None`。
    pub async fn get_details(
        &self,
        component: Component,
        secondary_id: Option<&str>,
        primary_id: &str,
        edge_num: i32,
    ) -> Option<Value> {
        let key = match build_key(component, secondary_id, primary_id, Some(edge_num), None) {
            Ok(key) => key,
            Err(e) => {
                warn!(run_id = %self.run_id, error = %e, "invalid edge details address");
                return None;
            }
        };
        self.report.retrieve_document("Details", &key).await
    }

    /// Streams one unit test's raw response payload.
    ///
    /// This is the one accessor that raises: it backs a one-shot download
    /// rather than a polled status, so absence is a terminal
    /// [`HarnessError::DocumentNotFound`] rather than "not yet".
    ///
    /// 流式输出一个单元测试的原始响应负载。这是唯一会抛出的访问器：
    /// 它支撑的是一次性下载而非轮询状态，因此缺失是终态错误而非“尚未就绪”。
    pub async fn get_streamed_response_file(
        &self,
        component: Component,
        secondary_id: Option<&str>,
        primary_id: &str,
        edge_num: i32,
        test_id: &str,
    ) -> Result<DocumentStream, HarnessError> {
        let key = build_key(
            component,
            secondary_id,
            primary_id,
            Some(edge_num),
            Some(test_id),
        )?;

        self.store
            .stream_document(&self.run_id, "Response", &key)
            .await
            .ok_or_else(|| HarnessError::DocumentNotFound {
                run_id: self.run_id.clone(),
                key,
            })
    }

    /// Every run id with at least one persisted document, sorted. Run ids
    /// are timestamp-derived, so this reads as a chronological listing.
    /// 每个至少持久化了一个文档的运行 id，已排序。
    /// 运行 id 源自时间戳，因此这读起来是按时间顺序的列表。
    pub async fn list_runs(&self) -> Vec<String> {
        let mut run_ids: Vec<String> = self.store.list_reports().await.into_iter().collect();
        run_ids.sort();
        run_ids
    }

    /// Irreversibly deletes this run: closes and reaps its worker (if this
    /// process launched one) and removes the report namespace.
    /// 不可逆地删除此运行：关闭并回收其工作进程（如果由本进程启动），
    /// 并移除报告命名空间。
    pub async fn delete(&self) -> Result<(), StoreError> {
        if let Some(entry) = self.registry.remove(&self.run_id).await {
            entry.lock().await.worker.close().await;
        }
        self.report.delete().await
    }

    /// The worker invocation: runner binary, the run id (so the worker can
    /// self-address its writes), then the caller's parameters as flags.
    /// 工作进程的调用形式：运行器二进制、运行 id（使工作进程能够
    /// 自寻址其写入），然后是作为标志的调用方参数。
    fn build_command_line(&self, params: &TestRunParameters) -> String {
        let mut command = format!(
            "{} --run_id {}",
            self.worker_config.runner_command, self.run_id
        );
        for flag in params.cli_flags() {
            command.push(' ');
            command.push_str(&flag);
        }
        command
    }
}

/// Generates a fresh run identifier: a sortable UTC timestamp with a short
/// random suffix so that runs started within the same second stay distinct.
/// Opaque to all consumers.
///
/// 生成一个新的运行标识符：可排序的 UTC 时间戳加一个短随机后缀，
/// 使同一秒内启动的运行保持不同。对所有消费者不透明。
fn generate_run_id() -> String {
    let stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{stamp}-{}", &suffix[..8])
}
