//! # Run Registry / 运行注册表
//!
//! An explicit, injectable registry mapping each run id to its live run
//! entry: command line, worker handle, timeout, cached completion
//! percentage and lifecycle state. The map is mutex-guarded internally so
//! concurrent run-start requests from a hosting process need no external
//! locking; entries are never evicted automatically.
//!
//! 一个显式的、可注入的注册表，将每个运行 id 映射到其活动的运行条目：
//! 命令行、工作进程句柄、超时、缓存的完成百分比和生命周期状态。
//! 映射在内部由互斥锁保护；条目绝不会被自动驱逐。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::core::models::RunState;
use crate::core::worker::WorkerProcess;

/// Everything the controller tracks about one launched run.
/// 控制器为一次已启动的运行所跟踪的全部内容。
pub struct RunEntry {
    /// The opaque command line the worker was (or will be) launched with.
    /// 工作进程（将要）以之启动的不透明命令行。
    pub command_line: String,
    /// The worker handle; one per run, never reused.
    /// 工作进程句柄；每个运行一个，绝不复用。
    pub worker: WorkerProcess,
    /// Handshake timeout this run was configured with.
    /// 此运行所配置的握手超时。
    pub timeout: Duration,
    /// Last percentage-complete value drained from the worker's output,
    /// `None` while unknown.
    /// 从工作进程输出中排出的最后一个完成百分比值，未知时为 `None`。
    pub percentage: Option<u8>,
    /// Lifecycle state of this run.
    /// 此运行的生命周期状态。
    pub state: RunState,
}

/// Process-wide map from run id to run entry, owned by whoever composes the
/// harness rather than hiding as global state.
///
/// Entries are individually lockable so a long status poll on one run never
/// holds up registration of another.
///
/// 进程范围内从运行 id 到运行条目的映射，由组装编排器的一方持有，
/// 而不是隐藏为全局状态。条目可单独加锁，因此对一个运行的长状态轮询
/// 绝不会阻碍另一个运行的注册。
#[derive(Default)]
pub struct RunRegistry {
    entries: Mutex<HashMap<String, Arc<Mutex<RunEntry>>>>,
}

impl RunRegistry {
    /// Creates an empty registry.
    /// 创建一个空注册表。
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry` under `run_id` unless the id is already registered.
    /// Returns `false` (leaving the existing entry untouched) on collision;
    /// the caller decides whether that is a duplicate-run warning.
    ///
    /// 除非该 id 已注册，否则将 `entry` 插入到 `run_id` 下。
    /// 冲突时返回 `false`（保持现有条目不变）；
    /// 由调用方决定这是否构成重复运行警告。
    pub async fn register(&self, run_id: &str, entry: RunEntry) -> bool {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(run_id) {
            return false;
        }
        entries.insert(run_id.to_string(), Arc::new(Mutex::new(entry)));
        true
    }

    /// The entry registered under `run_id`, if any.
    /// 注册在 `run_id` 下的条目（如果有）。
    pub async fn get(&self, run_id: &str) -> Option<Arc<Mutex<RunEntry>>> {
        self.entries.lock().await.get(run_id).cloned()
    }

    /// True while `run_id` is registered.
    /// 当 `run_id` 已注册时为 true。
    pub async fn contains(&self, run_id: &str) -> bool {
        self.entries.lock().await.contains_key(run_id)
    }

    /// Removes and returns the entry for `run_id`, if any. The caller is
    /// responsible for closing the worker it may still hold.
    ///
    /// 移除并返回 `run_id` 的条目（如果有）。
    /// 调用方负责关闭其中可能仍持有的工作进程。
    pub async fn remove(&self, run_id: &str) -> Option<Arc<Mutex<RunEntry>>> {
        self.entries.lock().await.remove(run_id)
    }

    /// Every run id currently registered in this process.
    /// 当前在此进程中注册的每个运行 id。
    pub async fn run_ids(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }
}
