//! # Run Lifecycle Models / 运行生命周期模型
//!
//! Data structures shared across the harness: the lifecycle state of one
//! orchestrated test run and the caller-supplied parameters that shape the
//! worker's command line.
//!
//! 编排器各处共享的数据结构：一次编排测试运行的生命周期状态，
//! 以及塑造工作进程命令行的调用方参数。

use serde::{Deserialize, Serialize};

/// Lifecycle of one orchestrated test run.
///
/// `created → started → (polling) → completed | abandoned`. A run whose
/// worker never completed its startup handshake is `Abandoned`; callers
/// wanting results must start a fresh run id.
///
/// 一次编排测试运行的生命周期。
/// 工作进程从未完成启动握手的运行为 `Abandoned`；
/// 需要结果的调用方必须启动一个新的运行 id。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Registered but not yet launched.
    /// 已注册但尚未启动。
    Created,
    /// Worker launched and handshake complete; status polling in progress.
    /// 工作进程已启动且握手完成；状态轮询进行中。
    Started,
    /// Worker reached end-of-stream, or the report fully materialized.
    /// 工作进程到达流末尾，或报告已完全物化。
    Completed,
    /// The worker could not be launched; this run will never progress.
    /// 工作进程无法启动；此运行永远不会推进。
    Abandoned,
}

/// Caller-supplied parameters for one test run.
///
/// All fields are optional; the spawned test runner applies its own
/// defaults for anything omitted. The run id itself is not a parameter:
/// the harness injects it so the worker can self-address its report writes.
///
/// 一次测试运行的调用方参数。所有字段都是可选的；被派生的测试运行器
/// 会为省略的内容应用自己的默认值。运行 id 本身不是参数：
/// 编排器会注入它，使工作进程能够自寻址其报告写入。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestRunParameters {
    /// TRAPI release the worker validates against.
    /// 工作进程据以验证的 TRAPI 版本。
    #[serde(default)]
    pub trapi_version: Option<String>,
    /// Biolink model release the worker validates against.
    /// 工作进程据以验证的 Biolink 模型版本。
    #[serde(default)]
    pub biolink_version: Option<String>,
    /// Primary resource under test (a KP infores identifier).
    /// 被测主资源（KP 的 infores 标识符）。
    #[serde(default)]
    pub primary_source: Option<String>,
    /// Umbrella resource under test (an ARA infores identifier).
    /// 被测上层资源（ARA 的 infores 标识符）。
    #[serde(default)]
    pub secondary_source: Option<String>,
    /// Restrict the run to a single edge per resource, for smoke testing.
    /// 将运行限制为每个资源一条边，用于冒烟测试。
    #[serde(default)]
    pub single_edge_only: bool,
    /// Log level forwarded to the worker process.
    /// 转发给工作进程的日志级别。
    #[serde(default)]
    pub log_level: Option<String>,
    /// Overrides the configured worker handshake timeout, in seconds.
    /// 覆盖已配置的工作进程握手超时（秒）。
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl TestRunParameters {
    /// Renders these parameters as the worker's command-line flags.
    /// Absent options contribute nothing; the runner's defaults apply.
    ///
    /// 将这些参数渲染为工作进程的命令行标志。
    /// 缺失的选项不产生任何内容；应用运行器的默认值。
    pub fn cli_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();

        if let Some(trapi) = &self.trapi_version {
            flags.push(format!("--trapi_version {trapi}"));
        }
        if let Some(biolink) = &self.biolink_version {
            flags.push(format!("--biolink_version {biolink}"));
        }
        if let Some(kp) = &self.primary_source {
            flags.push(format!("--kp_id {kp}"));
        }
        if let Some(ara) = &self.secondary_source {
            flags.push(format!("--ara_id {ara}"));
        }
        if self.single_edge_only {
            flags.push("--one".to_string());
        }
        if let Some(level) = &self.log_level {
            flags.push(format!("--log_level {level}"));
        }

        flags
    }
}
