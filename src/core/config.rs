//! # Harness Configuration / 编排器配置
//!
//! TOML-backed configuration for the harness: which report storage backend
//! to use and how the worker process is launched and polled. Every field
//! has a sensible default so an empty file (or no file at all) yields a
//! working filesystem-backed setup.
//!
//! 基于 TOML 的编排器配置：使用哪个报告存储后端，以及工作进程如何
//! 启动和轮询。每个字段都有合理的默认值。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::report::database::DocumentReportStore;
use crate::report::fs::FileReportStore;
use crate::report::store::{ReportStore, StoreError};

/// Top-level harness configuration, loaded from a TOML file.
/// 从 TOML 文件加载的顶级编排器配置。
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HarnessConfig {
    /// Which report storage backend to use and where it lives.
    /// 使用哪个报告存储后端以及它的位置。
    #[serde(default)]
    pub store: StoreConfig,
    /// How worker processes are launched and polled.
    /// 工作进程如何启动和轮询。
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Selects and parameterizes the report storage backend.
/// 选择并参数化报告存储后端。
///
/// ```toml
/// [store]
/// backend = "database"
/// url = "sqlite:reports/onehop.db?mode=rwc"
/// object_root = "reports/objects"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// One directory tree per named store.
    /// 每个命名存储一棵目录树。
    Filesystem {
        /// Root directory the named store lives under.
        /// 命名存储所在的根目录。
        root: PathBuf,
        /// Name of the store; one store holds many run namespaces.
        /// 存储的名称；一个存储容纳许多运行命名空间。
        #[serde(default = "default_store_name")]
        name: String,
    },
    /// Shared document database plus a companion large-object store.
    /// 共享文档数据库加一个伴随的大对象存储。
    Database {
        /// Database connection URL, probed at construction time.
        /// 数据库连接 URL，在构造时进行探测。
        url: String,
        /// Root directory of the companion large-object store.
        /// 伴随大对象存储的根目录。
        object_root: PathBuf,
        /// Name of the store; one store holds many run namespaces.
        /// 存储的名称；一个存储容纳许多运行命名空间。
        #[serde(default = "default_store_name")]
        name: String,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Filesystem {
            root: PathBuf::from("test_results"),
            name: default_store_name(),
        }
    }
}

impl StoreConfig {
    /// Builds the configured backend.
    ///
    /// # Errors
    /// For the database backend this is where the connectivity probe runs;
    /// an unreachable database fails here with [`StoreError::Connection`]
    /// rather than later on the fire-and-forget write path.
    ///
    /// 构建所配置的后端。对数据库后端而言，连通性探测在此运行；
    /// 无法到达的数据库在这里失败，而不是之后在写路径上。
    pub async fn build(&self) -> Result<Arc<dyn ReportStore>, StoreError> {
        match self {
            StoreConfig::Filesystem { root, name } => {
                let store = FileReportStore::new(root, name).await?;
                Ok(Arc::new(store))
            }
            StoreConfig::Database {
                url,
                object_root,
                name,
            } => {
                let store = DocumentReportStore::connect(url, name, object_root).await?;
                Ok(Arc::new(store))
            }
        }
    }
}

/// How worker processes are launched and polled.
/// 工作进程如何启动和轮询。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Bound, in seconds, for each startup-handshake wait.
    /// 每次启动握手等待的上限（秒）。
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bound, in seconds, for each output-line poll during status queries.
    /// 状态查询期间每次输出行轮询的上限（秒）。
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    /// The test-runner binary the harness invokes; the run id and the run
    /// parameters are appended as flags.
    /// 编排器调用的测试运行器二进制；运行 id 和运行参数作为标志附加。
    #[serde(default = "default_runner_command")]
    pub runner_command: String,
    /// Fixed working directory the runner is invoked from, when set.
    /// 设置后，运行器从该固定工作目录被调用。
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
            runner_command: default_runner_command(),
            work_dir: None,
        }
    }
}

impl WorkerConfig {
    /// The handshake timeout as a [`Duration`].
    /// 作为 [`Duration`] 的握手超时。
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The per-poll line timeout as a [`Duration`].
    /// 作为 [`Duration`] 的单次轮询行超时。
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

fn default_store_name() -> String {
    "test_reports".to_string()
}

fn default_timeout_secs() -> u64 {
    crate::core::worker::DEFAULT_WORKER_TIMEOUT.as_secs()
}

fn default_poll_timeout_secs() -> u64 {
    1
}

fn default_runner_command() -> String {
    "onehop-tests".to_string()
}

/// Loads the harness configuration from a TOML file.
/// 从 TOML 文件加载编排器配置。
pub fn load_config(path: impl AsRef<Path>) -> Result<HarnessConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
