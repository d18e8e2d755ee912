//! # Report Store Contract / 报告存储契约
//!
//! One explicit `ReportStore` trait with two conforming implementations
//! (filesystem and document-database). Documents are opaque
//! `serde_json::Value` payloads at this boundary; typed (de)serialization is
//! pushed to callers. The write path is fire-and-forget by design: failures
//! are logged, never raised, because the writing side is an out-of-process
//! worker with nobody to answer to.
//!
//! 一个显式的 `ReportStore` trait，两个符合契约的实现（文件系统和文档数据库）。
//! 在此边界上文档是不透明的 `serde_json::Value` 负载；类型化的（反）序列化
//! 由调用方负责。写路径按设计是 fire-and-forget 的：失败会被记录，但绝不抛出。

use async_trait::async_trait;
use futures::stream::Stream;
use serde_json::Value;
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Lazily produced text content of one stored document.
/// 一个已存储文档的惰性文本内容。
pub type DocumentStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Reserved namespace for append-only operational log entries, kept disjoint
/// from run-id space so it can never collide with an actual run.
/// 为追加式运营日志条目保留的命名空间，与运行 id 空间保持不相交，
/// 因此绝不会与实际运行冲突。
pub const LOGS_NAMESPACE: &str = "logs";

/// Errors surfaced by the report storage layer.
///
/// Only two situations actually raise in practice: backend construction
/// (connectivity probe) and caller-contract violations. Everything on the
/// regular read/write path is absorbed into logs or `None`.
///
/// 报告存储层暴露的错误。
/// 实践中只有两种情况真正抛出：后端构造（连通性探测）和调用方契约违规。
/// 常规读/写路径上的一切都被吸收为日志或 `None`。
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document-database backend could not reach its database.
    /// This is the one backend-construction-time error in the subsystem.
    /// 文档数据库后端无法连接其数据库。
    /// 这是子系统中唯一的后端构造时错误。
    #[error("could not connect to the report database: {details}")]
    Connection { details: String },

    /// The run id is empty, reserved, or not usable as a namespace.
    /// 运行 id 为空、被保留，或不能用作命名空间。
    #[error("invalid test run id '{run_id}': {reason}")]
    InvalidRunId { run_id: String, reason: String },

    /// A database operation failed.
    /// 数据库操作失败。
    #[error("report database error during '{operation}': {details}")]
    Database { operation: String, details: String },

    /// A filesystem operation failed.
    /// 文件系统操作失败。
    #[error("report store I/O error during '{operation}': {details}")]
    Io { operation: String, details: String },

    /// A document could not be serialized or deserialized.
    /// 文档无法被序列化或反序列化。
    #[error("report document serialization error: {details}")]
    Serialization { details: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization {
            details: err.to_string(),
        }
    }
}

/// The persistence contract shared by every report storage backend.
///
/// Semantics, identical across backends:
/// - keys are unique within a `(store, run id)` pair; a colliding save
///   silently overwrites (last write wins, no staleness detection);
/// - `retrieve_document` and `stream_document` are total over found/absent;
///   absence is a normal outcome for in-progress runs, never an error;
/// - a run id appears in `list_reports` iff at least one document has ever
///   been saved under it; there is no separate "run created" marker.
///
/// 每个报告存储后端共享的持久化契约。语义在各后端之间完全一致：
/// 键在 `(存储, 运行 id)` 内唯一，冲突的保存静默覆盖（最后写入者胜出）；
/// 读取对存在/缺失是全函数，缺失是进行中运行的正常结果；
/// 运行 id 出现在列表中当且仅当其下至少保存过一个文档。
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// The name of this store; one store holds many run namespaces.
    /// 此存储的名称；一个存储容纳许多运行命名空间。
    fn store_name(&self) -> &str;

    /// Persists `document` under `key` within `run_id`'s namespace, after
    /// stamping it with its own key so retrieval needs no external index.
    /// `type_label` is advisory and only appears in logs and records.
    /// Failures are logged and dropped; there is no write acknowledgement.
    ///
    /// 将 `document` 持久化到 `run_id` 命名空间内的 `key` 下，
    /// 并先盖上其自身键的戳记，使检索无需外部索引。
    /// `type_label` 仅供参考，只出现在日志和记录中。
    /// 失败会被记录并丢弃；没有写入确认。
    async fn save_document(
        &self,
        run_id: &str,
        type_label: &str,
        document: Value,
        key: &str,
        is_big: bool,
    );

    /// Fetches the document stored under `key`, or `None` if nothing has
    /// been saved there yet.
    ///
    /// 获取存储在 `key` 下的文档；若尚未保存任何内容则返回 `None`。
    async fn retrieve_document(&self, run_id: &str, type_label: &str, key: &str) -> Option<Value>;

    /// Lazily streams the text content of the document under `key`, or
    /// `None` if absent. For offloaded documents this resolves the pointer
    /// record and streams from the companion large-object store.
    ///
    /// 惰性地流式输出 `key` 下文档的文本内容；缺失时返回 `None`。
    /// 对于被卸载的文档，这会解析指针记录并从伴随的大对象存储流式读取。
    async fn stream_document(
        &self,
        run_id: &str,
        type_label: &str,
        key: &str,
    ) -> Option<DocumentStream>;

    /// Irreversibly removes one run's entire namespace.
    /// 不可逆地移除一个运行的整个命名空间。
    async fn delete_report(&self, run_id: &str) -> Result<(), StoreError>;

    /// Irreversibly removes the whole named store.
    /// 不可逆地移除整个命名存储。
    async fn drop_store(&self) -> Result<(), StoreError>;

    /// Every run id with at least one persisted document. The reserved
    /// `logs` namespace never appears here. Backend failures are logged and
    /// read as an empty listing.
    ///
    /// 每个至少持久化了一个文档的运行 id。保留的 `logs` 命名空间绝不会
    /// 出现在这里。后端失败会被记录并读作空列表。
    async fn list_reports(&self) -> HashSet<String>;

    /// Appends one operational entry to the reserved `logs` namespace.
    /// Fire-and-forget, like the document write path.
    ///
    /// 向保留的 `logs` 命名空间追加一条运营条目。
    /// 与文档写路径一样是 fire-and-forget 的。
    async fn log_event(&self, event: Value);
}

/// A run-scoped handle over one report namespace.
///
/// Repeated [`get_report`] calls with the same run id yield logically
/// equivalent handles; the handle carries no backend state beyond the store
/// reference and the run id itself.
///
/// 一个运行范围内的报告命名空间句柄。
/// 用同一运行 id 重复调用 [`get_report`] 会得到逻辑上等价的句柄；
/// 句柄除存储引用和运行 id 本身外不携带任何后端状态。
#[derive(Clone)]
pub struct TestReport {
    store: Arc<dyn ReportStore>,
    run_id: String,
}

impl TestReport {
    /// Binds a handle to `run_id` within `store`.
    ///
    /// An empty or reserved run id is a caller-contract violation and is
    /// rejected immediately.
    ///
    /// 将句柄绑定到 `store` 内的 `run_id`。
    /// 空的或被保留的运行 id 属于调用方契约违规，会被立即拒绝。
    pub fn new(store: Arc<dyn ReportStore>, run_id: &str) -> Result<Self, StoreError> {
        validate_run_id(run_id)?;
        Ok(Self {
            store,
            run_id: run_id.to_string(),
        })
    }

    /// The run id this handle is bound to.
    /// 此句柄绑定的运行 id。
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// True once at least one document has been saved under this run id.
    /// 一旦此运行 id 下至少保存了一个文档即为 true。
    pub async fn exists(&self) -> bool {
        self.store.list_reports().await.contains(&self.run_id)
    }

    /// See [`ReportStore::save_document`].
    /// 见 [`ReportStore::save_document`]。
    pub async fn save_json_document(&self, type_label: &str, document: Value, key: &str, is_big: bool) {
        self.store
            .save_document(&self.run_id, type_label, document, key, is_big)
            .await;
    }

    /// See [`ReportStore::retrieve_document`].
    /// 见 [`ReportStore::retrieve_document`]。
    pub async fn retrieve_document(&self, type_label: &str, key: &str) -> Option<Value> {
        self.store
            .retrieve_document(&self.run_id, type_label, key)
            .await
    }

    /// Streams the document under `key`, flattening absence into an empty
    /// stream. Callers that must distinguish absent from empty use
    /// [`ReportStore::stream_document`] directly.
    ///
    /// 流式输出 `key` 下的文档，将缺失展平为空流。
    /// 必须区分缺失与空内容的调用方直接使用 [`ReportStore::stream_document`]。
    pub async fn stream_document(&self, type_label: &str, key: &str) -> DocumentStream {
        match self
            .store
            .stream_document(&self.run_id, type_label, key)
            .await
        {
            Some(stream) => stream,
            None => Box::pin(futures::stream::empty()),
        }
    }

    /// Irreversibly deletes this run's namespace.
    /// 不可逆地删除此运行的命名空间。
    pub async fn delete(&self) -> Result<(), StoreError> {
        self.store.delete_report(&self.run_id).await
    }
}

/// Obtains the run-scoped handle for `run_id`. Idempotent.
/// 获取 `run_id` 的运行范围句柄。幂等。
pub fn get_report(store: &Arc<dyn ReportStore>, run_id: &str) -> Result<TestReport, StoreError> {
    TestReport::new(Arc::clone(store), run_id)
}

/// Stamps a JSON object with its own document key so that every stored
/// document is self-describing. Non-object payloads are passed through
/// unchanged; they carry no fields to stamp.
///
/// 为 JSON 对象盖上其自身文档键的戳记，使每个已存储文档都是自描述的。
/// 非对象负载原样通过；它们没有可盖戳的字段。
pub(crate) fn stamp_document(mut document: Value, key: &str) -> Value {
    if let Value::Object(ref mut fields) = document {
        fields.insert(
            "document_key".to_string(),
            Value::String(key.to_string()),
        );
    }
    document
}

/// Rejects run ids that cannot serve as a report namespace: empty strings,
/// the reserved logs namespace, and ids that would escape the store root
/// when used as a directory name.
///
/// 拒绝不能用作报告命名空间的运行 id：空字符串、保留的日志命名空间，
/// 以及用作目录名时会逃逸存储根目录的 id。
pub(crate) fn validate_run_id(run_id: &str) -> Result<(), StoreError> {
    if run_id.is_empty() {
        return Err(StoreError::InvalidRunId {
            run_id: run_id.to_string(),
            reason: "run id must not be empty".to_string(),
        });
    }
    if run_id == LOGS_NAMESPACE {
        return Err(StoreError::InvalidRunId {
            run_id: run_id.to_string(),
            reason: format!("'{LOGS_NAMESPACE}' is reserved for operational log entries"),
        });
    }
    if run_id == ".." || run_id == "." || run_id.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidRunId {
            run_id: run_id.to_string(),
            reason: "run id must not contain path elements".to_string(),
        });
    }
    Ok(())
}

/// Shared guard for the absorbing read/write paths: logs and rejects
/// contract-violating run ids and keys without raising.
///
/// 吸收型读/写路径的共享守卫：记录并拒绝违反契约的运行 id 和键，
/// 但不抛出。
pub(crate) fn checked_namespace(run_id: &str, key: &str, operation: &str) -> bool {
    if let Err(e) = validate_run_id(run_id) {
        warn!(run_id, operation, error = %e, "rejecting document operation");
        return false;
    }
    if let Err(e) = super::addressing::validate_key(key) {
        warn!(run_id, key, operation, error = %e, "rejecting document operation");
        return false;
    }
    true
}
