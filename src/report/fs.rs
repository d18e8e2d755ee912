//! # Filesystem Report Backend / 文件系统报告后端
//!
//! One root directory per named store, one subdirectory per run id, and one
//! file per document at a path derived verbatim from the document key.
//! Directories are created on demand. `is_big` gets no special handling
//! here; the filesystem has no record-size limit to work around.
//!
//! 每个命名存储一个根目录，每个运行 id 一个子目录，每个文档一个文件，
//! 文件路径直接由文档键导出。目录按需创建。`is_big` 在此没有特殊处理；
//! 文件系统没有需要规避的记录大小限制。

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::report::store::{
    checked_namespace, stamp_document, DocumentStream, ReportStore, StoreError, LOGS_NAMESPACE,
};

/// Report storage over a plain directory tree:
/// `{root}/{store_name}/{run_id}/{document_key}.json`.
///
/// 基于普通目录树的报告存储。
pub struct FileReportStore {
    name: String,
    root: PathBuf,
}

impl FileReportStore {
    /// Opens (creating on demand) the named store under `root` and records
    /// a creation entry in the reserved logs namespace.
    ///
    /// 打开（按需创建）`root` 下的命名存储，
    /// 并在保留的日志命名空间中记录一条创建条目。
    pub async fn new(root: impl AsRef<Path>, name: &str) -> Result<Self, StoreError> {
        let store = Self {
            name: name.to_string(),
            root: root.as_ref().to_path_buf(),
        };

        fs::create_dir_all(store.store_dir().join(LOGS_NAMESPACE))
            .await
            .map_err(|e| StoreError::Io {
                operation: "create report store".to_string(),
                details: e.to_string(),
            })?;

        store
            .log_event(json!({"event": "store_opened", "store": name}))
            .await;
        Ok(store)
    }

    fn store_dir(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.store_dir().join(run_id)
    }

    /// The document key maps verbatim onto the path below the run directory;
    /// slashes in the key become directory levels.
    /// 文档键逐字映射到运行目录下的路径；键中的斜杠成为目录层级。
    fn document_path(&self, run_id: &str, key: &str) -> PathBuf {
        self.run_dir(run_id).join(format!("{key}.json"))
    }
}

#[async_trait]
impl ReportStore for FileReportStore {
    fn store_name(&self) -> &str {
        &self.name
    }

    async fn save_document(
        &self,
        run_id: &str,
        type_label: &str,
        document: Value,
        key: &str,
        _is_big: bool,
    ) {
        if !checked_namespace(run_id, key, "save") {
            return;
        }

        let path = self.document_path(run_id, key);
        let document = stamp_document(document, key);
        debug!(run_id, type_label, key, "saving report document");

        let result: std::io::Result<()> = async {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            let body = serde_json::to_vec_pretty(&document)?;
            fs::write(&path, body).await
        }
        .await;

        if let Err(e) = result {
            // Fire-and-forget write path: the failure is logged and the
            // document is dropped.
            error!(run_id, type_label, key, error = %e, "failed to save report document");
        }
    }

    async fn retrieve_document(&self, run_id: &str, type_label: &str, key: &str) -> Option<Value> {
        if !checked_namespace(run_id, key, "retrieve") {
            return None;
        }

        let path = self.document_path(run_id, key);
        let body = match fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(run_id, type_label, key, error = %e, "failed to read report document");
                return None;
            }
        };

        match serde_json::from_str(&body) {
            Ok(document) => Some(document),
            Err(e) => {
                warn!(run_id, type_label, key, error = %e, "stored report document is not valid JSON");
                None
            }
        }
    }

    async fn stream_document(
        &self,
        run_id: &str,
        _type_label: &str,
        key: &str,
    ) -> Option<DocumentStream> {
        if !checked_namespace(run_id, key, "stream") {
            return None;
        }

        let file = match fs::File::open(self.document_path(run_id, key)).await {
            Ok(file) => file,
            Err(_) => return None,
        };

        let lines = LinesStream::new(BufReader::new(file).lines())
            .filter_map(|line| async move { line.ok() });
        Some(Box::pin(lines))
    }

    async fn delete_report(&self, run_id: &str) -> Result<(), StoreError> {
        crate::report::store::validate_run_id(run_id)?;

        match fs::remove_dir_all(self.run_dir(run_id)).await {
            Ok(()) => {
                self.log_event(json!({"event": "report_deleted", "run_id": run_id}))
                    .await;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io {
                operation: "delete report".to_string(),
                details: e.to_string(),
            }),
        }
    }

    async fn drop_store(&self) -> Result<(), StoreError> {
        match fs::remove_dir_all(self.store_dir()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io {
                operation: "drop store".to_string(),
                details: e.to_string(),
            }),
        }
    }

    async fn list_reports(&self) -> HashSet<String> {
        let mut run_ids = HashSet::new();
        let mut entries = match fs::read_dir(self.store_dir()).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(store = %self.name, error = %e, "failed to list report namespaces");
                return run_ids;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Ok(dir_name) = entry.file_name().into_string() {
                if dir_name != LOGS_NAMESPACE {
                    run_ids.insert(dir_name);
                }
            }
        }
        run_ids
    }

    async fn log_event(&self, event: Value) {
        let entry = json!({
            "logged_at": Utc::now().to_rfc3339(),
            "event": event,
        });
        // Append-only: every entry gets a fresh uniquely named file.
        let file_name = format!(
            "{}-{}.json",
            Utc::now().format("%Y-%m-%d_%H-%M-%S"),
            Uuid::new_v4().simple()
        );
        let path = self.store_dir().join(LOGS_NAMESPACE).join(file_name);

        let result: std::io::Result<()> = async {
            let body = serde_json::to_vec_pretty(&entry)?;
            fs::write(&path, body).await
        }
        .await;

        if let Err(e) = result {
            error!(store = %self.name, error = %e, "failed to append operational log entry");
        }
    }
}
