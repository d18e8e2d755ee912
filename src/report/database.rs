//! # Document-Database Report Backend / 文档数据库报告后端
//!
//! Report storage over an embedded SQLite database: one shared `documents`
//! table where each run id forms its own logical collection of JSON records
//! tagged by document key. Oversized payloads are offloaded to the companion
//! [`ObjectStore`] and represented in the table by a small pointer record.
//!
//! Construction performs a connectivity probe and fails with a dedicated
//! connection error, the one backend-construction-time error in the whole
//! storage subsystem.
//!
//! 基于嵌入式 SQLite 数据库的报告存储：一个共享的 `documents` 表，
//! 每个运行 id 构成其自己的逻辑集合，JSON 记录以文档键标记。
//! 超大负载被卸载到伴随的大对象存储，表中只保留一条小的指针记录。
//! 构造时执行连通性探测，失败时返回专用的连接错误。

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, error, warn};

use crate::report::objects::ObjectStore;
use crate::report::store::{
    checked_namespace, stamp_document, DocumentStream, ReportStore, StoreError,
};

/// One row of the shared `documents` table.
/// 共享 `documents` 表的一行。
#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    document: String,
    object_id: Option<String>,
}

/// Report storage backed by SQLite plus a companion large-object store.
/// 由 SQLite 和伴随大对象存储支持的报告存储。
pub struct DocumentReportStore {
    name: String,
    pool: SqlitePool,
    objects: ObjectStore,
}

impl DocumentReportStore {
    /// Connects to the database at `url`, probing connectivity immediately,
    /// and prepares the schema and the companion object store.
    ///
    /// # Errors
    /// [`StoreError::Connection`] when the database cannot be reached; this
    /// is deliberately raised at construction time rather than surfacing
    /// later on the fire-and-forget write path.
    ///
    /// 连接 `url` 处的数据库，立即探测连通性，并准备好模式和伴随的
    /// 对象存储。数据库无法到达时在构造时抛出专用的连接错误，
    /// 而不是之后在 fire-and-forget 写路径上浮现。
    pub async fn connect(
        url: &str,
        name: &str,
        object_root: impl AsRef<Path>,
    ) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection {
                details: format!("'{url}': {e}"),
            })?;

        let store = Self {
            name: name.to_string(),
            pool,
            objects: ObjectStore::new(object_root).await?,
        };
        store.init_schema().await?;
        store
            .log_event(json!({"event": "store_opened", "store": name}))
            .await;
        Ok(store)
    }

    /// Convenience constructor from a database file path: creates parent
    /// directories, builds the connection URL in read-write-create mode and
    /// delegates to [`DocumentReportStore::connect`].
    ///
    /// 从数据库文件路径出发的便捷构造函数：创建父目录，
    /// 以读写创建模式构建连接 URL，并委托给 [`DocumentReportStore::connect`]。
    pub async fn from_path(
        path: impl AsRef<Path>,
        name: &str,
        object_root: impl AsRef<Path>,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Connection {
                    details: format!("could not create {}: {e}", parent.display()),
                })?;
            }
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        Self::connect(&url, name, object_root).await
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                store_name   TEXT NOT NULL,
                run_id       TEXT NOT NULL,
                document_key TEXT NOT NULL,
                type_label   TEXT NOT NULL,
                document     TEXT NOT NULL,
                object_id    TEXT,
                saved_at     TEXT NOT NULL,
                PRIMARY KEY (store_name, run_id, document_key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Operational log entries live in their own table so the reserved
        // namespace can never collide with run-id space.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS store_logs (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                store_name TEXT NOT NULL,
                logged_at  TEXT NOT NULL,
                event      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_row(&self, run_id: &str, key: &str) -> Result<Option<DocumentRow>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT document, object_id
            FROM documents
            WHERE store_name = ? AND run_id = ? AND document_key = ?
            "#,
        )
        .bind(&self.name)
        .bind(run_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl ReportStore for DocumentReportStore {
    fn store_name(&self) -> &str {
        &self.name
    }

    async fn save_document(
        &self,
        run_id: &str,
        type_label: &str,
        document: Value,
        key: &str,
        is_big: bool,
    ) {
        if !checked_namespace(run_id, key, "save") {
            return;
        }

        debug!(run_id, type_label, key, is_big, "saving report document");

        let result: Result<(), StoreError> = async {
            let document = stamp_document(document, key);

            // Oversized payloads go to the object store; the record in the
            // collection becomes a pointer that stream_document resolves.
            let (record, object_id) = if is_big {
                let content = serde_json::to_string_pretty(&document)?;
                let object_id = self.objects.put(run_id, &content).await?;
                let pointer = json!({
                    "document_key": key,
                    "object_id": object_id.clone(),
                });
                (pointer.to_string(), Some(object_id))
            } else {
                (document.to_string(), None)
            };

            sqlx::query(
                r#"
                INSERT OR REPLACE INTO documents
                    (store_name, run_id, document_key, type_label, document, object_id, saved_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&self.name)
            .bind(run_id)
            .bind(key)
            .bind(type_label)
            .bind(&record)
            .bind(&object_id)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

            Ok(())
        }
        .await;

        if let Err(e) = result {
            error!(run_id, type_label, key, error = %e, "failed to save report document");
        }
    }

    async fn retrieve_document(&self, run_id: &str, type_label: &str, key: &str) -> Option<Value> {
        if !checked_namespace(run_id, key, "retrieve") {
            return None;
        }

        let row = match self.fetch_row(run_id, key).await {
            Ok(row) => row?,
            Err(e) => {
                warn!(run_id, type_label, key, error = %e, "failed to fetch report document");
                return None;
            }
        };

        // An offloaded document reads back as its pointer record; the full
        // content is reachable through stream_document.
        match serde_json::from_str(&row.document) {
            Ok(document) => Some(document),
            Err(e) => {
                warn!(run_id, type_label, key, error = %e, "stored report record is not valid JSON");
                None
            }
        }
    }

    async fn stream_document(
        &self,
        run_id: &str,
        type_label: &str,
        key: &str,
    ) -> Option<DocumentStream> {
        if !checked_namespace(run_id, key, "stream") {
            return None;
        }

        let row = match self.fetch_row(run_id, key).await {
            Ok(row) => row?,
            Err(e) => {
                warn!(run_id, type_label, key, error = %e, "failed to fetch report document");
                return None;
            }
        };

        match row.object_id {
            Some(object_id) => self.objects.stream(&object_id).await,
            None => {
                let lines: Vec<String> = row.document.lines().map(str::to_string).collect();
                Some(Box::pin(futures::stream::iter(lines)))
            }
        }
    }

    async fn delete_report(&self, run_id: &str) -> Result<(), StoreError> {
        crate::report::store::validate_run_id(run_id)?;

        sqlx::query("DELETE FROM documents WHERE store_name = ? AND run_id = ?")
            .bind(&self.name)
            .bind(run_id)
            .execute(&self.pool)
            .await?;
        self.objects.delete_run(run_id).await?;

        self.log_event(json!({"event": "report_deleted", "run_id": run_id}))
            .await;
        Ok(())
    }

    async fn drop_store(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE store_name = ?")
            .bind(&self.name)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM store_logs WHERE store_name = ?")
            .bind(&self.name)
            .execute(&self.pool)
            .await?;
        self.objects.drop_all().await
    }

    async fn list_reports(&self) -> HashSet<String> {
        let run_ids = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT run_id FROM documents WHERE store_name = ?",
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await;

        match run_ids {
            Ok(run_ids) => run_ids.into_iter().collect(),
            Err(e) => {
                warn!(store = %self.name, error = %e, "failed to list report namespaces");
                HashSet::new()
            }
        }
    }

    async fn log_event(&self, event: Value) {
        let result = sqlx::query(
            "INSERT INTO store_logs (store_name, logged_at, event) VALUES (?, ?, ?)",
        )
        .bind(&self.name)
        .bind(Utc::now().to_rfc3339())
        .bind(event.to_string())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            error!(store = %self.name, error = %e, "failed to append operational log entry");
        }
    }
}
