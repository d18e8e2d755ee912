//! # Large-Object Store / 大对象存储
//!
//! Companion store for oversized payloads (typically raw TRAPI response
//! bodies) that would hit record-size limits in the document-database
//! backend. Each payload lives in its own file under a per-run directory and
//! is named by a generated object id; the database keeps only a small
//! pointer record.
//!
//! 用于超大负载（通常是原始 TRAPI 响应体）的伴随存储，
//! 这些负载会触及文档数据库后端的记录大小限制。每个负载保存在按运行划分的
//! 目录下的独立文件中，并以生成的对象 id 命名；数据库只保留一条小的指针记录。

use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing::warn;
use uuid::Uuid;

use crate::report::store::{DocumentStream, StoreError};

/// Flat per-run payload storage addressed by generated object ids.
/// 按生成的对象 id 寻址的、按运行划分的负载存储。
#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    /// Opens (creating on demand) the object store rooted at `root`.
    /// 打开（按需创建）以 `root` 为根的对象存储。
    pub async fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| io_error("create object store root", &e))?;
        Ok(Self { root })
    }

    /// Writes `content` as a new object under `run_id` and returns its
    /// object id. The id is relative to the store root and resolvable by
    /// [`ObjectStore::stream`].
    ///
    /// 将 `content` 作为新对象写入 `run_id` 下并返回其对象 id。
    /// 该 id 相对于存储根目录，可由 [`ObjectStore::stream`] 解析。
    pub async fn put(&self, run_id: &str, content: &str) -> Result<String, StoreError> {
        let object_id = format!("{run_id}/{}", Uuid::new_v4().simple());
        let path = self.root.join(&object_id);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create object run directory", &e))?;
        }
        fs::write(&path, content)
            .await
            .map_err(|e| io_error("write object", &e))?;

        Ok(object_id)
    }

    /// Lazily streams the text lines of one stored object, or `None` if the
    /// id resolves to nothing (or to something outside the store root).
    ///
    /// 惰性地流式输出一个已存储对象的文本行；若该 id 解析不到任何内容
    /// （或解析到存储根目录之外）则返回 `None`。
    pub async fn stream(&self, object_id: &str) -> Option<DocumentStream> {
        if !valid_object_id(object_id) {
            warn!(object_id, "rejecting malformed object id");
            return None;
        }

        let path = self.root.join(object_id);
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(_) => return None,
        };

        let lines = LinesStream::new(BufReader::new(file).lines())
            .filter_map(|line| async move { line.ok() });
        Some(Box::pin(lines))
    }

    /// Removes every object stored under `run_id`. Missing directories are
    /// not an error; the run may simply have produced no big documents.
    ///
    /// 移除存储在 `run_id` 下的每个对象。目录缺失不是错误；
    /// 该运行可能根本没有产生大文档。
    pub async fn delete_run(&self, run_id: &str) -> Result<(), StoreError> {
        match fs::remove_dir_all(self.root.join(run_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete run objects", &e)),
        }
    }

    /// Irreversibly removes the whole object store.
    /// 不可逆地移除整个对象存储。
    pub async fn drop_all(&self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("drop object store", &e)),
        }
    }
}

/// Object ids are `{run_id}/{uuid}`; anything else came from a corrupted
/// pointer record and must not be resolved against the filesystem.
/// 对象 id 形如 `{run_id}/{uuid}`；其他任何形式都来自损坏的指针记录，
/// 绝不能拿去解析文件系统。
fn valid_object_id(object_id: &str) -> bool {
    let mut segments = object_id.split('/');
    let well_formed = |s: &str| {
        !s.is_empty() && s != ".." && s != "." && !s.contains(['\\', '\0'])
    };
    matches!(
        (segments.next(), segments.next(), segments.next()),
        (Some(run), Some(object), None) if well_formed(run) && well_formed(object)
    )
}

fn io_error(operation: &str, e: &std::io::Error) -> StoreError {
    StoreError::Io {
        operation: operation.to_string(),
        details: e.to_string(),
    }
}
