// Shared test helpers for integration tests
#![allow(dead_code)]

use std::sync::Arc;
use tempfile::{tempdir, TempDir};

use onehop_runner::report::database::DocumentReportStore;
use onehop_runner::report::fs::FileReportStore;
use onehop_runner::report::store::ReportStore;

/// A filesystem-backed report store rooted in a fresh temporary directory.
/// The `TempDir` guard must be kept alive for the duration of the test.
pub async fn file_store(name: &str) -> (TempDir, Arc<dyn ReportStore>) {
    let dir = tempdir().expect("Failed to create temporary store root");
    let store = FileReportStore::new(dir.path(), name)
        .await
        .expect("Failed to open filesystem report store");
    (dir, Arc::new(store))
}

/// A document-database report store over a fresh SQLite file, with its
/// companion object store alongside.
pub async fn database_store(name: &str) -> (TempDir, Arc<dyn ReportStore>) {
    let dir = tempdir().expect("Failed to create temporary store root");
    let store = DocumentReportStore::from_path(
        dir.path().join("reports.db"),
        name,
        dir.path().join("objects"),
    )
    .await
    .expect("Failed to open document-database report store");
    (dir, Arc::new(store))
}
