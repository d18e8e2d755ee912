//! # Report Module / 报告模块
//!
//! This module handles the addressing and persistence of test report
//! documents. Every artifact produced by a test run is a JSON document
//! stored under a deterministic hierarchical key, and the storage layer is
//! pluggable: a filesystem backend and a document-database backend share one
//! `ReportStore` contract.
//!
//! 此模块处理测试报告文档的寻址和持久化。
//! 测试运行产生的每个产物都是一个 JSON 文档，存储在确定性的分层键下，
//! 存储层是可插拔的：文件系统后端和文档数据库后端共享同一个 `ReportStore` 契约。

pub mod addressing;
pub mod database;
pub mod fs;
pub mod objects;
pub mod store;

// Re-export common report types
pub use addressing::{build_key, parse_unit_test_label, Component, UnitTestLabel};
pub use database::DocumentReportStore;
pub use fs::FileReportStore;
pub use objects::ObjectStore;
pub use store::{get_report, DocumentStream, ReportStore, StoreError, TestReport};
