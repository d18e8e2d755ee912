//! # Core Module / 核心模块
//!
//! This module contains the core functionality of OneHop Runner,
//! including run lifecycle models, configuration, worker process
//! management and the test harness that ties them together.
//!
//! 此模块包含 OneHop Runner 的核心功能，
//! 包括运行生命周期模型、配置、工作进程管理以及将它们联系在一起的测试编排器。

pub mod config;
pub mod harness;
pub mod models;
pub mod registry;
pub mod worker;

// Re-exports
pub use config::HarnessConfig;
pub use harness::TestHarness;
pub use models::{RunState, TestRunParameters};
pub use registry::RunRegistry;
pub use worker::WorkerProcess;
