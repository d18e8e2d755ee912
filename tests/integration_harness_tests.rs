//! # Test Harness Integration Tests / 测试编排器集成测试
//!
//! Exercises the run controller end to end against a filesystem-backed
//! report store: run idempotency, non-blocking status polling, read
//! accessors and run deletion. The "test runner" is faked with small shell
//! commands that speak the worker protocol (bare-integer progress lines).
//!
//! 针对文件系统报告存储端到端地测试运行控制器：运行幂等性、非阻塞状态
//! 轮询、读取访问器和运行删除。“测试运行器”用说工作进程协议
//! （裸整数进度行）的小型 shell 命令伪造。

mod common;

use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use onehop_runner::core::config::WorkerConfig;
use onehop_runner::core::harness::{HarnessError, TestHarness, TEST_RUN_SUMMARY};
use onehop_runner::core::models::TestRunParameters;
use onehop_runner::core::registry::RunRegistry;
use onehop_runner::report::addressing::Component;
use onehop_runner::report::store::ReportStore;

/// A worker config whose "runner" is an inline shell command.
fn fake_runner(command: &str) -> WorkerConfig {
    WorkerConfig {
        timeout_secs: 5,
        poll_timeout_secs: 1,
        runner_command: command.to_string(),
        work_dir: None,
    }
}

#[tokio::test]
#[cfg(not(target_os = "windows"))]
async fn test_run_twice_spawns_exactly_one_worker() {
    let (_root, store) = common::file_store("harness").await;
    let registry = Arc::new(RunRegistry::new());
    let harness = TestHarness::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        fake_runner(r#"sh -c "sleep 5""#),
    )
    .expect("harness should construct");

    let params = TestRunParameters::default();
    harness.run(&params).await;

    let entry = registry
        .get(harness.run_id())
        .await
        .expect("run should be registered");
    let first_pid = entry.lock().await.worker.process_id();
    assert!(first_pid.is_some());

    // 对同一活动运行 id 的第二次 run() 是空操作：没有第二个工作进程
    harness.run(&params).await;
    assert_eq!(registry.run_ids().await.len(), 1);
    assert_eq!(entry.lock().await.worker.process_id(), first_pid);

    harness.delete().await.expect("cleanup should succeed");
}

#[tokio::test]
#[cfg(not(target_os = "windows"))]
async fn test_get_status_drains_percentage_lines() {
    let (_root, store) = common::file_store("harness").await;
    let registry = Arc::new(RunRegistry::new());
    let harness = TestHarness::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        fake_runner(r#"sh -c "echo 25; echo starting edge tests; echo 60; sleep 5""#),
    )
    .expect("harness should construct");

    harness.run(&TestRunParameters::default()).await;

    // 排空挂起的进度行：缓存最后一个值，普通控制台行被忽略
    let status = harness.get_status().await;
    assert_eq!(status, 60);

    harness.delete().await.expect("cleanup should succeed");
}

#[tokio::test]
#[cfg(not(target_os = "windows"))]
async fn test_get_status_forces_completion_on_worker_exit() {
    let (_root, store) = common::file_store("harness").await;
    let registry = Arc::new(RunRegistry::new());
    let harness = TestHarness::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        fake_runner(r#"sh -c "echo 50""#),
    )
    .expect("harness should construct");

    harness.run(&TestRunParameters::default()).await;

    // The worker prints 50 and exits without an explicit 100 line; the
    // end-of-stream alone forces completion.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.get_status().await, 100);

    // Completion is sticky.
    assert_eq!(harness.get_status().await, 100);
}

#[tokio::test]
async fn test_get_status_returns_100_for_materialized_report() {
    let (_root, store) = common::file_store("harness").await;
    let registry = Arc::new(RunRegistry::new());

    store
        .save_document("r1", "Summary", json!({"done": true}), TEST_RUN_SUMMARY, false)
        .await;

    // 只读绑定：存储中已存在的报告立即读为 100，无需任何工作进程
    let harness = TestHarness::bind(
        Arc::clone(&store),
        Arc::clone(&registry),
        WorkerConfig::default(),
        "r1",
    )
    .expect("harness should bind");
    assert_eq!(harness.get_status().await, 100);
}

#[tokio::test]
async fn test_get_status_unknown_run_reads_as_zero() {
    let (_root, store) = common::file_store("harness").await;
    let harness = TestHarness::bind(
        store,
        Arc::new(RunRegistry::new()),
        WorkerConfig::default(),
        "never_started",
    )
    .expect("harness should bind");

    assert_eq!(harness.get_status().await, 0);
}

#[tokio::test]
#[cfg(not(target_os = "windows"))]
async fn test_abandoned_run_never_progresses() {
    let (_root, store) = common::file_store("harness").await;
    let registry = Arc::new(RunRegistry::new());
    let harness = TestHarness::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        fake_runner("this_command_does_not_exist_12345"),
    )
    .expect("harness should construct");

    // 启动失败被吸收：run() 不返回错误，运行只是永远不推进
    harness.run(&TestRunParameters::default()).await;

    let entry = registry
        .get(harness.run_id())
        .await
        .expect("run should be registered");
    assert!(entry.lock().await.worker.process_id().is_none());
    assert_eq!(harness.get_status().await, 0);
}

#[tokio::test]
async fn test_read_accessors_return_none_until_materialized() {
    let (_root, store) = common::file_store("harness").await;
    let harness = TestHarness::bind(
        Arc::clone(&store),
        Arc::new(RunRegistry::new()),
        WorkerConfig::default(),
        "r1",
    )
    .expect("harness should bind");

    assert_eq!(harness.get_summary().await, None);
    assert_eq!(harness.get_index().await, None);
    assert_eq!(
        harness.get_resource_summary(Component::KP, None, "Automat").await,
        None
    );
    assert_eq!(
        harness.get_details(Component::ARA, Some("Aragorn"), "Automat", 3).await,
        None
    );

    // 工作进程随后直接写入存储（此处由测试代为写入）
    store
        .save_document("r1", "Summary", json!({"passed": 7}), TEST_RUN_SUMMARY, false)
        .await;
    store
        .save_document(
            "r1",
            "Resource Summary",
            json!({"edges": 5}),
            "KP/Automat/resource_summary",
            false,
        )
        .await;
    store
        .save_document(
            "r1",
            "Details",
            json!({"edge": 3}),
            "ARA/Aragorn/Automat/Automat-3",
            false,
        )
        .await;

    let summary = harness.get_summary().await.expect("summary should appear");
    assert_eq!(summary["passed"], json!(7));

    let resource = harness
        .get_resource_summary(Component::KP, None, "Automat")
        .await
        .expect("resource summary should appear");
    assert_eq!(resource["edges"], json!(5));

    let details = harness
        .get_details(Component::ARA, Some("Aragorn"), "Automat", 3)
        .await
        .expect("details should appear");
    assert_eq!(details["edge"], json!(3));
}

#[tokio::test]
async fn test_streamed_response_file_raises_on_absence() {
    let (_root, store) = common::file_store("harness").await;
    let harness = TestHarness::bind(
        Arc::clone(&store),
        Arc::new(RunRegistry::new()),
        WorkerConfig::default(),
        "r1",
    )
    .expect("harness should bind");

    // 一次性下载访问器是唯一会抛出的读取接口
    let missing = harness
        .get_streamed_response_file(Component::KP, None, "Automat", 1, "input")
        .await;
    assert!(matches!(
        missing,
        Err(HarnessError::DocumentNotFound { .. })
    ));

    store
        .save_document(
            "r1",
            "Response",
            json!({"knowledge_graph": {"nodes": 2}}),
            "KP/Automat/Automat-1/input",
            true,
        )
        .await;

    let stream = harness
        .get_streamed_response_file(Component::KP, None, "Automat", 1, "input")
        .await
        .expect("response file should stream");
    let body = stream.collect::<Vec<String>>().await.join("\n");
    assert!(body.contains("knowledge_graph"));
}

#[tokio::test]
async fn test_list_runs_and_delete() {
    let (_root, store) = common::file_store("harness").await;
    let registry = Arc::new(RunRegistry::new());
    let harness = TestHarness::bind(
        Arc::clone(&store),
        Arc::clone(&registry),
        WorkerConfig::default(),
        "r1",
    )
    .expect("harness should bind");

    assert!(harness.list_runs().await.is_empty());

    store
        .save_document("r1", "Summary", json!({"a": 1}), TEST_RUN_SUMMARY, false)
        .await;
    assert_eq!(harness.list_runs().await, vec!["r1".to_string()]);

    harness.delete().await.expect("delete should succeed");
    assert!(harness.list_runs().await.is_empty());
    assert_eq!(harness.get_summary().await, None);
}

#[tokio::test]
#[cfg(not(target_os = "windows"))]
async fn test_run_command_line_embeds_run_id_and_parameters() {
    let (_root, store) = common::file_store("harness").await;
    let registry = Arc::new(RunRegistry::new());
    let harness = TestHarness::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        fake_runner("this_command_does_not_exist_12345"),
    )
    .expect("harness should construct");

    let params = TestRunParameters {
        trapi_version: Some("1.4.0".to_string()),
        biolink_version: Some("3.5.0".to_string()),
        primary_source: Some("Automat".to_string()),
        secondary_source: Some("Aragorn".to_string()),
        single_edge_only: true,
        log_level: Some("debug".to_string()),
        timeout_secs: None,
    };
    harness.run(&params).await;

    let entry = registry
        .get(harness.run_id())
        .await
        .expect("run should be registered");
    let command_line = entry.lock().await.command_line.clone();

    // 运行 id 被嵌入，使被派生的进程能够自寻址其报告写入
    assert!(command_line.contains(&format!("--run_id {}", harness.run_id())));
    assert!(command_line.contains("--trapi_version 1.4.0"));
    assert!(command_line.contains("--biolink_version 3.5.0"));
    assert!(command_line.contains("--kp_id Automat"));
    assert!(command_line.contains("--ara_id Aragorn"));
    assert!(command_line.contains("--one"));
    assert!(command_line.contains("--log_level debug"));
}
