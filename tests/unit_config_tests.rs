//! # Config Module Unit Tests / 配置模块单元测试
//!
//! This module contains unit tests for the `config.rs` module, covering
//! TOML parsing, defaulting and the store factory.
//!
//! 此模块包含 `config.rs` 模块的单元测试，覆盖 TOML 解析、默认值和存储工厂。

use serde_json::json;
use tempfile::tempdir;

use onehop_runner::core::config::{load_config, HarnessConfig, StoreConfig};

#[cfg(test)]
mod parsing_tests {
    use super::*;

    #[test]
    fn test_empty_config_yields_defaults() {
        // 空文件应得到可用的文件系统后端配置
        let config: HarnessConfig = toml::from_str("").expect("empty config should parse");

        match config.store {
            StoreConfig::Filesystem { root, name } => {
                assert_eq!(root.to_string_lossy(), "test_results");
                assert_eq!(name, "test_reports");
            }
            other => panic!("unexpected default store config: {other:?}"),
        }
        assert_eq!(config.worker.timeout_secs, 120);
        assert_eq!(config.worker.poll_timeout_secs, 1);
        assert_eq!(config.worker.runner_command, "onehop-tests");
        assert_eq!(config.worker.work_dir, None);
    }

    #[test]
    fn test_database_backend_config() {
        let config: HarnessConfig = toml::from_str(
            r#"
            [store]
            backend = "database"
            url = "sqlite:reports/onehop.db?mode=rwc"
            object_root = "reports/objects"

            [worker]
            timeout_secs = 30
            runner_command = "onehop-tests --verbose"
            work_dir = "/opt/onehop"
            "#,
        )
        .expect("database config should parse");

        match config.store {
            StoreConfig::Database {
                url,
                object_root,
                name,
            } => {
                assert_eq!(url, "sqlite:reports/onehop.db?mode=rwc");
                assert_eq!(object_root.to_string_lossy(), "reports/objects");
                assert_eq!(name, "test_reports");
            }
            other => panic!("unexpected store config: {other:?}"),
        }
        assert_eq!(config.worker.timeout_secs, 30);
        assert_eq!(
            config
                .worker
                .work_dir
                .as_deref()
                .map(|p| p.to_string_lossy().to_string()),
            Some("/opt/onehop".to_string())
        );
    }

    #[test]
    fn test_load_config_missing_file_fails() {
        let result = load_config("definitely/not/a/real/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempdir().expect("Failed to create temporary directory");
        let path = dir.path().join("onehop.toml");
        std::fs::write(&path, "[worker]\npoll_timeout_secs = 2\n").expect("Failed to write config");

        let config = load_config(&path).expect("config file should load");
        assert_eq!(config.worker.poll_timeout_secs, 2);
    }
}

#[cfg(test)]
mod factory_tests {
    use super::*;

    #[tokio::test]
    async fn test_filesystem_factory_builds_working_store() {
        let dir = tempdir().expect("Failed to create temporary directory");
        let config = StoreConfig::Filesystem {
            root: dir.path().to_path_buf(),
            name: "factory_test".to_string(),
        };

        let store = config.build().await.expect("factory should build the store");
        assert_eq!(store.store_name(), "factory_test");

        store
            .save_document("r1", "Summary", json!({"a": 1}), "summary", false)
            .await;
        assert!(store.list_reports().await.contains("r1"));
    }

    #[tokio::test]
    async fn test_database_factory_probes_connectivity() {
        // 无法到达的数据库在构造时立即失败，而不是在写路径上
        let config = StoreConfig::Database {
            url: "sqlite:/definitely/not/a/real/dir/reports.db".to_string(),
            object_root: std::env::temp_dir().join("onehop_factory_objects"),
            name: "factory_test".to_string(),
        };

        let result = config.build().await;
        assert!(result.is_err());
    }
}
