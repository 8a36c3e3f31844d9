
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.store.path.ends_with(".deferq/queue.db"));
        assert_eq!(config.worker.execution_time_secs, 300);
        assert_eq!(config.worker.polling_interval_secs, 4);
        assert_eq!(config.worker.resolve_failure, ResolveFailurePolicy::Skip);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn test_partial_worker_section_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [worker]
            polling_interval_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.worker.polling_interval_secs, 10);
        assert_eq!(config.worker.execution_time_secs, 300);
        assert_eq!(config.worker.resolve_failure, ResolveFailurePolicy::Skip);
    }

    #[test]
    fn test_resolve_failure_policy_lowercase() {
        let config: Config = toml::from_str(
            r#"
            [worker]
            resolve_failure = "abort"
            "#,
        )
        .unwrap();
        assert_eq!(config.worker.resolve_failure, ResolveFailurePolicy::Abort);

        let bad: Result<Config, _> = toml::from_str(
            r#"
            [worker]
            resolve_failure = "Retry"
            "#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_logging_dir() {
        let config: Config = toml::from_str(
            r#"
            [logging]
            level = "debug"
            dir = "/var/log/deferq"
            "#,
        )
        .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.dir, Some(PathBuf::from("/var/log/deferq")));
    }

    #[test]
    fn test_config_serialize_roundtrip() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("[worker]"));
        assert!(!text.contains("dir"));
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.store.path, config.store.path);
    }
