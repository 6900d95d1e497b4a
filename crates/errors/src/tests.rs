#[cfg(test)]
mod error_tests {
    use crate::*;

    #[test]
    fn test_mediaflow_error_display() {
        let validation_error = MediaflowError::Validation("name is blank".to_string());
        assert_eq!(validation_error.to_string(), "数据验证失败: name is blank");

        let start_error = MediaflowError::service_start("node-1/markup", 3, "connection refused");
        assert_eq!(
            start_error.to_string(),
            "服务启动失败: node-1/markup 在 3 次尝试后仍未运行 - connection refused"
        );

        let store_error = MediaflowError::StoreUnavailable("redis down".to_string());
        assert_eq!(store_error.to_string(), "轨迹存储不可用: redis down");

        let duplicate = MediaflowError::duplicate_node("node-1");
        assert_eq!(duplicate.to_string(), "重复的节点: node-1");

        let timeout_error = MediaflowError::Timeout("stop node-1/markup".to_string());
        assert_eq!(timeout_error.to_string(), "操作超时: stop node-1/markup");
    }

    #[test]
    fn test_error_creation_methods() {
        assert!(matches!(
            MediaflowError::validation_error("bad"),
            MediaflowError::Validation(_)
        ));
        assert!(matches!(
            MediaflowError::store_unavailable("down"),
            MediaflowError::StoreUnavailable(_)
        ));
        assert!(matches!(
            MediaflowError::config_error("missing"),
            MediaflowError::Configuration(_)
        ));
        assert!(matches!(
            MediaflowError::channel_error("refused"),
            MediaflowError::CommandChannel(_)
        ));
        assert!(matches!(
            MediaflowError::service_start("a/b", 2, "x"),
            MediaflowError::ServiceStart { attempts: 2, .. }
        ));
    }

    #[test]
    fn test_is_validation() {
        assert!(MediaflowError::validation_error("bad").is_validation());
        assert!(MediaflowError::duplicate_node("n").is_validation());
        assert!(!MediaflowError::store_unavailable("down").is_validation());
    }

    #[test]
    fn test_is_retryable() {
        assert!(MediaflowError::channel_error("refused").is_retryable());
        assert!(MediaflowError::timeout_error("slow").is_retryable());

        // 存储错误交由调用方决定是否重试
        assert!(!MediaflowError::store_unavailable("down").is_retryable());
        assert!(!MediaflowError::validation_error("bad").is_retryable());
        assert!(!MediaflowError::duplicate_node("n").is_retryable());
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let converted: MediaflowError = err.into();
        assert!(matches!(converted, MediaflowError::Serialization(_)));
    }
}
