#[cfg(test)]
mod tests {
    use crate::config::AgentConfig;
    use crate::session::SessionContext;

    #[test]
    fn test_default_config_sane() {
        let cfg = AgentConfig::default();
        assert!(cfg.retry_attempts > 0);
        assert!(cfg.monitor_interval_secs > cfg.device_scan_interval_secs);
        assert_eq!(cfg.upload_timeout_secs(), cfg.request_timeout_secs * 2);
    }

    #[test]
    fn test_session_completeness() {
        assert!(SessionContext::new("Player#1234567", 42).is_complete());
        assert!(!SessionContext::new("", 42).is_complete());
        assert!(!SessionContext::new("Player#1234567", 0).is_complete());
        assert!(!SessionContext::new("Player#1234567", -3).is_complete());
    }

    #[test]
    fn test_session_round_trips_through_json() {
        let ctx = SessionContext::new("Player#1", 7);
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"subject_id\""));
        assert!(json.contains("\"channel_id\":7"));
    }
}
