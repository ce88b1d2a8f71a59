//! Tests for the health module

use super::*;
use std::time::Duration;

use crate::pool::StaleReason;

mod probe_tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;
    use erpool_core::{ConnectionFactory, ErpConnection, Result};
    use serde_json::Value;

    use crate::testing::MockFactory;

    /// Connection whose ping never answers within the probe timeout
    struct StalledConnection;

    #[async_trait]
    impl ErpConnection for StalledConnection {
        fn tenant_key(&self) -> &str {
            "stalled"
        }

        fn is_healthy(&self) -> bool {
            true
        }

        async fn execute(&self, _operation: &str, _payload: Value) -> Result<Value> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Value::Null)
        }

        async fn reset_state(&self) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_probe_healthy_connection() {
        let mock = MockFactory::new();
        let conn = mock.create("t").await.expect("create");

        let latency = probe_connection(conn.as_ref(), Duration::from_secs(1))
            .await
            .expect("probe");
        assert!(latency < Duration::from_secs(1));
        assert_eq!(mock.connections()[0].ping_count(), 1);
    }

    #[tokio::test]
    async fn test_probe_failed_round_trip() {
        let mock = MockFactory::new();
        let conn = mock.create("t").await.expect("create");
        mock.connections()[0].fail_ping.store(true, Ordering::SeqCst);

        let err = probe_connection(conn.as_ref(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Failed(ref msg) if msg.contains("ping rejected")));
    }

    #[tokio::test]
    async fn test_probe_skips_round_trip_when_unhealthy() {
        let mock = MockFactory::new();
        let conn = mock.create("t").await.expect("create");
        mock.connections()[0].set_healthy(false);

        let err = probe_connection(conn.as_ref(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Unhealthy));
        assert_eq!(mock.connections()[0].ping_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout() {
        let timeout = Duration::from_millis(250);
        let err = probe_connection(&StalledConnection, timeout)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Timeout(t) if t == timeout));
        assert!(err.to_string().contains("timed out"));
    }
}

mod report_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_report_is_empty() {
        let report = HealthCheckReport::new("tenant-a");
        assert_eq!(report.tenant_key, "tenant-a");
        assert_eq!(report.inspected, 0);
        assert_eq!(report.retained, 0);
        assert_eq!(report.evicted_total(), 0);
        assert_eq!(report.evicted_for(StaleReason::Idle), 0);
    }

    #[test]
    fn test_record_eviction_counts_by_reason() {
        let mut report = HealthCheckReport::new("tenant-a");
        report.record_eviction(StaleReason::Idle);
        report.record_eviction(StaleReason::Idle);
        report.record_eviction(StaleReason::ProbeFailed);

        assert_eq!(report.evicted_total(), 3);
        assert_eq!(report.evicted_for(StaleReason::Idle), 2);
        assert_eq!(report.evicted_for(StaleReason::ProbeFailed), 1);
        assert_eq!(report.evicted_for(StaleReason::Expired), 0);
    }

    #[test]
    fn test_finish_stamps_completion_time() {
        let report = HealthCheckReport::new("tenant-a");
        let started = report.checked_at;
        let finished = report.finish();
        assert!(finished.checked_at >= started);
    }

    #[test]
    fn test_report_serialization() {
        let mut report = HealthCheckReport::new("tenant-a");
        report.inspected = 2;
        report.record_eviction(StaleReason::Expired);

        let value = serde_json::to_value(&report).expect("serialize");
        assert_eq!(value["evicted"]["expired"], serde_json::json!(1));
        assert_eq!(value["inspected"], serde_json::json!(2));

        let back: HealthCheckReport = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, report);
    }
}
