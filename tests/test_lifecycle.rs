use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use toast_dedup::cleanup::{ManualScheduler, RepeatingTask, Scheduler, TokioScheduler};
use toast_dedup::clock::ManualClock;
use toast_dedup::renderer::TracingRenderer;
use toast_dedup::storage::MemoryStorage;
use toast_dedup::{CacheSettings, Notifier, Severity, ToastError};

fn counting_task(counter: &Arc<AtomicUsize>) -> RepeatingTask {
    let counter = counter.clone();
    Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

mod manual_scheduler_tests {
    use super::*;

    #[test]
    fn test_advance_fires_once_per_elapsed_interval() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler
            .schedule_repeating(Duration::from_secs(60), counting_task(&counter))
            .unwrap();

        assert_eq!(scheduler.advance(Duration::from_secs(59)), 0);
        assert_eq!(scheduler.advance(Duration::from_secs(1)), 1);
        assert_eq!(scheduler.advance(Duration::from_secs(180)), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_cancel_stops_timer() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let token = scheduler
            .schedule_repeating(Duration::from_secs(1), counting_task(&counter))
            .unwrap();
        scheduler.cancel(token);

        assert_eq!(scheduler.active(), 0);
        scheduler.advance(Duration::from_secs(10));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        assert!(matches!(
            scheduler.schedule_repeating(Duration::ZERO, counting_task(&counter)),
            Err(ToastError::InvalidRequest { .. })
        ));
    }
}

mod notifier_lifecycle_tests {
    use super::*;

    struct Harness {
        notifier: Notifier,
        clock: Arc<ManualClock>,
        scheduler: Arc<ManualScheduler>,
        storage: MemoryStorage,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(0));
        let scheduler = Arc::new(ManualScheduler::new());
        let storage = MemoryStorage::new();
        let notifier = Notifier::builder(CacheSettings::default())
            .storage(storage.clone())
            .renderer(Arc::new(TracingRenderer))
            .scheduler(scheduler.clone())
            .clock(clock.clone())
            .build();
        Harness {
            notifier,
            clock,
            scheduler,
            storage,
        }
    }

    #[test]
    fn test_init_loads_storage_and_starts_sweep() {
        let h = harness();
        h.storage.insert_raw(
            "toastCache",
            r#"{"task-load-error": {"message": "Failed", "type": "error", "shownAt": 0, "expireAt": 3600000}}"#,
        );

        h.notifier.init().unwrap();
        assert!(h.notifier.is_running());
        assert_eq!(h.scheduler.active(), 1);
        assert!(h.notifier.record("task-load-error").is_some());

        // Second init neither reloads nor schedules another sweep
        h.notifier.init().unwrap();
        assert_eq!(h.scheduler.active(), 1);
    }

    #[test]
    fn test_periodic_sweep_evicts_expired_records() {
        let h = harness();
        h.notifier.init().unwrap();
        h.notifier
            .request_show("URGENT", Severity::Error, Some("high-priority-1"), None)
            .unwrap();

        h.clock.set(3_600_000);
        h.scheduler.advance(Duration::from_secs(60));
        assert!(h.notifier.is_empty());
    }

    #[test]
    fn test_sweep_leaves_live_records() {
        let h = harness();
        h.notifier.init().unwrap();
        h.notifier
            .request_show("URGENT", Severity::Error, Some("high-priority-1"), None)
            .unwrap();

        h.clock.set(60_000);
        h.scheduler.advance(Duration::from_secs(60));
        assert_eq!(h.notifier.len(), 1);
    }

    #[test]
    fn test_teardown_stops_sweep_and_keeps_state() {
        let h = harness();
        h.notifier.init().unwrap();
        h.notifier
            .request_show("URGENT", Severity::Error, Some("high-priority-1"), None)
            .unwrap();

        h.notifier.teardown();
        assert!(!h.notifier.is_running());
        assert_eq!(h.scheduler.active(), 0);

        h.clock.set(4_000_000);
        h.scheduler.advance(Duration::from_secs(600));
        assert_eq!(h.notifier.len(), 1);

        // Idempotent
        h.notifier.teardown();
    }

    #[test]
    fn test_clones_share_one_cache() {
        let h = harness();
        let other = h.notifier.clone();
        h.notifier
            .request_show("once", Severity::Info, Some("k"), None)
            .unwrap();
        assert!(
            other
                .request_show("once", Severity::Info, Some("k"), None)
                .unwrap()
                .is_none()
        );
    }
}

mod tokio_tests {
    use super::*;

    fn tokio_notifier(clock: &Arc<ManualClock>) -> Notifier {
        Notifier::builder(CacheSettings::default())
            .storage(MemoryStorage::new())
            .renderer(Arc::new(TracingRenderer))
            .scheduler(Arc::new(TokioScheduler::new()))
            .clock(clock.clone())
            .build()
    }

    #[test]
    fn test_init_without_runtime_reports_timer_unavailable() {
        let clock = Arc::new(ManualClock::new(0));
        let notifier = tokio_notifier(&clock);
        assert!(matches!(
            notifier.init(),
            Err(ToastError::TimerUnavailable { .. })
        ));
        assert!(!notifier.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_runs_sweep() {
        let clock = Arc::new(ManualClock::new(0));
        let notifier = tokio_notifier(&clock);
        notifier.init().unwrap();
        notifier
            .request_show("URGENT", Severity::Error, Some("high-priority-1"), None)
            .unwrap();

        clock.set(3_600_001);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(notifier.is_empty());

        notifier.teardown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_does_not_fire_immediately() {
        let scheduler = TokioScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let token = scheduler
            .schedule_repeating(Duration::from_secs(60), counting_task(&counter))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        scheduler.cancel(token);
        assert_eq!(scheduler.active(), 0);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracing_toast_auto_closes_after_duration() {
        let clock = Arc::new(ManualClock::new(0));
        let notifier = tokio_notifier(&clock);
        notifier
            .request_show(
                "Tasks loaded successfully",
                Severity::Success,
                Some("task-load-success"),
                Some(Duration::from_secs(5)),
            )
            .unwrap();
        assert!(notifier.record("task-load-success").unwrap().is_active());

        tokio::time::sleep(Duration::from_secs(6)).await;
        let record = notifier.record("task-load-success").unwrap();
        assert!(!record.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_tracing_toast() {
        let clock = Arc::new(ManualClock::new(0));
        let notifier = tokio_notifier(&clock);
        notifier
            .request_show("URGENT", Severity::Error, Some("high-priority-9"), None)
            .unwrap();

        notifier.dismiss("high-priority-9");
        assert!(!notifier.record("high-priority-9").unwrap().is_active());

        // The cancelled auto-close timer must not disturb anything later
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(notifier.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_zero_duration_toasts_never_stay_active() {
        let clock = Arc::new(ManualClock::new(0));
        let notifier = tokio_notifier(&clock);
        for id in 0..2000 {
            let key = format!("high-priority-{}", id);
            notifier
                .request_show("URGENT", Severity::Error, Some(&key), Some(Duration::ZERO))
                .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
        let stale = notifier.records().iter().filter(|r| r.is_active()).count();
        assert_eq!(stale, 0);
        assert_eq!(notifier.len(), 2000);
    }
}
