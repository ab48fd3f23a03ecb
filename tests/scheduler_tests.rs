mod common;

#[cfg(test)]
mod tests {
    use super::common::*;
    use awsconsole::app::scheduler::RefreshScheduler;
    use awsconsole::app::triggers::{ForegroundTriggers, TriggerOrigin};
    use awsconsole::ConsoleConfig;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const TEN_HOURS: Duration = Duration::from_secs(10 * 60 * 60);

    #[tokio::test(start_paused = true)]
    async fn test_refresh_runs_at_startup_then_every_ten_hours() {
        let fixture = Fixture::new();
        let scheduler = RefreshScheduler::new(fixture.pipeline.clone());
        assert_eq!(scheduler.interval(), TEN_HOURS);

        let shutdown = CancellationToken::new();
        let handle = scheduler.spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fixture.journal.count_requests(ROLE_LIST_URL), 1);
        assert_eq!(fixture.journal.count_requests(LOGIN_URL), 1);

        tokio::time::sleep(TEN_HOURS - Duration::from_secs(120)).await;
        assert_eq!(fixture.journal.count_requests(ROLE_LIST_URL), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fixture.journal.count_requests(ROLE_LIST_URL), 2);

        shutdown.cancel();
        handle.await.unwrap();

        // background runs never touch the window
        assert!(fixture.journal.view_calls().is_empty());
        assert!(fixture.journal.notifications().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_failures_stay_silent() {
        let fixture = Fixture::with_transport(ConsoleConfig::default(), |t| {
            t.always(ROLE_LIST_URL, 0, "")
        });

        let shutdown = CancellationToken::new();
        let handle = RefreshScheduler::new(fixture.pipeline.clone()).spawn(shutdown.clone());

        tokio::time::sleep(TEN_HOURS + Duration::from_secs(60)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(fixture.journal.count_requests(ROLE_LIST_URL), 2);
        assert!(fixture.journal.notifications().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_from_config() {
        let config = ConsoleConfig {
            refresh_interval_secs: 5,
            ..ConsoleConfig::default()
        };
        let fixture = Fixture::with_config(config);

        let shutdown = CancellationToken::new();
        let handle = RefreshScheduler::new(fixture.pipeline.clone()).spawn(shutdown.clone());

        // ticks at 0s, 5s and 10s
        tokio::time::sleep(Duration::from_secs(12)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(fixture.journal.count_requests(ROLE_LIST_URL), 3);
    }

    #[tokio::test]
    async fn test_both_trigger_origins_start_foreground_runs() {
        let fixture = Fixture::new();
        let triggers = ForegroundTriggers::new();
        let keyboard = triggers.sender();
        let signal = triggers.sender();
        let listener = triggers.spawn(fixture.pipeline.clone(), CancellationToken::new());

        keyboard.send(TriggerOrigin::Keyboard).unwrap();
        signal.send(TriggerOrigin::Signal).unwrap();
        drop(keyboard);
        drop(signal);

        // the listener drains its runs once every sender is gone
        listener.await.unwrap();

        let tabs: Vec<Event> = fixture
            .journal
            .view_calls()
            .into_iter()
            .filter(|e| matches!(e, Event::CreateTab { .. }))
            .collect();
        assert_eq!(tabs.len(), 2);
        assert_eq!(fixture.journal.count_requests(LOGIN_URL), 2);
    }

    #[tokio::test]
    async fn test_foreground_trigger_failure_notifies() {
        let fixture = Fixture::with_transport(ConsoleConfig::default(), |t| {
            t.always(ROLE_LIST_URL, 0, "")
        });
        let triggers = ForegroundTriggers::new();
        let sender = triggers.sender();
        let listener = triggers.spawn(fixture.pipeline.clone(), CancellationToken::new());

        sender.send(TriggerOrigin::Keyboard).unwrap();
        drop(sender);
        listener.await.unwrap();

        assert_eq!(fixture.journal.notifications(), vec![UNREACHABLE_MESSAGE]);
    }

    #[tokio::test]
    async fn test_trigger_listener_stops_on_shutdown() {
        let fixture = Fixture::new();
        let triggers = ForegroundTriggers::new();
        let sender = triggers.sender();
        let shutdown = CancellationToken::new();
        let listener = triggers.spawn(fixture.pipeline.clone(), shutdown.clone());

        shutdown.cancel();
        listener.await.unwrap();

        assert!(sender.send(TriggerOrigin::Keyboard).is_err());
        assert!(fixture.journal.requests().is_empty());
    }
}
