pub mod fixtures;

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use herald_events::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    const THREADS: usize = 8;
    const ROUNDS: usize = 200;

    #[test]
    fn test_concurrent_subscribe_is_not_lost() {
        let dispatcher = EventDispatcher::new();

        thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    for _ in 0..ROUNDS {
                        dispatcher.subscribe::<dyn Recorder>(tag("worker"));
                    }
                });
            }
        });

        assert_eq!(dispatcher.subscriber_count::<dyn Recorder>(), THREADS * ROUNDS);
        let event = dispatcher.post(RecordEvent::default());
        assert_eq!(event.trail.len(), THREADS * ROUNDS);
    }

    #[test]
    fn test_concurrent_posts_reach_every_listener() {
        let dispatcher = EventDispatcher::new();
        let listeners: Vec<_> = (0..4).map(|_| tag("shared")).collect();
        for listener in &listeners {
            dispatcher.subscribe::<dyn Recorder>(listener.clone());
        }

        thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    for _ in 0..ROUNDS {
                        let event = dispatcher.post(RecordEvent::default());
                        assert_eq!(event.trail.len(), 4);
                    }
                });
            }
        });

        for listener in &listeners {
            assert_eq!(listener.calls(), THREADS * ROUNDS);
        }
    }

    #[test]
    fn test_dispatch_sees_consistent_snapshot_under_churn() {
        let dispatcher = EventDispatcher::new();
        dispatcher.subscribe_with_priority::<dyn Recorder>(tag("head"), Priority::HIGH);
        dispatcher.subscribe_with_priority::<dyn Recorder>(tag("tail"), Priority::LOW);
        let churn = tag("churn");
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..ROUNDS * 4 {
                    dispatcher.subscribe::<dyn Recorder>(churn.clone());
                    dispatcher.unsubscribe::<dyn Recorder>(&churn);
                }
                done.store(true, Ordering::SeqCst);
            });

            for _ in 0..THREADS {
                scope.spawn(|| {
                    while !done.load(Ordering::SeqCst) {
                        let trail = dispatcher.post(RecordEvent::default()).trail;
                        assert!(
                            trail == ["head", "tail"] || trail == ["head", "churn", "tail"],
                            "torn dispatch order: {trail:?}"
                        );
                        let cached = dispatcher.post_cached(RecordEvent::default()).trail;
                        assert!(
                            cached == ["head", "tail"] || cached == ["head", "churn", "tail"],
                            "torn cached order: {cached:?}"
                        );
                    }
                });
            }
        });

        assert!(!dispatcher.has_listener::<dyn Recorder>(&churn));
        assert_eq!(dispatcher.post_cached(RecordEvent::default()).trail, ["head", "tail"]);
    }

    #[test]
    fn test_dispatcher_shared_through_arc() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let observer = tag("observer");
        dispatcher.subscribe::<dyn Observer>(observer.clone());

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                thread::spawn(move || dispatcher.post(ObserveEvent::default()).count)
            })
            .collect();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, THREADS);
        assert_eq!(observer.calls(), THREADS);
    }
}
