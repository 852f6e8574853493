use std::sync::Arc;

use director_auth::auth::rate_limit::{RateLimitDecision, RateLimiter, SlidingWindowLimiter};

#[test]
fn test_allows_up_to_limit_then_rejects() {
    let limiter = SlidingWindowLimiter::new(3, 60);

    assert_eq!(
        limiter.check_and_increment("1.2.3.4"),
        RateLimitDecision::Allowed { remaining: 2 }
    );
    assert_eq!(
        limiter.check_and_increment("1.2.3.4"),
        RateLimitDecision::Allowed { remaining: 1 }
    );
    assert_eq!(
        limiter.check_and_increment("1.2.3.4"),
        RateLimitDecision::Allowed { remaining: 0 }
    );

    match limiter.check_and_increment("1.2.3.4") {
        RateLimitDecision::Limited { retry_after_secs } => {
            assert!((1..=60).contains(&retry_after_secs));
        }
        other => panic!("expected limit, got {other:?}"),
    }
}

#[test]
fn test_keys_are_independent() {
    let limiter = SlidingWindowLimiter::new(1, 60);
    assert!(limiter.check_and_increment("a").is_allowed());
    assert!(!limiter.check_and_increment("a").is_allowed());
    assert!(limiter.check_and_increment("b").is_allowed());
}

#[test]
fn test_reset_clears_key() {
    let limiter = SlidingWindowLimiter::new(1, 60);
    assert!(limiter.check_and_increment("a").is_allowed());
    assert!(!limiter.check_and_increment("a").is_allowed());

    limiter.reset("a");
    assert!(limiter.check_and_increment("a").is_allowed());
}

#[test]
fn test_zero_window_never_limits() {
    let limiter = SlidingWindowLimiter::new(1, 0);
    for _ in 0..5 {
        assert!(limiter.check_and_increment("a").is_allowed());
    }
}

#[test]
fn test_cleanup_drops_stale_keys() {
    let limiter = SlidingWindowLimiter::new(5, 0);
    limiter.check_and_increment("a");
    limiter.check_and_increment("b");

    limiter.cleanup();
    assert_eq!(limiter.tracked_keys(), 0);

    let live = SlidingWindowLimiter::new(5, 60);
    live.check_and_increment("a");
    live.cleanup();
    assert_eq!(live.tracked_keys(), 1);
}

#[test]
fn test_concurrent_callers_never_exceed_limit() {
    let limiter: Arc<dyn RateLimiter> = Arc::new(SlidingWindowLimiter::new(50, 60));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = limiter.clone();
            std::thread::spawn(move || {
                (0..25)
                    .filter(|_| limiter.check_and_increment("shared").is_allowed())
                    .count()
            })
        })
        .collect();

    let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(allowed, 50);
}
