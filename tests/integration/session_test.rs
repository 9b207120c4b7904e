use crate::common::{DURATION_MS, EPISODES, Fixtures, TestContext};
use kadr::models::{NavigationDirection, NavigationOutcome, TranslationKind};
use kadr::player::{EngineEvent, PlaybackState, SessionEvent};
use kadr::utils::PlayerError;
use std::time::Duration;

fn fallback_count(events: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> usize {
    let mut count = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::FallbackRequested { .. }) {
            count += 1;
        }
    }
    count
}

#[tokio::test(start_paused = true)]
async fn test_seek_absolute_is_clamped_into_media() {
    let ctx = TestContext::playing(1).await;
    ctx.session.pause().await.unwrap();

    for (target, expected) in [
        (0, 0),
        (42_000, 42_000),
        (DURATION_MS, DURATION_MS),
        (DURATION_MS + 1, DURATION_MS),
        (u64::MAX, DURATION_MS),
    ] {
        let position = ctx.session.seek_absolute(target).await.unwrap();
        assert_eq!(position, expected);
        assert_eq!(ctx.position(), expected);
    }
}

#[tokio::test(start_paused = true)]
async fn test_seek_forward_near_end_clamps_to_duration() {
    let ctx = TestContext::playing(1).await;
    ctx.session.seek_absolute(1_195_000).await.unwrap();

    let position = ctx.session.seek_relative(10_000).await.unwrap();
    assert_eq!(position, 1_200_000);
    assert_eq!(ctx.position(), 1_200_000);

    ctx.settle().await;
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Ended);
}

#[tokio::test(start_paused = true)]
async fn test_back_then_forward_nets_five_seconds() {
    let ctx = TestContext::playing(1).await;
    ctx.session.pause().await.unwrap();
    ctx.session.seek_absolute(60_000).await.unwrap();

    ctx.session.seek_relative(-5_000).await.unwrap();
    let position = ctx.session.seek_relative(10_000).await.unwrap();
    assert_eq!(position, 65_000);
}

#[tokio::test(start_paused = true)]
async fn test_seek_back_at_start_clamps_to_zero() {
    let ctx = TestContext::playing(1).await;
    ctx.session.pause().await.unwrap();
    ctx.session.seek_absolute(2_000).await.unwrap();

    assert_eq!(ctx.session.seek_relative(-5_000).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_quality_switch_keeps_position() {
    let ctx = TestContext::playing(3).await;
    ctx.session.seek_absolute(300_000).await.unwrap();

    ctx.session.select_quality("1080").await.unwrap();

    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
    assert_eq!(
        ctx.engine.source_url(),
        Some(Fixtures::url(3, TranslationKind::Dubbed, "1080"))
    );
    assert!(ctx.engine.position_ms().abs_diff(300_000) < 100);
    assert_eq!(
        ctx.session.view().current_quality().get().as_deref(),
        Some("1080")
    );
}

#[tokio::test(start_paused = true)]
async fn test_kind_switch_keeps_position_and_steps_quality_down() {
    let ctx = TestContext::new(2);
    ctx.session
        .open_episode(2, TranslationKind::Dubbed, "1080")
        .await
        .unwrap();
    ctx.session.seek_absolute(90_000).await.unwrap();

    ctx.session.select_kind(TranslationKind::Subtitled).await.unwrap();

    assert_eq!(
        ctx.engine.source_url(),
        Some(Fixtures::url(2, TranslationKind::Subtitled, "720"))
    );
    assert!(ctx.engine.position_ms().abs_diff(90_000) < 100);
    assert_eq!(
        ctx.session.view().available_kinds().get(),
        vec![TranslationKind::Dubbed, TranslationKind::Subtitled]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_quality_leaves_state_untouched() {
    let ctx = TestContext::playing(1).await;

    let err = ctx.session.select_quality("2160").await.unwrap_err();
    assert!(matches!(err, PlayerError::SourceUnavailable { episode: 1, .. }));
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
    assert_eq!(ctx.engine.prepared_urls().len(), 1);

    let err = ctx
        .session
        .open_episode(EPISODES + 1, TranslationKind::Dubbed, "720")
        .await
        .unwrap_err();
    assert!(matches!(err, PlayerError::SourceUnavailable { .. }));
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_navigation_resets_position() {
    let ctx = TestContext::playing(1).await;
    ctx.session.seek_absolute(300_000).await.unwrap();

    let outcome = ctx
        .session
        .navigate_episode(NavigationDirection::Next)
        .await
        .unwrap();

    assert_eq!(outcome, NavigationOutcome::Navigated { episode: 2 });
    assert_eq!(ctx.session.view().episode().get().current_episode, 2);
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
    assert!(ctx.engine.position_ms() < 100);
    assert_eq!(
        ctx.engine.source_url(),
        Some(Fixtures::url(2, TranslationKind::Dubbed, "720"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_previous_at_first_episode_is_a_boundary() {
    let ctx = TestContext::playing(1).await;
    let mut events = ctx.session.view().subscribe_events();
    let before = ctx.engine.prepared_urls().len();

    let outcome = ctx
        .session
        .navigate_episode(NavigationDirection::Previous)
        .await
        .unwrap();

    assert_eq!(outcome, NavigationOutcome::Boundary(NavigationDirection::Previous));
    assert_eq!(ctx.session.view().episode().get().current_episode, 1);
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
    assert_eq!(ctx.engine.prepared_urls().len(), before);
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::NavigationBoundary(NavigationDirection::Previous)
    );
}

#[tokio::test(start_paused = true)]
async fn test_next_at_last_episode_is_a_boundary() {
    let ctx = TestContext::playing(EPISODES).await;

    let outcome = ctx
        .session
        .navigate_episode(NavigationDirection::Next)
        .await
        .unwrap();

    assert_eq!(outcome, NavigationOutcome::Boundary(NavigationDirection::Next));
    assert_eq!(ctx.session.view().episode().get().current_episode, EPISODES);
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_navigation_steps_quality_down_when_missing() {
    let ctx = TestContext::new(EPISODES - 1);
    ctx.session
        .open_episode(EPISODES - 1, TranslationKind::Dubbed, "1080")
        .await
        .unwrap();

    ctx.session
        .navigate_episode(NavigationDirection::Next)
        .await
        .unwrap();

    assert_eq!(
        ctx.session.view().current_quality().get().as_deref(),
        Some("720")
    );
}

#[tokio::test(start_paused = true)]
async fn test_speed_persists_across_swaps_and_navigation() {
    let ctx = TestContext::playing(1).await;
    ctx.session.set_speed(1.25).await.unwrap();

    ctx.session.select_quality("360").await.unwrap();
    assert_eq!(ctx.engine.speed(), 1.25);

    ctx.session
        .navigate_episode(NavigationDirection::Next)
        .await
        .unwrap();
    assert_eq!(ctx.engine.speed(), 1.25);
    assert_eq!(ctx.session.view().current_speed().get(), 1.25);

    let err = ctx.session.set_speed(-1.0).await.unwrap_err();
    assert_eq!(err, PlayerError::InvalidSpeed(-1.0));
    assert_eq!(ctx.engine.speed(), 1.25);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_engine_errors_enter_error_once() {
    let ctx = TestContext::playing(1).await;
    let mut events = ctx.session.view().subscribe_events();

    for _ in 0..3 {
        ctx.engine.emit(EngineEvent::Error("decoder crashed".to_string()));
    }
    ctx.settle().await;

    assert_eq!(
        ctx.session.view().state().get(),
        PlaybackState::Error("decoder crashed".to_string())
    );
    assert_eq!(fallback_count(&mut events), 1);
    assert!(ctx.session.play().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_failed_load_requests_fallback_page() {
    let ctx = TestContext::new(4);
    let mut events = ctx.session.view().subscribe_events();
    ctx.engine.fail_next_prepares(1);

    let err = ctx
        .session
        .open_episode(4, TranslationKind::Dubbed, "720")
        .await
        .unwrap_err();

    assert!(matches!(err, PlayerError::EngineFatal(_)));
    assert!(ctx.session.view().state().get().is_error());
    match events.try_recv().unwrap() {
        SessionEvent::FallbackRequested { embed_url, .. } => {
            assert_eq!(embed_url, "https://anime.example.org/watch/4")
        }
        other => panic!("unexpected event {:?}", other),
    }

    // An explicit retry recovers
    ctx.session
        .open_episode(4, TranslationKind::Dubbed, "720")
        .await
        .unwrap();
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_quality_swaps_cancel_stale_load() {
    let ctx = TestContext::playing(5).await;
    ctx.session.seek_absolute(300_000).await.unwrap();
    ctx.engine.set_load_latency(Duration::from_millis(200));

    let first = {
        let session = ctx.session.clone();
        tokio::spawn(async move { session.select_quality("1080").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Loading);

    ctx.session.select_quality("360").await.unwrap();

    assert_eq!(first.await.unwrap(), Err(PlayerError::LoadCancelled));
    assert_eq!(
        ctx.engine.source_url(),
        Some(Fixtures::url(5, TranslationKind::Dubbed, "360"))
    );
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
    assert!(ctx.engine.position_ms().abs_diff(300_000) < 100);

    // The superseded load never reports back
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        ctx.session.view().current_quality().get().as_deref(),
        Some("360")
    );
}

#[tokio::test(start_paused = true)]
async fn test_seek_during_load_is_applied_on_ready() {
    let ctx = TestContext::new(1);
    ctx.engine.set_load_latency(Duration::from_millis(100));

    let open = {
        let session = ctx.session.clone();
        tokio::spawn(async move { session.open_episode(1, TranslationKind::Dubbed, "720").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    ctx.session.seek_absolute(120_000).await.unwrap();

    open.await.unwrap().unwrap();
    assert!(ctx.engine.position_ms().abs_diff(120_000) < 100);
}

#[tokio::test(start_paused = true)]
async fn test_position_sampling_tracks_playback_and_stops_on_pause() {
    let ctx = TestContext::playing(1).await;

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    let sampled = ctx.position();
    assert!(sampled >= 950 && sampled <= 1_000, "sampled {}", sampled);
    assert!(ctx.session.view().buffered_percent().get() > 0);

    ctx.session.pause().await.unwrap();
    let paused_at = ctx.position();
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(ctx.position(), paused_at);
}

#[tokio::test(start_paused = true)]
async fn test_catalogue_for_another_series_starts_from_zero() {
    let ctx = TestContext::playing(1).await;
    ctx.session.seek_absolute(300_000).await.unwrap();

    // Refreshing the same series keeps the position across a swap
    ctx.session
        .set_catalogue(Fixtures::catalogue(), Fixtures::context(1))
        .await
        .unwrap();
    ctx.session.select_quality("1080").await.unwrap();
    assert!(ctx.engine.position_ms().abs_diff(300_000) < 100);

    let other_series: Vec<_> = Fixtures::catalogue()
        .into_iter()
        .map(|mut entry| {
            entry.url = entry.url.replace("cdn.example.org", "cdn.other.example.org");
            entry
        })
        .collect();
    ctx.session
        .set_catalogue(other_series, Fixtures::context(1))
        .await
        .unwrap();
    ctx.session
        .open_episode(1, TranslationKind::Dubbed, "720")
        .await
        .unwrap();

    assert!(ctx.engine.position_ms() < 100);
    assert!(
        ctx.engine
            .source_url()
            .is_some_and(|url| url.starts_with("https://cdn.other.example.org/"))
    );
}
