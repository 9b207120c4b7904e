use crate::common::{RecordingRemoteChannel, TestContext};
use kadr::config::{Config, PipConfig};
use kadr::controls::ControlsVisibilityTimer;
use kadr::models::TranslationKind;
use kadr::pip::{Orientation, PictureInPictureCoordinator, PlatformCapabilities, RemoteCommand};
use kadr::player::{EngineEvent, LifecycleEvent, PlaybackState};
use kadr::utils::PlayerError;
use std::time::Duration;

const SUPPORTED: PlatformCapabilities = PlatformCapabilities {
    pip_supported: true,
    orientation: Orientation::Landscape,
};

fn coordinator(
    ctx: &TestContext,
    capabilities: PlatformCapabilities,
) -> (
    PictureInPictureCoordinator,
    RecordingRemoteChannel,
    ControlsVisibilityTimer,
) {
    let channel = RecordingRemoteChannel::default();
    let controls = ControlsVisibilityTimer::new(Duration::from_secs(5));
    let pip = PictureInPictureCoordinator::new(
        ctx.session.clone(),
        controls.clone(),
        Box::new(channel.clone()),
        capabilities,
        &ctx.config.pip,
    );
    (pip, channel, controls)
}

#[tokio::test(start_paused = true)]
async fn test_compact_round_trip_keeps_playing() {
    let ctx = TestContext::playing(1).await;
    ctx.session.seek_absolute(200_000).await.unwrap();
    let (pip, channel, _controls) = coordinator(&ctx, SUPPORTED);

    pip.enter_compact().unwrap();
    assert!(pip.is_compact());
    assert_eq!(channel.last_titles(), vec!["Back", "Pause", "Next"]);

    // Backgrounding under compact mode keeps playback running
    pip.on_lifecycle(LifecycleEvent::Paused).await.unwrap();
    pip.on_lifecycle(LifecycleEvent::Stopped).await.unwrap();
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
    assert!(ctx.engine.is_playing());

    pip.on_compact_exit();
    assert!(!pip.is_compact());
    assert_eq!(channel.clear_count(), 1);
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
    assert!(ctx.engine.position_ms().abs_diff(200_000) < 100);
}

#[tokio::test(start_paused = true)]
async fn test_compact_refused_without_support() {
    let ctx = TestContext::playing(1).await;
    let (pip, channel, _controls) = coordinator(
        &ctx,
        PlatformCapabilities {
            pip_supported: false,
            orientation: Orientation::Portrait,
        },
    );

    assert_eq!(pip.enter_compact(), Err(PlayerError::PipUnsupported));
    assert!(!pip.is_compact());
    assert_eq!(channel.publish_count(), 0);

    let mut config = Config::default();
    config.pip = PipConfig { enabled: false };
    let disabled = TestContext::with_config(1, config);
    let (pip, _channel, _controls) = coordinator(&disabled, SUPPORTED);
    assert_eq!(pip.enter_compact(), Err(PlayerError::PipUnsupported));
}

#[tokio::test(start_paused = true)]
async fn test_remote_actions_drive_session() {
    let ctx = TestContext::playing(1).await;
    ctx.session.seek_absolute(100_000).await.unwrap();
    let (pip, channel, _controls) = coordinator(&ctx, SUPPORTED);
    pip.enter_compact().unwrap();

    pip.on_compact_action(RemoteCommand::PlayPause).await.unwrap();
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Paused);
    assert_eq!(channel.last_titles(), vec!["Back", "Play", "Next"]);

    pip.on_compact_action(RemoteCommand::Back).await.unwrap();
    assert_eq!(ctx.position(), 95_000);
    pip.on_compact_action(RemoteCommand::Next).await.unwrap();
    assert_eq!(ctx.position(), 105_000);

    pip.on_compact_action(RemoteCommand::PlayPause).await.unwrap();
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
    assert_eq!(channel.last_titles(), vec!["Back", "Pause", "Next"]);
}

#[tokio::test(start_paused = true)]
async fn test_remote_follows_engine_driven_state() {
    let ctx = TestContext::playing(1).await;
    let (pip, channel, _controls) = coordinator(&ctx, SUPPORTED);
    let _watch = pip.watch_state();
    pip.enter_compact().unwrap();
    let published = channel.publish_count();

    ctx.engine.emit(EngineEvent::BufferingStarted);
    ctx.settle().await;

    assert_eq!(ctx.session.view().state().get(), PlaybackState::Buffering);
    assert_eq!(channel.publish_count(), published + 1);
    assert_eq!(channel.last_titles(), vec!["Back", "Play", "Next"]);

    ctx.engine.emit(EngineEvent::BufferingEnded);
    ctx.settle().await;
    assert_eq!(channel.last_titles(), vec!["Back", "Pause", "Next"]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_outside_compact_pauses_and_resumes_from_saved_position() {
    let ctx = TestContext::playing(1).await;
    ctx.session.seek_absolute(400_000).await.unwrap();
    let (pip, _channel, _controls) = coordinator(&ctx, SUPPORTED);

    pip.on_lifecycle(LifecycleEvent::Paused).await.unwrap();
    pip.on_lifecycle(LifecycleEvent::Stopped).await.unwrap();
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Paused);
    assert!(!ctx.engine.is_playing());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(ctx.engine.position_ms(), 400_000);

    pip.on_lifecycle(LifecycleEvent::Started).await.unwrap();
    pip.on_lifecycle(LifecycleEvent::Resumed).await.unwrap();
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
    assert_eq!(ctx.engine.position_ms(), 400_000);
}

#[tokio::test(start_paused = true)]
async fn test_stop_keeps_user_pause() {
    let ctx = TestContext::playing(1).await;
    ctx.session.pause().await.unwrap();

    ctx.session.lifecycle(LifecycleEvent::Stopped, false).await.unwrap();
    ctx.session.lifecycle(LifecycleEvent::Started, false).await.unwrap();

    assert_eq!(ctx.session.view().state().get(), PlaybackState::Paused);
}

#[tokio::test(start_paused = true)]
async fn test_released_engine_is_rebuilt_at_saved_position() {
    let mut config = Config::default();
    config.playback.release_engine_on_stop = true;
    let ctx = TestContext::with_config(1, config);
    ctx.session
        .open_episode(1, TranslationKind::Dubbed, "720")
        .await
        .unwrap();
    ctx.session.seek_absolute(500_000).await.unwrap();

    ctx.session.lifecycle(LifecycleEvent::Stopped, false).await.unwrap();
    assert_eq!(ctx.engine.releases(), 1);
    assert_eq!(ctx.engine.source_url(), None);
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Paused);

    ctx.session.lifecycle(LifecycleEvent::Started, false).await.unwrap();
    ctx.settle().await;

    assert_eq!(ctx.engine.prepared_urls().len(), 2);
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
    assert!(ctx.engine.seeks().contains(&500_000));
}

#[tokio::test(start_paused = true)]
async fn test_platform_destroyed_engine_reloads_on_resume() {
    let ctx = TestContext::playing(1).await;
    ctx.session.seek_absolute(250_000).await.unwrap();
    ctx.session.pause().await.unwrap();
    ctx.session.play().await.unwrap();

    assert!(ctx.engine.destroy());
    ctx.settle().await;
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Paused);

    ctx.session.lifecycle(LifecycleEvent::Resumed, false).await.unwrap();
    ctx.settle().await;

    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
    assert_eq!(ctx.engine.prepared_urls().len(), 2);
    let restored = *ctx.engine.seeks().last().unwrap();
    assert!(restored.abs_diff(250_000) < 100, "restored {}", restored);
}

#[tokio::test(start_paused = true)]
async fn test_play_after_platform_destroy_reloads_at_saved_position() {
    let ctx = TestContext::playing(1).await;
    ctx.session.seek_absolute(250_000).await.unwrap();

    assert!(ctx.engine.destroy());
    ctx.settle().await;
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Paused);

    ctx.session.play().await.unwrap();
    ctx.settle().await;

    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
    assert_eq!(ctx.engine.prepared_urls().len(), 2);
    assert!(ctx.engine.is_playing());
    let restored = *ctx.engine.seeks().last().unwrap();
    assert!(restored.abs_diff(250_000) < 100, "restored {}", restored);
}

#[tokio::test(start_paused = true)]
async fn test_remote_play_after_platform_destroy_reloads() {
    let ctx = TestContext::playing(1).await;
    ctx.session.seek_absolute(180_000).await.unwrap();
    let (pip, channel, _controls) = coordinator(&ctx, SUPPORTED);
    let _watch = pip.watch_state();
    pip.enter_compact().unwrap();

    assert!(ctx.engine.destroy());
    ctx.settle().await;
    assert_eq!(channel.last_titles(), vec!["Back", "Play", "Next"]);

    pip.on_compact_action(RemoteCommand::PlayPause).await.unwrap();
    ctx.settle().await;

    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
    assert_eq!(ctx.engine.prepared_urls().len(), 2);
    assert!(ctx.engine.position_ms().abs_diff(180_000) < 100);
    assert_eq!(channel.last_titles(), vec!["Back", "Pause", "Next"]);
}

#[tokio::test(start_paused = true)]
async fn test_platform_destroy_during_load_restarts_it() {
    let ctx = TestContext::new(1);
    ctx.engine.set_load_latency(Duration::from_millis(300));

    let open = {
        let session = ctx.session.clone();
        tokio::spawn(async move { session.open_episode(1, TranslationKind::Dubbed, "720").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    ctx.session.seek_absolute(120_000).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Loading);

    assert!(ctx.engine.destroy());
    let result = tokio::time::timeout(Duration::from_secs(5), open)
        .await
        .expect("load should finish after the engine is rebuilt")
        .unwrap();

    assert_eq!(result, Ok(()));
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Playing);
    assert_eq!(ctx.engine.prepared_urls().len(), 2);
    assert!(ctx.engine.position_ms().abs_diff(120_000) < 100);
}

#[tokio::test(start_paused = true)]
async fn test_compact_exit_rearms_controls_unless_ended() {
    let ctx = TestContext::playing(1).await;
    let (pip, _channel, controls) = coordinator(&ctx, SUPPORTED);

    pip.enter_compact().unwrap();
    assert!(!controls.is_visible());
    pip.on_compact_exit();
    assert!(controls.is_visible());
    tokio::time::sleep(Duration::from_millis(5_100)).await;
    assert!(!controls.is_visible());

    pip.enter_compact().unwrap();
    ctx.session.seek_absolute(1_200_000).await.unwrap();
    ctx.settle().await;
    assert_eq!(ctx.session.view().state().get(), PlaybackState::Ended);

    pip.on_compact_exit();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(controls.is_visible());
}
