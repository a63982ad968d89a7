mod common;

use std::sync::Arc;
use std::time::Duration;

use freight_trip::auth::Identity;
use freight_trip::client::{LocalTripApi, TripApi};
use freight_trip::config::TrackingConfig;
use freight_trip::engine::trips;
use freight_trip::error::AppError;
use freight_trip::models::coordinates::{Coordinates, RawFix};
use freight_trip::models::load::LoadStatus;
use freight_trip::models::tracking::{BatterySample, TrackingMode};
use freight_trip::tracking::session::{NoticeLevel, OtpState, SessionUpdate, TripSession};
use freight_trip::tracking::source::{AcquisitionError, ChannelDevice, GeolocationDevice};
use uuid::Uuid;

use common::{Fixture, DELHI};

const WAIT: Duration = Duration::from_secs(2);

fn fix(lat: f64, lng: f64) -> RawFix {
    RawFix {
        lat,
        lng,
        heading: Some(10.0),
        speed: Some(15.0),
    }
}

fn api(fixture: &Fixture, identity: &Identity) -> Arc<dyn TripApi> {
    Arc::new(LocalTripApi::new(fixture.state.clone(), identity.clone()))
}

async fn open(
    fixture: &Fixture,
    identity: &Identity,
    device: Arc<ChannelDevice>,
    load_id: Uuid,
    config: TrackingConfig,
) -> TripSession {
    let device: Arc<dyn GeolocationDevice> = device;
    TripSession::open(api(fixture, identity), device, load_id, config)
        .await
        .unwrap()
}

async fn next(session: &mut TripSession) -> SessionUpdate {
    tokio::time::timeout(WAIT, session.next_update())
        .await
        .expect("no session update in time")
        .expect("session channels closed")
}

async fn next_fix(session: &mut TripSession) -> Coordinates {
    loop {
        if let SessionUpdate::Fix(coordinates) = next(session).await {
            return coordinates;
        }
    }
}

#[tokio::test]
async fn starting_a_trip_tracks_gps_fixes() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    let device = Arc::new(ChannelDevice::new());
    let mut session = open(&fixture, &fixture.driver, device.clone(), load_id, TrackingConfig::default()).await;

    assert_eq!(session.tracking_mode(), TrackingMode::Off);
    assert!(!device.is_watched());

    session.start_trip().await.unwrap();
    assert_eq!(session.load().status, LoadStatus::InTransit);
    assert_eq!(session.tracking_mode(), TrackingMode::Gps);
    assert!(device.is_watched());

    assert!(device.push(fix(19.5, 73.2)).await);
    let applied = next_fix(&mut session).await;
    assert_eq!(applied.lat, 19.5);
    assert_eq!(session.load().current_location, Some(applied));
    assert_eq!(session.history().len(), 1);

    let stored = trips::location_history(&fixture.state, &fixture.shipper, load_id).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].lat, 19.5);

    let progress = session.progress();
    assert!(progress.percent > 0.0 && progress.percent < 95.0);

    let notices = session.take_notices();
    assert!(notices
        .iter()
        .any(|notice| notice.level == NoticeLevel::Success));
}

#[tokio::test]
async fn no_fix_is_applied_after_tracking_stops() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    let device = Arc::new(ChannelDevice::new());
    let mut session = open(&fixture, &fixture.driver, device.clone(), load_id, TrackingConfig::default()).await;

    session.start_trip().await.unwrap();
    device.push(fix(19.5, 73.2)).await;
    next_fix(&mut session).await;

    session.stop_tracking();
    assert_eq!(session.tracking_mode(), TrackingMode::Off);
    assert!(!session.has_active_producer());

    device.push(fix(20.0, 73.5)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.pump().await;

    assert_eq!(session.history().len(), 1);
    assert_eq!(session.load().current_location.unwrap().lat, 19.5);
    assert!(!device.is_watched());
}

#[tokio::test]
async fn switching_modes_leaves_a_single_producer() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    let device = Arc::new(ChannelDevice::new());
    let config = TrackingConfig {
        simulation_interval: Duration::from_millis(10),
        ..TrackingConfig::default()
    };
    let mut session = open(&fixture, &fixture.driver, device.clone(), load_id, config).await;
    session.start_trip().await.unwrap();

    session.set_tracking_mode(TrackingMode::Simulation).unwrap();
    assert_eq!(session.tracking_mode(), TrackingMode::Simulation);

    let stale = RawFix {
        heading: Some(180.0),
        ..fix(25.0, 75.0)
    };
    device.push(stale).await;

    for _ in 0..3 {
        let coordinates = next_fix(&mut session).await;
        assert_eq!(coordinates.heading, Some(45.0));
    }
    assert!(session
        .history()
        .iter()
        .all(|entry| entry.heading != Some(180.0)));

    session.set_tracking_mode(TrackingMode::Gps).unwrap();
    session.set_tracking_mode(TrackingMode::Gps).unwrap();
    assert_eq!(session.tracking_mode(), TrackingMode::Gps);
    session.pump().await;
    let before = session.history().len();

    device.push(fix(21.0, 74.0)).await;
    let coordinates = next_fix(&mut session).await;
    assert_eq!(coordinates.lat, 21.0);
    assert_eq!(session.history().len(), before + 1);
}

#[tokio::test]
async fn history_timestamps_never_go_backwards() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    let device = Arc::new(ChannelDevice::new());
    let mut session = open(&fixture, &fixture.driver, device.clone(), load_id, TrackingConfig::default()).await;
    session.start_trip().await.unwrap();

    for step in 0..5 {
        device.push(fix(19.1 + step as f64 * 0.1, 73.0)).await;
        next_fix(&mut session).await;
    }

    let history = session.history();
    assert_eq!(history.len(), 5);
    assert!(history
        .windows(2)
        .all(|pair| pair[0].captured_at <= pair[1].captured_at));
}

#[tokio::test]
async fn pause_stops_tracking_and_resume_restarts_it() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    let device = Arc::new(ChannelDevice::new());
    let mut session = open(&fixture, &fixture.driver, device.clone(), load_id, TrackingConfig::default()).await;
    session.start_trip().await.unwrap();

    session.pause_trip().await.unwrap();
    assert_eq!(session.load().status, LoadStatus::Paused);
    assert_eq!(session.tracking_mode(), TrackingMode::Off);
    assert_eq!(
        session.set_tracking_mode(TrackingMode::Simulation).unwrap_err().to_string(),
        "conflict: tracking is only available in transit, load is Paused"
    );

    session.resume_trip().await.unwrap();
    assert_eq!(session.load().status, LoadStatus::InTransit);
    assert_eq!(session.tracking_mode(), TrackingMode::Gps);
    device.push(fix(19.3, 73.1)).await;
    assert_eq!(next_fix(&mut session).await.lat, 19.3);
}

#[tokio::test]
async fn failed_status_write_leaves_local_state_alone() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    let device = Arc::new(ChannelDevice::new());
    let mut session = open(&fixture, &fixture.driver, device.clone(), load_id, TrackingConfig::default()).await;

    // Another device of the same driver starts the trip first.
    trips::update_status(&fixture.state, &fixture.driver, load_id, LoadStatus::InTransit).unwrap();

    let err = session.start_trip().await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
    assert_eq!(session.load().status, LoadStatus::Assigned);
    assert_eq!(session.tracking_mode(), TrackingMode::Off);

    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
}

#[tokio::test]
async fn only_the_driver_controls_the_trip() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    let device = Arc::new(ChannelDevice::new());
    let mut session = open(&fixture, &fixture.shipper, device.clone(), load_id, TrackingConfig::default()).await;

    assert!(!session.is_driver());
    assert!(matches!(session.start_trip().await, Err(AppError::Forbidden(_))));
    assert!(matches!(
        session.set_tracking_mode(TrackingMode::Gps),
        Err(AppError::Forbidden(_))
    ));
    assert_eq!(session.load().status, LoadStatus::Assigned);
}

#[tokio::test]
async fn refused_permission_turns_tracking_off() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    let device = Arc::new(ChannelDevice::refusing(AcquisitionError::PermissionDenied));
    let mut session = open(&fixture, &fixture.driver, device, load_id, TrackingConfig::default()).await;

    session.start_trip().await.unwrap();

    assert_eq!(session.load().status, LoadStatus::InTransit);
    assert_eq!(session.tracking_mode(), TrackingMode::Off);
    assert_eq!(session.acquisition_error(), Some(&AcquisitionError::PermissionDenied));
    assert!(session
        .take_notices()
        .iter()
        .any(|notice| notice.level == NoticeLevel::Error && notice.message.contains("GPS")));
}

#[tokio::test]
async fn acquisition_failure_mid_trip_stops_tracking() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    let device = Arc::new(ChannelDevice::new());
    let mut session = open(&fixture, &fixture.driver, device.clone(), load_id, TrackingConfig::default()).await;
    session.start_trip().await.unwrap();

    device.fail(AcquisitionError::Timeout).await;
    let update = next(&mut session).await;

    assert_eq!(update, SessionUpdate::AcquisitionFailed(AcquisitionError::Timeout));
    assert_eq!(session.tracking_mode(), TrackingMode::Off);
    assert_eq!(session.acquisition_error(), Some(&AcquisitionError::Timeout));
    assert_eq!(session.load().status, LoadStatus::InTransit);
}

#[tokio::test]
async fn driver_session_resumes_gps_when_reopened_in_transit() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    trips::update_status(&fixture.state, &fixture.driver, load_id, LoadStatus::InTransit).unwrap();
    let device = Arc::new(ChannelDevice::new());

    let session = open(&fixture, &fixture.driver, device.clone(), load_id, TrackingConfig::default()).await;

    assert_eq!(session.tracking_mode(), TrackingMode::Gps);
    assert!(device.is_watched());

    session.close();
    tokio::task::yield_now().await;
}

#[tokio::test]
async fn low_battery_raises_an_alert_until_charging() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    let device = Arc::new(ChannelDevice::new());
    let mut session = open(&fixture, &fixture.driver, device, load_id, TrackingConfig::default()).await;

    session.update_battery(BatterySample {
        level: 0.1,
        charging: false,
    });
    assert!(session.alerts().contains("batt-low"));

    assert!(session.dismiss_alert("batt-low"));
    assert!(!session.alerts().contains("batt-low"));

    session.update_battery(BatterySample {
        level: 0.1,
        charging: true,
    });
    assert!(!session.alerts().contains("batt-low"));
}

#[tokio::test]
async fn viewer_follows_the_driver_through_polling() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    trips::update_status(&fixture.state, &fixture.driver, load_id, LoadStatus::InTransit).unwrap();
    let config = TrackingConfig {
        poll_interval: Duration::from_millis(20),
        ..TrackingConfig::default()
    };
    let mut viewer = open(
        &fixture,
        &fixture.receiver,
        Arc::new(ChannelDevice::new()),
        load_id,
        config,
    )
    .await;
    assert_eq!(viewer.tracking_mode(), TrackingMode::Off);

    let position = Coordinates::from_fix(fix(22.0, 74.5), chrono::Utc::now());
    trips::update_location(&fixture.state, &fixture.driver, load_id, position).unwrap();

    let seen = loop {
        if let SessionUpdate::Remote(event) = next(&mut viewer).await {
            if let Some(coordinates) = event.coordinates {
                break coordinates;
            }
        }
    };

    assert_eq!(seen.lat, 22.0);
    assert_eq!(viewer.load().current_location, Some(seen));
    assert_eq!(viewer.load().status, LoadStatus::InTransit);
    assert_eq!(viewer.history().last(), Some(&seen));
}

#[tokio::test]
async fn reaching_the_drop_point_requests_a_delivery_code() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    let device = Arc::new(ChannelDevice::new());
    let mut session = open(&fixture, &fixture.driver, device.clone(), load_id, TrackingConfig::default()).await;
    session.start_trip().await.unwrap();
    device.push(fix(27.0, 76.5)).await;
    next_fix(&mut session).await;

    let outcome = session.mark_reached().await.unwrap();

    assert!(outcome.otp_requested);
    assert_eq!(session.load().status, LoadStatus::Reached);
    assert_eq!(session.tracking_mode(), TrackingMode::Off);
    let location = session.load().current_location.unwrap();
    assert_eq!((location.lat, location.lng), (DELHI.lat, DELHI.lng));
    assert_eq!(session.progress().percent, 100.0);
    assert!(matches!(session.otp_state(), OtpState::Requested { .. }));

    let stored = trips::location_history(&fixture.state, &fixture.driver, load_id).unwrap();
    assert_eq!(stored.last().map(|entry| entry.lat), Some(DELHI.lat));
    assert_eq!(fixture.notifier.sent().len(), 1);
}

#[tokio::test]
async fn wrong_code_keeps_the_load_reached() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    let device = Arc::new(ChannelDevice::new());
    let mut session = open(&fixture, &fixture.driver, device, load_id, TrackingConfig::default()).await;
    session.start_trip().await.unwrap();
    session.mark_reached().await.unwrap();
    session.take_notices();

    let code = fixture.notifier.last_code().unwrap();
    let wrong = if code == "999999" { "888888" } else { "999999" };

    let err = session.verify_delivery(wrong).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidOtp { attempts_left: 4 }));
    assert_eq!(session.load().status, LoadStatus::Reached);
    let notices = session.take_notices();
    assert_eq!(notices[0].level, NoticeLevel::Error);

    session.verify_delivery(&code).await.unwrap();
    assert_eq!(session.load().status, LoadStatus::Completed);
    assert_eq!(session.otp_state(), OtpState::Verified);
    assert!(!session.transport().is_connected());
    assert!(session.load().invoice_number.is_some());

    assert!(matches!(
        session.verify_delivery(&code).await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
async fn verifying_before_arrival_is_an_invalid_transition() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    let mut session = open(
        &fixture,
        &fixture.driver,
        Arc::new(ChannelDevice::new()),
        load_id,
        TrackingConfig::default(),
    )
    .await;
    session.start_trip().await.unwrap();

    let err = session.verify_delivery("123456").await.unwrap_err();

    assert!(matches!(
        err,
        AppError::InvalidTransition {
            from: LoadStatus::InTransit,
            to: LoadStatus::Completed
        }
    ));
}

#[tokio::test]
async fn failed_code_dispatch_is_a_warning_not_a_failure() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    let mut session = open(
        &fixture,
        &fixture.driver,
        Arc::new(ChannelDevice::new()),
        load_id,
        TrackingConfig::default(),
    )
    .await;
    session.start_trip().await.unwrap();
    session.take_notices();
    fixture.notifier.set_failing(true);

    let outcome = session.mark_reached().await.unwrap();

    assert!(!outcome.otp_requested);
    assert_eq!(session.load().status, LoadStatus::Reached);
    assert_eq!(session.otp_state(), OtpState::NotRequested);
    let notices = session.take_notices();
    assert!(notices
        .iter()
        .any(|notice| notice.level == NoticeLevel::Warning));

    fixture.notifier.set_failing(false);
    let receipt = session.resend_otp().await.unwrap();
    assert!(receipt.requested);
    assert!(matches!(session.otp_state(), OtpState::Requested { .. }));
    let code = fixture.notifier.last_code().unwrap();
    session.verify_delivery(&code).await.unwrap();
    assert_eq!(session.load().status, LoadStatus::Completed);
}

#[tokio::test]
async fn failed_resend_keeps_the_delivered_code_valid() {
    let fixture = Fixture::new();
    let load_id = fixture.assigned_load();
    let mut session = open(
        &fixture,
        &fixture.driver,
        Arc::new(ChannelDevice::new()),
        load_id,
        TrackingConfig::default(),
    )
    .await;
    session.start_trip().await.unwrap();
    assert!(session.mark_reached().await.unwrap().otp_requested);
    let delivered = fixture.notifier.last_code().unwrap();
    let state_before = session.otp_state();
    session.take_notices();

    fixture.notifier.set_failing(true);
    let err = session.resend_otp().await.unwrap_err();

    assert!(matches!(err, AppError::Notification(_)));
    assert_eq!(session.otp_state(), state_before);
    assert!(fixture.state.delivery_challenges.contains_key(&load_id));
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Warning);

    fixture.notifier.set_failing(false);
    session.verify_delivery(&delivered).await.unwrap();
    assert_eq!(session.load().status, LoadStatus::Completed);
}
