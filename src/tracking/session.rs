//! Per-view trip session.
//!
//! A session owns everything one participant's view of a trip needs: the
//! load as last seen, its path history, the tracker, the transport, the
//! alert set and the delivery-code state. It is the single authoritative
//! in-memory copy for that view. Local fixes and transport updates are
//! applied in arrival order and the last one written wins.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::client::TripApi;
use crate::config::TrackingConfig;
use crate::engine::alerts::{evaluate_alerts, AlertInput};
use crate::engine::progress::{compute_progress, Progress};
use crate::engine::trips::OtpReceipt;
use crate::error::AppError;
use crate::models::alert::AlertSet;
use crate::models::coordinates::{Coordinates, RawFix};
use crate::models::event::{EventOrigin, LocationEvent};
use crate::models::load::{Load, LoadStatus};
use crate::models::tracking::{BatterySample, TrackingMode};
use crate::tracking::source::{AcquisitionError, GeolocationDevice, GpsSource, SimulationSource};
use crate::tracking::tracker::{Tracker, TrackerEvent};
use crate::transport::bus::{BusEvent, Handler, LocationBus};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// User-facing notification produced by a session operation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OtpState {
    NotRequested,
    Requested { expires_at: DateTime<Utc> },
    Verified,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReachedOutcome {
    pub otp_requested: bool,
}

/// What a call to [`TripSession::next_update`] applied.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Fix(Coordinates),
    Remote(LocationEvent),
    AcquisitionFailed(AcquisitionError),
    Ignored,
}

enum Incoming {
    Tracker(TrackerEvent),
    Remote(LocationEvent),
}

pub struct TripSession {
    api: Arc<dyn TripApi>,
    device: Arc<dyn GeolocationDevice>,
    config: TrackingConfig,
    load: Load,
    history: Vec<Coordinates>,
    tracker: Tracker,
    tracker_rx: mpsc::UnboundedReceiver<TrackerEvent>,
    transport: LocationBus,
    subscription: Handler,
    remote_rx: mpsc::UnboundedReceiver<LocationEvent>,
    alerts: AlertSet,
    battery: Option<BatterySample>,
    otp: OtpState,
    acquisition_error: Option<AcquisitionError>,
    notices: Vec<Notice>,
    rng: StdRng,
}

impl TripSession {
    /// Loads the trip, connects the transport and, for the driver of a moving
    /// load, starts GPS tracking.
    pub async fn open(
        api: Arc<dyn TripApi>,
        device: Arc<dyn GeolocationDevice>,
        load_id: Uuid,
        config: TrackingConfig,
    ) -> Result<Self, AppError> {
        let load = api
            .list_loads()
            .await?
            .into_iter()
            .find(|load| load.id == load_id)
            .ok_or_else(|| AppError::NotFound(format!("load {} not found", load_id)))?;
        let history = api.location_history(load_id).await?;

        let transport = LocationBus::new(Arc::clone(&api), config.poll_interval);
        let (remote_tx, remote_rx) = mpsc::unbounded_channel();
        let subscription: Handler = Arc::new(move |event: &LocationEvent| {
            if event.load_id == load_id && event.origin != EventOrigin::Local {
                let _ = remote_tx.send(event.clone());
            }
        });
        transport.subscribe(BusEvent::LocationUpdate, Arc::clone(&subscription));
        transport.connect(load.tenant_id);

        let (tracker, tracker_rx) = Tracker::new();
        let otp = if load.status == LoadStatus::Completed {
            OtpState::Verified
        } else {
            OtpState::NotRequested
        };

        let mut session = Self {
            api,
            device,
            config,
            load,
            history,
            tracker,
            tracker_rx,
            transport,
            subscription,
            remote_rx,
            alerts: AlertSet::new(),
            battery: None,
            otp,
            acquisition_error: None,
            notices: Vec::new(),
            rng: StdRng::from_os_rng(),
        };

        if session.is_driver() && session.load.status == LoadStatus::InTransit {
            session.start_gps();
        }

        info!(
            load_id = %load_id,
            status = %session.load.status,
            driver = session.is_driver(),
            "trip session opened"
        );
        Ok(session)
    }

    pub fn load(&self) -> &Load {
        &self.load
    }

    pub fn history(&self) -> &[Coordinates] {
        &self.history
    }

    pub fn alerts(&self) -> &AlertSet {
        &self.alerts
    }

    pub fn progress(&self) -> Progress {
        compute_progress(&self.load)
    }

    pub fn tracking_mode(&self) -> TrackingMode {
        self.tracker.mode()
    }

    pub fn has_active_producer(&self) -> bool {
        self.tracker.has_producer()
    }

    pub fn otp_state(&self) -> OtpState {
        self.otp
    }

    pub fn acquisition_error(&self) -> Option<&AcquisitionError> {
        self.acquisition_error.as_ref()
    }

    pub fn transport(&self) -> &LocationBus {
        &self.transport
    }

    pub fn is_driver(&self) -> bool {
        self.api.identity().drives(&self.load)
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub async fn start_trip(&mut self) -> Result<(), AppError> {
        self.transition(LoadStatus::InTransit).await?;
        self.start_gps();
        self.notify(NoticeLevel::Success, "Trip started successfully!");
        Ok(())
    }

    pub async fn pause_trip(&mut self) -> Result<(), AppError> {
        self.transition(LoadStatus::Paused).await?;
        self.tracker.stop();
        self.notify(NoticeLevel::Info, "Trip paused.");
        Ok(())
    }

    pub async fn resume_trip(&mut self) -> Result<(), AppError> {
        self.transition(LoadStatus::InTransit).await?;
        self.start_gps();
        self.notify(NoticeLevel::Success, "Trip resumed!");
        Ok(())
    }

    /// Marks arrival, pins the final position to the drop point and asks for a
    /// delivery code. A failed code request does not undo the arrival.
    pub async fn mark_reached(&mut self) -> Result<ReachedOutcome, AppError> {
        self.transition(LoadStatus::Reached).await?;
        self.tracker.stop();

        if let Some(drop_point) = self.load.drop_coordinates {
            let final_position = Coordinates::at(drop_point, self.next_capture_time());
            self.load.current_location = Some(final_position);
            self.history.push(final_position);
            if let Err(err) = self.api.update_location(self.load.id, final_position).await {
                warn!(load_id = %self.load.id, error = %err, "final location write failed");
            }
        }

        let otp_requested = match self.api.request_otp(self.load.id).await {
            Ok(receipt) => {
                self.otp = OtpState::Requested {
                    expires_at: receipt.expires_at,
                };
                self.notify(NoticeLevel::Success, "Arrived! Delivery code sent to the receiver.");
                true
            }
            Err(err) => {
                warn!(load_id = %self.load.id, error = %err, "delivery code request failed");
                self.notify(
                    NoticeLevel::Warning,
                    format!("Arrived, but failed to send the delivery code: {err}"),
                );
                false
            }
        };

        Ok(ReachedOutcome { otp_requested })
    }

    /// Rotates the delivery code. If the new code cannot be sent, the previous
    /// one stays valid and the OTP state is left as it was.
    pub async fn resend_otp(&mut self) -> Result<OtpReceipt, AppError> {
        if self.load.status != LoadStatus::Reached {
            return Err(AppError::Conflict(format!(
                "delivery code can only be sent once the load has reached, load is {}",
                self.load.status
            )));
        }

        match self.api.request_otp(self.load.id).await {
            Ok(receipt) => {
                self.otp = OtpState::Requested {
                    expires_at: receipt.expires_at,
                };
                self.notify(NoticeLevel::Info, "Delivery code resent.");
                Ok(receipt)
            }
            Err(err) => {
                warn!(load_id = %self.load.id, error = %err, "delivery code resend failed");
                let message = match self.otp {
                    OtpState::Requested { .. } => format!(
                        "Failed to resend the delivery code, the previous code still works: {err}"
                    ),
                    _ => format!("Failed to resend the delivery code: {err}"),
                };
                self.notify(NoticeLevel::Warning, message);
                Err(err)
            }
        }
    }

    pub async fn verify_delivery(&mut self, code: &str) -> Result<(), AppError> {
        match self.load.status {
            LoadStatus::Reached => {}
            LoadStatus::Completed => {
                return Err(AppError::Conflict(format!(
                    "load {} is already completed",
                    self.load.id
                )));
            }
            other => {
                return Err(AppError::InvalidTransition {
                    from: other,
                    to: LoadStatus::Completed,
                });
            }
        }

        match self.api.verify_otp(self.load.id, code).await {
            Ok(updated) => {
                self.merge_server_load(updated);
                self.otp = OtpState::Verified;
                self.tracker.stop();
                self.transport.disconnect();
                self.notify(NoticeLevel::Success, "Delivery Verified Successfully!");
                info!(load_id = %self.load.id, "trip completed");
                Ok(())
            }
            Err(err) => {
                let message = match &err {
                    AppError::InvalidOtp { .. } => "Invalid delivery code. Please try again.".to_string(),
                    AppError::OtpExpired => "Delivery code expired. Request a new one.".to_string(),
                    AppError::OtpLocked => {
                        "Too many attempts. Request a new delivery code.".to_string()
                    }
                    other => format!("Delivery verification failed: {other}"),
                };
                self.notify(NoticeLevel::Error, message);
                Err(err)
            }
        }
    }

    /// Switches the position source. Only the driver of a moving load may track.
    pub fn set_tracking_mode(&mut self, mode: TrackingMode) -> Result<(), AppError> {
        if mode != TrackingMode::Off {
            self.ensure_driver()?;
            if self.load.status != LoadStatus::InTransit {
                return Err(AppError::Conflict(format!(
                    "tracking is only available in transit, load is {}",
                    self.load.status
                )));
            }
        }

        match mode {
            TrackingMode::Gps => self.start_gps(),
            TrackingMode::Simulation => {
                self.tracker.stop();
                self.acquisition_error = None;
                let seed = self
                    .load
                    .current_location
                    .map(|location| location.point())
                    .or(self.load.pickup_coordinates);
                let source = SimulationSource::new(seed, self.config.simulation_interval);
                self.tracker.start(TrackingMode::Simulation, Box::new(source));
            }
            TrackingMode::Off => self.tracker.stop(),
        }
        Ok(())
    }

    pub fn stop_tracking(&mut self) {
        self.tracker.stop();
    }

    pub fn update_battery(&mut self, sample: BatterySample) {
        self.battery = Some(sample);
        let position = self.load.current_location;
        self.refresh_alerts(position.as_ref(), 0.0);
    }

    /// Hides an alert until its condition fires again.
    pub fn dismiss_alert(&mut self, id: &str) -> bool {
        self.alerts.remove(id).is_some()
    }

    /// Waits for the next fix or transport update and applies it.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        let incoming = tokio::select! {
            Some(event) = self.tracker_rx.recv() => Incoming::Tracker(event),
            Some(event) = self.remote_rx.recv() => Incoming::Remote(event),
            else => return None,
        };

        Some(match incoming {
            Incoming::Tracker(event) => self.handle_tracker_event(event).await,
            Incoming::Remote(event) => self.apply_remote(event),
        })
    }

    /// Applies everything already queued without waiting. Returns how many updates changed state.
    pub async fn pump(&mut self) -> usize {
        let mut applied = 0;

        while let Ok(event) = self.tracker_rx.try_recv() {
            if self.handle_tracker_event(event).await != SessionUpdate::Ignored {
                applied += 1;
            }
        }
        while let Ok(event) = self.remote_rx.try_recv() {
            if self.apply_remote(event) != SessionUpdate::Ignored {
                applied += 1;
            }
        }

        applied
    }

    pub fn close(self) {
        info!(load_id = %self.load.id, "trip session closed");
    }

    async fn transition(&mut self, target: LoadStatus) -> Result<(), AppError> {
        self.ensure_driver()?;
        self.load.status.action_towards(target)?;

        match self.api.update_status(self.load.id, target).await {
            Ok(updated) => {
                self.merge_server_load(updated);
                Ok(())
            }
            Err(err) => {
                error!(
                    load_id = %self.load.id,
                    to = %target,
                    error = %err,
                    "trip status update failed"
                );
                self.notify(
                    NoticeLevel::Error,
                    format!("Could not update trip status: {err}"),
                );
                Err(err)
            }
        }
    }

    fn ensure_driver(&self) -> Result<(), AppError> {
        if self.is_driver() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "only the assigned driver can do this".to_string(),
            ))
        }
    }

    fn start_gps(&mut self) {
        self.tracker.stop();
        self.acquisition_error = None;

        match GpsSource::start(self.device.as_ref()) {
            Ok(source) => self.tracker.start(TrackingMode::Gps, Box::new(source)),
            Err(error) => self.report_acquisition(error),
        }
    }

    fn report_acquisition(&mut self, error: AcquisitionError) {
        warn!(load_id = %self.load.id, error = %error, "gps unavailable");
        self.notify(NoticeLevel::Error, format!("GPS unavailable: {error}"));
        self.acquisition_error = Some(error);
    }

    async fn handle_tracker_event(&mut self, event: TrackerEvent) -> SessionUpdate {
        if !self.tracker.is_current(&event) {
            return SessionUpdate::Ignored;
        }

        match event {
            TrackerEvent::Fix { fix, .. } => match self.apply_fix(fix).await {
                Some(coordinates) => SessionUpdate::Fix(coordinates),
                None => SessionUpdate::Ignored,
            },
            TrackerEvent::Failed { error, .. } => {
                self.tracker.stop();
                self.report_acquisition(error.clone());
                SessionUpdate::AcquisitionFailed(error)
            }
        }
    }

    async fn apply_fix(&mut self, fix: RawFix) -> Option<Coordinates> {
        if self.load.status != LoadStatus::InTransit || self.tracker.mode() == TrackingMode::Off {
            return None;
        }

        let coordinates = Coordinates::from_fix(fix, self.next_capture_time());
        self.load.current_location = Some(coordinates);
        self.history.push(coordinates);

        let roll = self.rng.random::<f64>();
        self.refresh_alerts(Some(&coordinates), roll);

        self.transport.emit(
            BusEvent::LocationUpdate,
            &LocationEvent {
                load_id: self.load.id,
                coordinates: Some(coordinates),
                status: self.load.status,
                origin: EventOrigin::Local,
            },
        );

        if let Err(err) = self.api.update_location(self.load.id, coordinates).await {
            warn!(load_id = %self.load.id, error = %err, "location push failed");
        }

        Some(coordinates)
    }

    fn apply_remote(&mut self, event: LocationEvent) -> SessionUpdate {
        if event.load_id != self.load.id {
            return SessionUpdate::Ignored;
        }

        self.load.status = event.status;
        if let Some(coordinates) = event.coordinates {
            self.load.current_location = Some(coordinates);
            let newer = self
                .history
                .last()
                .is_none_or(|last| coordinates.captured_at > last.captured_at);
            if newer {
                self.history.push(coordinates);
            }
        }
        if event.status == LoadStatus::Completed {
            self.otp = OtpState::Verified;
        }

        SessionUpdate::Remote(event)
    }

    fn refresh_alerts(&mut self, position: Option<&Coordinates>, traffic_roll: f64) {
        let input = AlertInput {
            load: &self.load,
            position,
            battery: self.battery,
            mode: self.tracker.mode(),
            traffic_roll,
        };
        let alerts = evaluate_alerts(&input, &self.alerts);
        self.alerts = alerts;
    }

    /// Keeps path history non-decreasing in capture time.
    fn next_capture_time(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.history.last() {
            Some(last) if last.captured_at > now => last.captured_at,
            _ => now,
        }
    }

    fn merge_server_load(&mut self, updated: Load) {
        let local = self.load.current_location;
        self.load = updated;

        let keep_local = match (local, self.load.current_location) {
            (Some(mine), Some(theirs)) => mine.captured_at > theirs.captured_at,
            (Some(_), None) => true,
            _ => false,
        };
        if keep_local {
            self.load.current_location = local;
        }
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }
}

impl Drop for TripSession {
    fn drop(&mut self) {
        self.tracker.stop();
        self.transport
            .unsubscribe(BusEvent::LocationUpdate, &self.subscription);
        self.transport.disconnect();
    }
}
