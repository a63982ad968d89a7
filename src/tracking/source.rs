//! Position producers: a device location watch or a synthetic simulator.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::models::coordinates::{GeoPoint, RawFix};

/// Maximum per-axis jitter applied by the simulator, in degrees (about 100 m).
pub const SIMULATION_JITTER_DEG: f64 = 0.001;
pub const SIMULATION_HEADING_DEG: f64 = 45.0;
const SIMULATION_MIN_KMH: f64 = 40.0;
const SIMULATION_MAX_KMH: f64 = 90.0;

const WATCH_BUFFER: usize = 64;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location tracking is not supported on this device")]
    Unsupported,

    #[error("timed out acquiring a position")]
    Timeout,

    #[error("position unavailable: {0}")]
    Unavailable(String),
}

/// A lazy stream of fixes. `Ok(None)` ends the stream; an error ends the watch session.
#[async_trait]
pub trait PositionSource: Send {
    async fn next_fix(&mut self) -> Result<Option<RawFix>, AcquisitionError>;
}

pub type WatchSender = mpsc::Sender<Result<RawFix, AcquisitionError>>;
pub type WatchReceiver = mpsc::Receiver<Result<RawFix, AcquisitionError>>;

/// Platform location-watch primitive.
pub trait GeolocationDevice: Send + Sync {
    fn watch_position(&self) -> Result<WatchReceiver, AcquisitionError>;
}

/// Fixes delivered by a device watch. Dropping the source clears the watch.
pub struct GpsSource {
    watch: WatchReceiver,
}

impl GpsSource {
    pub fn start(device: &dyn GeolocationDevice) -> Result<Self, AcquisitionError> {
        Ok(Self {
            watch: device.watch_position()?,
        })
    }
}

#[async_trait]
impl PositionSource for GpsSource {
    async fn next_fix(&mut self) -> Result<Option<RawFix>, AcquisitionError> {
        match self.watch.recv().await {
            Some(Ok(fix)) => Ok(Some(fix)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }
}

/// A device fed from outside, e.g. fixes relayed from a phone over the network.
pub struct ChannelDevice {
    current: Mutex<Option<WatchSender>>,
    refusal: Option<AcquisitionError>,
}

impl ChannelDevice {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            refusal: None,
        }
    }

    /// A device that refuses every watch request with `error`.
    pub fn refusing(error: AcquisitionError) -> Self {
        Self {
            current: Mutex::new(None),
            refusal: Some(error),
        }
    }

    fn sender(&self) -> Option<WatchSender> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Delivers a fix to the active watch. Returns `false` when nobody is watching.
    pub async fn push(&self, fix: RawFix) -> bool {
        match self.sender() {
            Some(sender) => sender.send(Ok(fix)).await.is_ok(),
            None => false,
        }
    }

    /// Fails the active watch.
    pub async fn fail(&self, error: AcquisitionError) -> bool {
        match self.sender() {
            Some(sender) => sender.send(Err(error)).await.is_ok(),
            None => false,
        }
    }

    pub fn is_watched(&self) -> bool {
        self.sender().is_some_and(|sender| !sender.is_closed())
    }
}

impl Default for ChannelDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GeolocationDevice for ChannelDevice {
    fn watch_position(&self) -> Result<WatchReceiver, AcquisitionError> {
        if let Some(error) = &self.refusal {
            return Err(error.clone());
        }

        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        Ok(rx)
    }
}

/// Emits a jittered fix every tick, starting from a seed position.
pub struct SimulationSource {
    last: Option<GeoPoint>,
    period: Duration,
    ticker: Option<Interval>,
    rng: StdRng,
}

impl SimulationSource {
    pub fn new(seed: Option<GeoPoint>, period: Duration) -> Self {
        Self::with_rng(seed, period, StdRng::from_os_rng())
    }

    pub fn with_rng(seed: Option<GeoPoint>, period: Duration, rng: StdRng) -> Self {
        Self {
            last: seed,
            period,
            ticker: None,
            rng,
        }
    }
}

#[async_trait]
impl PositionSource for SimulationSource {
    async fn next_fix(&mut self) -> Result<Option<RawFix>, AcquisitionError> {
        let period = self.period;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            ticker.tick().await;
            if let Some(previous) = self.last {
                let fix = perturb(&previous, &mut self.rng);
                self.last = Some(GeoPoint {
                    lat: fix.lat,
                    lng: fix.lng,
                });
                return Ok(Some(fix));
            }
        }
    }
}

/// Next simulated fix: a small positive drift in both axes at a plausible highway speed.
pub fn perturb<R: Rng + ?Sized>(previous: &GeoPoint, rng: &mut R) -> RawFix {
    let speed_kmh = rng.random_range(SIMULATION_MIN_KMH..=SIMULATION_MAX_KMH);
    RawFix {
        lat: previous.lat + rng.random_range(0.0..SIMULATION_JITTER_DEG),
        lng: previous.lng + rng.random_range(0.0..SIMULATION_JITTER_DEG),
        heading: Some(SIMULATION_HEADING_DEG),
        speed: Some(speed_kmh / 3.6),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    const START: GeoPoint = GeoPoint {
        lat: 19.0760,
        lng: 72.8777,
    };

    #[test]
    fn perturbation_stays_within_jitter_and_speed_band() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let fix = perturb(&START, &mut rng);
            assert!(fix.lat >= START.lat && fix.lat - START.lat <= SIMULATION_JITTER_DEG);
            assert!(fix.lng >= START.lng && fix.lng - START.lng <= SIMULATION_JITTER_DEG);
            assert_eq!(fix.heading, Some(SIMULATION_HEADING_DEG));
            let speed = fix.speed.unwrap();
            assert!(speed >= 40.0 / 3.6 - 1e-9 && speed <= 90.0 / 3.6 + 1e-9);
        }
    }

    #[tokio::test]
    async fn simulation_walks_from_seed() {
        let mut source = SimulationSource::with_rng(
            Some(START),
            Duration::from_millis(5),
            StdRng::seed_from_u64(1),
        );
        let first = source.next_fix().await.unwrap().unwrap();
        let second = source.next_fix().await.unwrap().unwrap();

        assert!(first.lat >= START.lat);
        assert!(second.lat >= first.lat && second.lng >= first.lng);
    }

    #[tokio::test]
    async fn gps_source_surfaces_watch_errors() {
        let device = ChannelDevice::new();
        let mut source = GpsSource::start(&device).unwrap();

        assert!(device.push(RawFix { lat: 1.0, lng: 2.0, heading: None, speed: None }).await);
        assert!(device.fail(AcquisitionError::Timeout).await);

        assert_eq!(source.next_fix().await.unwrap().map(|fix| fix.lat), Some(1.0));
        assert_eq!(source.next_fix().await, Err(AcquisitionError::Timeout));
    }

    #[test]
    fn refusing_device_reports_permission_denied() {
        let device = ChannelDevice::refusing(AcquisitionError::PermissionDenied);
        assert_eq!(
            GpsSource::start(&device).err(),
            Some(AcquisitionError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn dropping_the_source_closes_the_watch() {
        let device = ChannelDevice::new();
        let source = GpsSource::start(&device).unwrap();
        assert!(device.is_watched());

        drop(source);
        assert!(!device.is_watched());
        assert!(!device.push(RawFix { lat: 1.0, lng: 2.0, heading: None, speed: None }).await);
    }
}
