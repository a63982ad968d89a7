use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub trip_transitions_total: IntCounterVec,
    pub location_updates_total: IntCounter,
    pub otp_requests_total: IntCounterVec,
    pub otp_verifications_total: IntCounterVec,
    pub ws_clients: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let trip_transitions_total = IntCounterVec::new(
            Opts::new("trip_transitions_total", "Trip status transitions by target status"),
            &["to"],
        )
        .expect("valid trip_transitions_total metric");

        let location_updates_total =
            IntCounter::new("location_updates_total", "Accepted location writes")
                .expect("valid location_updates_total metric");

        let otp_requests_total = IntCounterVec::new(
            Opts::new("otp_requests_total", "Delivery code requests by outcome"),
            &["outcome"],
        )
        .expect("valid otp_requests_total metric");

        let otp_verifications_total = IntCounterVec::new(
            Opts::new("otp_verifications_total", "Delivery code verifications by outcome"),
            &["outcome"],
        )
        .expect("valid otp_verifications_total metric");

        let ws_clients = IntGauge::new("ws_clients", "Connected websocket clients")
            .expect("valid ws_clients metric");

        registry
            .register(Box::new(trip_transitions_total.clone()))
            .expect("register trip_transitions_total");
        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");
        registry
            .register(Box::new(otp_requests_total.clone()))
            .expect("register otp_requests_total");
        registry
            .register(Box::new(otp_verifications_total.clone()))
            .expect("register otp_verifications_total");
        registry
            .register(Box::new(ws_clients.clone()))
            .expect("register ws_clients");

        Self {
            registry,
            trip_transitions_total,
            location_updates_total,
            otp_requests_total,
            otp_verifications_total,
            ws_clients,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
