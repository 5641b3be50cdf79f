//! gRPC health check service
//!
//! Implements the standard gRPC health checking protocol on top of
//! `tonic-health`. See: https://github.com/grpc/grpc/blob/master/doc/health-checking.md

use tonic_health::pb::health_server::{Health, HealthServer};
use tonic_health::server::HealthReporter;
use tonic_health::ServingStatus;

/// Service name standing for the overall server health
pub const OVERALL_SERVICE: &str = "";

/// Health responder reporting `SERVING` for the overall server.
///
/// The status never changes afterwards. Any other service name is answered
/// with `NOT_FOUND`.
pub async fn serving_health_service() -> HealthServer<impl Health> {
    let (mut reporter, service) = tonic_health::server::health_reporter();
    mark_serving(&mut reporter).await;
    service
}

async fn mark_serving(reporter: &mut HealthReporter) {
    reporter
        .set_service_status(OVERALL_SERVICE, ServingStatus::Serving)
        .await;
}
