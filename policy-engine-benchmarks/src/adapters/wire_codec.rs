//! Request and response marshalling.

use super::{blocking, BenchError, BenchTarget, DurationCategory};
use crate::benchmarks::{BenchmarkResult, LatencyStats};
use crate::fixtures::sample_attributes;
use async_trait::async_trait;
use pdp_engine::wire::{marshal_request_to_buffer, marshal_response, unmarshal_request};
use pdp_engine::{AttributeValue, Effect, Error};
use serde_json::json;
use std::hint::black_box;

const ITERATIONS: usize = 20_000;

/// Measures a request round trip through the codec: marshal to a reused
/// buffer, unmarshal, then marshal a response carrying the attributes as
/// obligations.
pub struct WireCodecAdapter {
    iterations: usize,
}

impl WireCodecAdapter {
    /// Create an adapter with the default iteration count.
    pub fn new() -> Self {
        Self {
            iterations: ITERATIONS,
        }
    }

    /// Adapter with a custom iteration count.
    pub fn with_iterations(iterations: usize) -> Self {
        Self { iterations }
    }
}

impl Default for WireCodecAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn round_trip(
    attrs: &[(String, AttributeValue)],
    req: &mut [u8],
    resp: &mut [u8],
) -> Result<usize, Error> {
    let n = marshal_request_to_buffer(req, attrs)?;
    let decoded = unmarshal_request(&req[..n])?;
    marshal_response(resp, Effect::Permit, &decoded, &[])
}

#[async_trait]
impl BenchTarget for WireCodecAdapter {
    fn id(&self) -> &str {
        "wire_codec"
    }

    fn description(&self) -> &str {
        "Marshals and unmarshals requests and responses"
    }

    fn duration_category(&self) -> DurationCategory {
        DurationCategory::Fast
    }

    async fn run(&self) -> Result<BenchmarkResult, BenchError> {
        let iterations = self.iterations;
        let id = self.id().to_string();

        blocking(move || {
            let attrs = sample_attributes(0);
            let mut req = vec![0u8; 1024];
            let mut resp = vec![0u8; 1024];

            let mut response_bytes = 0;
            let stats = LatencyStats::measure(iterations, |_| {
                response_bytes = black_box(round_trip(&attrs, &mut req, &mut resp)?);
                Ok::<_, Error>(())
            })?;

            Ok(BenchmarkResult::new(
                id,
                stats.to_metrics(
                    "marshal_unmarshal",
                    json!({
                        "attributes": attrs.len(),
                        "response_bytes": response_bytes,
                    }),
                ),
            ))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdp_engine::wire::unmarshal_response;

    #[test]
    fn test_round_trip_returns_attributes() {
        let attrs = sample_attributes(3);
        let mut req = [0u8; 256];
        let mut resp = [0u8; 256];

        let n = round_trip(&attrs, &mut req, &mut resp).unwrap();
        let (effect, obligations) = unmarshal_response(&resp[..n]).unwrap();
        assert_eq!(effect, Effect::Permit);
        assert_eq!(obligations.len(), attrs.len());
        assert_eq!(obligations[0].0, "user");
    }

    #[tokio::test]
    async fn test_run_benchmark() {
        let result = WireCodecAdapter::with_iterations(10).run().await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.metrics["attributes"], 4);
    }
}
