//! Longest-prefix lookups in the network radix tree.

use super::{blocking, BenchError, BenchTarget, DurationCategory};
use crate::benchmarks::{BenchmarkResult, LatencyStats};
use crate::fixtures::sample_networks;
use async_trait::async_trait;
use serde_json::json;
use std::hint::black_box;
use std::net::{IpAddr, Ipv4Addr};

const NETWORKS: usize = 4_096;
const ITERATIONS: usize = 50_000;

/// Measures address lookups in a tree of /24 networks. Every eighth
/// address falls outside the tree.
pub struct NetworkLookupAdapter {
    networks: usize,
    iterations: usize,
}

impl NetworkLookupAdapter {
    /// Create an adapter with the default sizes.
    pub fn new() -> Self {
        Self {
            networks: NETWORKS,
            iterations: ITERATIONS,
        }
    }

    /// Adapter with custom sizes.
    pub fn with_sizes(networks: usize, iterations: usize) -> Self {
        Self {
            networks,
            iterations,
        }
    }
}

impl Default for NetworkLookupAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn probe(i: usize, networks: usize) -> IpAddr {
    if i % 8 == 7 {
        return IpAddr::V4(Ipv4Addr::new(172, 16, (i % 256) as u8, 1));
    }

    let [_, a, b, _] = ((i % networks.max(1)) as u32).to_be_bytes();
    IpAddr::V4(Ipv4Addr::new(10, a, b, (i % 254 + 1) as u8))
}

#[async_trait]
impl BenchTarget for NetworkLookupAdapter {
    fn id(&self) -> &str {
        "network_lookup"
    }

    fn description(&self) -> &str {
        "Finds the longest matching network for IPv4 addresses"
    }

    fn duration_category(&self) -> DurationCategory {
        DurationCategory::Fast
    }

    async fn run(&self) -> Result<BenchmarkResult, BenchError> {
        let (networks, iterations) = (self.networks, self.iterations);
        let id = self.id().to_string();

        blocking(move || {
            let tree = sample_networks(networks)?;
            let mut hits = 0usize;

            let stats = LatencyStats::measure(iterations, |i| {
                if black_box(tree.get_by_addr(&probe(i, networks))).is_some() {
                    hits += 1;
                }
                Ok::<_, BenchError>(())
            })?;

            Ok(BenchmarkResult::new(
                id,
                stats.to_metrics(
                    "get_by_addr",
                    json!({
                        "networks": tree.len(),
                        "hits": hits,
                    }),
                ),
            ))
        })
        .await
    }
}
