//! Metrics-history subsystem: records point-in-time
//! samples and folds them into hourly averages once they age out of the
//! retention window. Depends only on the raw-KV facade `metakv_store`
//! exposes under the `metrics:` key prefix, never on entity-store internals,
//! so it can evolve its own record shapes without touching bucket/object
//! schema versioning.

#[macro_use]
extern crate tracing;

pub mod aggregator;
pub mod recorder;
pub mod snapshot;

#[cfg(test)]
mod test_support;

pub use aggregator::{spawn as spawn_aggregator, AggregatorConfig};
pub use recorder::record;
pub use snapshot::{HourlyAggregate, MetricSnapshot};
