//! Render kustomize overlays into kuttl test cases and run them against a cluster.
//!
//! ```no_run
//! use kubecover::{harness::KustomizedHarness, runner::KuttlRunner};
//!
//! let harness = KustomizedHarness::new("testdata/separate-cm", "test11")?;
//! let result = harness.run(&KuttlRunner::default());
//! harness.cleanup();
//! result?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cluster;
pub mod commands;
pub mod config;
pub mod harness;
pub mod kind;
pub mod manifest;
pub mod render;
pub mod runner;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
