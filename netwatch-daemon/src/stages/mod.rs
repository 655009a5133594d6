//! Daemon stages.
//!
//! Each stage is an async function or struct with a `run` method that the
//! [`Orchestrator`](crate::orchestrator::Orchestrator) spawns through
//! [`SyncCoordinator::spawn`](netwatch_core::SyncCoordinator::spawn), so
//! every stage is registered before it starts and released exactly once.
//!
//! Every stage waits on the shutdown token alongside its own I/O.
//!
//! | Stage | Role |
//! | --- | --- |
//! | [`collector`] | UDP listener, turns matching datagrams into hits |
//! | [`display`] | Renders alert/recovery messages and periodic status lines |
//! | [`signal`] | Fires the shutdown broadcast on SIGINT/SIGTERM |
//! | [`stats`] | Publishes watchdog state to metric gauges |

pub mod collector;
pub mod display;
pub mod signal;
pub mod stats;
