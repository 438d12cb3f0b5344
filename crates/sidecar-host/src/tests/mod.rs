//! Test suites for the embedded service lifecycle manager.

#[cfg(unix)]
mod lifecycle_behaviour;
mod support;
