//! Collects pprof profiles from a set of running processes and stores them in
//! a profefe-compatible profile store.

pub mod classifier;
pub mod cli;
pub mod collector;
pub mod config;
pub mod fetcher;
pub mod pprofpb;
pub mod profile;
pub mod store;
pub mod target;

#[cfg(test)]
mod testutil;
