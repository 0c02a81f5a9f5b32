//! This crate implements two-party additive and boolean secret sharing with
//! Beaver-triple multiplication over a synchronous TCP transport.
pub mod network;
pub mod party;
pub mod rng;
pub mod share;
