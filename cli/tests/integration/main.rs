//! Integration tests for the berth CLI
//!
//! These tests spawn the actual binary and test end-to-end behavior.
//! Every test points `BERTH_CONFIG` at a temp directory so nothing under
//! `~/.berth` is read or written.

mod support;
