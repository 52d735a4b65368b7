//! Test Module
//!
//! Cross-module test suite for the Solace backend. Unit tests live next to their code.
//!
//! ## Test Categories
//! - `mocks`: recording/failing collaborator fakes and the turn harness
//! - `brain_tests`: VADER scoring into moods, escalation detection on realistic text
//! - `turn_tests`: one turn at a time against an explicit session
//! - `supervisor_tests`: session registry behavior through the actor handle
//! - `integration_tests`: full turns against HTTP collaborators on a mock server

pub mod mocks;
pub mod supervisor_tests;
