//! Integration tests for the portico operator
//!
//! These tests require a Kubernetes cluster (kind) to run and tell the story
//! of how application teams onboard services through portico.
//!
//! # Test Organization
//!
//! - `crd_operations`: Stories about creating, reading, and validating
//!   AppOnboarding resources through the Kubernetes API
//!
//! - `onboarding_lifecycle`: Stories about the reconcile loop against a real
//!   API server: status conditions, finalizers, and deletion
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored --nocapture
//! ```

mod crd_operations;
mod helpers;
mod onboarding_lifecycle;
