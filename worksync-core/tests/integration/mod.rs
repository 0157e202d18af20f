// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Integration Tests for Worksync Core
//!
//! These tests verify complete workflows from workspace creation through
//! pairing, multi-device sync and conflict resolution.
//!
//! Run with: cargo test --test integration

mod multi_device_workflow_test;
