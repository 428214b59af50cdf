// Copyright 2026 PriceLens Contributors
// SPDX-License-Identifier: Apache-2.0

//! PriceLens runtime library — fetch, extraction service, SQLite store,
//! REST API and CLI around the `pricelens` engines.
//!
//! This library crate exposes the modules for the binary and for
//! integration testing.

pub mod cli;
pub mod config;
pub mod renderer;
pub mod rest;
pub mod service;
pub mod storage;
