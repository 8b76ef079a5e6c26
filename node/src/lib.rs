// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod errors;
pub mod api;
pub mod audit;
pub mod storage;
pub mod persistence;
pub mod ledger;
pub mod verifier;
pub mod reconciler;
pub mod engine;
pub mod server;
pub mod telemetry;
