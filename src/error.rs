// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// No ruleset is registered under the requested simulation version.
    UnknownSimVersion,
    /// Event references a skill, relic or slot that does not exist.
    InvalidEvent,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::UnknownSimVersion => f.write_str("unknown simulation version"),
            KernelError::InvalidEvent => f.write_str("invalid event"),
        }
    }
}

pub type KernelResult<T> = core::result::Result<T, KernelError>;
pub type Result<T> = KernelResult<T>;
