//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use lacpd_utils::pm::PortHandle;
use tracing::{info, warn};

use crate::packet::DecodeError;

// LACP errors.
#[derive(Debug)]
pub enum Error {
    // Configuration requests
    DuplicateLport(PortHandle),
    DuplicateSport(PortHandle),
    LportNotFound(PortHandle),
    SportNotFound(PortHandle),
    SportBusy(PortHandle),
    // Packet input
    PduDecodeError(PortHandle, DecodeError),
    // Selection logic
    NoAggregatorMatch(PortHandle),
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::DuplicateLport(handle)
            | Error::DuplicateSport(handle)
            | Error::LportNotFound(handle)
            | Error::SportNotFound(handle)
            | Error::SportBusy(handle) => {
                warn!(port = %handle, "{}", self);
            }
            Error::PduDecodeError(handle, error) => {
                warn!(port = %handle, %error, "{}", self);
            }
            Error::NoAggregatorMatch(handle) => {
                // The port simply stays unselected; not an operator error.
                info!(port = %handle, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::DuplicateLport(..) => {
                write!(f, "logical port already exists")
            }
            Error::DuplicateSport(..) => {
                write!(f, "aggregator already exists")
            }
            Error::LportNotFound(..) => {
                write!(f, "logical port not found")
            }
            Error::SportNotFound(..) => {
                write!(f, "aggregator not found")
            }
            Error::SportBusy(..) => {
                write!(f, "aggregator still has attached ports")
            }
            Error::PduDecodeError(..) => {
                write!(f, "failed to decode PDU")
            }
            Error::NoAggregatorMatch(..) => {
                write!(f, "no matching aggregator")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::PduDecodeError(_, error) => Some(error),
            _ => None,
        }
    }
}
