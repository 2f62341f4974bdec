//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use lacpd_utils::pm::PortHandle;
use tracing::{debug, debug_span};

use crate::aggregator::MatchType;
use crate::fsm::{mux, periodic, rx};

// LACP debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    PortCreate(&'a PortHandle),
    PortDelete(&'a PortHandle),
    SportCreate(&'a PortHandle),
    SportDelete(&'a PortHandle),
    RxFsmTransition(&'a PortHandle, rx::State, rx::State),
    PeriodicFsmTransition(&'a PortHandle, periodic::State, periodic::State),
    MuxFsmTransition(&'a PortHandle, mux::State, mux::State),
    SelectionMatch(&'a PortHandle, &'a PortHandle, MatchType),
    LportAttach(&'a PortHandle, &'a PortHandle, u32),
    LportDetach(&'a PortHandle, &'a PortHandle, u32),
    PduRx(&'a PortHandle),
    PduTx(&'a PortHandle),
    MarkerRx(&'a PortHandle),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::PortCreate(handle) | Debug::PortDelete(handle) => {
                debug_span!("port", %handle).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::SportCreate(handle) | Debug::SportDelete(handle) => {
                debug_span!("sport", %handle).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::RxFsmTransition(handle, old_state, new_state) => {
                debug_span!("port", %handle).in_scope(|| {
                    debug!(%old_state, %new_state, "{}", self);
                });
            }
            Debug::PeriodicFsmTransition(handle, old_state, new_state) => {
                debug_span!("port", %handle).in_scope(|| {
                    debug!(%old_state, %new_state, "{}", self);
                });
            }
            Debug::MuxFsmTransition(handle, old_state, new_state) => {
                debug_span!("port", %handle).in_scope(|| {
                    debug!(%old_state, %new_state, "{}", self);
                });
            }
            Debug::SelectionMatch(handle, sport, match_type) => {
                debug_span!("port", %handle).in_scope(|| {
                    debug!(%sport, ?match_type, "{}", self);
                });
            }
            Debug::LportAttach(sport, lport, num_lports)
            | Debug::LportDetach(sport, lport, num_lports) => {
                debug_span!("sport", handle = %sport).in_scope(|| {
                    debug!(%lport, %num_lports, "{}", self);
                });
            }
            Debug::PduRx(handle)
            | Debug::PduTx(handle)
            | Debug::MarkerRx(handle) => {
                debug_span!("port", %handle).in_scope(|| {
                    debug!("{}", self);
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::PortCreate(..) => {
                write!(f, "port created")
            }
            Debug::PortDelete(..) => {
                write!(f, "port deleted")
            }
            Debug::SportCreate(..) => {
                write!(f, "aggregator created")
            }
            Debug::SportDelete(..) => {
                write!(f, "aggregator deleted")
            }
            Debug::RxFsmTransition(..) => {
                write!(f, "receive state transition")
            }
            Debug::PeriodicFsmTransition(..) => {
                write!(f, "periodic state transition")
            }
            Debug::MuxFsmTransition(..) => {
                write!(f, "mux state transition")
            }
            Debug::SelectionMatch(..) => {
                write!(f, "aggregator selected")
            }
            Debug::LportAttach(..) => {
                write!(f, "port attached to aggregator")
            }
            Debug::LportDetach(..) => {
                write!(f, "port detached from aggregator")
            }
            Debug::PduRx(..) => {
                write!(f, "LACPDU received")
            }
            Debug::PduTx(..) => {
                write!(f, "LACPDU transmitted")
            }
            Debug::MarkerRx(..) => {
                write!(f, "marker PDU received")
            }
        }
    }
}
