//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//
// The three per-port LACP state machines of IEEE 802.1AX: Receive (Figure
// 43-10), Periodic Transmission (Figure 43-12) and Mux (Figure 43-14).
//
// The modules below define the machine states and events together with the
// pure transition relations. Entry actions have side effects on the port,
// the aggregator table and the forwarding plane, and live in the event
// handlers (`events.rs`).
//

// Receive machine.
pub mod rx {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    pub enum State {
        Begin,
        Current,
        Expired,
        Defaulted,
        LacpDisabled,
        PortDisabled,
        Initialize,
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    pub enum Event {
        // Protocol (re)initialization.
        Begin,
        // Link down or port administratively disabled.
        PortDown,
        // Link up with LACP disabled on the port.
        LacpDisabled,
        // Link up with LACP enabled on the port.
        PortEnabled,
        // LACPDU received.
        PduRcvd,
        // current_while timer expired.
        CurrentWhileExpired,
        // Port moved to another aggregation context.
        PortMoved,
    }

    impl State {
        // Transition relation. `None` means the event doesn't apply in the
        // current state.
        pub fn next(self, event: Event) -> Option<State> {
            match (self, event) {
                (_, Event::Begin) => Some(State::Initialize),
                (State::Initialize, _) => None,
                (_, Event::PortDown) => Some(State::PortDisabled),
                (_, Event::LacpDisabled) => Some(State::LacpDisabled),
                (State::PortDisabled, Event::PortEnabled) => {
                    Some(State::Expired)
                }
                (State::PortDisabled, Event::PortMoved) => {
                    Some(State::Initialize)
                }
                (State::LacpDisabled, Event::PortEnabled) => {
                    Some(State::Expired)
                }
                (State::Current, Event::PduRcvd) => Some(State::Current),
                (State::Current, Event::CurrentWhileExpired) => {
                    Some(State::Expired)
                }
                (State::Expired, Event::PduRcvd) => Some(State::Current),
                (State::Expired, Event::CurrentWhileExpired) => {
                    Some(State::Defaulted)
                }
                (State::Defaulted, Event::PduRcvd) => Some(State::Current),
                _ => None,
            }
        }
    }

    impl std::fmt::Display for State {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                State::Begin => write!(f, "Begin"),
                State::Current => write!(f, "Current"),
                State::Expired => write!(f, "Expired"),
                State::Defaulted => write!(f, "Defaulted"),
                State::LacpDisabled => write!(f, "LacpDisabled"),
                State::PortDisabled => write!(f, "PortDisabled"),
                State::Initialize => write!(f, "Initialize"),
            }
        }
    }
}

// Periodic Transmission machine.
pub mod periodic {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    pub enum State {
        Begin,
        NoPeriodic,
        FastPeriodic,
        SlowPeriodic,
        // One-shot transient: raises NTT and immediately re-enters fast or
        // slow periodic depending on the partner's timeout.
        PeriodicTx,
    }

    impl std::fmt::Display for State {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                State::Begin => write!(f, "Begin"),
                State::NoPeriodic => write!(f, "NoPeriodic"),
                State::FastPeriodic => write!(f, "FastPeriodic"),
                State::SlowPeriodic => write!(f, "SlowPeriodic"),
                State::PeriodicTx => write!(f, "PeriodicTx"),
            }
        }
    }
}

// Mux machine.
pub mod mux {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    pub enum State {
        Begin,
        Detached,
        Waiting,
        Attached,
        Collecting,
        CollectingDistributing,
    }

    impl std::fmt::Display for State {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                State::Begin => write!(f, "Begin"),
                State::Detached => write!(f, "Detached"),
                State::Waiting => write!(f, "Waiting"),
                State::Attached => write!(f, "Attached"),
                State::Collecting => write!(f, "Collecting"),
                State::CollectingDistributing => {
                    write!(f, "CollectingDistributing")
                }
            }
        }
    }
}
