//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use chrono::{DateTime, Utc};
use lacpd_utils::avl::AvlTree;
use lacpd_utils::pm::PortHandle;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::debug::Debug;
use crate::fsm::{mux, periodic, rx};
use crate::packet::{LacpParams, PortId, PortState, SystemId};

// Administrative LACP mode knobs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Activity {
    #[default]
    Active,
    Passive,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Timeout {
    #[default]
    Long,
    Short,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Aggregation {
    #[default]
    Aggregatable,
    Individual,
}

// Outcome of the selection logic for a port.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Selected {
    #[default]
    Unselected,
    Selected,
    Standby,
}

#[derive(Clone, Debug)]
pub struct Port {
    pub port_handle: PortHandle,
    pub lacp_enabled: bool,
    pub link_up: bool,
    pub link_speed_mbps: u32,
    // Link speed class, from the handle's port-type bits.
    pub port_type: u8,
    // Actor's operational parameters.
    pub actor: LacpParams,
    // Operator-configured partner defaults.
    pub partner_admin: LacpParams,
    // Currently learned partner parameters.
    pub partner_oper: LacpParams,
    pub selected: Selected,
    pub ready_n: bool,
    // Aggregator currently attached or proposed by selection.
    pub sport_handle: Option<PortHandle>,
    pub rx_state: rx::State,
    pub mux_state: mux::State,
    pub periodic_state: periodic::State,
    // Tick counters; 0 means the timer is stopped.
    pub current_while_ticks: u16,
    pub periodic_tx_ticks: u16,
    pub wait_while_ticks: u16,
    // Need to transmit.
    pub ntt: bool,
    // LACPDUs sent within the current fast-periodic window.
    pub tx_window: u8,
    pub statistics: PortStatistics,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct PortStatistics {
    pub create_time: DateTime<Utc>,
    pub lacpdus_sent: u64,
    pub lacpdus_received: u64,
    pub lacpdus_rx_errors: u64,
    pub marker_pdus_received: u64,
    pub marker_response_pdus_sent: u64,
    pub current_while_expiry_count: u32,
    pub periodic_tx_expiry_count: u32,
    pub wait_while_expiry_count: u32,
}

// All configured logical ports, indexed by port handle.
//
// Iteration follows ascending handle order, keeping timer processing and
// aggregate membership walks deterministic.
#[derive(Debug, Default)]
pub struct Ports(AvlTree<PortHandle, Port>);

// ===== impl Port =====

impl Port {
    pub(crate) fn new(port_handle: PortHandle, system: SystemId) -> Port {
        Debug::PortCreate(&port_handle).log();

        let actor = LacpParams {
            system,
            key: 0,
            port: PortId::new(
                DFLT_PORT_PRIORITY,
                port_handle.global_port_number(),
            ),
            state: PortState::LACP_ACTIVITY | PortState::AGGREGATION,
        };

        Port {
            port_handle,
            lacp_enabled: false,
            link_up: false,
            link_speed_mbps: 0,
            port_type: port_handle.port_type(),
            actor,
            partner_admin: LacpParams::default(),
            partner_oper: LacpParams::default(),
            selected: Selected::Unselected,
            ready_n: false,
            sport_handle: None,
            rx_state: rx::State::Begin,
            mux_state: mux::State::Begin,
            periodic_state: periodic::State::Begin,
            current_while_ticks: 0,
            periodic_tx_ticks: 0,
            wait_while_ticks: 0,
            ntt: false,
            tx_window: 0,
            statistics: Default::default(),
        }
    }

    // Whether both endpoints run LACP passively, which suppresses periodic
    // transmission altogether.
    pub(crate) fn both_passive(&self) -> bool {
        !self.actor.state.contains(PortState::LACP_ACTIVITY)
            && !self.partner_oper.state.contains(PortState::LACP_ACTIVITY)
    }

    // Periodic transmission interval mandated by the partner's timeout.
    pub(crate) fn periodic_interval(&self) -> u16 {
        if self.partner_oper.state.contains(PortState::LACP_TIMEOUT) {
            FAST_PERIODIC_TICKS
        } else {
            SLOW_PERIODIC_TICKS
        }
    }

    // current_while value mandated by the actor's own timeout.
    pub(crate) fn current_while_interval(&self) -> u16 {
        if self.actor.state.contains(PortState::LACP_TIMEOUT) {
            SHORT_TIMEOUT_TICKS
        } else {
            LONG_TIMEOUT_TICKS
        }
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        Debug::PortDelete(&self.port_handle).log();
    }
}

// ===== impl PortStatistics =====

impl Default for PortStatistics {
    fn default() -> PortStatistics {
        PortStatistics {
            create_time: Utc::now(),
            lacpdus_sent: 0,
            lacpdus_received: 0,
            lacpdus_rx_errors: 0,
            marker_pdus_received: 0,
            marker_response_pdus_sent: 0,
            current_while_expiry_count: 0,
            periodic_tx_expiry_count: 0,
            wait_while_expiry_count: 0,
        }
    }
}

// ===== impl Ports =====

impl Ports {
    // Inserts a newly configured port. The value is handed back when the
    // handle is already known.
    pub(crate) fn insert(&mut self, port: Port) -> Option<Port> {
        self.0.insert_or_find(port.port_handle, port)
    }

    pub(crate) fn remove(&mut self, handle: &PortHandle) -> Option<Port> {
        self.0.remove(handle)
    }

    pub fn get(&self, handle: &PortHandle) -> Option<&Port> {
        self.0.get(handle)
    }

    pub fn get_mut(&mut self, handle: &PortHandle) -> Option<&mut Port> {
        self.0.get_mut(handle)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // Ports in ascending handle order.
    pub fn iter(&self) -> impl Iterator<Item = &'_ Port> + '_ {
        self.0.iter().map(|(_, port)| port)
    }

    // Handles in ascending order, for walks that mutate the entries.
    pub fn handles(&self) -> Vec<PortHandle> {
        self.0.keys()
    }
}
