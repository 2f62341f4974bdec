//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use derive_new::new;
use lacpd_utils::pm::PortHandle;
use lacpd_utils::{Receiver, Sender, UnboundedSender};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::aggregator::Aggregators;
use crate::consts::DFLT_SYSTEM_PRIORITY;
use crate::error::Error;
use crate::events;
use crate::fsm::{mux, periodic, rx};
use crate::packet::{LacpParams, PortState, SystemId};
use crate::port::{PortStatistics, Ports, Selected};
use crate::southbound;
use crate::tasks;
use crate::tasks::messages::ProtocolInputMsg;
use crate::tasks::messages::input::ProtocolMsg;
use crate::tasks::messages::output::PduTxMsg;

// Size of the dispatcher's input queue.
const INPUT_QUEUE_DEPTH: usize = 1024;

// Global engine configuration.
//
// Owned by the dispatcher; handlers read it by reference. The actor system
// identity appears in every transmitted PDU, so changing it restarts all
// receive sessions.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    pub system: SystemId,
}

// Output channels towards the external collaborators.
#[derive(Clone, Debug, new)]
pub struct OutputChannelsTx {
    // Forwarding-plane programming.
    pub southbound: UnboundedSender<southbound::Command>,
    // Outbound PDUs.
    pub pdu: UnboundedSender<PduTxMsg>,
}

#[derive(Debug)]
pub struct Master {
    // Engine configuration.
    pub config: EngineConfig,
    // Per-port protocol state.
    pub ports: Ports,
    // Provisioned aggregators.
    pub aggregators: Aggregators,
    // Ticks processed since startup.
    pub tick_count: u64,
    // Output channels.
    pub tx: OutputChannelsTx,
}

// ===== snapshot records =====

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct LportParams {
    pub port_handle: PortHandle,
    pub lacp_enabled: bool,
    pub link_up: bool,
    pub link_speed_mbps: u32,
    pub actor: LacpParams,
    pub partner_admin: LacpParams,
    pub partner_oper: LacpParams,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct LportProtocol {
    pub port_handle: PortHandle,
    pub sport_handle: Option<PortHandle>,
    pub rx_state: rx::State,
    pub mux_state: mux::State,
    pub periodic_state: periodic::State,
    pub selected: Selected,
    pub ready_n: bool,
    pub ntt: bool,
    pub partner_sync: bool,
    pub partner_collecting: bool,
    pub current_while_ticks: u16,
    pub periodic_tx_ticks: u16,
    pub wait_while_ticks: u16,
    pub current_while_expiry_count: u32,
    pub periodic_tx_expiry_count: u32,
    pub wait_while_expiry_count: u32,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct LagTuple {
    pub sport_handle: PortHandle,
    pub port_type: u8,
    pub actor_key: u16,
    pub partner_system: SystemId,
    pub partner_key: u16,
    pub num_lports: u32,
    pub lport_handles: Vec<PortHandle>,
}

// ===== impl EngineConfig =====

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            system: SystemId::new(
                DFLT_SYSTEM_PRIORITY,
                Default::default(),
            ),
        }
    }
}

// ===== impl Master =====

impl Master {
    pub fn new(config: EngineConfig, tx: OutputChannelsTx) -> Master {
        Master {
            config,
            ports: Default::default(),
            aggregators: Default::default(),
            tick_count: 0,
            tx,
        }
    }

    // Creates the dispatcher's input queue.
    pub fn input_channels()
    -> (Sender<ProtocolInputMsg>, Receiver<ProtocolInputMsg>) {
        mpsc::channel(INPUT_QUEUE_DEPTH)
    }

    // Processes a single event, running every handler to completion, then
    // flushes pending transmissions.
    //
    // Configuration errors are returned to the caller; packet and timer
    // path errors never unwind the dispatcher.
    pub fn process_msg(
        &mut self,
        msg: ProtocolInputMsg,
    ) -> Result<(), Error> {
        let result = match msg {
            ProtocolMsg::RxPdu(msg) => events::process_rx_pdu(self, msg),
            ProtocolMsg::Tick => {
                events::process_tick(self);
                Ok(())
            }
            ProtocolMsg::LinkUp(msg) => events::process_link_up(self, msg),
            ProtocolMsg::LinkDown(msg) => events::process_link_down(self, msg),
            ProtocolMsg::LportSet(msg) => events::process_lport_set(self, msg),
            ProtocolMsg::LportClear(msg) => {
                events::process_lport_clear(self, msg)
            }
            ProtocolMsg::SportCreate(msg) => {
                events::process_sport_create(self, msg)
            }
            ProtocolMsg::SportDelete(msg) => {
                events::process_sport_delete(self, msg)
            }
            ProtocolMsg::SportParams(msg) => {
                events::process_sport_params(self, msg)
            }
            ProtocolMsg::ActorSys(msg) => events::process_actor_sys(self, msg),
            ProtocolMsg::Shutdown => Ok(()),
        };

        events::transmit_pass(self);
        result
    }

    // Runs the dispatcher until the shutdown sentinel arrives, then drains
    // the remaining queued events and returns.
    pub async fn run(
        mut self,
        mut rx: Receiver<ProtocolInputMsg>,
        tx: Sender<ProtocolInputMsg>,
    ) -> Master {
        // Protocol tick source.
        let _tick_task = tasks::tick_interval(&tx);
        drop(tx);

        while let Some(msg) = rx.recv().await {
            let shutdown = matches!(msg, ProtocolMsg::Shutdown);
            if let Err(error) = self.process_msg(msg) {
                error.log();
            }

            if shutdown {
                loop {
                    match rx.try_recv() {
                        Ok(msg) => {
                            if let Err(error) = self.process_msg(msg) {
                                error.log();
                            }
                        }
                        Err(TryRecvError::Empty)
                        | Err(TryRecvError::Disconnected) => break,
                    }
                }
                break;
            }
        }

        self
    }

    // ===== snapshot queries =====

    pub fn get_lport_params(
        &self,
        handle: PortHandle,
    ) -> Result<LportParams, Error> {
        let port = self
            .ports
            .get(&handle)
            .ok_or(Error::LportNotFound(handle))?;

        Ok(LportParams {
            port_handle: port.port_handle,
            lacp_enabled: port.lacp_enabled,
            link_up: port.link_up,
            link_speed_mbps: port.link_speed_mbps,
            actor: port.actor,
            partner_admin: port.partner_admin,
            partner_oper: port.partner_oper,
        })
    }

    pub fn get_lport_protocol(
        &self,
        handle: PortHandle,
    ) -> Result<LportProtocol, Error> {
        let port = self
            .ports
            .get(&handle)
            .ok_or(Error::LportNotFound(handle))?;

        Ok(LportProtocol {
            port_handle: port.port_handle,
            sport_handle: port.sport_handle,
            rx_state: port.rx_state,
            mux_state: port.mux_state,
            periodic_state: port.periodic_state,
            selected: port.selected,
            ready_n: port.ready_n,
            ntt: port.ntt,
            partner_sync: port
                .partner_oper
                .state
                .contains(PortState::SYNCHRONIZATION),
            partner_collecting: port
                .partner_oper
                .state
                .contains(PortState::COLLECTING),
            current_while_ticks: port.current_while_ticks,
            periodic_tx_ticks: port.periodic_tx_ticks,
            wait_while_ticks: port.wait_while_ticks,
            current_while_expiry_count: port
                .statistics
                .current_while_expiry_count,
            periodic_tx_expiry_count: port.statistics.periodic_tx_expiry_count,
            wait_while_expiry_count: port.statistics.wait_while_expiry_count,
        })
    }

    pub fn get_lport_stats(
        &self,
        handle: PortHandle,
    ) -> Result<PortStatistics, Error> {
        let port = self
            .ports
            .get(&handle)
            .ok_or(Error::LportNotFound(handle))?;

        Ok(port.statistics.clone())
    }

    pub fn list_sports(&self) -> Vec<LagTuple> {
        self.aggregators
            .iter()
            .map(|sport| LagTuple {
                sport_handle: sport.sport_handle,
                port_type: sport.port_type,
                actor_key: sport.actor_key,
                partner_system: sport.partner_system,
                partner_key: sport.partner_key,
                num_lports: sport.num_lports(),
                lport_handles: sport.lports.iter().copied().collect(),
            })
            .collect()
    }
}
