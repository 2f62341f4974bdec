//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use lacpd_utils::pm::PortHandle;

use crate::aggregator::{MatchParams, MatchType, ParamFlags};
use crate::consts::*;
use crate::debug::Debug;
use crate::error::Error;
use crate::fsm::{mux, periodic, rx};
use crate::master::Master;
use crate::packet::{Lacpdu, MarkerTlvType, Pdu, PortState, SystemId};
use crate::port::{Activity, Aggregation, Port, Selected, Timeout};
use crate::southbound;
use crate::tasks::messages::input::{
    ActorSysMsg, LinkDownMsg, LinkUpMsg, LportClearMsg, LportSetMsg, RxPduMsg,
    SportCreateMsg, SportDeleteMsg, SportParamsMsg,
};
use crate::tasks::messages::output::PduTxMsg;

// Actor state bits a partner must mirror back for its view of us to be
// considered up to date.
const NTT_STATE_MASK: u8 = PortState::LACP_ACTIVITY.bits()
    | PortState::LACP_TIMEOUT.bits()
    | PortState::SYNCHRONIZATION.bits()
    | PortState::AGGREGATION.bits();

// ===== PDU input =====

pub(crate) fn process_rx_pdu(
    master: &mut Master,
    msg: RxPduMsg,
) -> Result<(), Error> {
    let handle = msg.port_handle;
    let port = master
        .ports
        .get_mut(&handle)
        .ok_or(Error::LportNotFound(handle))?;

    let pdu = match Pdu::decode(&msg.data) {
        Ok(pdu) => pdu,
        Err(error) => {
            port.statistics.lacpdus_rx_errors += 1;
            return Err(Error::PduDecodeError(handle, error));
        }
    };

    // PDUs on disabled ports are discarded without state change.
    if !port.link_up || !port.lacp_enabled {
        return Ok(());
    }

    match pdu {
        Pdu::Marker(marker) => {
            Debug::MarkerRx(&handle).log();
            port.statistics.marker_pdus_received += 1;

            // Echo the requester fields back with the TLV type switched to
            // "response". The state machines are not involved.
            if marker.tlv_type == MarkerTlvType::Information {
                let response = marker.response();
                port.statistics.marker_response_pdus_sent += 1;
                let _ = master.tx.pdu.send(PduTxMsg {
                    port_handle: handle,
                    data: response.encode(),
                });
            }
            Ok(())
        }
        Pdu::Lacp(pdu) => {
            Debug::PduRx(&handle).log();
            port.statistics.lacpdus_received += 1;
            process_lacpdu(master, handle, pdu);
            Ok(())
        }
    }
}

// Runs the Receive machine for an arriving LACPDU (CURRENT state entry).
fn process_lacpdu(master: &mut Master, handle: PortHandle, pdu: Lacpdu) {
    let port = master.ports.get_mut(&handle).unwrap();

    let Some(next) = port.rx_state.next(rx::Event::PduRcvd) else {
        return;
    };

    // The partner's view of us is stale, answer with fresh information.
    if pdu.partner.system != port.actor.system
        || pdu.partner.port != port.actor.port
        || pdu.partner.key != port.actor.key
        || pdu.partner.state.bits() & NTT_STATE_MASK
            != port.actor.state.bits() & NTT_STATE_MASK
    {
        port.ntt = true;
    }

    // A change in the partner's identity invalidates the current selection.
    if pdu.actor.system != port.partner_oper.system
        || pdu.actor.port != port.partner_oper.port
        || pdu.actor.key != port.partner_oper.key
        || pdu.actor.state.contains(PortState::AGGREGATION)
            != port.partner_oper.state.contains(PortState::AGGREGATION)
    {
        port.selected = Selected::Unselected;
    }

    // Record the partner information carried in the PDU.
    port.partner_oper = pdu.actor;
    port.actor.state.remove(PortState::EXPIRED | PortState::DEFAULTED);
    port.current_while_ticks = port.current_while_interval();

    if port.rx_state != next {
        Debug::RxFsmTransition(&handle, port.rx_state, next).log();
    }
    port.rx_state = next;

    periodic_reevaluate(master, handle);
    mux_reevaluate(master, handle);
    try_select(master, handle);
}

// ===== timer input =====

pub(crate) fn process_tick(master: &mut Master) {
    master.tick_count += 1;
    let reset_window =
        master.tick_count % u64::from(FAST_PERIODIC_TICKS) == 0;

    for handle in master.ports.handles() {
        let port = master.ports.get_mut(&handle).unwrap();
        if reset_window {
            port.tx_window = 0;
        }

        // current_while timer.
        if port.current_while_ticks > 0 {
            port.current_while_ticks -= 1;
            if port.current_while_ticks == 0 {
                port.statistics.current_while_expiry_count += 1;
                rx_fsm(master, handle, rx::Event::CurrentWhileExpired);
                periodic_reevaluate(master, handle);
                mux_reevaluate(master, handle);
            }
        }

        // periodic_tx timer.
        let port = master.ports.get_mut(&handle).unwrap();
        if port.periodic_tx_ticks > 0 {
            port.periodic_tx_ticks -= 1;
            if port.periodic_tx_ticks == 0 {
                periodic_tx_fire(master, handle);
            }
        }

        // wait_while timer.
        let port = master.ports.get_mut(&handle).unwrap();
        if port.wait_while_ticks > 0 {
            port.wait_while_ticks -= 1;
            if port.wait_while_ticks == 0 {
                port.statistics.wait_while_expiry_count += 1;
                port.ready_n = true;

                // The aggregate-wait barrier spans the whole aggregator, so
                // sibling ports may become attachable as well.
                let sport = port.sport_handle;
                mux_reevaluate(master, handle);
                if let Some(sport) = sport {
                    for sibling in sport_members(master, sport, Some(handle)) {
                        mux_reevaluate(master, sibling);
                    }
                }
            }
        }
    }
}

// PERIODIC_TX is a one-shot transient: raise NTT, then re-enter fast or
// slow periodic according to the partner's current timeout.
fn periodic_tx_fire(master: &mut Master, handle: PortHandle) {
    let port = master.ports.get_mut(&handle).unwrap();

    port.statistics.periodic_tx_expiry_count += 1;
    Debug::PeriodicFsmTransition(
        &handle,
        port.periodic_state,
        periodic::State::PeriodicTx,
    )
    .log();
    port.ntt = true;

    let next = if port.periodic_interval() == FAST_PERIODIC_TICKS {
        periodic::State::FastPeriodic
    } else {
        periodic::State::SlowPeriodic
    };
    Debug::PeriodicFsmTransition(&handle, periodic::State::PeriodicTx, next)
        .log();
    port.periodic_state = next;
    port.periodic_tx_ticks = port.periodic_interval();
}

// ===== link state input =====

pub(crate) fn process_link_up(
    master: &mut Master,
    msg: LinkUpMsg,
) -> Result<(), Error> {
    let handle = msg.port_handle;
    let port = master
        .ports
        .get_mut(&handle)
        .ok_or(Error::LportNotFound(handle))?;

    port.link_up = true;
    port.link_speed_mbps = msg.speed_mbps;

    if port.lacp_enabled {
        rx_fsm(master, handle, rx::Event::PortEnabled);
    } else {
        rx_fsm(master, handle, rx::Event::LacpDisabled);
    }
    periodic_reevaluate(master, handle);
    mux_reevaluate(master, handle);
    try_select(master, handle);

    Ok(())
}

pub(crate) fn process_link_down(
    master: &mut Master,
    msg: LinkDownMsg,
) -> Result<(), Error> {
    let handle = msg.port_handle;
    let port = master
        .ports
        .get_mut(&handle)
        .ok_or(Error::LportNotFound(handle))?;

    port.link_up = false;
    port.link_speed_mbps = 0;
    port.selected = Selected::Unselected;

    mux_reevaluate(master, handle);
    rx_fsm(master, handle, rx::Event::PortDown);
    periodic_reevaluate(master, handle);

    Ok(())
}

// ===== configuration input =====

pub(crate) fn process_lport_set(
    master: &mut Master,
    msg: LportSetMsg,
) -> Result<(), Error> {
    let handle = msg.port_handle;

    // Reject handle collisions with provisioned aggregators.
    if master.aggregators.get(&handle).is_some() {
        return Err(Error::DuplicateSport(handle));
    }

    match master.ports.get_mut(&handle) {
        Some(port) => {
            // The configurator is idempotent; only a real change restarts
            // the port's protocol session.
            if !lport_cfg_changed(port, &msg, &master.config.system) {
                return Ok(());
            }

            port.selected = Selected::Unselected;
            mux_reevaluate(master, handle);

            let port = master.ports.get_mut(&handle).unwrap();
            apply_lport_cfg(port, &msg, &master.config.system);

            // The reconfigured port no longer belongs to its previous
            // aggregation context: take the receive session through the
            // port-moved path.
            rx_fsm(master, handle, rx::Event::PortDown);
            rx_fsm(master, handle, rx::Event::PortMoved);
            resume_port(master, handle);
        }
        None => {
            let mut port = Port::new(handle, master.config.system);
            apply_lport_cfg(&mut port, &msg, &master.config.system);
            master.ports.insert(port);
            mux_reevaluate(master, handle);
            restart_port(master, handle);
        }
    }

    Ok(())
}

pub(crate) fn process_lport_clear(
    master: &mut Master,
    msg: LportClearMsg,
) -> Result<(), Error> {
    let handle = msg.port_handle;
    let port = master
        .ports
        .get_mut(&handle)
        .ok_or(Error::LportNotFound(handle))?;

    // Detach from the aggregate before the record goes away.
    port.selected = Selected::Unselected;
    mux_reevaluate(master, handle);
    master.ports.remove(&handle);

    Ok(())
}

pub(crate) fn process_sport_create(
    master: &mut Master,
    msg: SportCreateMsg,
) -> Result<(), Error> {
    let handle = msg.sport_handle;

    // Reject handle collisions with configured logical ports.
    if master.ports.get(&handle).is_some() {
        return Err(Error::DuplicateLport(handle));
    }

    master
        .aggregators
        .create(handle, msg.port_type, msg.actor_key)?;
    let _ = master
        .tx
        .southbound
        .send(southbound::Command::LagCreate {
            sport_handle: handle,
        });

    Ok(())
}

pub(crate) fn process_sport_delete(
    master: &mut Master,
    msg: SportDeleteMsg,
) -> Result<(), Error> {
    let handle = msg.sport_handle;

    master.aggregators.destroy(handle)?;
    let _ = master
        .tx
        .southbound
        .send(southbound::Command::LagDestroy {
            sport_handle: handle,
        });

    Ok(())
}

pub(crate) fn process_sport_params(
    master: &mut Master,
    msg: SportParamsMsg,
) -> Result<(), Error> {
    let handle = msg.sport_handle;
    let sport = master
        .aggregators
        .get_mut(&handle)
        .ok_or(Error::SportNotFound(handle))?;

    if !sport.lports.is_empty() {
        return Err(Error::SportBusy(handle));
    }

    // An empty flag set unsets the partner parameters altogether, freeing
    // the aggregator for deletion or a fresh selection.
    if msg.flags.is_empty() && msg.aggr_type.is_none() {
        sport.clear_learned();
    }
    if msg.flags.contains(ParamFlags::PARTNER_SYS_PRI) {
        sport.partner_system.priority = msg.partner_system_priority;
        sport.flags.insert(ParamFlags::PARTNER_SYS_PRI);
    }
    if msg.flags.contains(ParamFlags::PARTNER_SYS_ID) {
        sport.partner_system.mac = msg.partner_system_mac;
        sport.flags.insert(ParamFlags::PARTNER_SYS_ID);
    }
    if msg.flags.contains(ParamFlags::PARTNER_KEY) {
        sport.partner_key = msg.partner_key;
        sport.flags.insert(ParamFlags::PARTNER_KEY);
    }
    if let Some(aggr_type) = msg.aggr_type {
        sport.aggr_type = aggr_type;
    }

    // Ports holding a proposal for this aggregator must re-run selection
    // against the new parameters.
    for member in sport_members(master, handle, None) {
        let port = master.ports.get_mut(&member).unwrap();
        port.selected = Selected::Unselected;
        mux_reevaluate(master, member);
        try_select(master, member);
    }

    Ok(())
}

// Changing the actor system identity restarts every receive session, since
// the system id is carried in every transmitted PDU.
pub(crate) fn process_actor_sys(
    master: &mut Master,
    msg: ActorSysMsg,
) -> Result<(), Error> {
    master.config.system = SystemId::new(msg.priority, msg.mac);

    for handle in master.ports.handles() {
        let port = master.ports.get_mut(&handle).unwrap();
        port.selected = Selected::Unselected;
        mux_reevaluate(master, handle);

        let port = master.ports.get_mut(&handle).unwrap();
        port.actor.system = master.config.system;
        restart_port(master, handle);
    }

    Ok(())
}

// ===== transmit pass =====

// Emits an LACPDU on every port with NTT raised, subject to the per-port
// rate limit of MAX_TX_PER_FAST_PERIOD frames per fast-periodic window.
pub(crate) fn transmit_pass(master: &mut Master) {
    for handle in master.ports.handles() {
        let port = master.ports.get_mut(&handle).unwrap();

        if !port.ntt || port.periodic_tx_ticks == 0 {
            continue;
        }
        if port.tx_window >= MAX_TX_PER_FAST_PERIOD {
            // NTT stays pending until the window rolls over.
            continue;
        }

        let pdu = Lacpdu::new(port.actor, port.partner_oper, 0);
        port.ntt = false;
        port.tx_window += 1;
        port.statistics.lacpdus_sent += 1;
        Debug::PduTx(&handle).log();

        let _ = master.tx.pdu.send(PduTxMsg {
            port_handle: handle,
            data: pdu.encode(),
        });
    }
}

// ===== receive machine =====

pub(crate) fn rx_fsm(
    master: &mut Master,
    handle: PortHandle,
    event: rx::Event,
) {
    let Some(port) = master.ports.get_mut(&handle) else {
        return;
    };
    let Some(mut next) = port.rx_state.next(event) else {
        return;
    };

    loop {
        if port.rx_state != next {
            Debug::RxFsmTransition(&handle, port.rx_state, next).log();
        }
        port.rx_state = next;

        match next {
            rx::State::Initialize => {
                port.partner_oper = port.partner_admin;
                port.selected = Selected::Unselected;
                port.ntt = false;
                port.current_while_ticks = 0;
                // Unconditional transition.
                next = rx::State::PortDisabled;
                continue;
            }
            rx::State::PortDisabled => {
                port.partner_oper.state.remove(PortState::SYNCHRONIZATION);
                port.current_while_ticks = 0;
            }
            rx::State::LacpDisabled => {
                port.selected = Selected::Unselected;
                port.partner_oper = port.partner_admin;
                port.partner_oper.state.remove(PortState::AGGREGATION);
                port.current_while_ticks = 0;
            }
            rx::State::Expired => {
                port.partner_oper.state.remove(PortState::SYNCHRONIZATION);
                port.partner_oper.state.insert(PortState::LACP_TIMEOUT);
                port.actor.state.insert(PortState::EXPIRED);
                port.current_while_ticks = SHORT_TIMEOUT_TICKS;
            }
            rx::State::Defaulted => {
                // Fall back to the administratively configured partner.
                if port.partner_oper != port.partner_admin {
                    port.selected = Selected::Unselected;
                }
                port.partner_oper = port.partner_admin;
                port.partner_oper.state.insert(PortState::DEFAULTED);
                port.actor.state.insert(PortState::DEFAULTED);
                port.actor.state.remove(PortState::EXPIRED);
                port.current_while_ticks = 0;
            }
            rx::State::Begin | rx::State::Current => {}
        }
        break;
    }
}

// ===== periodic transmission machine =====

pub(crate) fn periodic_reevaluate(master: &mut Master, handle: PortHandle) {
    let Some(port) = master.ports.get_mut(&handle) else {
        return;
    };

    let enabled =
        port.link_up && port.lacp_enabled && !port.both_passive();
    let target = if !enabled {
        periodic::State::NoPeriodic
    } else if port.periodic_interval() == FAST_PERIODIC_TICKS {
        periodic::State::FastPeriodic
    } else {
        periodic::State::SlowPeriodic
    };

    if port.periodic_state == target {
        return;
    }

    // Moving from the slow to the fast rate goes through PERIODIC_TX so
    // the partner learns about the new timeout right away.
    if port.periodic_state == periodic::State::SlowPeriodic
        && target == periodic::State::FastPeriodic
    {
        Debug::PeriodicFsmTransition(
            &handle,
            port.periodic_state,
            periodic::State::PeriodicTx,
        )
        .log();
        port.ntt = true;
    }

    Debug::PeriodicFsmTransition(&handle, port.periodic_state, target).log();
    port.periodic_state = target;
    port.periodic_tx_ticks = match target {
        periodic::State::NoPeriodic => 0,
        periodic::State::FastPeriodic => FAST_PERIODIC_TICKS,
        periodic::State::SlowPeriodic => SLOW_PERIODIC_TICKS,
        _ => unreachable!(),
    };
}

// ===== mux machine =====

pub(crate) fn mux_reevaluate(master: &mut Master, handle: PortHandle) {
    loop {
        let Some(port) = master.ports.get(&handle) else {
            return;
        };

        let selected = port.selected == Selected::Selected;
        let partner_sync =
            port.partner_oper.state.contains(PortState::SYNCHRONIZATION);
        let partner_collecting =
            port.partner_oper.state.contains(PortState::COLLECTING);

        let next = match port.mux_state {
            mux::State::Begin => Some(mux::State::Detached),
            mux::State::Detached if selected => Some(mux::State::Waiting),
            mux::State::Waiting if !selected => Some(mux::State::Detached),
            mux::State::Waiting
                if port.ready_n
                    && port
                        .sport_handle
                        .is_some_and(|sport| {
                            aggregator_ready(master, sport, handle)
                        }) =>
            {
                Some(mux::State::Attached)
            }
            mux::State::Attached if !selected => Some(mux::State::Detached),
            mux::State::Attached if partner_sync => {
                Some(mux::State::Collecting)
            }
            mux::State::Collecting if !selected => Some(mux::State::Detached),
            mux::State::Collecting if !partner_sync => {
                Some(mux::State::Attached)
            }
            mux::State::Collecting if partner_collecting => {
                Some(mux::State::CollectingDistributing)
            }
            mux::State::CollectingDistributing if !selected => {
                Some(mux::State::Detached)
            }
            mux::State::CollectingDistributing
                if !partner_sync || !partner_collecting =>
            {
                Some(mux::State::Collecting)
            }
            _ => None,
        };

        match next {
            Some(next) => mux_entry(master, handle, next),
            None => break,
        }
    }
}

fn mux_entry(master: &mut Master, handle: PortHandle, next: mux::State) {
    let Master {
        ports,
        aggregators,
        tx,
        ..
    } = master;
    let port = ports.get_mut(&handle).unwrap();
    let prev = port.mux_state;

    Debug::MuxFsmTransition(&handle, prev, next).log();
    port.mux_state = next;

    match next {
        mux::State::Detached => {
            port.actor.state.remove(
                PortState::SYNCHRONIZATION
                    | PortState::COLLECTING
                    | PortState::DISTRIBUTING,
            );
            port.ready_n = false;
            port.wait_while_ticks = 0;
            port.ntt = true;

            let _ = tx.southbound.send(southbound::Command::SetRx {
                port_handle: handle,
                enabled: false,
            });
            let _ = tx.southbound.send(southbound::Command::SetTx {
                port_handle: handle,
                enabled: false,
            });

            if let Some(sport) = port.sport_handle {
                let attached = aggregators
                    .get(&sport)
                    .is_some_and(|sport| sport.lports.contains(&handle));
                if attached {
                    let _ = aggregators.detach(sport, handle);
                }
                if port.selected == Selected::Unselected {
                    port.sport_handle = None;
                }
            }
        }
        mux::State::Waiting => {
            port.wait_while_ticks = AGGREGATE_WAIT_TICKS;
            port.ready_n = false;
        }
        mux::State::Attached => {
            // Returning from COLLECTING must stop the data path first.
            if prev == mux::State::Collecting
                || prev == mux::State::CollectingDistributing
            {
                let _ = tx.southbound.send(southbound::Command::SetRx {
                    port_handle: handle,
                    enabled: false,
                });
                let _ = tx.southbound.send(southbound::Command::SetTx {
                    port_handle: handle,
                    enabled: false,
                });
            } else {
                // Join the selected aggregate.
                let sport = port.sport_handle.unwrap();
                let params = match_params(port);
                if aggregators.attach(sport, handle, &params).is_err() {
                    // The aggregator vanished between selection and attach.
                    port.selected = Selected::Unselected;
                    port.mux_state = prev;
                    return;
                }
            }

            port.actor.state.insert(PortState::SYNCHRONIZATION);
            port.actor
                .state
                .remove(PortState::COLLECTING | PortState::DISTRIBUTING);
            port.ntt = true;
        }
        mux::State::Collecting => {
            // Returning from COLLECTING_DISTRIBUTING stops transmission.
            if prev == mux::State::CollectingDistributing {
                port.actor.state.remove(PortState::DISTRIBUTING);
                let _ = tx.southbound.send(southbound::Command::SetTx {
                    port_handle: handle,
                    enabled: false,
                });
            }

            port.actor.state.insert(PortState::COLLECTING);
            port.ntt = true;
            let _ = tx.southbound.send(southbound::Command::SetRx {
                port_handle: handle,
                enabled: true,
            });
        }
        mux::State::CollectingDistributing => {
            port.actor.state.insert(PortState::DISTRIBUTING);
            port.ntt = true;
            let _ = tx.southbound.send(southbound::Command::SetTx {
                port_handle: handle,
                enabled: true,
            });
        }
        mux::State::Begin => unreachable!(),
    }
}

// The aggregate-wait barrier: every other selected member of the aggregate
// must be ready before any port may attach. Members with LACP disabled
// don't hold the barrier up.
fn aggregator_ready(
    master: &Master,
    sport: PortHandle,
    skip: PortHandle,
) -> bool {
    master
        .ports
        .iter()
        .filter(|port| {
            port.sport_handle == Some(sport)
                && port.port_handle != skip
                && port.selected == Selected::Selected
        })
        .all(|port| {
            port.ready_n || port.rx_state == rx::State::LacpDisabled
        })
}

// ===== selection logic =====

pub(crate) fn try_select(master: &mut Master, handle: PortHandle) {
    let Some(port) = master.ports.get(&handle) else {
        return;
    };

    if port.selected != Selected::Unselected
        || !port.link_up
        || !port.lacp_enabled
        || port.mux_state != mux::State::Detached
    {
        return;
    }

    // A partner that never responded leaves the port out of any aggregate.
    if port.partner_oper.system.mac.is_unspecified() {
        return;
    }

    let params = match_params(port);
    match master.aggregators.select(&params) {
        None => {
            Error::NoAggregatorMatch(handle).log();
        }
        Some((sport, match_type)) => {
            Debug::SelectionMatch(&handle, &sport, match_type).log();

            // Preemption: the aggregate's current members yield to the
            // higher-priority port.
            if match_type == MatchType::Priority {
                for member in sport_members(master, sport, Some(handle)) {
                    let port = master.ports.get_mut(&member).unwrap();
                    port.selected = Selected::Unselected;
                    mux_reevaluate(master, member);
                }
            }

            let port = master.ports.get_mut(&handle).unwrap();
            port.selected = Selected::Selected;
            port.sport_handle = Some(sport);
            mux_reevaluate(master, handle);
        }
    }
}

// ===== helper functions =====

fn match_params(port: &Port) -> MatchParams {
    let aggr_type = |state: &PortState| {
        if state.contains(PortState::AGGREGATION) {
            Aggregation::Aggregatable
        } else {
            Aggregation::Individual
        }
    };

    MatchParams::new(
        port.port_type,
        port.actor.key,
        port.partner_oper.key,
        port.partner_oper.system,
        port.actor.port.priority,
        port.partner_oper.port.priority,
        aggr_type(&port.actor.state),
        aggr_type(&port.partner_oper.state),
    )
}

// Ports currently selected for the given aggregate, in ascending handle
// order.
fn sport_members(
    master: &Master,
    sport: PortHandle,
    skip: Option<PortHandle>,
) -> Vec<PortHandle> {
    master
        .ports
        .iter()
        .filter(|port| {
            port.sport_handle == Some(sport)
                && Some(port.port_handle) != skip
                && port.selected == Selected::Selected
        })
        .map(|port| port.port_handle)
        .collect()
}

fn lport_cfg_changed(
    port: &Port,
    msg: &LportSetMsg,
    engine_system: &SystemId,
) -> bool {
    let system = SystemId::new(
        msg.system_priority.unwrap_or(engine_system.priority),
        msg.system_mac.unwrap_or(engine_system.mac),
    );

    port.lacp_enabled != msg.lacp_enabled
        || port.actor.key != msg.key
        || port.actor.port.priority != msg.port_priority
        || port.actor.state.contains(PortState::LACP_ACTIVITY)
            != (msg.activity == Activity::Active)
        || port.actor.state.contains(PortState::LACP_TIMEOUT)
            != (msg.timeout == Timeout::Short)
        || port.actor.state.contains(PortState::AGGREGATION)
            != (msg.aggregation == Aggregation::Aggregatable)
        || port.actor.system != system
}

fn apply_lport_cfg(
    port: &mut Port,
    msg: &LportSetMsg,
    engine_system: &SystemId,
) {
    port.lacp_enabled = msg.lacp_enabled;
    port.actor.key = msg.key;
    port.actor.port.priority = msg.port_priority;
    port.actor.system = SystemId::new(
        msg.system_priority.unwrap_or(engine_system.priority),
        msg.system_mac.unwrap_or(engine_system.mac),
    );
    port.actor.state.set(
        PortState::LACP_ACTIVITY,
        msg.activity == Activity::Active,
    );
    port.actor
        .state
        .set(PortState::LACP_TIMEOUT, msg.timeout == Timeout::Short);
    port.actor.state.set(
        PortState::AGGREGATION,
        msg.aggregation == Aggregation::Aggregatable,
    );
}

// Reinitializes a port's protocol session from scratch.
fn restart_port(master: &mut Master, handle: PortHandle) {
    rx_fsm(master, handle, rx::Event::Begin);
    resume_port(master, handle);
}

// Brings a reinitialized port back up according to its current admin and
// link state.
fn resume_port(master: &mut Master, handle: PortHandle) {
    let port = master.ports.get_mut(&handle).unwrap();
    if port.link_up {
        if port.lacp_enabled {
            rx_fsm(master, handle, rx::Event::PortEnabled);
        } else {
            rx_fsm(master, handle, rx::Event::LacpDisabled);
        }
    }
    periodic_reevaluate(master, handle);
    mux_reevaluate(master, handle);
    try_select(master, handle);
}
