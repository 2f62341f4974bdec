//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use bytes::Bytes;
use lacpd::error::Error;
use lacpd::fsm::{mux, rx};
use lacpd::master::{EngineConfig, Master, OutputChannelsTx};
use lacpd::packet::{
    LacpParams, Lacpdu, MarkerPdu, MarkerTlvType, PortId, PortState, SystemId,
};
use lacpd::port::{Activity, Aggregation, Selected, Timeout};
use lacpd::southbound::Command;
use lacpd::tasks::messages::input::{
    LinkDownMsg, LinkUpMsg, LportSetMsg, ProtocolMsg, RxPduMsg,
    SportCreateMsg, SportDeleteMsg,
};
use lacpd::tasks::messages::output::PduTxMsg;
use lacpd_utils::UnboundedReceiver;
use lacpd_utils::mac_addr::MacAddr;
use lacpd_utils::pm::PortHandle;
use tokio::sync::mpsc;

const PORT_TYPE_10G: u8 = 1;
const ACTOR_KEY: u16 = 5;

//
// Test harness.
//

struct Context {
    master: Master,
    southbound_rx: UnboundedReceiver<Command>,
    pdu_rx: UnboundedReceiver<PduTxMsg>,
}

impl Context {
    fn new() -> Context {
        let (southbound_tx, southbound_rx) = mpsc::unbounded_channel();
        let (pdu_tx, pdu_rx) = mpsc::unbounded_channel();
        let config = EngineConfig {
            system: SystemId::new(
                100,
                MacAddr::from([0x08, 0x00, 0x20, 0x01, 0x01, 0x01]),
            ),
        };
        Context {
            master: Master::new(
                config,
                OutputChannelsTx::new(southbound_tx, pdu_tx),
            ),
            southbound_rx,
            pdu_rx,
        }
    }

    fn process(&mut self, msg: ProtocolMsg) {
        let _ = self.master.process_msg(msg);
    }

    fn tick(&mut self, count: u16) {
        for _ in 0..count {
            self.process(ProtocolMsg::Tick);
        }
    }

    fn drain_southbound(&mut self) -> Vec<Command> {
        let mut commands = vec![];
        while let Ok(command) = self.southbound_rx.try_recv() {
            commands.push(command);
        }
        commands
    }

    fn drain_pdus(&mut self) -> Vec<PduTxMsg> {
        let mut pdus = vec![];
        while let Ok(pdu) = self.pdu_rx.try_recv() {
            pdus.push(pdu);
        }
        pdus
    }

    // Injects a peer LACPDU on the given port, echoing our current actor
    // information in the partner TLV.
    fn inject_peer_pdu(
        &mut self,
        handle: PortHandle,
        peer: SystemId,
        peer_key: u16,
        peer_port: u16,
        peer_state: PortState,
    ) {
        let our = self.master.get_lport_params(handle).unwrap();
        let pdu = Lacpdu::new(
            LacpParams::new(
                peer,
                peer_key,
                PortId::new(1, peer_port),
                peer_state,
            ),
            our.actor,
            0,
        );
        self.process(ProtocolMsg::RxPdu(RxPduMsg {
            port_handle: handle,
            data: pdu.encode(),
        }));
    }
}

fn lport(port: u8) -> PortHandle {
    PortHandle::from_smpt(1, 0, port, PORT_TYPE_10G)
}

fn sport() -> PortHandle {
    PortHandle::lag(1)
}

fn lport_set(handle: PortHandle, key: u16, port_priority: u16) -> ProtocolMsg {
    ProtocolMsg::LportSet(LportSetMsg {
        port_handle: handle,
        lacp_enabled: true,
        key,
        port_priority,
        activity: Activity::Active,
        timeout: Timeout::Short,
        aggregation: Aggregation::Aggregatable,
        system_priority: None,
        system_mac: None,
    })
}

fn sport_create(handle: PortHandle, actor_key: u16) -> ProtocolMsg {
    ProtocolMsg::SportCreate(SportCreateMsg {
        sport_handle: handle,
        port_type: PORT_TYPE_10G,
        actor_key,
    })
}

fn link_up(handle: PortHandle) -> ProtocolMsg {
    ProtocolMsg::LinkUp(LinkUpMsg {
        port_handle: handle,
        speed_mbps: 10_000,
    })
}

fn peer1() -> SystemId {
    SystemId::new(200, MacAddr::from([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]))
}

fn peer_sync() -> PortState {
    PortState::LACP_ACTIVITY
        | PortState::LACP_TIMEOUT
        | PortState::AGGREGATION
        | PortState::SYNCHRONIZATION
}

// Brings a two-port aggregate all the way to collecting/distributing on
// both members.
fn form_two_port_lag(ctx: &mut Context) {
    let (a, b) = (lport(1), lport(2));

    ctx.process(sport_create(sport(), ACTOR_KEY));
    ctx.process(lport_set(a, ACTOR_KEY, 1));
    ctx.process(lport_set(b, ACTOR_KEY, 1));
    ctx.process(link_up(a));
    ctx.process(link_up(b));

    ctx.inject_peer_pdu(a, peer1(), ACTOR_KEY, 0x11, peer_sync());
    ctx.inject_peer_pdu(b, peer1(), ACTOR_KEY, 0x12, peer_sync());

    // Both ports must sit out the aggregate-wait delay.
    ctx.tick(20);

    ctx.inject_peer_pdu(
        a,
        peer1(),
        ACTOR_KEY,
        0x11,
        peer_sync() | PortState::COLLECTING,
    );
    ctx.inject_peer_pdu(
        b,
        peer1(),
        ACTOR_KEY,
        0x12,
        peer_sync() | PortState::COLLECTING,
    );
}

//
// Tests.
//

#[test]
fn test_two_port_lag_forms() {
    let mut ctx = Context::new();
    let (a, b) = (lport(1), lport(2));

    form_two_port_lag(&mut ctx);

    for handle in [a, b] {
        let protocol = ctx.master.get_lport_protocol(handle).unwrap();
        assert_eq!(protocol.rx_state, rx::State::Current);
        assert_eq!(protocol.mux_state, mux::State::CollectingDistributing);
        assert_eq!(protocol.selected, Selected::Selected);
        assert_eq!(protocol.sport_handle, Some(sport()));

        // Collecting/distributing implies all three actor bits.
        let params = ctx.master.get_lport_params(handle).unwrap();
        assert!(params.actor.state.contains(
            PortState::SYNCHRONIZATION
                | PortState::COLLECTING
                | PortState::DISTRIBUTING
        ));
    }

    // Both members ended up on the same aggregate, with the peer's
    // parameters learned.
    let sports = ctx.master.list_sports();
    assert_eq!(sports.len(), 1);
    assert_eq!(sports[0].num_lports, 2);
    assert_eq!(sports[0].partner_system, peer1());
    assert_eq!(sports[0].partner_key, ACTOR_KEY);
    assert_eq!(sports[0].lport_handles, vec![a, b]);

    // The data path was opened in both directions for both members.
    let commands = ctx.drain_southbound();
    for handle in [a, b] {
        assert!(commands.contains(&Command::SetRx {
            port_handle: handle,
            enabled: true
        }));
        assert!(commands.contains(&Command::SetTx {
            port_handle: handle,
            enabled: true
        }));
    }
}

#[test]
fn test_partner_never_responds() {
    let mut ctx = Context::new();
    let (a, b) = (lport(1), lport(2));

    ctx.process(sport_create(sport(), ACTOR_KEY));
    ctx.process(lport_set(a, ACTOR_KEY, 1));
    ctx.process(lport_set(b, ACTOR_KEY, 1));
    ctx.process(link_up(a));
    ctx.process(link_up(b));

    // Expiry runs its course without a single peer PDU.
    ctx.tick(31);

    for handle in [a, b] {
        let protocol = ctx.master.get_lport_protocol(handle).unwrap();
        assert_eq!(protocol.rx_state, rx::State::Defaulted);
        assert_eq!(protocol.mux_state, mux::State::Detached);
        // The placeholder partner MAC keeps the port out of any aggregate.
        assert_eq!(protocol.selected, Selected::Unselected);
        assert_eq!(protocol.sport_handle, None);
    }

    let sports = ctx.master.list_sports();
    assert_eq!(sports[0].num_lports, 0);
    assert!(sports[0].partner_system.mac.is_unspecified());
}

#[test]
fn test_priority_preemption() {
    let mut ctx = Context::new();
    let (a, b) = (lport(1), lport(2));
    let peer2 =
        SystemId::new(100, MacAddr::from([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]));

    ctx.process(sport_create(sport(), ACTOR_KEY));

    // Port A (priority 100, partner key 7) grabs the only aggregate.
    ctx.process(lport_set(a, ACTOR_KEY, 100));
    ctx.process(link_up(a));
    ctx.inject_peer_pdu(a, peer1(), 7, 0x11, peer_sync());
    ctx.tick(21);
    assert_eq!(
        ctx.master.get_lport_protocol(a).unwrap().mux_state,
        mux::State::Collecting
    );

    // Port B arrives with a higher-priority number and a different peer.
    ctx.process(lport_set(b, ACTOR_KEY, 50));
    ctx.process(link_up(b));
    ctx.inject_peer_pdu(b, peer2, 9, 0x12, peer_sync());

    // A is evicted right away, B still sits out the aggregate wait.
    let protocol = ctx.master.get_lport_protocol(a).unwrap();
    assert_eq!(protocol.selected, Selected::Unselected);
    assert_eq!(protocol.mux_state, mux::State::Detached);
    assert_eq!(protocol.sport_handle, None);

    ctx.tick(20);
    ctx.inject_peer_pdu(
        b,
        peer2,
        9,
        0x12,
        peer_sync() | PortState::COLLECTING,
    );

    let protocol = ctx.master.get_lport_protocol(b).unwrap();
    assert_eq!(protocol.mux_state, mux::State::CollectingDistributing);

    let sports = ctx.master.list_sports();
    assert_eq!(sports[0].num_lports, 1);
    assert_eq!(sports[0].partner_system, peer2);
    assert_eq!(sports[0].partner_key, 9);
    assert_eq!(sports[0].lport_handles, vec![b]);
}

#[test]
fn test_link_flap() {
    let mut ctx = Context::new();
    let (a, b) = (lport(1), lport(2));

    form_two_port_lag(&mut ctx);
    ctx.drain_southbound();

    ctx.process(ProtocolMsg::LinkDown(LinkDownMsg { port_handle: a }));

    let protocol = ctx.master.get_lport_protocol(a).unwrap();
    assert_eq!(protocol.mux_state, mux::State::Detached);
    assert_eq!(protocol.rx_state, rx::State::PortDisabled);
    assert_eq!(protocol.selected, Selected::Unselected);

    let params = ctx.master.get_lport_params(a).unwrap();
    assert!(!params.actor.state.intersects(
        PortState::SYNCHRONIZATION
            | PortState::COLLECTING
            | PortState::DISTRIBUTING
    ));

    // The data path was closed and the membership dropped.
    let commands = ctx.drain_southbound();
    assert!(commands.contains(&Command::SetRx {
        port_handle: a,
        enabled: false
    }));
    assert!(commands.contains(&Command::SetTx {
        port_handle: a,
        enabled: false
    }));

    let sports = ctx.master.list_sports();
    assert_eq!(sports[0].num_lports, 1);
    assert_eq!(sports[0].lport_handles, vec![b]);
}

#[test]
fn test_marker_echo() {
    let mut ctx = Context::new();
    let a = lport(1);

    ctx.process(sport_create(sport(), ACTOR_KEY));
    ctx.process(lport_set(a, ACTOR_KEY, 1));
    ctx.process(link_up(a));

    let rx_state_before =
        ctx.master.get_lport_protocol(a).unwrap().rx_state;
    ctx.drain_pdus();

    let marker = MarkerPdu::new(
        MarkerTlvType::Information,
        0x2a,
        MacAddr::from([0x02, 0x01, 0x02, 0x03, 0x04, 0x05]),
        7,
    );
    ctx.process(ProtocolMsg::RxPdu(RxPduMsg {
        port_handle: a,
        data: marker.encode(),
    }));

    // A marker response goes out, the state machines don't move.
    let responses: Vec<_> = ctx
        .drain_pdus()
        .into_iter()
        .filter(|pdu| pdu.data[0] == 0x02)
        .collect();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].port_handle, a);
    assert_eq!(responses[0].data[2], 0x02);

    let protocol = ctx.master.get_lport_protocol(a).unwrap();
    assert_eq!(protocol.rx_state, rx_state_before);

    let stats = ctx.master.get_lport_stats(a).unwrap();
    assert_eq!(stats.marker_pdus_received, 1);
    assert_eq!(stats.marker_response_pdus_sent, 1);
    assert_eq!(stats.lacpdus_received, 0);
}

#[test]
fn test_malformed_pdu() {
    let mut ctx = Context::new();
    let a = lport(1);

    ctx.process(sport_create(sport(), ACTOR_KEY));
    ctx.process(lport_set(a, ACTOR_KEY, 1));
    ctx.process(link_up(a));

    let mut data = vec![0u8; 128];
    data[0] = 0x07;
    let result = ctx.master.process_msg(ProtocolMsg::RxPdu(RxPduMsg {
        port_handle: a,
        data: Bytes::from(data),
    }));
    assert!(matches!(result, Err(Error::PduDecodeError(..))));

    // Counted and dropped, with no protocol state change.
    let stats = ctx.master.get_lport_stats(a).unwrap();
    assert_eq!(stats.lacpdus_rx_errors, 1);
    assert_eq!(stats.lacpdus_received, 0);
    assert_eq!(
        ctx.master.get_lport_protocol(a).unwrap().rx_state,
        rx::State::Expired
    );
}

#[test]
fn test_sport_delete() {
    let mut ctx = Context::new();
    let (a, b) = (lport(1), lport(2));

    form_two_port_lag(&mut ctx);

    // Deleting an aggregate with attached members is refused.
    let result = ctx
        .master
        .process_msg(ProtocolMsg::SportDelete(SportDeleteMsg {
            sport_handle: sport(),
        }));
    assert!(matches!(result, Err(Error::SportBusy(..))));
    assert_eq!(ctx.master.list_sports().len(), 1);

    // Once the members are gone the learned parameters are cleared and
    // the aggregate can be removed.
    ctx.process(ProtocolMsg::LinkDown(LinkDownMsg { port_handle: a }));
    ctx.process(ProtocolMsg::LinkDown(LinkDownMsg { port_handle: b }));
    ctx.drain_southbound();

    let result = ctx
        .master
        .process_msg(ProtocolMsg::SportDelete(SportDeleteMsg {
            sport_handle: sport(),
        }));
    assert!(result.is_ok());
    assert!(ctx.master.list_sports().is_empty());
    assert!(ctx.drain_southbound().contains(&Command::LagDestroy {
        sport_handle: sport()
    }));
}

#[test]
fn test_duplicate_sport() {
    let mut ctx = Context::new();

    ctx.process(sport_create(sport(), ACTOR_KEY));
    let result = ctx.master.process_msg(sport_create(sport(), ACTOR_KEY));
    assert!(matches!(result, Err(Error::DuplicateSport(..))));
}

#[test]
fn test_idempotent_lport_set() {
    let mut ctx = Context::new();
    let a = lport(1);

    ctx.process(sport_create(sport(), ACTOR_KEY));
    ctx.process(lport_set(a, ACTOR_KEY, 1));
    ctx.process(link_up(a));
    ctx.inject_peer_pdu(a, peer1(), ACTOR_KEY, 0x11, peer_sync());

    let before = ctx.master.get_lport_protocol(a).unwrap();
    assert_eq!(before.rx_state, rx::State::Current);
    assert_eq!(before.selected, Selected::Selected);

    // An identical configuration event must not restart the session.
    ctx.process(lport_set(a, ACTOR_KEY, 1));
    let after = ctx.master.get_lport_protocol(a).unwrap();
    assert_eq!(after.rx_state, rx::State::Current);
    assert_eq!(after.selected, Selected::Selected);

    // A real change does.
    ctx.process(lport_set(a, ACTOR_KEY + 1, 1));
    let after = ctx.master.get_lport_protocol(a).unwrap();
    assert_eq!(after.rx_state, rx::State::Expired);
    assert_eq!(after.selected, Selected::Unselected);
}

#[test]
fn test_ntt_on_stale_partner_view() {
    let mut ctx = Context::new();
    let a = lport(1);

    ctx.process(sport_create(sport(), ACTOR_KEY));
    ctx.process(lport_set(a, ACTOR_KEY, 1));
    ctx.process(link_up(a));
    ctx.drain_pdus();

    // The peer has no idea who we are: its partner TLV is all defaults.
    let pdu = Lacpdu::new(
        LacpParams::new(peer1(), ACTOR_KEY, PortId::new(1, 0x11), peer_sync()),
        LacpParams::default(),
        0,
    );
    ctx.process(ProtocolMsg::RxPdu(RxPduMsg {
        port_handle: a,
        data: pdu.encode(),
    }));

    // A corrective LACPDU goes out straight away.
    let pdus = ctx.drain_pdus();
    assert!(pdus.iter().any(|pdu| pdu.data[0] == 0x01));
    assert_eq!(ctx.master.get_lport_stats(a).unwrap().lacpdus_sent, 1);
}

#[test]
fn test_tx_rate_limit() {
    let mut ctx = Context::new();
    let a = lport(1);

    ctx.process(sport_create(sport(), ACTOR_KEY));
    ctx.process(lport_set(a, ACTOR_KEY, 1));
    ctx.process(link_up(a));

    // Every PDU with a stale partner view raises NTT, but no more than
    // three frames leave within one fast-periodic window.
    for _ in 0..5 {
        let pdu = Lacpdu::new(
            LacpParams::new(
                peer1(),
                ACTOR_KEY,
                PortId::new(1, 0x11),
                peer_sync(),
            ),
            LacpParams::default(),
            0,
        );
        ctx.process(ProtocolMsg::RxPdu(RxPduMsg {
            port_handle: a,
            data: pdu.encode(),
        }));
    }
    assert_eq!(ctx.master.get_lport_stats(a).unwrap().lacpdus_sent, 3);

    let protocol = ctx.master.get_lport_protocol(a).unwrap();
    assert!(protocol.ntt);

    // The pending NTT is served once the window rolls over.
    ctx.tick(10);
    assert!(ctx.master.get_lport_stats(a).unwrap().lacpdus_sent > 3);
    assert!(!ctx.master.get_lport_protocol(a).unwrap().ntt);
}

#[test]
fn test_slow_periodic_on_long_timeout_partner() {
    use lacpd::fsm::periodic;

    let mut ctx = Context::new();
    let a = lport(1);

    ctx.process(sport_create(sport(), ACTOR_KEY));
    ctx.process(lport_set(a, ACTOR_KEY, 1));
    ctx.process(link_up(a));

    // While expired the partner is assumed to be a short-timeout one.
    assert_eq!(
        ctx.master.get_lport_protocol(a).unwrap().periodic_state,
        periodic::State::FastPeriodic
    );

    // A partner advertising the long timeout slows us down.
    let peer_state = PortState::LACP_ACTIVITY
        | PortState::AGGREGATION
        | PortState::SYNCHRONIZATION;
    ctx.inject_peer_pdu(a, peer1(), ACTOR_KEY, 0x11, peer_state);

    let protocol = ctx.master.get_lport_protocol(a).unwrap();
    assert_eq!(protocol.periodic_state, periodic::State::SlowPeriodic);
    assert_eq!(protocol.periodic_tx_ticks, 300);
}

#[test]
fn test_actor_sys_change_restarts_sessions() {
    use lacpd::tasks::messages::input::ActorSysMsg;

    let mut ctx = Context::new();
    let a = lport(1);

    ctx.process(sport_create(sport(), ACTOR_KEY));
    ctx.process(lport_set(a, ACTOR_KEY, 1));
    ctx.process(link_up(a));
    ctx.inject_peer_pdu(a, peer1(), ACTOR_KEY, 0x11, peer_sync());
    assert_eq!(
        ctx.master.get_lport_protocol(a).unwrap().rx_state,
        rx::State::Current
    );

    let new_mac = MacAddr::from([0x08, 0x00, 0x20, 0x02, 0x02, 0x02]);
    ctx.process(ProtocolMsg::ActorSys(ActorSysMsg {
        priority: 10,
        mac: new_mac,
    }));

    // The receive session starts over and the new identity is in place.
    let protocol = ctx.master.get_lport_protocol(a).unwrap();
    assert_eq!(protocol.rx_state, rx::State::Expired);
    assert_eq!(protocol.selected, Selected::Unselected);

    let params = ctx.master.get_lport_params(a).unwrap();
    assert_eq!(params.actor.system, SystemId::new(10, new_mac));
}

#[test]
fn test_lport_clear_detaches() {
    use lacpd::tasks::messages::input::LportClearMsg;

    let mut ctx = Context::new();
    let (a, b) = (lport(1), lport(2));

    form_two_port_lag(&mut ctx);

    ctx.process(ProtocolMsg::LportClear(LportClearMsg { port_handle: a }));

    assert!(ctx.master.get_lport_params(a).is_err());
    let sports = ctx.master.list_sports();
    assert_eq!(sports[0].num_lports, 1);
    assert_eq!(sports[0].lport_handles, vec![b]);
}

#[test]
fn test_sport_admin_params() {
    use lacpd::aggregator::ParamFlags;
    use lacpd::tasks::messages::input::SportParamsMsg;

    let mut ctx = Context::new();
    let a = lport(1);

    ctx.process(sport_create(sport(), ACTOR_KEY));

    // Pre-provision the partner parameters the aggregate is meant for.
    let msg = SportParamsMsg {
        sport_handle: sport(),
        flags: ParamFlags::PARTNER_SYS_PRI
            | ParamFlags::PARTNER_SYS_ID
            | ParamFlags::PARTNER_KEY,
        partner_system_priority: peer1().priority,
        partner_system_mac: peer1().mac,
        partner_key: ACTOR_KEY,
        aggr_type: None,
    };
    assert!(ctx.master.process_msg(ProtocolMsg::SportParams(msg)).is_ok());

    // A port learning exactly those parameters matches on the first pass.
    ctx.process(lport_set(a, ACTOR_KEY, 1));
    ctx.process(link_up(a));
    ctx.inject_peer_pdu(a, peer1(), ACTOR_KEY, 0x11, peer_sync());
    assert_eq!(
        ctx.master.get_lport_protocol(a).unwrap().selected,
        Selected::Selected
    );

    // Once a member is attached the parameters are locked.
    ctx.tick(20);
    let msg = SportParamsMsg {
        sport_handle: sport(),
        flags: ParamFlags::PARTNER_KEY,
        partner_system_priority: 0,
        partner_system_mac: MacAddr::UNSPECIFIED,
        partner_key: 99,
        aggr_type: None,
    };
    let result = ctx.master.process_msg(ProtocolMsg::SportParams(msg));
    assert!(matches!(result, Err(Error::SportBusy(..))));
}

#[test]
fn test_sport_partial_params_match() {
    use lacpd::aggregator::ParamFlags;
    use lacpd::tasks::messages::input::SportParamsMsg;

    let mut ctx = Context::new();
    let a = lport(1);

    // Only the partner key is pre-provisioned; the unset system fields
    // must not get in the way of selection.
    ctx.process(sport_create(sport(), ACTOR_KEY));
    ctx.process(ProtocolMsg::SportParams(SportParamsMsg {
        sport_handle: sport(),
        flags: ParamFlags::PARTNER_KEY,
        partner_system_priority: 0,
        partner_system_mac: MacAddr::UNSPECIFIED,
        partner_key: ACTOR_KEY,
        aggr_type: None,
    }));

    ctx.process(lport_set(a, ACTOR_KEY, 1));
    ctx.process(link_up(a));
    ctx.inject_peer_pdu(a, peer1(), ACTOR_KEY, 0x11, peer_sync());

    let protocol = ctx.master.get_lport_protocol(a).unwrap();
    assert_eq!(protocol.selected, Selected::Selected);
    assert_eq!(protocol.sport_handle, Some(sport()));

    // The remaining partner parameters were adopted from the port.
    let sports = ctx.master.list_sports();
    assert_eq!(sports[0].partner_system, peer1());
    assert_eq!(sports[0].partner_key, ACTOR_KEY);
}

#[test]
fn test_sport_params_unset() {
    use lacpd::aggregator::ParamFlags;
    use lacpd::tasks::messages::input::SportParamsMsg;

    let mut ctx = Context::new();

    ctx.process(sport_create(sport(), ACTOR_KEY));
    ctx.process(ProtocolMsg::SportParams(SportParamsMsg {
        sport_handle: sport(),
        flags: ParamFlags::PARTNER_KEY | ParamFlags::PARTNER_SYS_ID,
        partner_system_priority: 0,
        partner_system_mac: peer1().mac,
        partner_key: ACTOR_KEY,
        aggr_type: None,
    }));

    // Provisioned partner parameters block deletion until unset.
    let result = ctx
        .master
        .process_msg(ProtocolMsg::SportDelete(SportDeleteMsg {
            sport_handle: sport(),
        }));
    assert!(matches!(result, Err(Error::SportBusy(..))));

    ctx.process(ProtocolMsg::SportParams(SportParamsMsg {
        sport_handle: sport(),
        flags: ParamFlags::empty(),
        partner_system_priority: 0,
        partner_system_mac: MacAddr::UNSPECIFIED,
        partner_key: 0,
        aggr_type: None,
    }));
    let result = ctx
        .master
        .process_msg(ProtocolMsg::SportDelete(SportDeleteMsg {
            sport_handle: sport(),
        }));
    assert!(result.is_ok());
    assert!(ctx.master.list_sports().is_empty());
}

#[test]
fn test_unknown_handles() {
    use lacpd::tasks::messages::input::SportParamsMsg;
    use lacpd::aggregator::ParamFlags;

    let mut ctx = Context::new();
    let a = lport(1);

    let result = ctx.master.process_msg(link_up(a));
    assert!(matches!(result, Err(Error::LportNotFound(..))));

    let result = ctx.master.process_msg(ProtocolMsg::RxPdu(RxPduMsg {
        port_handle: a,
        data: Bytes::from_static(&[0u8; 128]),
    }));
    assert!(matches!(result, Err(Error::LportNotFound(..))));

    let result =
        ctx.master
            .process_msg(ProtocolMsg::SportParams(SportParamsMsg {
                sport_handle: sport(),
                flags: ParamFlags::empty(),
                partner_system_priority: 0,
                partner_system_mac: MacAddr::UNSPECIFIED,
                partner_key: 0,
                aggr_type: None,
            }));
    assert!(matches!(result, Err(Error::SportNotFound(..))));
}

#[test]
fn test_individual_partner_not_aggregated() {
    let mut ctx = Context::new();
    let a = lport(1);

    ctx.process(sport_create(sport(), ACTOR_KEY));
    ctx.process(lport_set(a, ACTOR_KEY, 1));
    ctx.process(link_up(a));

    // The peer refuses aggregation: no LAG membership for this link.
    let peer_state = PortState::LACP_ACTIVITY
        | PortState::LACP_TIMEOUT
        | PortState::SYNCHRONIZATION;
    ctx.inject_peer_pdu(a, peer1(), ACTOR_KEY, 0x11, peer_state);

    let protocol = ctx.master.get_lport_protocol(a).unwrap();
    assert_eq!(protocol.rx_state, rx::State::Current);
    assert_eq!(protocol.selected, Selected::Unselected);
    assert_eq!(protocol.mux_state, mux::State::Detached);
}

#[test]
fn test_marker_response_not_echoed() {
    let mut ctx = Context::new();
    let a = lport(1);

    ctx.process(sport_create(sport(), ACTOR_KEY));
    ctx.process(lport_set(a, ACTOR_KEY, 1));
    ctx.process(link_up(a));
    ctx.drain_pdus();

    // A marker *response* PDU is counted but never answered.
    let marker = MarkerPdu::new(
        MarkerTlvType::Response,
        0x2a,
        MacAddr::from([0x02, 0x01, 0x02, 0x03, 0x04, 0x05]),
        7,
    );
    ctx.process(ProtocolMsg::RxPdu(RxPduMsg {
        port_handle: a,
        data: marker.encode(),
    }));

    assert!(ctx.drain_pdus().iter().all(|pdu| pdu.data[0] != 0x02));
    let stats = ctx.master.get_lport_stats(a).unwrap();
    assert_eq!(stats.marker_pdus_received, 1);
    assert_eq!(stats.marker_response_pdus_sent, 0);
}

#[test]
fn test_defaulted_expiry_deadline() {
    let mut ctx = Context::new();
    let a = lport(1);

    ctx.process(lport_set(a, ACTOR_KEY, 1));
    ctx.process(link_up(a));

    // Straight after link-up the port sits in Expired with the short
    // timeout armed.
    assert_eq!(
        ctx.master.get_lport_protocol(a).unwrap().rx_state,
        rx::State::Expired
    );
    ctx.tick(29);
    assert_eq!(
        ctx.master.get_lport_protocol(a).unwrap().rx_state,
        rx::State::Expired
    );
    ctx.tick(1);
    assert_eq!(
        ctx.master.get_lport_protocol(a).unwrap().rx_state,
        rx::State::Defaulted
    );
}
