//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use lacpd_utils::Sender;
use lacpd_utils::task::IntervalTask;

use crate::consts::TICK_INTERVAL;

//
// LACP tasks diagram:
//
//                                +--------------+
//                                | configurator |
//                                +--------------+
//                                       |
//                                       | (1x) config events
//                                       V
//                                +--------------+
//            pdu_rx (Nx) ------> |              | ------> (1x) pdu_tx
//            tick (1x) --------> |    master    |
//            link events (Nx) -> |              | ------> (1x) southbound
//                                +--------------+
//

// LACP inter-task message types.
pub mod messages {
    use bytes::Bytes;
    use lacpd_utils::mac_addr::MacAddr;
    use lacpd_utils::pm::PortHandle;
    use serde::{Deserialize, Serialize};

    // Type aliases.
    pub type ProtocolInputMsg = input::ProtocolMsg;

    // Input messages (producers -> main task).
    pub mod input {
        use super::*;
        use crate::aggregator::ParamFlags;
        use crate::port::{Activity, Aggregation, Timeout};

        #[derive(Debug, Deserialize, Serialize)]
        pub enum ProtocolMsg {
            // Received PDU (Ethernet payload, slow-protocols subtype
            // onwards).
            RxPdu(RxPduMsg),
            // Protocol tick (100 ms).
            Tick,
            // Link state notifications.
            LinkUp(LinkUpMsg),
            LinkDown(LinkDownMsg),
            // Configuration events.
            LportSet(LportSetMsg),
            LportClear(LportClearMsg),
            SportCreate(SportCreateMsg),
            SportDelete(SportDeleteMsg),
            SportParams(SportParamsMsg),
            ActorSys(ActorSysMsg),
            // Terminal sentinel: drain the queue and stop the dispatcher.
            Shutdown,
        }

        #[derive(Debug, Deserialize, Serialize)]
        pub struct RxPduMsg {
            pub port_handle: PortHandle,
            pub data: Bytes,
        }

        #[derive(Debug, Deserialize, Serialize)]
        pub struct LinkUpMsg {
            pub port_handle: PortHandle,
            pub speed_mbps: u32,
        }

        #[derive(Debug, Deserialize, Serialize)]
        pub struct LinkDownMsg {
            pub port_handle: PortHandle,
        }

        #[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
        pub struct LportSetMsg {
            pub port_handle: PortHandle,
            pub lacp_enabled: bool,
            pub key: u16,
            pub port_priority: u16,
            pub activity: Activity,
            pub timeout: Timeout,
            pub aggregation: Aggregation,
            // Per-port actor system overrides; the engine defaults apply
            // when unset.
            pub system_priority: Option<u16>,
            pub system_mac: Option<MacAddr>,
        }

        #[derive(Debug, Deserialize, Serialize)]
        pub struct LportClearMsg {
            pub port_handle: PortHandle,
        }

        #[derive(Debug, Deserialize, Serialize)]
        pub struct SportCreateMsg {
            pub sport_handle: PortHandle,
            pub port_type: u8,
            pub actor_key: u16,
        }

        #[derive(Debug, Deserialize, Serialize)]
        pub struct SportDeleteMsg {
            pub sport_handle: PortHandle,
        }

        #[derive(Debug, Deserialize, Serialize)]
        pub struct SportParamsMsg {
            pub sport_handle: PortHandle,
            // Which of the fields below carry a value to apply.
            pub flags: ParamFlags,
            pub partner_system_priority: u16,
            pub partner_system_mac: MacAddr,
            pub partner_key: u16,
            pub aggr_type: Option<Aggregation>,
        }

        #[derive(Debug, Deserialize, Serialize)]
        pub struct ActorSysMsg {
            pub priority: u16,
            pub mac: MacAddr,
        }
    }

    // Output messages (main task -> sinks).
    pub mod output {
        use super::*;

        #[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
        pub struct PduTxMsg {
            pub port_handle: PortHandle,
            pub data: Bytes,
        }
    }
}

// ===== LACP tasks =====

// Protocol tick timer.
pub(crate) fn tick_interval(
    tick_txp: &Sender<messages::ProtocolInputMsg>,
) -> IntervalTask {
    #[cfg(not(feature = "testing"))]
    {
        let tick_txp = tick_txp.clone();
        IntervalTask::new(TICK_INTERVAL, false, move || {
            let tick_txp = tick_txp.clone();
            async move {
                let _ = tick_txp.send(messages::input::ProtocolMsg::Tick).await;
            }
        })
    }
    #[cfg(feature = "testing")]
    {
        IntervalTask {}
    }
}
