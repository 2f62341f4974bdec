//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use lacpd_utils::pm::PortHandle;
use serde::{Deserialize, Serialize};

// Commands issued to the forwarding plane.
//
// The protocol engine never touches hardware itself: aggregate membership
// changes and per-direction enables are pushed through an injected command
// channel and applied by whatever owns the data path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Command {
    // Enable or disable reception on a member port.
    SetRx {
        port_handle: PortHandle,
        enabled: bool,
    },
    // Enable or disable transmission on a member port.
    SetTx {
        port_handle: PortHandle,
        enabled: bool,
    },
    // Aggregate lifecycle.
    LagCreate {
        sport_handle: PortHandle,
    },
    LagDestroy {
        sport_handle: PortHandle,
    },
}
