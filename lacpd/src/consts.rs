//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use lacpd_utils::mac_addr::MacAddr;

// Granularity of the protocol tick.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

// Protocol timer values, in ticks.
pub const FAST_PERIODIC_TICKS: u16 = 10;
pub const SLOW_PERIODIC_TICKS: u16 = 300;
pub const SHORT_TIMEOUT_TICKS: u16 = 30;
pub const LONG_TIMEOUT_TICKS: u16 = 900;
pub const AGGREGATE_WAIT_TICKS: u16 = 20;

// Upper bound of LACPDUs transmitted per fast-periodic window.
pub const MAX_TX_PER_FAST_PERIOD: u8 = 3;

// Default actor system priority.
pub const DFLT_SYSTEM_PRIORITY: u16 = 65534;

// Default actor port priority.
pub const DFLT_PORT_PRIORITY: u16 = 1;

// Partner system MAC placeholder meaning "partner never responded".
pub const DFLT_PARTNER_SYSTEM_MAC: MacAddr = MacAddr::UNSPECIFIED;
