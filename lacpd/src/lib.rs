//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![cfg_attr(
    feature = "testing",
    allow(dead_code, unused_variables, unused_imports)
)]

pub mod aggregator;
pub mod consts;
pub mod debug;
pub mod error;
pub mod events;
pub mod fsm;
pub mod master;
pub mod packet;
pub mod port;
pub mod southbound;
pub mod tasks;
