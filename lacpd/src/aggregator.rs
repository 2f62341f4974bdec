//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use bitflags::bitflags;
use derive_new::new;
use lacpd_utils::avl::AvlTree;
use lacpd_utils::pm::PortHandle;
use serde::{Deserialize, Serialize};

use crate::debug::Debug;
use crate::error::Error;
use crate::packet::SystemId;
use crate::port::Aggregation;

// Which of the learned parameters have been populated.
bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct ParamFlags: u8 {
        const PARTNER_SYS_PRI = 1 << 0;
        const PARTNER_SYS_ID = 1 << 1;
        const PARTNER_KEY = 1 << 2;
        const ACTOR_PORT_PRIORITY = 1 << 3;
        const PARTNER_PORT_PRIORITY = 1 << 4;
    }
}

// Selection passes, attempted in declaration order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum MatchType {
    // All parameters equal, learned partner present and valid.
    Exact,
    // An aggregator whose populated parameters all match, unpopulated
    // fields compare as wildcards; adopts the incoming partner
    // information.
    Partial,
    // A busier aggregator yielding to a higher-priority port; adopts the
    // incoming partner information and evicts the current members.
    Priority,
}

// One pre-provisioned aggregator (super port).
#[derive(Clone, Debug)]
pub struct Aggregator {
    pub sport_handle: PortHandle,
    // Link speed class members must share.
    pub port_type: u8,
    pub actor_key: u16,
    pub aggr_type: Aggregation,
    pub admin_up: bool,
    // Learned partner parameters, valid per `flags`.
    pub partner_system: SystemId,
    pub partner_key: u16,
    // Highest (numerically smallest) port priorities seen among members.
    pub actor_max_port_priority: u16,
    pub partner_max_port_priority: u16,
    pub flags: ParamFlags,
    // Currently attached members.
    pub lports: BTreeSet<PortHandle>,
}

// Parameters a port submits to the selection logic.
#[derive(Clone, Copy, Debug, new)]
pub struct MatchParams {
    pub port_type: u8,
    pub actor_key: u16,
    pub partner_key: u16,
    pub partner_system: SystemId,
    pub actor_port_priority: u16,
    pub partner_port_priority: u16,
    pub actor_aggr_type: Aggregation,
    pub partner_aggr_type: Aggregation,
}

// All provisioned aggregators, indexed by super port handle.
#[derive(Debug, Default)]
pub struct Aggregators(AvlTree<PortHandle, Aggregator>);

// ===== impl Aggregator =====

impl Aggregator {
    fn new(
        sport_handle: PortHandle,
        port_type: u8,
        actor_key: u16,
    ) -> Aggregator {
        Aggregator {
            sport_handle,
            port_type,
            actor_key,
            aggr_type: Aggregation::Aggregatable,
            admin_up: true,
            partner_system: SystemId::default(),
            partner_key: 0,
            actor_max_port_priority: 0,
            partner_max_port_priority: 0,
            flags: ParamFlags::empty(),
            lports: BTreeSet::new(),
        }
    }

    pub fn num_lports(&self) -> u32 {
        self.lports.len() as u32
    }

    // Resets the learned partner parameters so the aggregator can be reused
    // by a subsequent selection.
    pub(crate) fn clear_learned(&mut self) {
        self.partner_system = SystemId::default();
        self.partner_key = 0;
        self.actor_max_port_priority = 0;
        self.partner_max_port_priority = 0;
        self.flags = ParamFlags::empty();
    }

    // Adopts the partner parameters carried by a successful non-exact
    // selection.
    fn adopt(&mut self, params: &MatchParams, match_type: MatchType) {
        self.partner_system = params.partner_system;
        self.partner_key = params.partner_key;
        self.actor_max_port_priority = params.actor_port_priority;

        // On a partial match the partner maximum is taken as-is; on a
        // priority match it only moves towards higher priority.
        if match_type == MatchType::Partial
            || self.partner_max_port_priority > params.partner_port_priority
        {
            self.partner_max_port_priority = params.partner_port_priority;
        }

        self.flags.insert(
            ParamFlags::PARTNER_SYS_PRI
                | ParamFlags::PARTNER_SYS_ID
                | ParamFlags::PARTNER_KEY
                | ParamFlags::ACTOR_PORT_PRIORITY
                | ParamFlags::PARTNER_PORT_PRIORITY,
        );
    }

    // Matches this aggregator's parameters against the ones submitted by a
    // port. Fields that haven't been populated yet are skipped, except on
    // the exact pass where everything must line up.
    //
    // An aggregator whose learned partner is still the never-responded
    // placeholder never matches: a port without a live partner gets no
    // aggregator to share.
    fn matches(&self, params: &MatchParams, match_type: MatchType) -> bool {
        if !self.admin_up {
            return false;
        }

        // An individual link never joins an aggregatable group, even though
        // 802.3ad would permit it. A LAG of one behaves like a plain port.
        if self.aggr_type == Aggregation::Aggregatable
            && (params.actor_aggr_type == Aggregation::Individual
                || params.partner_aggr_type == Aggregation::Individual)
        {
            return false;
        }

        if self.port_type != params.port_type {
            return false;
        }
        if self.actor_key != params.actor_key {
            return false;
        }

        // Partner key, when present. The priority pass may cross a key
        // mismatch if the incoming port carries strictly higher priority.
        if self.flags.contains(ParamFlags::PARTNER_KEY)
            || match_type == MatchType::Exact
        {
            if self.partner_key != params.partner_key {
                let preempt = match_type == MatchType::Priority
                    && self.flags.contains(ParamFlags::ACTOR_PORT_PRIORITY)
                    && (self.actor_max_port_priority
                        > params.actor_port_priority
                        || (self
                            .flags
                            .contains(ParamFlags::PARTNER_PORT_PRIORITY)
                            && self.actor_max_port_priority
                                == params.actor_port_priority
                            && self.partner_max_port_priority
                                > params.partner_port_priority));
                if !preempt {
                    return false;
                }
            }
        }

        // Partner system priority, when present. The priority pass may also
        // cross a mismatch when the incoming partner system priority is
        // strictly higher.
        let mut sys_priority_match = false;
        if self.flags.contains(ParamFlags::PARTNER_SYS_PRI)
            || match_type == MatchType::Exact
        {
            if self.partner_system.priority != params.partner_system.priority {
                if match_type == MatchType::Priority
                    && params.partner_system.priority != 0
                    && self.partner_system.priority
                        > params.partner_system.priority
                {
                    sys_priority_match = true;
                } else {
                    return false;
                }
            }
        }

        // Partner system id, when present. A placeholder id (partner never
        // responded) disqualifies the aggregator outright.
        if self.flags.contains(ParamFlags::PARTNER_SYS_ID)
            || match_type == MatchType::Exact
        {
            if (self.partner_system.mac != params.partner_system.mac
                || self.partner_system.mac.is_unspecified())
                && !sys_priority_match
            {
                return false;
            }
        }

        true
    }
}

// ===== impl Aggregators =====

impl Aggregators {
    // Provisions a new aggregator.
    pub(crate) fn create(
        &mut self,
        sport_handle: PortHandle,
        port_type: u8,
        actor_key: u16,
    ) -> Result<(), Error> {
        let sport = Aggregator::new(sport_handle, port_type, actor_key);
        match self.0.insert_or_find(sport_handle, sport) {
            None => {
                Debug::SportCreate(&sport_handle).log();
                Ok(())
            }
            Some(_) => Err(Error::DuplicateSport(sport_handle)),
        }
    }

    // Removes an aggregator. Fails while members are attached or learned
    // partner parameters are still present.
    pub(crate) fn destroy(
        &mut self,
        sport_handle: PortHandle,
    ) -> Result<Aggregator, Error> {
        let sport = self
            .0
            .get(&sport_handle)
            .ok_or(Error::SportNotFound(sport_handle))?;
        if !sport.lports.is_empty() || !sport.flags.is_empty() {
            return Err(Error::SportBusy(sport_handle));
        }

        Debug::SportDelete(&sport_handle).log();
        Ok(self.0.remove(&sport_handle).unwrap())
    }

    pub fn get(&self, sport_handle: &PortHandle) -> Option<&Aggregator> {
        self.0.get(sport_handle)
    }

    pub fn get_mut(
        &mut self,
        sport_handle: &PortHandle,
    ) -> Option<&mut Aggregator> {
        self.0.get_mut(sport_handle)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // Aggregators in ascending handle order.
    pub fn iter(&self) -> impl Iterator<Item = &'_ Aggregator> + '_ {
        self.0.iter().map(|(_, sport)| sport)
    }

    // Attempts to map the submitted parameters to an aggregator, trying an
    // exact match first, then an idle aggregator, then priority-based
    // preemption.
    //
    // On success the matched aggregator has adopted the submitted partner
    // parameters and the match type tells the caller whether currently
    // attached members must be evicted.
    pub(crate) fn select(
        &mut self,
        params: &MatchParams,
    ) -> Option<(PortHandle, MatchType)> {
        for match_type in
            [MatchType::Exact, MatchType::Partial, MatchType::Priority]
        {
            let found = self
                .0
                .iter()
                .find(|(_, sport)| sport.matches(params, match_type))
                .map(|(handle, _)| handle);

            if let Some(sport_handle) = found {
                let sport = self.0.get_mut(&sport_handle).unwrap();
                match match_type {
                    MatchType::Partial | MatchType::Priority => {
                        sport.adopt(params, match_type);
                    }
                    MatchType::Exact => {
                        // Track the highest priorities seen among matching
                        // members.
                        if sport
                            .flags
                            .contains(ParamFlags::ACTOR_PORT_PRIORITY)
                            && sport.actor_max_port_priority
                                > params.actor_port_priority
                        {
                            sport.actor_max_port_priority =
                                params.actor_port_priority;
                        }
                        if sport
                            .flags
                            .contains(ParamFlags::PARTNER_PORT_PRIORITY)
                            && sport.partner_max_port_priority
                                > params.partner_port_priority
                        {
                            sport.partner_max_port_priority =
                                params.partner_port_priority;
                        }
                    }
                }
                return Some((sport_handle, match_type));
            }
        }

        None
    }

    // Attaches a logical port to an aggregator, recording the partner
    // parameters on the first attach.
    pub(crate) fn attach(
        &mut self,
        sport_handle: PortHandle,
        lport_handle: PortHandle,
        params: &MatchParams,
    ) -> Result<(), Error> {
        let sport = self
            .0
            .get_mut(&sport_handle)
            .ok_or(Error::SportNotFound(sport_handle))?;

        if sport.flags.is_empty() {
            sport.adopt(params, MatchType::Partial);
        }
        sport.lports.insert(lport_handle);

        Debug::LportAttach(&sport_handle, &lport_handle, sport.num_lports())
            .log();
        Ok(())
    }

    // Detaches a logical port. When the last member leaves, the learned
    // partner parameters are cleared so the aggregator can be reused.
    pub(crate) fn detach(
        &mut self,
        sport_handle: PortHandle,
        lport_handle: PortHandle,
    ) -> Result<(), Error> {
        let sport = self
            .0
            .get_mut(&sport_handle)
            .ok_or(Error::SportNotFound(sport_handle))?;

        sport.lports.remove(&lport_handle);
        if sport.lports.is_empty() {
            sport.clear_learned();
        }

        Debug::LportDetach(&sport_handle, &lport_handle, sport.num_lports())
            .log();
        Ok(())
    }
}
