//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, TryGetError};
use derive_new::new;
use lacpd_utils::bytes::{BytesExt, BytesMutExt, TLS_BUF};
use lacpd_utils::mac_addr::MacAddr;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

//
// LACPDU format (IEEE 802.3ad clause 43.4.2), 128 octets on the wire:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |    Subtype    |    Version    |  Actor TLV    |  Actor Len    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |        Actor Sys Pri          |        Actor System           |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
// |                          (6 octets)                           |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |          Actor Key            |       Actor Port Pri          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |          Actor Port           |  Actor State  |   Reserved    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+   (3 octets)  +
// |                  ... partner TLV (analogous) ...              |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// | Collector TLV |Collector Len  |     Collector Max Delay       |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                    Reserved (12 octets)                       |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |Terminator TLV |Terminator Len |   Padding to 128 octets ...   |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//

// PDU subtypes.
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PduSubtype {
    Lacp = 0x01,
    Marker = 0x02,
}

// Marker TLV types.
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum MarkerTlvType {
    Information = 0x01,
    Response = 0x02,
}

// Actor/partner port state, as carried on the wire.
bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct PortState: u8 {
        const LACP_ACTIVITY = 1 << 0;
        const LACP_TIMEOUT = 1 << 1;
        const AGGREGATION = 1 << 2;
        const SYNCHRONIZATION = 1 << 3;
        const COLLECTING = 1 << 4;
        const DISTRIBUTING = 1 << 5;
        const DEFAULTED = 1 << 6;
        const EXPIRED = 1 << 7;
    }
}

// System identifier: priority plus MAC, compared in that order. The
// numerically smaller value is the higher-priority system.
#[derive(Clone, Copy, Debug, Default, Eq, new, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct SystemId {
    pub priority: u16,
    pub mac: MacAddr,
}

// Port identifier: priority plus port number, compared in that order.
#[derive(Clone, Copy, Debug, Default, Eq, new, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct PortId {
    pub priority: u16,
    pub number: u16,
}

// One endpoint's operational parameters, as carried in the actor and
// partner TLVs.
#[derive(Clone, Copy, Debug, Default, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LacpParams {
    pub system: SystemId,
    pub key: u16,
    pub port: PortId,
    pub state: PortState,
}

#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Lacpdu {
    pub actor: LacpParams,
    pub partner: LacpParams,
    pub collector_max_delay: u16,
}

#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct MarkerPdu {
    pub tlv_type: MarkerTlvType,
    pub requester_port: u16,
    pub requester_system: MacAddr,
    pub requester_transaction_id: u32,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(enum_as_inner::EnumAsInner)]
pub enum Pdu {
    Lacp(Lacpdu),
    Marker(MarkerPdu),
}

// Decode errors.
#[derive(Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum DecodeError {
    IncompletePdu,
    InvalidSubtype(u8),
    InvalidVersion(u8),
    InvalidTlv { tlv_type: u8, tlv_len: u8 },
    ReadOutOfBounds,
}

// ===== impl Pdu =====

impl Pdu {
    pub const VERSION: u8 = 0x01;
    // Octets emitted on the wire for every PDU.
    pub const PDU_LEN: usize = 128;

    // Decodes a PDU from an Ethernet payload (slow-protocols subtype
    // onwards).
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = Bytes::copy_from_slice(data);

        let subtype = buf.try_get_u8()?;
        match PduSubtype::from_u8(subtype) {
            Some(PduSubtype::Lacp) => {
                Ok(Pdu::Lacp(Lacpdu::decode(&mut buf)?))
            }
            Some(PduSubtype::Marker) => {
                Ok(Pdu::Marker(MarkerPdu::decode(&mut buf)?))
            }
            None => Err(DecodeError::InvalidSubtype(subtype)),
        }
    }
}

// ===== impl Lacpdu =====

impl Lacpdu {
    const TLV_ACTOR: u8 = 0x01;
    const TLV_PARTNER: u8 = 0x02;
    const TLV_COLLECTOR: u8 = 0x03;
    const TLV_TERMINATOR: u8 = 0x00;
    const TLV_ACTOR_LEN: u8 = 0x14;
    const TLV_PARTNER_LEN: u8 = 0x14;
    const TLV_COLLECTOR_LEN: u8 = 0x10;
    // Octets needed up to and including the terminator TLV.
    const MIN_LEN: usize = 60;

    // Encodes the LACPDU into its canonical 128-octet wire form.
    pub fn encode(&self) -> Bytes {
        TLS_BUF.with(|buf| {
            let mut buf = buf.borrow_mut();
            buf.clear();

            buf.put_u8(PduSubtype::Lacp as u8);
            buf.put_u8(Pdu::VERSION);

            buf.put_u8(Self::TLV_ACTOR);
            buf.put_u8(Self::TLV_ACTOR_LEN);
            self.actor.encode(&mut buf);

            buf.put_u8(Self::TLV_PARTNER);
            buf.put_u8(Self::TLV_PARTNER_LEN);
            self.partner.encode(&mut buf);

            buf.put_u8(Self::TLV_COLLECTOR);
            buf.put_u8(Self::TLV_COLLECTOR_LEN);
            buf.put_u16(self.collector_max_delay);
            buf.put_bytes(0, 12);

            buf.put_u8(Self::TLV_TERMINATOR);
            buf.put_u8(0);

            // Pad out to the fixed PDU size.
            let pad = Pdu::PDU_LEN - buf.len();
            buf.put_bytes(0, pad);
            Bytes::copy_from_slice(buf.as_ref())
        })
    }

    // Decodes the LACPDU body (everything after the subtype octet). The
    // padding region is deliberately not validated.
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        if buf.remaining() < Self::MIN_LEN - 1 {
            return Err(DecodeError::IncompletePdu);
        }

        let version = buf.try_get_u8()?;
        if version != Pdu::VERSION {
            return Err(DecodeError::InvalidVersion(version));
        }

        check_tlv_hdr(buf, Self::TLV_ACTOR, Self::TLV_ACTOR_LEN)?;
        let actor = LacpParams::decode(buf)?;

        check_tlv_hdr(buf, Self::TLV_PARTNER, Self::TLV_PARTNER_LEN)?;
        let partner = LacpParams::decode(buf)?;

        check_tlv_hdr(buf, Self::TLV_COLLECTOR, Self::TLV_COLLECTOR_LEN)?;
        let collector_max_delay = buf.try_get_u16()?;
        buf.advance(12);

        let tlv_type = buf.try_get_u8()?;
        let tlv_len = buf.try_get_u8()?;
        if tlv_type != Self::TLV_TERMINATOR || tlv_len != 0 {
            return Err(DecodeError::InvalidTlv { tlv_type, tlv_len });
        }

        Ok(Lacpdu {
            actor,
            partner,
            collector_max_delay,
        })
    }
}

// ===== impl LacpParams =====

impl LacpParams {
    fn encode(&self, buf: &mut bytes::BytesMut) {
        buf.put_u16(self.system.priority);
        buf.put_mac(&self.system.mac);
        buf.put_u16(self.key);
        buf.put_u16(self.port.priority);
        buf.put_u16(self.port.number);
        buf.put_u8(self.state.bits());
        buf.put_bytes(0, 3);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let system_priority = buf.try_get_u16()?;
        let system_mac = buf.try_get_mac()?;
        let key = buf.try_get_u16()?;
        let port_priority = buf.try_get_u16()?;
        let port_number = buf.try_get_u16()?;
        let state = PortState::from_bits_retain(buf.try_get_u8()?);
        buf.advance(3);

        Ok(LacpParams {
            system: SystemId::new(system_priority, system_mac),
            key,
            port: PortId::new(port_priority, port_number),
            state,
        })
    }
}

// ===== impl MarkerPdu =====

impl MarkerPdu {
    const TLV_LEN: u8 = 0x10;
    // Octets needed up to and including the terminator TLV.
    const MIN_LEN: usize = 20;

    // Encodes the marker PDU into its canonical 128-octet wire form.
    pub fn encode(&self) -> Bytes {
        TLS_BUF.with(|buf| {
            let mut buf = buf.borrow_mut();
            buf.clear();

            buf.put_u8(PduSubtype::Marker as u8);
            buf.put_u8(Pdu::VERSION);
            buf.put_u8(self.tlv_type as u8);
            buf.put_u8(Self::TLV_LEN);
            buf.put_u16(self.requester_port);
            buf.put_mac(&self.requester_system);
            buf.put_u32(self.requester_transaction_id);
            buf.put_bytes(0, 2);
            buf.put_u8(0);
            buf.put_u8(0);

            // Pad out to the fixed PDU size.
            let pad = Pdu::PDU_LEN - buf.len();
            buf.put_bytes(0, pad);
            Bytes::copy_from_slice(buf.as_ref())
        })
    }

    // Decodes the marker PDU body (everything after the subtype octet).
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        if buf.remaining() < Self::MIN_LEN - 1 {
            return Err(DecodeError::IncompletePdu);
        }

        let version = buf.try_get_u8()?;
        if version != Pdu::VERSION {
            return Err(DecodeError::InvalidVersion(version));
        }

        let tlv_type = buf.try_get_u8()?;
        let tlv_len = buf.try_get_u8()?;
        let Some(tlv_type) = MarkerTlvType::from_u8(tlv_type) else {
            return Err(DecodeError::InvalidTlv { tlv_type, tlv_len });
        };
        if tlv_len != Self::TLV_LEN {
            return Err(DecodeError::InvalidTlv {
                tlv_type: tlv_type as u8,
                tlv_len,
            });
        }

        let requester_port = buf.try_get_u16()?;
        let requester_system = buf.try_get_mac()?;
        let requester_transaction_id = buf.try_get_u32()?;
        buf.advance(2);

        Ok(MarkerPdu {
            tlv_type,
            requester_port,
            requester_system,
            requester_transaction_id,
        })
    }

    // Builds the response for a received marker information PDU: identical
    // requester fields, with the TLV type switched to "response".
    pub fn response(&self) -> MarkerPdu {
        MarkerPdu {
            tlv_type: MarkerTlvType::Response,
            ..self.clone()
        }
    }
}

// ===== helper functions =====

fn check_tlv_hdr(
    buf: &mut Bytes,
    expected_type: u8,
    expected_len: u8,
) -> Result<(), DecodeError> {
    let tlv_type = buf.try_get_u8()?;
    let tlv_len = buf.try_get_u8()?;
    if tlv_type != expected_type || tlv_len != expected_len {
        return Err(DecodeError::InvalidTlv { tlv_type, tlv_len });
    }
    Ok(())
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::IncompletePdu => {
                write!(f, "incomplete PDU")
            }
            DecodeError::InvalidSubtype(subtype) => {
                write!(f, "invalid PDU subtype: {subtype}")
            }
            DecodeError::InvalidVersion(version) => {
                write!(f, "invalid LACP version: {version}")
            }
            DecodeError::InvalidTlv { tlv_type, tlv_len } => {
                write!(f, "invalid TLV: type {tlv_type}, length {tlv_len}")
            }
            DecodeError::ReadOutOfBounds => {
                write!(f, "attempt to read out of bounds")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<TryGetError> for DecodeError {
    fn from(_error: TryGetError) -> DecodeError {
        DecodeError::ReadOutOfBounds
    }
}
