#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

// keep first: provides the logging macros for the whole crate
mod fmt;

mod address;
mod codec;
mod command;
mod connection;
pub mod constants;
mod engine;
mod event;
mod indicators;
mod interface;
mod link;
mod parser;

pub use address::DeviceAddress;
pub use codec::{Codec, CodecList};
pub use command::AtCommand;
pub use connection::{
    CodecSetupState, Connection, ConnectionSet, ConnectionState, HandshakePhase, NetworkOperator,
    OperatorQueryState,
};
pub use engine::{Engine, EngineConfig};
pub use event::{
    CallHeldStatus, CallSetupStatus, CallStatus, CurrentCall, Event, EventSink,
};
pub use indicators::{Indicator, IndicatorTable};
pub use interface::{
    Collaborators, Discovery, Transport, TransportHandle, VoiceLink, VoiceLinkHandle,
};
pub use link::{
    Fallback, LinkCapabilities, LinkParameters, LinkSetting, LinkSettingRow, SetupFailure,
};
pub use parser::Parser;

/// Local role of a connection endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// Hands-free unit (headset, car kit)
    HandsFree,
    /// Audio gateway (phone)
    AudioGateway,
}

impl Role {
    /// The role the remote device plays towards us
    #[must_use]
    pub const fn peer(self) -> Role {
        match self {
            Role::HandsFree => Role::AudioGateway,
            Role::AudioGateway => Role::HandsFree,
        }
    }
}

/// Errors reported by the engine and its helper types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HfpError {
    /// Malformed or out-of-range input
    InvalidParameter,
    /// The connection registry is at capacity
    RegistryFull,
    /// No connection exists for the given address and role
    NotConnected,
    /// The operation is not valid in the current connection state
    WrongState,
    /// The transport layer refused or lost the channel
    TransportFailed,
    /// Service discovery did not produce a usable server channel
    DiscoveryFailed,
    /// The remote device rejected the request
    PeerRejected,
}
