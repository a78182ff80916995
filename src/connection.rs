//! Per-connection state and the bounded connection registry.
//!
//! A [`Connection`] carries everything the engine knows about one remote
//! device in one role: lifecycle state, parser scratch state, negotiated
//! session data and pending outbound intents. The [`ConnectionSet`] registry
//! is owned by the engine and passed by reference, never global.

use crate::address::DeviceAddress;
use crate::codec::{Codec, CodecList};
use crate::constants::{
    CALL_SERVICE_NAME_SIZE, MAX_CALL_SERVICES, MAX_CONNECTIONS, OPERATOR_NAME_SIZE,
    PHONE_NUMBER_SIZE,
};
use crate::event::{CallHeldStatus, CallSetupStatus, CallStatus};
use crate::indicators::IndicatorTable;
use crate::interface::{TransportHandle, VoiceLinkHandle};
use crate::link::LinkSetting;
use crate::parser::Parser;
use crate::{HfpError, Role};
use heapless::{String, Vec};

/// Steps of the service level connection handshake, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakePhase {
    /// AT+BRSF feature exchange
    ExchangeFeatures,
    /// AT+BAC codec announcement (only with codec negotiation)
    NotifyCodecs,
    /// AT+CIND=? indicator descriptions
    RetrieveIndicators,
    /// AT+CIND? indicator status values
    RetrieveIndicatorStatus,
    /// AT+CMER activation of unsolicited updates
    EnableIndicatorUpdates,
    /// AT+CHLD=? call hold services (only with three-way calling on both sides)
    RetrieveCallHoldServices,
}

/// Lifecycle state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    /// No activity
    Idle,
    /// Service discovery query in flight
    AwaitingDiscovery,
    /// Transport connect in flight
    AwaitingTransportConnect,
    /// Transport connect in flight, release already requested; close on connect
    ShutdownOnConnect {
        /// Re-establish the session once the teardown completes
        restart: bool,
    },
    /// Service level connection handshake in progress
    Handshake {
        /// Current handshake step
        phase: HandshakePhase,
        /// Command for this step was sent, response outstanding (HF side)
        awaiting_reply: bool,
    },
    /// Service level connection established, no voice link
    SessionEstablished,
    /// Voice link setup should be issued on the next run
    InitiateVoiceLink,
    /// Voice link setup in flight
    AwaitingVoiceLink,
    /// Voice link is up
    VoiceLinkEstablished,
    /// Voice link release should be issued on the next run
    ReleasingVoiceLink,
    /// Voice link release in flight
    AwaitingVoiceLinkRelease,
    /// Transport disconnect should be issued on the next run
    ReleasingTransport,
    /// Transport disconnect in flight
    AwaitingTransportRelease {
        /// Re-establish the session once the transport is down
        restart: bool,
    },
}

impl ConnectionState {
    /// Whether a transport channel exists or is being set up
    #[must_use]
    pub fn transport_in_use(self) -> bool {
        !matches!(
            self,
            ConnectionState::Idle | ConnectionState::AwaitingDiscovery
        )
    }

    /// Whether the service level connection is fully established
    #[must_use]
    pub fn session_up(self) -> bool {
        matches!(
            self,
            ConnectionState::SessionEstablished
                | ConnectionState::InitiateVoiceLink
                | ConnectionState::AwaitingVoiceLink
                | ConnectionState::VoiceLinkEstablished
                | ConnectionState::ReleasingVoiceLink
                | ConnectionState::AwaitingVoiceLinkRelease
        )
    }

    /// Whether a voice link exists or is being set up or torn down
    #[must_use]
    pub fn voice_link_in_use(self) -> bool {
        matches!(
            self,
            ConnectionState::InitiateVoiceLink
                | ConnectionState::AwaitingVoiceLink
                | ConnectionState::VoiceLinkEstablished
                | ConnectionState::ReleasingVoiceLink
                | ConnectionState::AwaitingVoiceLinkRelease
        )
    }
}

/// Codec negotiation progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecSetupState {
    /// No negotiation performed
    #[default]
    Idle,
    /// AG received the peer codec list
    ReceivedList,
    /// Codec setup was triggered, selection outstanding
    ReceivedTrigger,
    /// HF waits for the gateway's +BCS suggestion
    AwaitingCommonCodec,
    /// HF confirmed the suggested codec, OK outstanding
    HfConfirmed,
    /// Codec agreed on both sides
    Exchanged,
}

/// +COPS network operator data
#[derive(Debug, Clone, Default)]
pub struct NetworkOperator {
    /// Registration mode
    pub mode: u8,
    /// Name format, must be 0 (long alphanumeric)
    pub format: u8,
    /// Operator name
    pub name: String<OPERATOR_NAME_SIZE>,
}

/// Operator name query progression on the HF side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatorQueryState {
    /// No query running
    #[default]
    Idle,
    /// AT+COPS=3,0 should be sent
    SendFormat,
    /// Format set, OK outstanding
    AwaitingFormatOk,
    /// AT+COPS? should be sent
    SendQuery,
    /// Query sent, +COPS and OK outstanding
    AwaitingResult,
}

/// State for one remote device in one local role
#[derive(Debug)]
pub struct Connection {
    /// Remote device address
    pub remote: DeviceAddress,
    /// Local role of this connection
    pub role: Role,
    /// Lifecycle state
    pub state: ConnectionState,
    /// Transport channel, once connected
    pub transport: Option<TransportHandle>,
    /// Voice link, once established
    pub voice_link: Option<VoiceLinkHandle>,
    /// Discovered transport server channel
    pub server_channel: u8,

    /// Byte parser scratch state
    pub parser: Parser,

    /// Features reported by the peer (BRSF bitmap)
    pub remote_features: u32,
    /// Codecs reported by the peer (AT+BAC)
    pub remote_codecs: CodecList,
    /// AG indicator table; on the HF side filled from +CIND
    pub indicators: IndicatorTable,
    /// Call hold services reported via +CHLD:
    pub call_services: Vec<String<CALL_SERVICE_NAME_SIZE>, MAX_CALL_SERVICES>,
    /// Operator data from +COPS
    pub network_operator: NetworkOperator,

    /// Codec negotiation progress
    pub codec_state: CodecSetupState,
    /// Codec suggested in +BCS, raw wire id
    pub suggested_codec: u8,
    /// Codec confirmed in AT+BCS=, raw wire id
    pub codec_confirmed: u8,
    /// Codec agreed for the voice link
    pub negotiated_codec: Option<Codec>,
    /// Wideband setup failed once; do not try mSBC again on this connection
    pub msbc_failed: bool,
    /// Link settings tier for the next setup attempt
    pub link_setting: LinkSetting,
    /// Remote controller supports eSCO
    pub remote_esco: bool,

    /// call indicator as tracked on the HF side
    pub call_status: CallStatus,
    /// callsetup indicator as tracked on the HF side
    pub callsetup_status: CallSetupStatus,
    /// callheld indicator as tracked on the HF side
    pub callheld_status: CallHeldStatus,

    /// Phone number from the last CLIP/CCWA/CNUM/CLCC field
    pub number: String<PHONE_NUMBER_SIZE>,
    /// Number type for [`Self::number`]
    pub number_type: u8,
    /// Number captured from an ATD dial command
    pub dial_number: String<PHONE_NUMBER_SIZE>,
    /// Scratch +CLCC entry
    pub current_call: crate::event::CurrentCall,
    /// Speaker gain 0..=15
    pub speaker_gain: u8,
    /// Microphone gain 0..=15
    pub microphone_gain: u8,
    /// Last +CME ERROR code
    pub extended_error_value: u8,
    /// Last DTMF code from AT+VTS
    pub dtmf_code: u8,
    /// Call hold action digit from AT+CHLD
    pub call_hold_action: u8,
    /// Optional call index suffix from AT+CHLD
    pub call_hold_index: Option<u8>,
    /// CMER mode value; 0xFF until AT+CMER was processed
    pub indicator_updates_mode: u8,

    /// Peer enabled +CLIP delivery
    pub clip_enabled: bool,
    /// Peer enabled +CCWA delivery
    pub call_waiting_enabled: bool,
    /// Peer enabled +CME ERROR replies
    pub extended_errors_enabled: bool,

    /// AG: owes the peer an OK
    pub ok_pending: bool,
    /// AG: owes the peer an error reply
    pub error_pending: bool,
    /// HF: command sent, OK/ERROR maps back to this
    pub response_pending: Option<crate::command::AtCommand>,

    /// HF: send AT+BCS= with the confirmed codec
    pub send_codec_confirm: bool,
    /// HF: re-send AT+BAC= after an unsupported suggestion
    pub send_supported_codecs: bool,
    /// AG: send RING alert
    pub send_ring: bool,
    /// AG: send a +CCWA call waiting notification
    pub send_call_waiting: bool,
    /// AG: announce in-band ring setting via +BSIR
    pub send_in_band_ring: Option<bool>,
    /// Send the local speaker gain to the peer
    pub send_speaker_gain: bool,
    /// Send the local microphone gain to the peer
    pub send_microphone_gain: bool,

    /// Voice link requested by the application
    pub establish_voice_requested: bool,
    /// Voice link release requested by the application
    pub release_voice_requested: bool,
    /// Release the session once the voice link is down
    pub release_session_after_voice: bool,

    /// HF: answer the call (ATA)
    pub answer_requested: bool,
    /// HF: hang up (AT+CHUP)
    pub hangup_requested: bool,
    /// HF: number to dial (ATD)
    pub dial_requested: Option<String<PHONE_NUMBER_SIZE>>,
    /// HF: redial last number (AT+BLDN)
    pub redial_requested: bool,
    /// HF: call hold action to send (AT+CHLD=)
    pub call_hold_requested: Option<(u8, Option<u8>)>,
    /// HF: DTMF code to send (AT+VTS:)
    pub dtmf_requested: Option<u8>,
    /// HF: CLIP activation to send
    pub clip_activation: Option<bool>,
    /// HF: CCWA activation to send
    pub call_waiting_activation: Option<bool>,
    /// HF: CMEE activation to send
    pub extended_errors_activation: Option<bool>,
    /// HF: send AT+NREC=0
    pub disable_ec_nr_requested: bool,
    /// HF: operator name query progression
    pub operator_query: OperatorQueryState,
    /// HF: send AT+CNUM
    pub subscriber_query_requested: bool,
    /// HF: send AT+CLCC
    pub list_calls_requested: bool,
}

impl Connection {
    /// Fresh connection in [`ConnectionState::Idle`]
    #[must_use]
    pub fn new(remote: DeviceAddress, role: Role) -> Self {
        Self {
            remote,
            role,
            state: ConnectionState::Idle,
            transport: None,
            voice_link: None,
            server_channel: 0,
            parser: Parser::new(),
            remote_features: 0,
            remote_codecs: CodecList::new(),
            indicators: IndicatorTable::new(),
            call_services: Vec::new(),
            network_operator: NetworkOperator::default(),
            codec_state: CodecSetupState::Idle,
            suggested_codec: 0,
            codec_confirmed: 0,
            negotiated_codec: None,
            msbc_failed: false,
            link_setting: LinkSetting::D1,
            remote_esco: true,
            call_status: CallStatus::None,
            callsetup_status: CallSetupStatus::None,
            callheld_status: CallHeldStatus::None,
            number: String::new(),
            number_type: 0,
            dial_number: String::new(),
            current_call: crate::event::CurrentCall::default(),
            speaker_gain: 9,
            microphone_gain: 9,
            extended_error_value: 0,
            dtmf_code: 0,
            call_hold_action: 0,
            call_hold_index: None,
            indicator_updates_mode: 0xFF,
            clip_enabled: false,
            call_waiting_enabled: false,
            extended_errors_enabled: false,
            ok_pending: false,
            error_pending: false,
            response_pending: None,
            send_codec_confirm: false,
            send_supported_codecs: false,
            send_ring: false,
            send_call_waiting: false,
            send_in_band_ring: None,
            send_speaker_gain: false,
            send_microphone_gain: false,
            establish_voice_requested: false,
            release_voice_requested: false,
            release_session_after_voice: false,
            answer_requested: false,
            hangup_requested: false,
            dial_requested: None,
            redial_requested: false,
            call_hold_requested: None,
            dtmf_requested: None,
            clip_activation: None,
            call_waiting_activation: None,
            extended_errors_activation: None,
            disable_ec_nr_requested: false,
            operator_query: OperatorQueryState::Idle,
            subscriber_query_requested: false,
            list_calls_requested: false,
        }
    }

    /// Forget all session data after the transport went down. Keeps the
    /// remote address, role and discovered channel so a restart can reuse
    /// them.
    pub fn reset_session_state(&mut self) {
        let remote = self.remote;
        let role = self.role;
        let channel = self.server_channel;
        *self = Connection::new(remote, role);
        self.server_channel = channel;
    }

    /// Whether the peer and we both support codec negotiation
    #[must_use]
    pub fn codec_negotiation_supported(&self, local_features: u32) -> bool {
        use crate::constants::{ag_features, hf_features};
        match self.role {
            Role::HandsFree => {
                (local_features & hf_features::CODEC_NEGOTIATION != 0)
                    && (self.remote_features & ag_features::CODEC_NEGOTIATION != 0)
            }
            Role::AudioGateway => {
                (local_features & ag_features::CODEC_NEGOTIATION != 0)
                    && (self.remote_features & hf_features::CODEC_NEGOTIATION != 0)
            }
        }
    }

    /// Whether both sides advertise three-way calling
    #[must_use]
    pub fn three_way_calling_supported(&self, local_features: u32) -> bool {
        use crate::constants::{ag_features, hf_features};
        match self.role {
            Role::HandsFree => {
                (local_features & hf_features::THREE_WAY_CALLING != 0)
                    && (self.remote_features & ag_features::THREE_WAY_CALLING != 0)
            }
            Role::AudioGateway => {
                (local_features & ag_features::THREE_WAY_CALLING != 0)
                    && (self.remote_features & hf_features::THREE_WAY_CALLING != 0)
            }
        }
    }

    /// Whether both sides advertise the eSCO S4 settings feature
    #[must_use]
    pub fn s4_supported(&self, local_features: u32) -> bool {
        use crate::constants::{ag_features, hf_features};
        match self.role {
            Role::HandsFree => {
                (local_features & hf_features::ESCO_S4 != 0)
                    && (self.remote_features & ag_features::ESCO_S4 != 0)
            }
            Role::AudioGateway => {
                (local_features & ag_features::ESCO_S4 != 0)
                    && (self.remote_features & hf_features::ESCO_S4 != 0)
            }
        }
    }
}

/// Bounded registry of connections, keyed by (remote address, local role)
#[derive(Debug, Default)]
pub struct ConnectionSet {
    entries: Vec<Connection, MAX_CONNECTIONS>,
}

impl ConnectionSet {
    /// Empty registry
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of tracked connections
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no connections are tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Connection for the given remote and role
    #[must_use]
    pub fn get(&self, remote: DeviceAddress, role: Role) -> Option<&Connection> {
        self.entries
            .iter()
            .find(|c| c.remote == remote && c.role == role)
    }

    /// Mutable connection for the given remote and role
    pub fn get_mut(&mut self, remote: DeviceAddress, role: Role) -> Option<&mut Connection> {
        self.entries
            .iter_mut()
            .find(|c| c.remote == remote && c.role == role)
    }

    /// Existing connection for the given key, or a fresh one.
    ///
    /// # Errors
    /// Fails with [`HfpError::RegistryFull`] when no slot is left.
    pub fn provide(
        &mut self,
        remote: DeviceAddress,
        role: Role,
    ) -> Result<&mut Connection, HfpError> {
        if let Some(index) = self
            .entries
            .iter()
            .position(|c| c.remote == remote && c.role == role)
        {
            return Ok(&mut self.entries[index]);
        }
        self.entries
            .push(Connection::new(remote, role))
            .map_err(|_| HfpError::RegistryFull)?;
        let index = self.entries.len() - 1;
        Ok(&mut self.entries[index])
    }

    /// Mutable connection owning the given transport handle
    pub fn by_transport(&mut self, handle: TransportHandle) -> Option<&mut Connection> {
        self.entries
            .iter_mut()
            .find(|c| c.transport == Some(handle))
    }

    /// Mutable connection owning the given voice link handle
    pub fn by_voice_link(&mut self, handle: VoiceLinkHandle) -> Option<&mut Connection> {
        self.entries
            .iter_mut()
            .find(|c| c.voice_link == Some(handle))
    }

    /// Drop the connection for the given key
    pub fn remove(&mut self, remote: DeviceAddress, role: Role) {
        if let Some(index) = self
            .entries
            .iter()
            .position(|c| c.remote == remote && c.role == role)
        {
            self.entries.swap_remove(index);
        }
    }

    /// Iterate over the connections
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.entries.iter()
    }

    /// Iterate mutably over the connections
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection> {
        self.entries.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> DeviceAddress {
        DeviceAddress::new([0x00, 0x1B, 0xDC, 0x07, 0x32, last])
    }

    #[test]
    fn test_registry_keyed_by_address_and_role() {
        let mut set = ConnectionSet::new();
        set.provide(addr(1), Role::HandsFree).unwrap();
        set.provide(addr(1), Role::AudioGateway).unwrap();
        assert_eq!(set.len(), 2);
        // same key returns the existing entry
        set.provide(addr(1), Role::HandsFree).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_registry_bounded() {
        let mut set = ConnectionSet::new();
        for i in 0..MAX_CONNECTIONS as u8 {
            set.provide(addr(i), Role::HandsFree).unwrap();
        }
        assert_eq!(
            set.provide(addr(0xEE), Role::HandsFree).err(),
            Some(HfpError::RegistryFull)
        );
    }

    #[test]
    fn test_lookup_by_handles() {
        let mut set = ConnectionSet::new();
        let conn = set.provide(addr(7), Role::HandsFree).unwrap();
        conn.transport = Some(TransportHandle(42));
        conn.voice_link = Some(VoiceLinkHandle(7));
        assert_eq!(
            set.by_transport(TransportHandle(42)).unwrap().remote,
            addr(7)
        );
        assert!(set.by_transport(TransportHandle(43)).is_none());
        assert_eq!(
            set.by_voice_link(VoiceLinkHandle(7)).unwrap().remote,
            addr(7)
        );
    }

    #[test]
    fn test_reset_session_state_keeps_identity() {
        let mut conn = Connection::new(addr(3), Role::HandsFree);
        conn.server_channel = 4;
        conn.remote_features = 0xFF;
        conn.msbc_failed = true;
        conn.reset_session_state();
        assert_eq!(conn.remote, addr(3));
        assert_eq!(conn.server_channel, 4);
        assert_eq!(conn.remote_features, 0);
        assert!(!conn.msbc_failed);
        assert_eq!(conn.state, ConnectionState::Idle);
    }

    #[test]
    fn test_state_predicates() {
        assert!(!ConnectionState::Idle.transport_in_use());
        assert!(!ConnectionState::AwaitingDiscovery.transport_in_use());
        assert!(ConnectionState::AwaitingTransportConnect.transport_in_use());
        assert!(ConnectionState::VoiceLinkEstablished.session_up());
        assert!(ConnectionState::VoiceLinkEstablished.voice_link_in_use());
        assert!(!ConnectionState::SessionEstablished.voice_link_in_use());
        assert!(!ConnectionState::ReleasingTransport.session_up());
    }
}
