//! Connection engine: lifecycle state machine for sessions and voice links.
//!
//! The engine is single threaded and sans-io. External completions (discovery
//! results, transport connects, received bytes, voice link outcomes) enter
//! through the `on_*` methods; application intents through the command
//! methods. Both record state and then pump [`Engine::run`], which performs
//! all outbound work through the [`Collaborators`] traits.

mod ag;
mod hf;

use crate::address::DeviceAddress;
use crate::codec::{Codec, CodecList};
use crate::connection::{
    CodecSetupState, Connection, ConnectionSet, ConnectionState, HandshakePhase,
    OperatorQueryState,
};
use crate::constants::{
    CALL_SERVICE_NAME_SIZE, DEFAULT_AG_FEATURES, DEFAULT_HF_FEATURES, MAX_CALL_SERVICES,
    OPERATOR_NAME_SIZE, OUTBOUND_LINE_SIZE, PHONE_NUMBER_SIZE, sco_packet_types,
};
use crate::event::{Event, EventSink};
use crate::indicators::{Indicator, IndicatorTable};
use crate::interface::{Collaborators, Discovery, Transport, TransportHandle, VoiceLink, VoiceLinkHandle};
use crate::link::{
    Fallback, LinkCapabilities, LinkParameters, SetupFailure, fallback_after_failure,
    initial_link_setting,
};
use crate::parser;
use crate::{HfpError, Role};
use core::fmt::Write as _;
use heapless::{String, Vec};

/// Static engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Local feature bitmap for the hands-free role
    pub hf_features: u32,
    /// Local feature bitmap for the audio gateway role
    pub ag_features: u32,
    /// Locally supported codecs, announced via AT+BAC
    pub codecs: CodecList,
    /// Indicator set served in the audio gateway role
    pub indicators: IndicatorTable,
    /// Call hold services served via +CHLD:
    pub call_hold_services: Vec<String<CALL_SERVICE_NAME_SIZE>, MAX_CALL_SERVICES>,
    /// Operator name served via +COPS in the audio gateway role
    pub operator_name: String<OPERATOR_NAME_SIZE>,
    /// Administratively allowed voice packet types
    pub allowed_packet_types: u16,
    /// Local controller supports eSCO
    pub local_esco: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut codecs = CodecList::new();
        codecs.insert(Codec::Cvsd.id());
        codecs.insert(Codec::Msbc.id());

        let mut indicators = IndicatorTable::new();
        indicators.push(Indicator::new("service", 0, 1, 0));
        indicators.push(Indicator::new("call", 0, 1, 0));
        indicators.push(Indicator::new("callsetup", 0, 3, 0));
        indicators.push(Indicator::new("callheld", 0, 2, 0));
        indicators.push(Indicator::new("signal", 0, 5, 5));
        indicators.push(Indicator::new("roam", 0, 1, 0));
        indicators.push(Indicator::new("battchg", 0, 5, 5));

        let mut call_hold_services = Vec::new();
        for name in ["1", "1x", "2", "2x", "3"] {
            let mut entry = String::new();
            let _ = entry.push_str(name);
            let _ = call_hold_services.push(entry);
        }

        Self {
            hf_features: DEFAULT_HF_FEATURES,
            ag_features: DEFAULT_AG_FEATURES,
            codecs,
            indicators,
            call_hold_services,
            operator_name: String::new(),
            allowed_packet_types: sco_packet_types::ALL,
            local_esco: true,
        }
    }
}

/// The HFP connection engine
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    connections: ConnectionSet,
    /// At most one voice link setup runs at a time; holds the owning key
    voice_setup_active: Option<(DeviceAddress, Role)>,
}

impl Engine {
    /// Engine with the given configuration and an empty registry
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            connections: ConnectionSet::new(),
            voice_setup_active: None,
        }
    }

    /// Read access to the connection registry
    #[must_use]
    pub fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    /// Local feature bitmap for the given role
    fn local_features(&self, role: Role) -> u32 {
        match role {
            Role::HandsFree => self.config.hf_features,
            Role::AudioGateway => self.config.ag_features,
        }
    }

    // --- application intents ------------------------------------------------

    /// Establish a service level connection to `remote` in `role`.
    ///
    /// # Errors
    /// Fails when the registry is full or discovery cannot be started.
    pub fn establish_session<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        role: Role,
    ) -> Result<(), HfpError> {
        let conn = self.connections.provide(remote, role)?;
        match conn.state {
            ConnectionState::ReleasingTransport => {
                // teardown not yet issued; just keep the session
                conn.state = ConnectionState::SessionEstablished;
                Ok(())
            }
            ConnectionState::AwaitingTransportRelease { .. } => {
                conn.state = ConnectionState::AwaitingTransportRelease { restart: true };
                Ok(())
            }
            ConnectionState::ShutdownOnConnect { .. } => {
                conn.state = ConnectionState::ShutdownOnConnect { restart: true };
                Ok(())
            }
            ConnectionState::Idle => {
                conn.state = ConnectionState::AwaitingDiscovery;
                info!("establishing session to {:?}", remote);
                if let Err(reason) = c.discovery().query(remote, role.peer()) {
                    self.connections.remove(remote, role);
                    return Err(reason);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Release the session (and any voice link) towards `remote`
    pub fn release_session<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        role: Role,
    ) {
        let Some(conn) = self.connections.get_mut(remote, role) else {
            return;
        };
        match conn.state {
            ConnectionState::Idle | ConnectionState::AwaitingDiscovery => {
                self.connections.remove(remote, role);
            }
            ConnectionState::AwaitingTransportConnect => {
                conn.state = ConnectionState::ShutdownOnConnect { restart: false };
            }
            ConnectionState::Handshake { .. }
            | ConnectionState::SessionEstablished
            | ConnectionState::InitiateVoiceLink => {
                conn.establish_voice_requested = false;
                conn.state = ConnectionState::ReleasingTransport;
            }
            ConnectionState::AwaitingVoiceLink | ConnectionState::VoiceLinkEstablished => {
                conn.release_session_after_voice = true;
                conn.state = ConnectionState::ReleasingVoiceLink;
            }
            ConnectionState::ReleasingVoiceLink | ConnectionState::AwaitingVoiceLinkRelease => {
                conn.release_session_after_voice = true;
            }
            ConnectionState::ShutdownOnConnect { .. }
            | ConnectionState::ReleasingTransport
            | ConnectionState::AwaitingTransportRelease { .. } => {}
        }
        self.run(c);
    }

    /// Establish a voice link on an established session.
    ///
    /// # Errors
    /// Fails when no session exists towards `remote`.
    pub fn establish_voice_link<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        role: Role,
    ) -> Result<(), HfpError> {
        let local_features = self.local_features(role);
        let conn = self
            .connections
            .get_mut(remote, role)
            .ok_or(HfpError::NotConnected)?;
        if !conn.state.session_up() {
            return Err(HfpError::WrongState);
        }
        if conn.state.voice_link_in_use() {
            return Ok(());
        }
        conn.establish_voice_requested = true;
        if !conn.codec_negotiation_supported(local_features) {
            // no negotiation: narrowband voice, initiator sets the link up
            conn.negotiated_codec = Some(Codec::Cvsd);
            init_link_settings(&self.config, conn, local_features);
            conn.state = ConnectionState::InitiateVoiceLink;
        } else {
            match role {
                // gateway drives the codec exchange with +BCS
                Role::AudioGateway => {
                    conn.codec_state = CodecSetupState::ReceivedTrigger;
                }
                // hands-free side asks for one with AT+BCC
                Role::HandsFree => {
                    if conn.codec_state == CodecSetupState::Exchanged {
                        conn.codec_state = CodecSetupState::Idle;
                    }
                }
            }
        }
        self.run(c);
        Ok(())
    }

    /// Release the voice link towards `remote`
    pub fn release_voice_link<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        role: Role,
    ) {
        if let Some(conn) = self.connections.get_mut(remote, role) {
            conn.establish_voice_requested = false;
            if matches!(
                conn.state,
                ConnectionState::AwaitingVoiceLink | ConnectionState::VoiceLinkEstablished
            ) {
                conn.state = ConnectionState::ReleasingVoiceLink;
            }
        }
        self.run(c);
    }

    // --- external completions ----------------------------------------------

    /// Discovery finished; `result` carries the peer's server channel
    pub fn on_discovery_result<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        role: Role,
        result: Result<u8, HfpError>,
    ) {
        let Some(conn) = self.connections.get_mut(remote, role) else {
            return;
        };
        if conn.state != ConnectionState::AwaitingDiscovery {
            return;
        }
        match result {
            Ok(channel) => {
                conn.server_channel = channel;
                conn.state = ConnectionState::AwaitingTransportConnect;
                if c.transport().connect(remote, channel).is_err() {
                    self.fail_establishment(c, remote, role, HfpError::TransportFailed);
                }
            }
            Err(reason) => {
                warn!("service discovery failed");
                self.fail_establishment(c, remote, role, reason);
            }
        }
    }

    /// An inbound transport channel was announced
    pub fn on_incoming_transport<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        role: Role,
        handle: TransportHandle,
    ) {
        match self.connections.provide(remote, role) {
            Ok(conn) if conn.state == ConnectionState::Idle => {
                conn.state = ConnectionState::AwaitingTransportConnect;
                c.transport().accept(handle);
            }
            // busy with this peer already, or registry full
            _ => c.transport().decline(handle),
        }
    }

    /// Transport channel to `remote` is up
    pub fn on_transport_connected<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        role: Role,
        handle: TransportHandle,
    ) {
        let ag_indicators = self.config.indicators.clone();
        let Some(conn) = self.connections.get_mut(remote, role) else {
            return;
        };
        conn.transport = Some(handle);
        match conn.state {
            ConnectionState::ShutdownOnConnect { restart } => {
                conn.state = ConnectionState::AwaitingTransportRelease { restart };
                c.transport().disconnect(handle);
            }
            _ => {
                if role == Role::AudioGateway {
                    conn.indicators = ag_indicators;
                }
                conn.state = ConnectionState::Handshake {
                    phase: HandshakePhase::ExchangeFeatures,
                    awaiting_reply: false,
                };
            }
        }
        self.run(c);
    }

    /// Transport connect to `remote` failed
    pub fn on_transport_connect_failed<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        role: Role,
    ) {
        if self.connections.get(remote, role).is_some() {
            self.fail_establishment(c, remote, role, HfpError::TransportFailed);
        }
    }

    /// Transport channel went down
    pub fn on_transport_disconnected<C: Collaborators>(&mut self, c: &mut C, handle: TransportHandle) {
        let Some(conn) = self.connections.by_transport(handle) else {
            return;
        };
        let remote = conn.remote;
        let role = conn.role;
        let restart = matches!(
            conn.state,
            ConnectionState::AwaitingTransportRelease { restart: true }
        );
        if self.voice_setup_active == Some((remote, role)) {
            self.voice_setup_active = None;
        }
        c.events().on_event(remote, role, Event::SessionReleased);

        if restart {
            if let Some(conn) = self.connections.get_mut(remote, role) {
                conn.reset_session_state();
                conn.state = ConnectionState::AwaitingDiscovery;
            }
            info!("restarting session to {:?} after release", remote);
            if c.discovery().query(remote, role.peer()).is_err() {
                self.fail_establishment(c, remote, role, HfpError::DiscoveryFailed);
            }
        } else {
            self.connections.remove(remote, role);
        }
    }

    /// Bytes arrived on a transport channel
    pub fn on_transport_data<C: Collaborators>(
        &mut self,
        c: &mut C,
        handle: TransportHandle,
        data: &[u8],
    ) {
        let Engine {
            config,
            connections,
            ..
        } = self;
        if let Some(conn) = connections.by_transport(handle) {
            for &byte in data {
                if let Some(command) = parser::parse_byte(conn, byte) {
                    match conn.role {
                        Role::HandsFree => hf::handle_command(config, conn, c, command),
                        Role::AudioGateway => ag::handle_command(config, conn, c, command),
                    }
                }
            }
        }
        self.run(c);
    }

    /// The transport signals that a line can be sent again
    pub fn on_transport_can_send<C: Collaborators>(&mut self, c: &mut C, _handle: TransportHandle) {
        self.run(c);
    }

    /// An inbound voice link was announced for `remote`
    pub fn on_incoming_voice_link<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        role: Role,
        handle: VoiceLinkHandle,
    ) {
        let Some(conn) = self.connections.get_mut(remote, role) else {
            c.voice_link().reject(handle);
            return;
        };
        if !conn.state.session_up() || conn.state.voice_link_in_use() {
            c.voice_link().reject(handle);
            return;
        }
        let codec = conn.negotiated_codec.unwrap_or(Codec::Cvsd);
        let params = LinkParameters::for_setting(conn.link_setting, codec);
        conn.state = ConnectionState::AwaitingVoiceLink;
        c.voice_link().accept(handle, params);
    }

    /// Voice link setup finished, successfully or not
    pub fn on_voice_link_outcome<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        role: Role,
        outcome: Result<VoiceLinkHandle, u8>,
    ) {
        let local_features = self.local_features(role);
        let local_esco = self.config.local_esco;
        let allowed_packet_types = self.config.allowed_packet_types;
        let Some(conn) = self.connections.get_mut(remote, role) else {
            return;
        };
        if self.voice_setup_active == Some((remote, role)) {
            self.voice_setup_active = None;
        }
        match outcome {
            Ok(handle) => {
                conn.voice_link = Some(handle);
                if conn.release_voice_requested || conn.release_session_after_voice {
                    // release raced with the setup; tear it down right away
                    conn.state = ConnectionState::ReleasingVoiceLink;
                } else {
                    conn.establish_voice_requested = false;
                    conn.state = ConnectionState::VoiceLinkEstablished;
                    let codec = conn.negotiated_codec.unwrap_or(Codec::Cvsd);
                    c.events().on_event(
                        remote,
                        role,
                        Event::VoiceLinkEstablished {
                            codec,
                            setting: conn.link_setting,
                        },
                    );
                }
            }
            Err(status) => {
                if conn.release_voice_requested || conn.release_session_after_voice {
                    // release won the race; no link came up, nothing to retry
                    conn.release_voice_requested = false;
                    conn.establish_voice_requested = false;
                    if conn.release_session_after_voice {
                        conn.release_session_after_voice = false;
                        conn.state = ConnectionState::ReleasingTransport;
                    } else {
                        conn.state = ConnectionState::SessionEstablished;
                    }
                    self.run(c);
                    return;
                }
                let cause = SetupFailure::from_status(status);
                let capabilities = LinkCapabilities {
                    local_esco,
                    remote_esco: conn.remote_esco,
                    s4_supported: conn.s4_supported(local_features),
                    allowed_packet_types,
                };
                let codec = conn.negotiated_codec.unwrap_or(Codec::Cvsd);
                match fallback_after_failure(
                    conn.link_setting,
                    &capabilities,
                    codec,
                    cause,
                    conn.msbc_failed,
                ) {
                    Fallback::Retry(setting) => {
                        info!("voice link setup failed, retrying at lower tier");
                        conn.link_setting = setting;
                        conn.state = ConnectionState::InitiateVoiceLink;
                    }
                    Fallback::SwitchToCvsd => {
                        info!("wideband setup failed, falling back to narrowband");
                        conn.msbc_failed = true;
                        conn.negotiated_codec = Some(Codec::Cvsd);
                        conn.link_setting = crate::link::LinkSetting::D1;
                        conn.state = ConnectionState::SessionEstablished;
                        conn.establish_voice_requested = true;
                        match role {
                            // AG re-runs codec selection; CVSD will be chosen
                            Role::AudioGateway => {
                                conn.codec_state = CodecSetupState::ReceivedTrigger;
                            }
                            // HF waits for the gateway's new +BCS suggestion
                            Role::HandsFree => {
                                conn.codec_state = CodecSetupState::AwaitingCommonCodec;
                            }
                        }
                    }
                    Fallback::Abandon => {
                        warn!("voice link setup failed, giving up");
                        conn.establish_voice_requested = false;
                        conn.state = ConnectionState::SessionEstablished;
                        c.events()
                            .on_event(remote, role, Event::VoiceLinkSetupFailed { cause });
                    }
                }
            }
        }
        self.run(c);
    }

    /// Voice link went down
    pub fn on_voice_link_released<C: Collaborators>(&mut self, c: &mut C, handle: VoiceLinkHandle) {
        let Some(conn) = self.connections.by_voice_link(handle) else {
            return;
        };
        let remote = conn.remote;
        let role = conn.role;
        conn.voice_link = None;
        conn.release_voice_requested = false;
        conn.state = ConnectionState::SessionEstablished;
        c.events().on_event(remote, role, Event::VoiceLinkReleased);
        if conn.release_session_after_voice {
            conn.release_session_after_voice = false;
            conn.state = ConnectionState::ReleasingTransport;
        }
        self.run(c);
    }

    // --- call control and settings -----------------------------------------

    /// HF: answer the incoming call
    pub fn answer_call<C: Collaborators>(&mut self, c: &mut C, remote: DeviceAddress) {
        self.with_session(c, remote, |conn| conn.answer_requested = true);
    }

    /// HF: terminate the current call
    pub fn hang_up<C: Collaborators>(&mut self, c: &mut C, remote: DeviceAddress) {
        self.with_session(c, remote, |conn| conn.hangup_requested = true);
    }

    /// HF: place a call
    pub fn dial<C: Collaborators>(&mut self, c: &mut C, remote: DeviceAddress, number: &str) {
        self.with_session(c, remote, |conn| {
            let mut stored: String<PHONE_NUMBER_SIZE> = String::new();
            for ch in number.chars().take(PHONE_NUMBER_SIZE) {
                let _ = stored.push(ch);
            }
            conn.dial_requested = Some(stored);
        });
    }

    /// HF: redial the last number
    pub fn redial<C: Collaborators>(&mut self, c: &mut C, remote: DeviceAddress) {
        self.with_session(c, remote, |conn| conn.redial_requested = true);
    }

    /// HF: send a call hold / multiparty action
    pub fn call_hold_action<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        action: u8,
        index: Option<u8>,
    ) {
        self.with_session(c, remote, |conn| {
            conn.call_hold_requested = Some((action, index));
        });
    }

    /// HF: transmit a DTMF code
    pub fn transmit_dtmf<C: Collaborators>(&mut self, c: &mut C, remote: DeviceAddress, code: u8) {
        self.with_session(c, remote, |conn| conn.dtmf_requested = Some(code));
    }

    /// Synchronize the speaker gain (0..=15) with the peer
    pub fn set_speaker_gain<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        role: Role,
        gain: u8,
    ) {
        if let Some(conn) = self.connections.get_mut(remote, role) {
            conn.speaker_gain = gain.min(15);
            conn.send_speaker_gain = true;
        }
        self.run(c);
    }

    /// Synchronize the microphone gain (0..=15) with the peer
    pub fn set_microphone_gain<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        role: Role,
        gain: u8,
    ) {
        if let Some(conn) = self.connections.get_mut(remote, role) {
            conn.microphone_gain = gain.min(15);
            conn.send_microphone_gain = true;
        }
        self.run(c);
    }

    /// HF: enable or disable +CLIP caller line identification
    pub fn enable_caller_id<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        enable: bool,
    ) {
        self.with_session(c, remote, |conn| conn.clip_activation = Some(enable));
    }

    /// HF: enable or disable +CCWA call waiting notifications
    pub fn enable_call_waiting<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        enable: bool,
    ) {
        self.with_session(c, remote, |conn| conn.call_waiting_activation = Some(enable));
    }

    /// HF: enable or disable +CME ERROR extended error reports
    pub fn enable_extended_errors<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        enable: bool,
    ) {
        self.with_session(c, remote, |conn| {
            conn.extended_errors_activation = Some(enable);
        });
    }

    /// HF: ask the gateway to disable its echo canceling and noise reduction
    pub fn disable_ec_nr<C: Collaborators>(&mut self, c: &mut C, remote: DeviceAddress) {
        self.with_session(c, remote, |conn| conn.disable_ec_nr_requested = true);
    }

    /// HF: query the network operator name
    pub fn query_operator<C: Collaborators>(&mut self, c: &mut C, remote: DeviceAddress) {
        self.with_session(c, remote, |conn| {
            if conn.operator_query == OperatorQueryState::Idle {
                conn.operator_query = OperatorQueryState::SendFormat;
            }
        });
    }

    /// HF: query the subscriber number
    pub fn query_subscriber_number<C: Collaborators>(&mut self, c: &mut C, remote: DeviceAddress) {
        self.with_session(c, remote, |conn| conn.subscriber_query_requested = true);
    }

    /// HF: list current calls
    pub fn list_current_calls<C: Collaborators>(&mut self, c: &mut C, remote: DeviceAddress) {
        self.with_session(c, remote, |conn| conn.list_calls_requested = true);
    }

    /// AG: update an indicator value; sends +CIEV when updates are active
    pub fn update_indicator<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        name: &str,
        value: u8,
    ) {
        if let Some(conn) = self.connections.get_mut(remote, Role::AudioGateway) {
            if let Some(position) = conn.indicators.position(name) {
                if let Some(indicator) = conn.indicators.get_mut(position) {
                    if indicator.status != value {
                        indicator.status = value;
                        indicator.status_changed = true;
                    }
                }
            }
        }
        self.run(c);
    }

    /// AG: set the caller number reported alongside RING when the peer
    /// enabled +CLIP
    pub fn set_caller_number(&mut self, remote: DeviceAddress, number: &str, number_type: u8) {
        if let Some(conn) = self.connections.get_mut(remote, Role::AudioGateway) {
            conn.number.clear();
            for ch in number.chars().take(PHONE_NUMBER_SIZE) {
                let _ = conn.number.push(ch);
            }
            conn.number_type = number_type;
        }
    }

    /// AG: send a RING alert
    pub fn send_ring<C: Collaborators>(&mut self, c: &mut C, remote: DeviceAddress) {
        if let Some(conn) = self.connections.get_mut(remote, Role::AudioGateway) {
            conn.send_ring = true;
        }
        self.run(c);
    }

    /// AG: notify the peer of a waiting call via +CCWA.
    ///
    /// Sent only when the peer enabled call waiting notifications; the number
    /// comes from [`Engine::set_caller_number`].
    pub fn notify_call_waiting<C: Collaborators>(&mut self, c: &mut C, remote: DeviceAddress) {
        if let Some(conn) = self.connections.get_mut(remote, Role::AudioGateway) {
            conn.send_call_waiting = true;
        }
        self.run(c);
    }

    /// AG: announce the in-band ring tone setting via +BSIR
    pub fn set_in_band_ring<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        active: bool,
    ) {
        if let Some(conn) = self.connections.get_mut(remote, Role::AudioGateway) {
            conn.send_in_band_ring = Some(active);
        }
        self.run(c);
    }

    /// Record the remote controller's eSCO capability for tier selection
    pub fn set_remote_esco_support(&mut self, remote: DeviceAddress, role: Role, esco: bool) {
        if let Some(conn) = self.connections.get_mut(remote, role) {
            conn.remote_esco = esco;
        }
    }

    // --- run loop -----------------------------------------------------------

    /// Perform all outbound work that is currently possible
    pub fn run<C: Collaborators>(&mut self, c: &mut C) {
        let Engine {
            config,
            connections,
            voice_setup_active,
        } = self;
        for conn in connections.iter_mut() {
            match conn.role {
                Role::HandsFree => hf::pump(config, conn, c),
                Role::AudioGateway => ag::pump(config, conn, c),
            }
            run_lifecycle(conn, voice_setup_active, c);
        }
    }

    fn with_session<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        apply: impl FnOnce(&mut Connection),
    ) {
        if let Some(conn) = self.connections.get_mut(remote, Role::HandsFree) {
            if conn.state.session_up() {
                apply(conn);
            }
        }
        self.run(c);
    }

    fn fail_establishment<C: Collaborators>(
        &mut self,
        c: &mut C,
        remote: DeviceAddress,
        role: Role,
        reason: HfpError,
    ) {
        c.events()
            .on_event(remote, role, Event::SessionEstablishmentFailed { reason });
        self.connections.remove(remote, role);
    }
}

/// Shared non-line actions: voice link setup/teardown, transport teardown
fn run_lifecycle<C: Collaborators>(
    conn: &mut Connection,
    voice_setup_active: &mut Option<(DeviceAddress, Role)>,
    c: &mut C,
) {
    match conn.state {
        ConnectionState::InitiateVoiceLink => {
            // one setup at a time across all connections
            match voice_setup_active {
                Some(key) if *key != (conn.remote, conn.role) => {}
                _ => {
                    *voice_setup_active = Some((conn.remote, conn.role));
                    let codec = conn.negotiated_codec.unwrap_or(Codec::Cvsd);
                    let params = LinkParameters::for_setting(conn.link_setting, codec);
                    debug!("initiating voice link setup");
                    conn.state = ConnectionState::AwaitingVoiceLink;
                    if c.voice_link().setup(conn.remote, params).is_err() {
                        *voice_setup_active = None;
                        conn.state = ConnectionState::SessionEstablished;
                        conn.establish_voice_requested = false;
                        c.events().on_event(
                            conn.remote,
                            conn.role,
                            Event::VoiceLinkSetupFailed {
                                cause: SetupFailure::PeerRejected,
                            },
                        );
                    }
                }
            }
        }
        ConnectionState::ReleasingVoiceLink => {
            if let Some(handle) = conn.voice_link {
                conn.state = ConnectionState::AwaitingVoiceLinkRelease;
                c.voice_link().release(handle);
            } else {
                // setup still in flight; outcome handler sees the release intent
                conn.release_voice_requested = true;
            }
        }
        ConnectionState::ReleasingTransport => {
            if let Some(handle) = conn.transport {
                conn.state = ConnectionState::AwaitingTransportRelease { restart: false };
                c.transport().disconnect(handle);
            }
        }
        _ => {}
    }
}

/// Pick the starting tier for the next voice link setup
fn init_link_settings(config: &EngineConfig, conn: &mut Connection, local_features: u32) {
    let capabilities = LinkCapabilities {
        local_esco: config.local_esco,
        remote_esco: conn.remote_esco,
        s4_supported: conn.s4_supported(local_features),
        allowed_packet_types: config.allowed_packet_types,
    };
    let codec = conn.negotiated_codec.unwrap_or(Codec::Cvsd);
    conn.link_setting = initial_link_setting(&capabilities, codec);
    debug!("initial link setting selected");
}

/// Format and send one line; returns false when the transport is not ready
fn send_line<C: Collaborators>(
    conn: &mut Connection,
    c: &mut C,
    line: core::fmt::Arguments<'_>,
) -> bool {
    let Some(handle) = conn.transport else {
        return false;
    };
    if !c.transport().can_send_now(handle) {
        return false;
    }
    let mut buffer: String<OUTBOUND_LINE_SIZE> = String::new();
    if buffer.write_fmt(line).is_err() {
        error!("outbound line exceeds buffer");
        return false;
    }
    c.transport().send(handle, buffer.as_bytes()).is_ok()
}

/// Next handshake step after `phase` completed; `None` means the service
/// level connection is done
fn handshake_advance(
    conn: &Connection,
    local_features: u32,
    phase: HandshakePhase,
) -> Option<HandshakePhase> {
    match phase {
        HandshakePhase::ExchangeFeatures => {
            if conn.codec_negotiation_supported(local_features) {
                Some(HandshakePhase::NotifyCodecs)
            } else {
                Some(HandshakePhase::RetrieveIndicators)
            }
        }
        HandshakePhase::NotifyCodecs => Some(HandshakePhase::RetrieveIndicators),
        HandshakePhase::RetrieveIndicators => Some(HandshakePhase::RetrieveIndicatorStatus),
        HandshakePhase::RetrieveIndicatorStatus => Some(HandshakePhase::EnableIndicatorUpdates),
        HandshakePhase::EnableIndicatorUpdates => {
            if conn.three_way_calling_supported(local_features) {
                Some(HandshakePhase::RetrieveCallHoldServices)
            } else {
                None
            }
        }
        HandshakePhase::RetrieveCallHoldServices => None,
    }
}
