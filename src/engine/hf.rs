//! Hands-free role: drives the service level connection handshake, reacts to
//! gateway responses and unsolicited result codes, and turns application
//! intents into AT commands.

use super::{EngineConfig, handshake_advance, send_line};
use crate::codec::Codec;
use crate::command::AtCommand;
use crate::connection::{
    CodecSetupState, Connection, ConnectionState, HandshakePhase, OperatorQueryState,
};
use crate::constants::ag_features;
use crate::event::{CallHeldStatus, CallSetupStatus, CallStatus, Event, EventSink};
use crate::interface::Collaborators;
use crate::link::SetupFailure;
use crate::{HfpError, Role};

fn emit<C: Collaborators>(conn: &Connection, c: &mut C, event: Event) {
    c.events().on_event(conn.remote, conn.role, event);
}

pub(crate) fn handle_command<C: Collaborators>(
    config: &EngineConfig,
    conn: &mut Connection,
    c: &mut C,
    command: AtCommand,
) {
    match command {
        AtCommand::Ok => handle_ok(config, conn, c),
        AtCommand::Error => handle_error(conn, c),
        AtCommand::Ring => emit(conn, c, Event::RingAlert),
        AtCommand::IndicatorStatusUpdate => process_indicator_updates(conn, c),
        AtCommand::AgSuggestedCodec => handle_suggested_codec(config, conn),
        AtCommand::ClipInformation => {
            let number = conn.number.clone();
            emit(
                conn,
                c,
                Event::CallerId {
                    number,
                    number_type: conn.number_type,
                },
            );
        }
        AtCommand::CallWaitingNotification => {
            let number = conn.number.clone();
            emit(
                conn,
                c,
                Event::CallWaiting {
                    number,
                    number_type: conn.number_type,
                },
            );
        }
        AtCommand::ExtendedError => {
            // the gateway sends +CME ERROR instead of OK
            conn.response_pending = None;
            emit(
                conn,
                c,
                Event::ExtendedError {
                    code: conn.extended_error_value,
                },
            );
        }
        AtCommand::SubscriberNumber => {
            let number = conn.number.clone();
            emit(
                conn,
                c,
                Event::SubscriberNumber {
                    number,
                    number_type: conn.number_type,
                },
            );
        }
        AtCommand::ListCurrentCalls => {
            let number = conn.number.clone();
            emit(
                conn,
                c,
                Event::CurrentCallListed {
                    call: conn.current_call,
                    number,
                    number_type: conn.number_type,
                },
            );
        }
        AtCommand::SpeakerGain => emit(conn, c, Event::SpeakerGain(conn.speaker_gain)),
        AtCommand::MicrophoneGain => emit(conn, c, Event::MicrophoneGain(conn.microphone_gain)),
        AtCommand::InBandRingSetting => {
            let active = conn.remote_features & ag_features::IN_BAND_RING_TONE != 0;
            emit(conn, c, Event::InBandRingTone(active));
        }
        AtCommand::Unknown => {
            let line = conn.parser.unknown_header.clone();
            emit(conn, c, Event::UnknownCommand { line });
        }
        // payload already stored by the parser; progress happens on OK
        AtCommand::SupportedFeatures
        | AtCommand::RetrieveIndicators
        | AtCommand::RetrieveIndicatorsStatus
        | AtCommand::CallHoldServices
        | AtCommand::QueryOperatorName => {}
        _ => {}
    }
}

/// The gateway suggested a codec via +BCS
fn handle_suggested_codec(config: &EngineConfig, conn: &mut Connection) {
    let suggested = Codec::from_id(conn.suggested_codec);
    let supported = suggested.is_some_and(|codec| config.codecs.contains(codec));
    if supported {
        conn.negotiated_codec = suggested;
        conn.codec_confirmed = conn.suggested_codec;
        conn.codec_state = CodecSetupState::HfConfirmed;
        conn.send_codec_confirm = true;
        debug!("confirming suggested codec {}", conn.suggested_codec);
    } else {
        // not supported: answer with our codec list instead
        conn.codec_confirmed = 0;
        conn.suggested_codec = 0;
        conn.negotiated_codec = None;
        conn.codec_state = CodecSetupState::AwaitingCommonCodec;
        conn.send_supported_codecs = true;
    }
}

fn handle_ok<C: Collaborators>(config: &EngineConfig, conn: &mut Connection, c: &mut C) {
    if let ConnectionState::Handshake {
        phase,
        awaiting_reply: true,
    } = conn.state
    {
        match handshake_advance(conn, config.hf_features, phase) {
            Some(next) => {
                conn.state = ConnectionState::Handshake {
                    phase: next,
                    awaiting_reply: false,
                };
            }
            None => session_established(conn, c),
        }
        return;
    }

    match conn.response_pending.take() {
        Some(AtCommand::TriggerCodecSetup) => {
            conn.codec_state = CodecSetupState::AwaitingCommonCodec;
        }
        Some(AtCommand::HfConfirmedCodec) => {
            // codec agreed; the gateway initiates the voice link
            conn.codec_state = CodecSetupState::Exchanged;
            conn.negotiated_codec = Codec::from_id(conn.codec_confirmed);
            super::init_link_settings(config, conn, config.hf_features);
        }
        Some(AtCommand::SetOperatorFormat) => {
            conn.operator_query = OperatorQueryState::SendQuery;
        }
        Some(AtCommand::QueryOperatorName) => {
            conn.operator_query = OperatorQueryState::Idle;
            let name = conn.network_operator.name.clone();
            emit(
                conn,
                c,
                Event::OperatorName {
                    mode: conn.network_operator.mode,
                    name,
                },
            );
        }
        Some(AtCommand::DisableEcNr) => emit(conn, c, Event::EcNrDisabled),
        _ => {}
    }
}

fn handle_error<C: Collaborators>(conn: &mut Connection, c: &mut C) {
    if matches!(conn.state, ConnectionState::Handshake { .. }) {
        warn!("peer rejected service level connection setup");
        emit(
            conn,
            c,
            Event::SessionEstablishmentFailed {
                reason: HfpError::PeerRejected,
            },
        );
        conn.state = ConnectionState::ReleasingTransport;
        return;
    }

    let pending = conn.response_pending.take();
    if pending == Some(AtCommand::TriggerCodecSetup)
        || conn.codec_state == CodecSetupState::ReceivedTrigger
    {
        // remote refuses the voice link setup
        conn.codec_state = CodecSetupState::Idle;
        conn.establish_voice_requested = false;
        emit(
            conn,
            c,
            Event::VoiceLinkSetupFailed {
                cause: SetupFailure::PeerRejected,
            },
        );
        return;
    }

    match pending {
        Some(AtCommand::SetOperatorFormat | AtCommand::QueryOperatorName) => {
            conn.operator_query = OperatorQueryState::Idle;
        }
        Some(other) => warn!("peer rejected command {:?}", other),
        None => {}
    }
}

/// Handshake finished: report the session and the initial indicator state
fn session_established<C: Collaborators>(conn: &mut Connection, c: &mut C) {
    conn.state = ConnectionState::SessionEstablished;
    info!("service level connection established");
    emit(conn, c, Event::SessionEstablished);

    let mut index = 0u8;
    for indicator in conn.indicators.iter_mut() {
        index += 1;
        indicator.status_changed = false;
        c.events().on_event(
            conn.remote,
            conn.role,
            Event::IndicatorChanged {
                index,
                name: indicator.name.clone(),
                status: indicator.status,
            },
        );
    }
    sync_call_state(conn);
}

fn sync_call_state(conn: &mut Connection) {
    for indicator in conn.indicators.iter() {
        match indicator.name.as_str() {
            "call" => conn.call_status = CallStatus::from_value(indicator.status),
            "callsetup" => {
                conn.callsetup_status = CallSetupStatus::from_value(indicator.status);
            }
            "callheld" => conn.callheld_status = CallHeldStatus::from_value(indicator.status),
            _ => {}
        }
    }
}

/// One or more indicators changed through +CIEV
fn process_indicator_updates<C: Collaborators>(conn: &mut Connection, c: &mut C) {
    let remote = conn.remote;
    let role = conn.role;
    let mut call_state_changed = false;

    let mut new_call = conn.call_status;
    let mut new_callsetup = conn.callsetup_status;
    let mut new_callheld = conn.callheld_status;

    let mut index = 0u8;
    for indicator in conn.indicators.iter_mut() {
        index += 1;
        if !indicator.status_changed {
            continue;
        }
        indicator.status_changed = false;

        match indicator.name.as_str() {
            "call" => {
                new_call = CallStatus::from_value(indicator.status);
                call_state_changed = true;
            }
            "callsetup" => {
                new_callsetup = CallSetupStatus::from_value(indicator.status);
                call_state_changed = true;
            }
            "callheld" => {
                new_callheld = CallHeldStatus::from_value(indicator.status);
                call_state_changed = true;
            }
            _ => {}
        }

        c.events().on_event(
            remote,
            role,
            Event::IndicatorChanged {
                index,
                name: indicator.name.clone(),
                status: indicator.status,
            },
        );
    }

    let ringing_before = conn.callsetup_status.is_ringing();
    let ringing_now = new_callsetup.is_ringing();
    if ringing_before != ringing_now {
        let event = if ringing_now {
            Event::RingingStarted
        } else {
            Event::RingingStopped
        };
        c.events().on_event(remote, role, event);
    }

    if conn.call_status != new_call {
        let event = if new_call == CallStatus::None {
            Event::CallTerminated
        } else {
            Event::CallAnswered
        };
        c.events().on_event(remote, role, event);
    }

    conn.call_status = new_call;
    conn.callsetup_status = new_callsetup;
    conn.callheld_status = new_callheld;

    if call_state_changed {
        c.events().on_event(
            remote,
            role,
            Event::CallStateChanged {
                call: new_call,
                callsetup: new_callsetup,
                callheld: new_callheld,
            },
        );
    }
}

/// Send the next pending line, if any and if the transport is ready
pub(crate) fn pump<C: Collaborators>(config: &EngineConfig, conn: &mut Connection, c: &mut C) {
    debug_assert_eq!(conn.role, Role::HandsFree);

    if let ConnectionState::Handshake {
        phase,
        awaiting_reply: false,
    } = conn.state
    {
        if send_handshake_command(config, conn, c, phase) {
            conn.state = ConnectionState::Handshake {
                phase,
                awaiting_reply: true,
            };
        }
        return;
    }

    if !conn.state.session_up() || conn.response_pending.is_some() {
        return;
    }

    if conn.send_codec_confirm {
        let id = conn.codec_confirmed;
        if send_line(conn, c, format_args!("AT+BCS={}\r\n", id)) {
            conn.send_codec_confirm = false;
            conn.response_pending = Some(AtCommand::HfConfirmedCodec);
        }
        return;
    }
    if conn.send_supported_codecs {
        if send_codec_list(config, conn, c) {
            conn.send_supported_codecs = false;
            conn.response_pending = Some(AtCommand::AvailableCodecs);
        }
        return;
    }
    if conn.establish_voice_requested
        && conn.state == ConnectionState::SessionEstablished
        && conn.codec_state == CodecSetupState::Idle
    {
        if send_line(conn, c, format_args!("AT+BCC\r\n")) {
            conn.codec_state = CodecSetupState::ReceivedTrigger;
            conn.response_pending = Some(AtCommand::TriggerCodecSetup);
        }
        return;
    }
    if conn.answer_requested {
        if send_line(conn, c, format_args!("ATA\r\n")) {
            conn.answer_requested = false;
            conn.response_pending = Some(AtCommand::AnswerCall);
        }
        return;
    }
    if conn.hangup_requested {
        if send_line(conn, c, format_args!("AT+CHUP\r\n")) {
            conn.hangup_requested = false;
            conn.response_pending = Some(AtCommand::HangUp);
        }
        return;
    }
    if let Some(number) = conn.dial_requested.clone() {
        if send_line(conn, c, format_args!("ATD{};\r\n", number.as_str())) {
            conn.dial_requested = None;
            conn.response_pending = Some(AtCommand::DialNumber);
        }
        return;
    }
    if conn.redial_requested {
        if send_line(conn, c, format_args!("AT+BLDN\r\n")) {
            conn.redial_requested = false;
            conn.response_pending = Some(AtCommand::RedialLastNumber);
        }
        return;
    }
    if let Some((action, index)) = conn.call_hold_requested {
        let sent = match index {
            Some(index) => send_line(conn, c, format_args!("AT+CHLD={}{}\r\n", action, index)),
            None => send_line(conn, c, format_args!("AT+CHLD={}\r\n", action)),
        };
        if sent {
            conn.call_hold_requested = None;
            conn.response_pending = Some(AtCommand::CallHold);
        }
        return;
    }
    if let Some(code) = conn.dtmf_requested {
        if send_line(conn, c, format_args!("AT+VTS:{}\r\n", code as char)) {
            conn.dtmf_requested = None;
            conn.response_pending = Some(AtCommand::TransmitDtmf);
        }
        return;
    }
    if let Some(enable) = conn.clip_activation {
        if send_line(conn, c, format_args!("AT+CLIP={}\r\n", u8::from(enable))) {
            conn.clip_activation = None;
            conn.response_pending = Some(AtCommand::EnableClip);
        }
        return;
    }
    if let Some(enable) = conn.call_waiting_activation {
        if send_line(conn, c, format_args!("AT+CCWA={}\r\n", u8::from(enable))) {
            conn.call_waiting_activation = None;
            conn.response_pending = Some(AtCommand::EnableCallWaiting);
        }
        return;
    }
    if let Some(enable) = conn.extended_errors_activation {
        if send_line(conn, c, format_args!("AT+CMEE={}\r\n", u8::from(enable))) {
            conn.extended_errors_activation = None;
            conn.response_pending = Some(AtCommand::EnableExtendedErrors);
        }
        return;
    }
    if conn.disable_ec_nr_requested {
        if send_line(conn, c, format_args!("AT+NREC=0\r\n")) {
            conn.disable_ec_nr_requested = false;
            conn.response_pending = Some(AtCommand::DisableEcNr);
        }
        return;
    }
    match conn.operator_query {
        OperatorQueryState::SendFormat => {
            if send_line(conn, c, format_args!("AT+COPS=3,0\r\n")) {
                conn.operator_query = OperatorQueryState::AwaitingFormatOk;
                conn.response_pending = Some(AtCommand::SetOperatorFormat);
            }
            return;
        }
        OperatorQueryState::SendQuery => {
            if send_line(conn, c, format_args!("AT+COPS?\r\n")) {
                conn.operator_query = OperatorQueryState::AwaitingResult;
                conn.response_pending = Some(AtCommand::QueryOperatorName);
            }
            return;
        }
        _ => {}
    }
    if conn.subscriber_query_requested {
        if send_line(conn, c, format_args!("AT+CNUM\r\n")) {
            conn.subscriber_query_requested = false;
            conn.response_pending = Some(AtCommand::SubscriberNumber);
        }
        return;
    }
    if conn.list_calls_requested {
        if send_line(conn, c, format_args!("AT+CLCC\r\n")) {
            conn.list_calls_requested = false;
            conn.response_pending = Some(AtCommand::ListCurrentCalls);
        }
        return;
    }
    if conn.send_speaker_gain {
        let gain = conn.speaker_gain;
        if send_line(conn, c, format_args!("AT+VGS={}\r\n", gain)) {
            conn.send_speaker_gain = false;
            conn.response_pending = Some(AtCommand::SpeakerGain);
        }
        return;
    }
    if conn.send_microphone_gain {
        let gain = conn.microphone_gain;
        if send_line(conn, c, format_args!("AT+VGM={}\r\n", gain)) {
            conn.send_microphone_gain = false;
            conn.response_pending = Some(AtCommand::MicrophoneGain);
        }
    }
}

fn send_handshake_command<C: Collaborators>(
    config: &EngineConfig,
    conn: &mut Connection,
    c: &mut C,
    phase: HandshakePhase,
) -> bool {
    match phase {
        HandshakePhase::ExchangeFeatures => {
            send_line(conn, c, format_args!("AT+BRSF={}\r\n", config.hf_features))
        }
        HandshakePhase::NotifyCodecs => send_codec_list(config, conn, c),
        HandshakePhase::RetrieveIndicators => send_line(conn, c, format_args!("AT+CIND=?\r\n")),
        HandshakePhase::RetrieveIndicatorStatus => {
            send_line(conn, c, format_args!("AT+CIND?\r\n"))
        }
        HandshakePhase::EnableIndicatorUpdates => {
            send_line(conn, c, format_args!("AT+CMER=3,0,0,1\r\n"))
        }
        HandshakePhase::RetrieveCallHoldServices => {
            send_line(conn, c, format_args!("AT+CHLD=?\r\n"))
        }
    }
}

fn send_codec_list<C: Collaborators>(
    config: &EngineConfig,
    conn: &mut Connection,
    c: &mut C,
) -> bool {
    let mut list: heapless::String<32> = heapless::String::new();
    for (i, id) in config.codecs.ids().iter().enumerate() {
        if i > 0 {
            let _ = list.push(',');
        }
        let _ = core::fmt::write(&mut list, format_args!("{}", id));
    }
    send_line(conn, c, format_args!("AT+BAC={}\r\n", list.as_str()))
}
