//! Audio gateway role: answers the hands-free side's handshake commands,
//! serves post-session requests, and pushes unsolicited status lines.

use super::{EngineConfig, handshake_advance, init_link_settings, send_line};
use crate::codec::Codec;
use crate::command::AtCommand;
use crate::connection::{CodecSetupState, Connection, ConnectionState, HandshakePhase};
use crate::constants::ag_features;
use crate::event::{Event, EventSink};
use crate::interface::Collaborators;
use crate::Role;

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
        AtCommand::SupportedFeatures => {
            conn.state = ConnectionState::Handshake {
                phase: HandshakePhase::ExchangeFeatures,
                awaiting_reply: true,
            };
        }
        AtCommand::AvailableCodecs => {
            conn.codec_state = CodecSetupState::ReceivedList;
            if let ConnectionState::Handshake { .. } = conn.state {
                conn.state = ConnectionState::Handshake {
                    phase: HandshakePhase::NotifyCodecs,
                    awaiting_reply: true,
                };
            } else {
                // codec list update after the handshake, e.g. when wideband
                // setup failed on the hands-free side
                conn.ok_pending = true;
            }
        }
        AtCommand::RetrieveIndicators => {
            conn.state = ConnectionState::Handshake {
                phase: HandshakePhase::RetrieveIndicators,
                awaiting_reply: true,
            };
        }
        AtCommand::RetrieveIndicatorsStatus => {
            conn.state = ConnectionState::Handshake {
                phase: HandshakePhase::RetrieveIndicatorStatus,
                awaiting_reply: true,
            };
        }
        AtCommand::EnableIndicatorStatusUpdate => {
            if let ConnectionState::Handshake { .. } = conn.state {
                conn.state = ConnectionState::Handshake {
                    phase: HandshakePhase::EnableIndicatorUpdates,
                    awaiting_reply: true,
                };
            } else {
                conn.ok_pending = true;
            }
        }
        AtCommand::CallHoldServices => {
            conn.state = ConnectionState::Handshake {
                phase: HandshakePhase::RetrieveCallHoldServices,
                awaiting_reply: true,
            };
        }
        AtCommand::TriggerCodecSetup => {
            if conn.codec_negotiation_supported(config.ag_features) {
                conn.ok_pending = true;
                conn.codec_state = CodecSetupState::ReceivedTrigger;
                conn.establish_voice_requested = true;
            } else {
                conn.error_pending = true;
            }
        }
        AtCommand::HfConfirmedCodec => handle_codec_confirmation(config, conn),
        AtCommand::EnableIndividualIndicatorUpdate
        | AtCommand::EnableClip
        | AtCommand::EnableCallWaiting
        | AtCommand::EnableExtendedErrors
        | AtCommand::SetOperatorFormat => conn.ok_pending = true,
        AtCommand::QueryOperatorName => {
            // reply line goes out before the OK
            conn.response_pending = Some(AtCommand::QueryOperatorName);
            conn.ok_pending = true;
        }
        AtCommand::AnswerCall => {
            conn.ok_pending = true;
            emit(conn, c, Event::AnswerRequested);
        }
        AtCommand::HangUp => {
            conn.ok_pending = true;
            emit(conn, c, Event::HangUpRequested);
        }
        AtCommand::DialNumber => {
            conn.ok_pending = true;
            let number = conn.dial_number.clone();
            emit(conn, c, Event::DialRequest { number });
        }
        AtCommand::RedialLastNumber => {
            conn.ok_pending = true;
            emit(conn, c, Event::RedialRequest);
        }
        AtCommand::CallHold => {
            conn.ok_pending = true;
            emit(
                conn,
                c,
                Event::CallHoldRequested {
                    action: conn.call_hold_action,
                    index: conn.call_hold_index,
                },
            );
        }
        AtCommand::TransmitDtmf => {
            conn.ok_pending = true;
            emit(conn, c, Event::DtmfCode(conn.dtmf_code));
        }
        AtCommand::DisableEcNr => {
            if config.ag_features & ag_features::EC_NR != 0 {
                conn.ok_pending = true;
                emit(conn, c, Event::EcNrDisabled);
            } else {
                conn.error_pending = true;
            }
        }
        AtCommand::SpeakerGain => {
            conn.ok_pending = true;
            emit(conn, c, Event::SpeakerGain(conn.speaker_gain));
        }
        AtCommand::MicrophoneGain => {
            conn.ok_pending = true;
            emit(conn, c, Event::MicrophoneGain(conn.microphone_gain));
        }
        // accepted without payload; the application tracks calls itself
        AtCommand::SubscriberNumber | AtCommand::ListCurrentCalls => conn.ok_pending = true,
        AtCommand::Unknown => {
            let line = conn.parser.unknown_header.clone();
            emit(conn, c, Event::UnknownCommand { line });
            conn.error_pending = true;
        }
        _ => {}
    }
}

/// AT+BCS from the hands-free side closes (or restarts) codec selection
fn handle_codec_confirmation(config: &EngineConfig, conn: &mut Connection) {
    if conn.codec_confirmed == conn.suggested_codec && conn.suggested_codec != 0 {
        conn.ok_pending = true;
        conn.negotiated_codec = Codec::from_id(conn.codec_confirmed);
        conn.codec_state = CodecSetupState::Exchanged;
        if conn.establish_voice_requested && conn.state == ConnectionState::SessionEstablished {
            init_link_settings(config, conn, config.ag_features);
            conn.state = ConnectionState::InitiateVoiceLink;
        }
    } else {
        warn!(
            "codec confirmation mismatch: suggested {} got {}",
            conn.suggested_codec, conn.codec_confirmed
        );
        conn.error_pending = true;
        conn.codec_state = CodecSetupState::ReceivedTrigger;
    }
}

/// Send the next pending reply or unsolicited line
pub(crate) fn pump<C: Collaborators>(config: &EngineConfig, conn: &mut Connection, c: &mut C) {
    debug_assert_eq!(conn.role, Role::AudioGateway);

    if conn.error_pending {
        let code = conn.extended_error_value;
        let sent = if conn.extended_errors_enabled {
            send_line(conn, c, format_args!("\r\n+CME ERROR:{}\r\n", code))
        } else {
            send_line(conn, c, format_args!("\r\nERROR\r\n"))
        };
        if sent {
            conn.error_pending = false;
        }
        return;
    }

    if conn.ok_pending {
        let sent = match conn.response_pending {
            Some(AtCommand::QueryOperatorName) => send_line(
                conn,
                c,
                format_args!(
                    "\r\n+COPS:0,0,\"{}\"\r\n\r\nOK\r\n",
                    config.operator_name.as_str()
                ),
            ),
            _ => send_line(conn, c, format_args!("\r\nOK\r\n")),
        };
        if sent {
            conn.ok_pending = false;
            conn.response_pending = None;
        }
        return;
    }

    if let ConnectionState::Handshake {
        phase,
        awaiting_reply: true,
    } = conn.state
    {
        if send_handshake_reply(config, conn, c, phase) {
            match handshake_advance(conn, config.ag_features, phase) {
                Some(next) => {
                    conn.state = ConnectionState::Handshake {
                        phase: next,
                        awaiting_reply: false,
                    };
                }
                None => {
                    conn.state = ConnectionState::SessionEstablished;
                    info!("service level connection established");
                    emit(conn, c, Event::SessionEstablished);
                }
            }
        }
        return;
    }

    if !conn.state.session_up() {
        return;
    }

    if conn.establish_voice_requested && conn.codec_state == CodecSetupState::ReceivedTrigger {
        let id = select_codec(config, conn);
        if send_line(conn, c, format_args!("\r\n+BCS:{}\r\n", id)) {
            conn.suggested_codec = id;
            conn.codec_state = CodecSetupState::AwaitingCommonCodec;
        }
        return;
    }

    if let Some(active) = conn.send_in_band_ring {
        if send_line(conn, c, format_args!("\r\n+BSIR:{}\r\n", u8::from(active))) {
            conn.send_in_band_ring = None;
        }
        return;
    }

    if conn.indicator_updates_mode == 1 {
        let mut pending: Option<(u8, u8)> = None;
        for (i, indicator) in conn.indicators.iter_mut().enumerate() {
            if !indicator.status_changed {
                continue;
            }
            if !indicator.enabled {
                // deactivated via AT+BIA: swallow the change silently
                indicator.status_changed = false;
                continue;
            }
            pending = Some((i as u8 + 1, indicator.status));
            break;
        }
        if let Some((index, status)) = pending {
            if send_line(conn, c, format_args!("\r\n+CIEV:{},{}\r\n", index, status))
                && let Some(indicator) = conn.indicators.get_mut(usize::from(index) - 1)
            {
                indicator.status_changed = false;
            }
            return;
        }
    }

    if conn.send_ring {
        if !send_line(conn, c, format_args!("\r\nRING\r\n")) {
            return;
        }
        conn.send_ring = false;
        if conn.clip_enabled && !conn.number.is_empty() {
            let number = conn.number.clone();
            let number_type = conn.number_type;
            let _ = send_line(
                conn,
                c,
                format_args!("\r\n+CLIP: \"{}\",{}\r\n", number.as_str(), number_type),
            );
        }
        return;
    }

    if conn.send_call_waiting {
        if !conn.call_waiting_enabled {
            conn.send_call_waiting = false;
        } else {
            let number = conn.number.clone();
            let number_type = conn.number_type;
            if send_line(
                conn,
                c,
                format_args!("\r\n+CCWA: \"{}\",{},1\r\n", number.as_str(), number_type),
            ) {
                conn.send_call_waiting = false;
            }
            return;
        }
    }

    if conn.send_speaker_gain {
        let gain = conn.speaker_gain;
        if send_line(conn, c, format_args!("\r\n+VGS:{}\r\n", gain)) {
            conn.send_speaker_gain = false;
        }
        return;
    }
    if conn.send_microphone_gain {
        let gain = conn.microphone_gain;
        if send_line(conn, c, format_args!("\r\n+VGM:{}\r\n", gain)) {
            conn.send_microphone_gain = false;
        }
    }
}

fn send_handshake_reply<C: Collaborators>(
    config: &EngineConfig,
    conn: &mut Connection,
    c: &mut C,
    phase: HandshakePhase,
) -> bool {
    match phase {
        HandshakePhase::ExchangeFeatures => send_line(
            conn,
            c,
            format_args!("\r\n+BRSF:{}\r\n\r\nOK\r\n", config.ag_features),
        ),
        HandshakePhase::NotifyCodecs | HandshakePhase::EnableIndicatorUpdates => {
            send_line(conn, c, format_args!("\r\nOK\r\n"))
        }
        HandshakePhase::RetrieveIndicators => {
            let mut body: heapless::String<{ crate::constants::OUTBOUND_LINE_SIZE }> =
                heapless::String::new();
            for (i, indicator) in conn.indicators.iter().enumerate() {
                if i > 0 {
                    let _ = body.push(',');
                }
                let _ = core::fmt::write(
                    &mut body,
                    format_args!(
                        "(\"{}\",({},{}))",
                        indicator.name.as_str(),
                        indicator.min_range,
                        indicator.max_range
                    ),
                );
            }
            send_line(
                conn,
                c,
                format_args!("\r\n+CIND:{}\r\n\r\nOK\r\n", body.as_str()),
            )
        }
        HandshakePhase::RetrieveIndicatorStatus => {
            let mut body: heapless::String<64> = heapless::String::new();
            for (i, indicator) in conn.indicators.iter().enumerate() {
                if i > 0 {
                    let _ = body.push(',');
                }
                let _ = core::fmt::write(&mut body, format_args!("{}", indicator.status));
            }
            send_line(
                conn,
                c,
                format_args!("\r\n+CIND:{}\r\n\r\nOK\r\n", body.as_str()),
            )
        }
        HandshakePhase::RetrieveCallHoldServices => {
            let mut body: heapless::String<64> = heapless::String::new();
            for (i, service) in config.call_hold_services.iter().enumerate() {
                if i > 0 {
                    let _ = body.push(',');
                }
                let _ = body.push_str(service.as_str());
            }
            send_line(
                conn,
                c,
                format_args!("\r\n+CHLD:({})\r\n\r\nOK\r\n", body.as_str()),
            )
        }
    }
}

/// Pick the best codec both sides support; CVSD is the guaranteed fallback
fn select_codec(config: &EngineConfig, conn: &Connection) -> u8 {
    let esco = config.local_esco && conn.remote_esco;
    let mut best = Codec::Cvsd.id();
    if conn.msbc_failed {
        return best;
    }
    for &id in conn.remote_codecs.ids() {
        let Some(codec) = Codec::from_id(id) else {
            continue;
        };
        if !esco && !codec.works_without_esco() {
            continue;
        }
        if config.codecs.contains(codec) && id > best {
            best = id;
        }
    }
    best
}
