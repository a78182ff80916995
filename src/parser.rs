//! Byte-at-a-time AT command parser.
//!
//! The parser runs in four phases: header (command identification), sequence
//! (first item list), second item and third item. Bytes are processed one at
//! a time so the outcome never depends on how the transport fragments a
//! line. Double quotes suspend separator handling, spaces are ignored outside
//! the header, `(` and `)` are never stored and an `=` in the header starts a
//! one-byte lookahead that distinguishes `=?` from `=<value>`; in the latter
//! case the byte is dispatched again in the sequence phase.

use crate::command::{self, AtCommand, DIAL_PREFIX};
use crate::connection::{Connection, ConnectionState, HandshakePhase};
use crate::constants::{LINE_BUFFER_SIZE, MAX_INDICATORS, ag_features};
use crate::indicators::{Indicator, IndicatorTable};
use heapless::{String, Vec};

/// Parser phases; end of line always returns to `Header`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Phase {
    #[default]
    Header,
    Sequence,
    SecondItem,
    ThirdItem,
}

/// Per-connection parser scratch state
#[derive(Debug, Default)]
pub struct Parser {
    phase: Phase,
    buffer: Vec<u8, LINE_BUFFER_SIZE>,
    quoted: bool,
    found_equal_sign: bool,
    ignore_value: bool,
    item_index: usize,
    /// Command of the line being parsed; taken at end of line
    pub command: Option<AtCommand>,
    /// Header token of the last unrecognized line
    pub unknown_header: String<LINE_BUFFER_SIZE>,
}

impl Parser {
    /// Fresh parser in the header phase
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&mut self, byte: u8) {
        // over-long tokens are silently truncated
        let _ = self.buffer.push(byte);
    }

    fn store_if_token(&mut self, byte: u8) {
        match byte {
            b',' | b';' | b'(' | b')' | b'\n' | b'\r' => {}
            _ => self.store(byte),
        }
    }

    fn buffer_u32(&self) -> u32 {
        buffer_to_u32(&self.buffer)
    }

    fn buffer_string<const N: usize>(&self) -> String<N> {
        let mut out = String::new();
        for &b in self.buffer.iter().take(N) {
            if out.push(b as char).is_err() {
                break;
            }
        }
        out
    }
}

fn buffer_to_u32(buffer: &[u8]) -> u32 {
    let mut value: u32 = 0;
    for &b in buffer {
        if !b.is_ascii_digit() {
            break;
        }
        value = value.saturating_mul(10).saturating_add(u32::from(b - b'0'));
    }
    value
}

fn is_separator(byte: u8) -> bool {
    matches!(byte, b',' | b';' | b'\n' | b'\r')
}

/// Whether the byte terminates a line
#[must_use]
pub fn is_end_of_line(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}

/// Feed one byte into the connection's parser.
///
/// Returns the completed command when the byte ends a line that carried one;
/// the caller acts on it afterwards. All parsed payload fields are already
/// stored on the connection at that point.
pub fn parse_byte(conn: &mut Connection, byte: u8) -> Option<AtCommand> {
    let mut processed = false;
    while !processed {
        processed = parse_byte_step(conn, byte);
    }
    if is_end_of_line(byte) {
        conn.parser.item_index = 0;
        conn.parser.phase = Phase::Header;
        return conn.parser.command.take();
    }
    None
}

fn parse_byte_step(conn: &mut Connection, byte: u8) -> bool {
    // double quotes suspend separator handling
    if byte == b'"' {
        conn.parser.quoted = !conn.parser.quoted;
        return true;
    }
    if conn.parser.quoted {
        conn.parser.store(byte);
        return true;
    }

    // spaces only carry meaning inside the header ("+CME ERROR:")
    if byte == b' ' && conn.parser.phase != Phase::Header {
        return true;
    }

    match conn.parser.phase {
        Phase::Header => {
            let mut processed = true;
            match byte {
                b'\n' | b'\r' | b';' => {}
                b':' | b'?' => conn.parser.store(byte),
                b'=' => {
                    // lookahead: the next byte decides between '=?' and '=<value>'
                    conn.parser.found_equal_sign = true;
                    conn.parser.store(byte);
                    return true;
                }
                _ => {
                    if !conn.parser.found_equal_sign {
                        conn.parser.store(byte);
                        return true;
                    }
                    // value byte after '='; dispatch again in the sequence phase
                    processed = false;
                }
            }

            if conn.parser.buffer.is_empty() {
                return true;
            }

            resolve_header(conn);

            conn.parser.found_equal_sign = false;
            conn.parser.buffer.clear();
            conn.parser.phase = Phase::Sequence;
            processed
        }

        Phase::Sequence => {
            // explicit empty field, e.g. "AT+BIA=,1"
            if byte == b',' && conn.parser.buffer.is_empty() {
                conn.parser.ignore_value = true;
                parse_sequence_item(conn);
                conn.parser.ignore_value = false;
                return true;
            }

            conn.parser.store_if_token(byte);
            if !is_separator(byte) {
                return true;
            }
            if conn.parser.buffer.is_empty() {
                return true;
            }

            parse_sequence_item(conn);
            conn.parser.buffer.clear();

            match conn.parser.command {
                Some(
                    AtCommand::ClipInformation
                    | AtCommand::CallWaitingNotification
                    | AtCommand::IndicatorStatusUpdate
                    | AtCommand::QueryOperatorName
                    | AtCommand::SetOperatorFormat
                    | AtCommand::RetrieveIndicators,
                ) => conn.parser.phase = Phase::SecondItem,
                _ => {}
            }
            true
        }

        Phase::SecondItem => {
            conn.parser.store_if_token(byte);
            if !is_separator(byte) {
                return true;
            }

            parse_second_item(conn);

            conn.parser.buffer.clear();
            conn.parser.phase = Phase::ThirdItem;
            true
        }

        Phase::ThirdItem => {
            conn.parser.store_if_token(byte);
            if !is_separator(byte) {
                return true;
            }

            parse_third_item(conn);

            conn.parser.buffer.clear();
            // indicator descriptions continue with the next "(name,(min,max))" group
            if conn.parser.command == Some(AtCommand::RetrieveIndicators) {
                conn.parser.phase = Phase::Sequence;
            } else {
                conn.parser.phase = Phase::Header;
            }
            true
        }
    }
}

fn resolve_header(conn: &mut Connection) {
    let token: String<LINE_BUFFER_SIZE> = conn.parser.buffer_string();
    let mut resolved = command::lookup(token.as_str(), conn.role);

    // +CIND: means descriptions or status values depending on handshake phase
    if resolved == Some(AtCommand::RetrieveIndicatorsGeneric) {
        resolved = match conn.state {
            ConnectionState::Handshake {
                phase: HandshakePhase::RetrieveIndicators,
                awaiting_reply: true,
            } => Some(AtCommand::RetrieveIndicators),
            ConnectionState::Handshake {
                phase: HandshakePhase::RetrieveIndicatorStatus,
                awaiting_reply: true,
            } => Some(AtCommand::RetrieveIndicatorsStatus),
            _ => Some(AtCommand::Unknown),
        };
    }

    match resolved {
        Some(AtCommand::DialNumber) => {
            conn.dial_number.clear();
            for c in token.as_str().chars().skip(DIAL_PREFIX.len()) {
                if conn.dial_number.push(c).is_err() {
                    break;
                }
            }
        }
        Some(AtCommand::AvailableCodecs) => conn.remote_codecs.clear(),
        // only the HF side rebuilds its table from +CIND: descriptions; the
        // AG serves its own table and must keep it on AT+CIND=?
        Some(AtCommand::RetrieveIndicators) if conn.role == crate::Role::HandsFree => {
            conn.indicators.clear();
        }
        Some(AtCommand::CallHoldServices) if conn.role == crate::Role::HandsFree => {
            conn.call_services.clear();
        }
        Some(AtCommand::Unknown) => {
            conn.parser.unknown_header = token.clone();
        }
        _ => {}
    }

    trace!("parsed header token, command {:?}", resolved);
    conn.parser.command = resolved;
}

fn parse_sequence_item(conn: &mut Connection) {
    let value = conn.parser.buffer_u32();
    match conn.parser.command {
        Some(AtCommand::SupportedFeatures) => {
            conn.remote_features = value;
            debug!("remote supported features {:08x}", value);
        }
        Some(AtCommand::AvailableCodecs) => {
            // bounded insert; excess or duplicate peer codecs are dropped
            let _ = conn.remote_codecs.insert(value as u8);
        }
        Some(AtCommand::RetrieveIndicators) => {
            let name: String<{ crate::constants::INDICATOR_NAME_SIZE }> =
                conn.parser.buffer_string();
            let _ = conn.indicators.push(Indicator::new(name.as_str(), 0, 0, 0));
        }
        Some(AtCommand::RetrieveIndicatorsStatus) => {
            let index = conn.parser.item_index;
            if let Some(indicator) = conn.indicators.get_mut(index) {
                indicator.status = value as u8;
            }
            bump_indicator_index(conn);
        }
        Some(AtCommand::EnableIndicatorStatusUpdate) => {
            conn.parser.item_index += 1;
            // AT+CMER=3,0,0,<enable>; only the fourth value matters
            if conn.parser.item_index == 4 {
                conn.indicator_updates_mode = value as u8;
            }
        }
        Some(AtCommand::CallHoldServices) => {
            if conn.parser.buffer.len() <= 2 {
                let name: String<{ crate::constants::CALL_SERVICE_NAME_SIZE }> =
                    conn.parser.buffer_string();
                let _ = conn.call_services.push(name);
            }
        }
        Some(AtCommand::IndicatorStatusUpdate) => {
            conn.parser.item_index = IndicatorTable::clamp_wire_index(value);
        }
        Some(AtCommand::EnableIndividualIndicatorUpdate) => {
            let index = conn.parser.item_index;
            if conn.parser.ignore_value {
                // empty field: activation stays unchanged
            } else if let Some(indicator) = conn.indicators.get_mut(index) {
                if indicator.mandatory {
                    debug!("ignoring activation change for mandatory indicator");
                } else {
                    indicator.enabled = value != 0;
                }
            }
            bump_indicator_index(conn);
        }
        Some(AtCommand::QueryOperatorName) => conn.network_operator.mode = value as u8,
        Some(AtCommand::SetOperatorFormat) => {
            if conn.parser.buffer.first() != Some(&b'3') {
                warn!("unsupported operator selection parameter");
            }
        }
        Some(AtCommand::ExtendedError) => conn.extended_error_value = value as u8,
        Some(AtCommand::EnableExtendedErrors) => conn.extended_errors_enabled = value != 0,
        Some(AtCommand::AgSuggestedCodec) => conn.suggested_codec = value as u8,
        Some(AtCommand::HfConfirmedCodec) => conn.codec_confirmed = value as u8,
        Some(AtCommand::InBandRingSetting) => {
            if value != 0 {
                conn.remote_features |= ag_features::IN_BAND_RING_TONE;
            } else {
                conn.remote_features &= !ag_features::IN_BAND_RING_TONE;
            }
        }
        Some(AtCommand::MicrophoneGain) => conn.microphone_gain = (value as u8).min(15),
        Some(AtCommand::SpeakerGain) => conn.speaker_gain = (value as u8).min(15),
        Some(AtCommand::TransmitDtmf) => {
            conn.dtmf_code = conn.parser.buffer.first().copied().unwrap_or(0);
        }
        Some(AtCommand::EnableClip) => {
            conn.clip_enabled = conn.parser.buffer.first() != Some(&b'0');
        }
        Some(AtCommand::EnableCallWaiting) => {
            conn.call_waiting_enabled = conn.parser.buffer.first() != Some(&b'0');
        }
        Some(AtCommand::CallHold) => {
            let digits = &conn.parser.buffer;
            conn.call_hold_action = digits.first().map_or(0, |b| b.wrapping_sub(b'0'));
            conn.call_hold_index = if digits.len() > 1 {
                Some(buffer_to_u32(&digits[1..]) as u8)
            } else {
                None
            };
        }
        Some(AtCommand::ClipInformation | AtCommand::CallWaitingNotification) => {
            conn.number = conn.parser.buffer_string();
        }
        Some(AtCommand::SubscriberNumber) => {
            // +CNUM: <alpha>,<number>,<type>; the alpha field is empty
            match conn.parser.item_index {
                1 => conn.number = conn.parser.buffer_string(),
                2 => conn.number_type = value as u8,
                _ => {}
            }
            conn.parser.item_index += 1;
        }
        Some(AtCommand::ListCurrentCalls) => {
            match conn.parser.item_index {
                0 => conn.current_call.index = value as u8,
                1 => conn.current_call.direction = value as u8,
                2 => conn.current_call.status = value as u8,
                3 => conn.current_call.mode = value as u8,
                4 => conn.current_call.multiparty = value as u8,
                5 => conn.number = conn.parser.buffer_string(),
                6 => conn.number_type = value as u8,
                _ => {}
            }
            conn.parser.item_index += 1;
        }
        _ => {}
    }
}

fn parse_second_item(conn: &mut Connection) {
    let value = conn.parser.buffer_u32();
    match conn.parser.command {
        Some(AtCommand::QueryOperatorName | AtCommand::SetOperatorFormat) => {
            conn.network_operator.format = value as u8;
        }
        Some(AtCommand::IndicatorStatusUpdate) => {
            let index = conn.parser.item_index;
            if let Some(indicator) = conn.indicators.get_mut(index) {
                indicator.status = value as u8;
                indicator.status_changed = true;
            }
        }
        Some(AtCommand::RetrieveIndicators) => {
            let last = conn.indicators.len().saturating_sub(1);
            if let Some(indicator) = conn.indicators.get_mut(last) {
                indicator.min_range = value as u8;
            }
        }
        Some(AtCommand::ClipInformation | AtCommand::CallWaitingNotification) => {
            conn.number_type = value as u8;
        }
        _ => {}
    }
}

fn parse_third_item(conn: &mut Connection) {
    match conn.parser.command {
        Some(AtCommand::QueryOperatorName) => {
            conn.network_operator.name = conn.parser.buffer_string();
        }
        Some(AtCommand::RetrieveIndicators) => {
            let value = conn.parser.buffer_u32();
            let last = conn.indicators.len().saturating_sub(1);
            if let Some(indicator) = conn.indicators.get_mut(last) {
                indicator.max_range = value as u8;
            }
        }
        _ => {}
    }
}

fn bump_indicator_index(conn: &mut Connection) {
    if conn.parser.item_index + 1 < MAX_INDICATORS {
        conn.parser.item_index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::DeviceAddress;
    use crate::codec::Codec;
    use crate::Role;

    fn hf_conn() -> Connection {
        Connection::new(DeviceAddress::new([0; 6]), Role::HandsFree)
    }

    fn ag_conn() -> Connection {
        Connection::new(DeviceAddress::new([0; 6]), Role::AudioGateway)
    }

    fn feed(conn: &mut Connection, line: &str) -> heapless::Vec<AtCommand, 8> {
        let mut commands = heapless::Vec::new();
        for &byte in line.as_bytes() {
            if let Some(cmd) = parse_byte(conn, byte) {
                commands.push(cmd).unwrap();
            }
        }
        commands
    }

    #[test]
    fn test_hf_parses_supported_features() {
        let mut conn = hf_conn();
        let commands = feed(&mut conn, "\r\n+BRSF:871\r\n");
        assert_eq!(commands.as_slice(), &[AtCommand::SupportedFeatures]);
        assert_eq!(conn.remote_features, 871);
    }

    #[test]
    fn test_fragmentation_independence() {
        // identical outcome regardless of how the line is chunked
        let line = "\r\n+BRSF:871\r\n\r\nOK\r\n";
        for split in 1..line.len() {
            let mut conn = hf_conn();
            let mut commands = heapless::Vec::<AtCommand, 8>::new();
            for chunk in line.as_bytes().chunks(split) {
                for &byte in chunk {
                    if let Some(cmd) = parse_byte(&mut conn, byte) {
                        commands.push(cmd).unwrap();
                    }
                }
            }
            assert_eq!(
                commands.as_slice(),
                &[AtCommand::SupportedFeatures, AtCommand::Ok],
                "split size {}",
                split
            );
            assert_eq!(conn.remote_features, 871);
        }
    }

    #[test]
    fn test_ag_equal_sign_lookahead() {
        let mut conn = ag_conn();
        let commands = feed(&mut conn, "AT+BRSF=63\r\n");
        assert_eq!(commands.as_slice(), &[AtCommand::SupportedFeatures]);
        assert_eq!(conn.remote_features, 63);

        // '=?' resolves to the test form instead of dispatching a value
        let commands = feed(&mut conn, "AT+CHLD=?\r\n");
        assert_eq!(commands.as_slice(), &[AtCommand::CallHoldServices]);
    }

    #[test]
    fn test_ag_parses_codec_list() {
        let mut conn = ag_conn();
        feed(&mut conn, "AT+BAC=1,2,3\r\n");
        assert!(conn.remote_codecs.contains(Codec::Cvsd));
        assert!(conn.remote_codecs.contains(Codec::Msbc));
        assert!(conn.remote_codecs.contains(Codec::Lc3Swb));

        // a repeated announcement replaces the list
        feed(&mut conn, "AT+BAC=1\r\n");
        assert_eq!(conn.remote_codecs.len(), 1);
    }

    #[test]
    fn test_indicator_descriptions_and_status() {
        let mut conn = hf_conn();
        conn.state = ConnectionState::Handshake {
            phase: HandshakePhase::RetrieveIndicators,
            awaiting_reply: true,
        };
        let commands = feed(
            &mut conn,
            "\r\n+CIND:(\"service\",(0,1)),(\"call\",(0,1)),(\"callsetup\",(0,3))\r\n",
        );
        assert_eq!(commands.as_slice(), &[AtCommand::RetrieveIndicators]);
        assert_eq!(conn.indicators.len(), 3);
        let callsetup = conn.indicators.get(2).unwrap();
        assert_eq!(callsetup.name.as_str(), "callsetup");
        assert_eq!(callsetup.min_range, 0);
        assert_eq!(callsetup.max_range, 3);
        assert!(callsetup.mandatory);

        conn.state = ConnectionState::Handshake {
            phase: HandshakePhase::RetrieveIndicatorStatus,
            awaiting_reply: true,
        };
        let commands = feed(&mut conn, "\r\n+CIND:1,0,2\r\n");
        assert_eq!(commands.as_slice(), &[AtCommand::RetrieveIndicatorsStatus]);
        assert_eq!(conn.indicators.get(0).unwrap().status, 1);
        assert_eq!(conn.indicators.get(2).unwrap().status, 2);
    }

    #[test]
    fn test_ag_keeps_indicator_table_on_description_request() {
        let mut conn = ag_conn();
        conn.indicators.push(Indicator::new("service", 0, 1, 0));
        conn.indicators.push(Indicator::new("call", 0, 1, 0));
        let commands = feed(&mut conn, "AT+CIND=?\r\n");
        assert_eq!(commands.as_slice(), &[AtCommand::RetrieveIndicators]);
        assert_eq!(conn.indicators.len(), 2);
        assert_eq!(conn.indicators.get(0).unwrap().name.as_str(), "service");
    }

    #[test]
    fn test_cind_outside_handshake_is_unknown() {
        let mut conn = hf_conn();
        conn.state = ConnectionState::SessionEstablished;
        let commands = feed(&mut conn, "\r\n+CIND:1,0\r\n");
        assert_eq!(commands.as_slice(), &[AtCommand::Unknown]);
    }

    #[test]
    fn test_ciev_updates_and_clamps() {
        let mut conn = hf_conn();
        conn.indicators.push(Indicator::new("service", 0, 1, 0));
        conn.indicators.push(Indicator::new("call", 0, 1, 0));

        feed(&mut conn, "\r\n+CIEV:2,1\r\n");
        let call = conn.indicators.get(1).unwrap();
        assert_eq!(call.status, 1);
        assert!(call.status_changed);

        // index 0 clamps to the first entry instead of underflowing
        feed(&mut conn, "\r\n+CIEV:0,1\r\n");
        assert_eq!(conn.indicators.get(0).unwrap().status, 1);

        // out-of-range index clamps to the last valid slot without panicking
        feed(&mut conn, "\r\n+CIEV:99,1\r\n");
    }

    #[test]
    fn test_quoted_value_keeps_separators() {
        let mut conn = hf_conn();
        feed(&mut conn, "\r\n+COPS:0,0,\"Operator, Inc\"\r\n");
        assert_eq!(conn.network_operator.mode, 0);
        assert_eq!(conn.network_operator.name.as_str(), "Operator, Inc");
    }

    #[test]
    fn test_clip_number_and_type() {
        let mut conn = hf_conn();
        let commands = feed(&mut conn, "\r\n+CLIP:\"5551234\",129\r\n");
        assert_eq!(commands.as_slice(), &[AtCommand::ClipInformation]);
        assert_eq!(conn.number.as_str(), "5551234");
        assert_eq!(conn.number_type, 129);
    }

    #[test]
    fn test_call_hold_services_list() {
        let mut conn = hf_conn();
        feed(&mut conn, "\r\n+CHLD:(0,1,1x,2,2x,3)\r\n");
        assert_eq!(conn.call_services.len(), 6);
        assert_eq!(conn.call_services[2].as_str(), "1x");
    }

    #[test]
    fn test_bia_empty_field_keeps_activation() {
        let mut conn = ag_conn();
        conn.indicators.push(Indicator::new("service", 0, 1, 0));
        conn.indicators.push(Indicator::new("roam", 0, 1, 0));
        feed(&mut conn, "AT+BIA=,0\r\n");
        assert!(conn.indicators.get(0).unwrap().enabled);
        assert!(!conn.indicators.get(1).unwrap().enabled);
    }

    #[test]
    fn test_bia_cannot_disable_mandatory() {
        let mut conn = ag_conn();
        conn.indicators.push(Indicator::new("call", 0, 1, 0));
        feed(&mut conn, "AT+BIA=0\r\n");
        assert!(conn.indicators.get(0).unwrap().enabled);
    }

    #[test]
    fn test_dial_number_captured() {
        let mut conn = ag_conn();
        let commands = feed(&mut conn, "ATD5551234;\r\n");
        assert_eq!(commands.as_slice(), &[AtCommand::DialNumber]);
        assert_eq!(conn.dial_number.as_str(), "5551234");
    }

    #[test]
    fn test_call_hold_action_with_index() {
        let mut conn = ag_conn();
        feed(&mut conn, "AT+CHLD=12\r\n");
        assert_eq!(conn.call_hold_action, 1);
        assert_eq!(conn.call_hold_index, Some(2));

        feed(&mut conn, "AT+CHLD=3\r\n");
        assert_eq!(conn.call_hold_action, 3);
        assert_eq!(conn.call_hold_index, None);
    }

    #[test]
    fn test_cmer_fourth_value() {
        let mut conn = ag_conn();
        feed(&mut conn, "AT+CMER=3,0,0,1\r\n");
        assert_eq!(conn.indicator_updates_mode, 1);
    }

    #[test]
    fn test_clcc_seven_fields() {
        let mut conn = hf_conn();
        let commands = feed(&mut conn, "\r\n+CLCC:1,1,4,0,0,\"5559876\",129\r\n");
        assert_eq!(commands.as_slice(), &[AtCommand::ListCurrentCalls]);
        assert_eq!(conn.current_call.index, 1);
        assert_eq!(conn.current_call.direction, 1);
        assert_eq!(conn.current_call.status, 4);
        assert_eq!(conn.number.as_str(), "5559876");
        assert_eq!(conn.number_type, 129);
    }

    #[test]
    fn test_overlong_token_truncated_silently() {
        let mut conn = hf_conn();
        let mut line = heapless::String::<128>::new();
        line.push_str("\r\n+COPS:0,0,\"").unwrap();
        for _ in 0..60 {
            line.push('x').unwrap();
        }
        line.push_str("\"\r\n").unwrap();
        feed(&mut conn, line.as_str());
        assert_eq!(
            conn.network_operator.name.len(),
            crate::constants::OPERATOR_NAME_SIZE
        );
    }

    #[test]
    fn test_unknown_command_classified() {
        let mut conn = ag_conn();
        let commands = feed(&mut conn, "AT+XAPL=dead,1\r\n");
        assert_eq!(commands.as_slice(), &[AtCommand::Unknown]);
        assert_eq!(conn.parser.unknown_header.as_str(), "AT+XAPL=");
    }

    #[test]
    fn test_in_band_ring_bit_update() {
        let mut conn = hf_conn();
        conn.remote_features = 0;
        feed(&mut conn, "\r\n+BSIR:1\r\n");
        assert_ne!(conn.remote_features & ag_features::IN_BAND_RING_TONE, 0);
        feed(&mut conn, "\r\n+BSIR:0\r\n");
        assert_eq!(conn.remote_features & ag_features::IN_BAND_RING_TONE, 0);
    }

    #[test]
    fn test_subscriber_number_with_empty_alpha_field() {
        let mut conn = hf_conn();
        let commands = feed(&mut conn, "\r\n+CNUM: ,\"5551212\",129\r\n");
        assert_eq!(commands.as_slice(), &[AtCommand::SubscriberNumber]);
        assert_eq!(conn.number.as_str(), "5551212");
        assert_eq!(conn.number_type, 129);
    }

    #[test]
    fn test_suggested_and_confirmed_codec() {
        let mut conn = hf_conn();
        feed(&mut conn, "\r\n+BCS:2\r\n");
        assert_eq!(conn.suggested_codec, 2);

        let mut conn = ag_conn();
        feed(&mut conn, "AT+BCS=2\r\n");
        assert_eq!(conn.codec_confirmed, 2);
    }
}
