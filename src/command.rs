//! AT command identifiers and the role-scoped dispatch tables.
//!
//! Each role owns a build-time-sorted table mapping command prefixes to
//! identifiers; lookup is a binary search over the exact header token. The
//! dial command `ATD<number>;` carries a variable suffix and is matched by
//! prefix after the table lookup misses.

use crate::Role;

/// Identifier for a parsed AT command or result code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AtCommand {
    /// ERROR result code
    Error,
    /// Valid-looking but unrecognized command or response
    Unknown,
    /// OK result code
    Ok,
    /// RING alert
    Ring,
    /// AT+BRSF= / +BRSF: supported features exchange
    SupportedFeatures,
    /// AT+BAC= available codecs
    AvailableCodecs,
    /// +CIND: before phase disambiguation
    RetrieveIndicatorsGeneric,
    /// +CIND: indicator descriptions (AT+CIND=? response)
    RetrieveIndicators,
    /// +CIND: indicator status values (AT+CIND? response)
    RetrieveIndicatorsStatus,
    /// AT+CMER= indicator status update mode
    EnableIndicatorStatusUpdate,
    /// AT+BIA= individual indicator activation
    EnableIndividualIndicatorUpdate,
    /// AT+CHLD=? / +CHLD: call hold and multiparty services
    CallHoldServices,
    /// AT+CLIP= calling line notification activation
    EnableClip,
    /// +CLIP: calling line information
    ClipInformation,
    /// AT+CCWA= call waiting notification activation
    EnableCallWaiting,
    /// +CCWA: call waiting notification
    CallWaitingNotification,
    /// +CIEV: indicator status update
    IndicatorStatusUpdate,
    /// AT+COPS? / +COPS: operator query
    QueryOperatorName,
    /// AT+COPS= operator format selection
    SetOperatorFormat,
    /// AT+CMEE= extended error activation
    EnableExtendedErrors,
    /// +CME ERROR: extended error report
    ExtendedError,
    /// AT+BCC codec connection trigger
    TriggerCodecSetup,
    /// +BCS: AG suggested codec
    AgSuggestedCodec,
    /// AT+BCS= HF confirmed codec
    HfConfirmedCodec,
    /// ATA answer call
    AnswerCall,
    /// AT+CHLD= call hold action
    CallHold,
    /// AT+CHUP hang up
    HangUp,
    /// +BSIR: in-band ring tone setting change
    InBandRingSetting,
    /// ATD<number>; place call
    DialNumber,
    /// AT+BLDN redial last number
    RedialLastNumber,
    /// AT+NREC= echo canceling / noise reduction deactivation
    DisableEcNr,
    /// AT+VTS: DTMF code
    TransmitDtmf,
    /// AT+VGM= / +VGM: microphone gain
    MicrophoneGain,
    /// AT+VGS= / +VGS: speaker gain
    SpeakerGain,
    /// AT+CNUM / +CNUM: subscriber number
    SubscriberNumber,
    /// AT+CLCC / +CLCC: list current calls
    ListCurrentCalls,
}

/// Commands the Audio Gateway accepts from the Hands-Free unit.
/// Sorted by byte value for binary search.
static AG_COMMAND_TABLE: &[(&str, AtCommand)] = &[
    ("AT+BAC=", AtCommand::AvailableCodecs),
    ("AT+BCC", AtCommand::TriggerCodecSetup),
    ("AT+BCS=", AtCommand::HfConfirmedCodec),
    ("AT+BIA=", AtCommand::EnableIndividualIndicatorUpdate),
    ("AT+BLDN", AtCommand::RedialLastNumber),
    ("AT+BRSF=", AtCommand::SupportedFeatures),
    ("AT+CCWA=", AtCommand::EnableCallWaiting),
    ("AT+CHLD=", AtCommand::CallHold),
    ("AT+CHLD=?", AtCommand::CallHoldServices),
    ("AT+CHUP", AtCommand::HangUp),
    ("AT+CIND=?", AtCommand::RetrieveIndicators),
    ("AT+CIND?", AtCommand::RetrieveIndicatorsStatus),
    ("AT+CLCC", AtCommand::ListCurrentCalls),
    ("AT+CLIP=", AtCommand::EnableClip),
    ("AT+CMEE=", AtCommand::EnableExtendedErrors),
    ("AT+CMER=", AtCommand::EnableIndicatorStatusUpdate),
    ("AT+CNUM", AtCommand::SubscriberNumber),
    ("AT+COPS=", AtCommand::SetOperatorFormat),
    ("AT+COPS?", AtCommand::QueryOperatorName),
    ("AT+NREC=", AtCommand::DisableEcNr),
    ("AT+VGM=", AtCommand::MicrophoneGain),
    ("AT+VGS=", AtCommand::SpeakerGain),
    ("AT+VTS:", AtCommand::TransmitDtmf),
    ("ATA", AtCommand::AnswerCall),
];

/// Responses and unsolicited result codes the Hands-Free unit accepts from
/// the Audio Gateway. Sorted by byte value for binary search.
static HF_COMMAND_TABLE: &[(&str, AtCommand)] = &[
    ("+BCS:", AtCommand::AgSuggestedCodec),
    ("+BRSF:", AtCommand::SupportedFeatures),
    ("+BSIR:", AtCommand::InBandRingSetting),
    ("+CCWA:", AtCommand::CallWaitingNotification),
    ("+CHLD:", AtCommand::CallHoldServices),
    ("+CIEV:", AtCommand::IndicatorStatusUpdate),
    ("+CIND:", AtCommand::RetrieveIndicatorsGeneric),
    ("+CLCC:", AtCommand::ListCurrentCalls),
    ("+CLIP:", AtCommand::ClipInformation),
    ("+CME ERROR:", AtCommand::ExtendedError),
    ("+CNUM:", AtCommand::SubscriberNumber),
    ("+COPS:", AtCommand::QueryOperatorName),
    ("+VGM:", AtCommand::MicrophoneGain),
    ("+VGS:", AtCommand::SpeakerGain),
    ("ERROR", AtCommand::Error),
    ("OK", AtCommand::Ok),
    ("RING", AtCommand::Ring),
];

/// The dial command prefix; the phone number suffix is variable
pub const DIAL_PREFIX: &str = "ATD";

/// Translate a complete header token into a command identifier for the given
/// local role. Unmatched tokens that still look like protocol traffic are
/// reported as [`AtCommand::Unknown`]; everything else yields `None`.
#[must_use]
pub fn lookup(token: &str, role: Role) -> Option<AtCommand> {
    let table = match role {
        Role::AudioGateway => AG_COMMAND_TABLE,
        Role::HandsFree => HF_COMMAND_TABLE,
    };

    if let Ok(index) = table.binary_search_by(|(prefix, _)| (*prefix).cmp(token)) {
        return Some(table[index].1);
    }

    // dial-by-number carries the number in the header token itself
    if role == Role::AudioGateway && token.starts_with(DIAL_PREFIX) {
        return Some(AtCommand::DialNumber);
    }

    // valid looking, but unknown commands/responses
    match role {
        Role::AudioGateway if token.starts_with("AT+") => Some(AtCommand::Unknown),
        Role::HandsFree if token.starts_with('+') => Some(AtCommand::Unknown),
        _ => None,
    }
}
