//! Events emitted towards the application and the sink trait that receives
//! them. Every event is a plain value; string payloads use bounded buffers.

use crate::address::DeviceAddress;
use crate::codec::Codec;
use crate::constants::{INDICATOR_NAME_SIZE, LINE_BUFFER_SIZE, OPERATOR_NAME_SIZE, PHONE_NUMBER_SIZE};
use crate::link::{LinkSetting, SetupFailure};
use crate::{HfpError, Role};
use heapless::String;

/// Call indicator value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CallStatus {
    /// No held or active calls
    #[default]
    None,
    /// At least one call is active or held
    Present,
}

impl CallStatus {
    /// Status for a call indicator value; any non-zero value means present
    #[must_use]
    pub const fn from_value(value: u8) -> Self {
        match value {
            0 => CallStatus::None,
            _ => CallStatus::Present,
        }
    }
}

/// Callsetup indicator value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CallSetupStatus {
    /// No call establishment in progress
    #[default]
    None,
    /// Incoming call setup in progress
    Incoming,
    /// Outgoing call setup in dialing state
    Outgoing,
    /// Outgoing call setup in alerting state
    Alerting,
}

impl CallSetupStatus {
    /// Status for a callsetup indicator value; out-of-range values map to none
    #[must_use]
    pub const fn from_value(value: u8) -> Self {
        match value {
            1 => CallSetupStatus::Incoming,
            2 => CallSetupStatus::Outgoing,
            3 => CallSetupStatus::Alerting,
            _ => CallSetupStatus::None,
        }
    }

    /// Whether a ring tone would be audible in this state
    #[must_use]
    pub const fn is_ringing(self) -> bool {
        matches!(self, CallSetupStatus::Incoming | CallSetupStatus::Alerting)
    }
}

/// Callheld indicator value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CallHeldStatus {
    /// No held calls
    #[default]
    None,
    /// Call on hold while another call is active
    HeldAndActive,
    /// Call on hold, no active call
    HeldOnly,
}

impl CallHeldStatus {
    /// Status for a callheld indicator value; out-of-range values map to none
    #[must_use]
    pub const fn from_value(value: u8) -> Self {
        match value {
            1 => CallHeldStatus::HeldAndActive,
            2 => CallHeldStatus::HeldOnly,
            _ => CallHeldStatus::None,
        }
    }
}

/// Entry of a +CLCC current-calls listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CurrentCall {
    /// Call index on the gateway
    pub index: u8,
    /// 0 = outgoing, 1 = incoming
    pub direction: u8,
    /// Call state code
    pub status: u8,
    /// Bearer mode code
    pub mode: u8,
    /// Whether the call is part of a multiparty call
    pub multiparty: u8,
}

/// Notifications delivered through [`EventSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Service level connection is up; the session is usable
    SessionEstablished,
    /// Session establishment failed before completion
    SessionEstablishmentFailed {
        /// Failure classification
        reason: HfpError,
    },
    /// Service level connection was torn down
    SessionReleased,
    /// Voice link is up
    VoiceLinkEstablished {
        /// Codec in effect on the link
        codec: Codec,
        /// Negotiated quality tier
        setting: LinkSetting,
    },
    /// Voice link setup failed and no retry remains
    VoiceLinkSetupFailed {
        /// Last failure cause
        cause: SetupFailure,
    },
    /// Voice link was torn down
    VoiceLinkReleased,
    /// An AG indicator changed its value
    IndicatorChanged {
        /// 1-based indicator index
        index: u8,
        /// Indicator name
        name: String<INDICATOR_NAME_SIZE>,
        /// New value
        status: u8,
    },
    /// Aggregate call state derived from the mandatory indicators
    CallStateChanged {
        /// call indicator
        call: CallStatus,
        /// callsetup indicator
        callsetup: CallSetupStatus,
        /// callheld indicator
        callheld: CallHeldStatus,
    },
    /// Ring alerting started (incoming or remote alerting)
    RingingStarted,
    /// Ring alerting stopped
    RingingStopped,
    /// An active call appeared
    CallAnswered,
    /// The last call ended
    CallTerminated,
    /// RING line from the gateway
    RingAlert,
    /// +CLIP caller line identification
    CallerId {
        /// Phone number
        number: String<PHONE_NUMBER_SIZE>,
        /// Number type code
        number_type: u8,
    },
    /// +CCWA call waiting notification
    CallWaiting {
        /// Phone number of the waiting call
        number: String<PHONE_NUMBER_SIZE>,
        /// Number type code
        number_type: u8,
    },
    /// +COPS network operator report
    OperatorName {
        /// Registration mode
        mode: u8,
        /// Operator name
        name: String<OPERATOR_NAME_SIZE>,
    },
    /// +CNUM subscriber number report
    SubscriberNumber {
        /// Subscriber phone number
        number: String<PHONE_NUMBER_SIZE>,
        /// Number type code
        number_type: u8,
    },
    /// +CLCC current call entry
    CurrentCallListed {
        /// Parsed call entry
        call: CurrentCall,
        /// Phone number of the call
        number: String<PHONE_NUMBER_SIZE>,
        /// Number type code
        number_type: u8,
    },
    /// +CME ERROR extended error report
    ExtendedError {
        /// Error code from the gateway
        code: u8,
    },
    /// Speaker gain synchronized by the peer
    SpeakerGain(u8),
    /// Microphone gain synchronized by the peer
    MicrophoneGain(u8),
    /// In-band ring tone setting changed by the gateway
    InBandRingTone(bool),
    /// Syntactically valid but unrecognized line from the peer
    UnknownCommand {
        /// Raw header token
        line: String<LINE_BUFFER_SIZE>,
    },
    /// Peer answered the call (ATA)
    AnswerRequested,
    /// Peer hung up (AT+CHUP)
    HangUpRequested,
    /// Peer placed a call (ATD)
    DialRequest {
        /// Number to dial
        number: String<PHONE_NUMBER_SIZE>,
    },
    /// Peer requested redial of the last number (AT+BLDN)
    RedialRequest,
    /// Peer requested a call hold / multiparty action (AT+CHLD)
    CallHoldRequested {
        /// Action digit
        action: u8,
        /// Optional call index suffix
        index: Option<u8>,
    },
    /// Peer transmitted a DTMF code (AT+VTS)
    DtmfCode(u8),
    /// Peer disabled echo canceling and noise reduction (AT+NREC=0)
    EcNrDisabled,
}

/// Receiver for engine notifications.
///
/// Called synchronously from within the engine entry points; implementations
/// must not call back into the engine.
pub trait EventSink {
    /// Deliver one event for the connection identified by address and role
    fn on_event(&mut self, remote: DeviceAddress, role: Role, event: Event);
}
