//! Constants used throughout the library: table capacities reflecting HFP
//! protocol limits, default feature sets, and codec/packet-type values.

/// Maximum number of simultaneous HFP connections
pub const MAX_CONNECTIONS: usize = 4;

/// Maximum number of AG status indicators per connection
pub const MAX_INDICATORS: usize = 10;

/// Maximum number of codecs in a local or remote codec list
pub const MAX_CODECS: usize = 10;

/// Maximum number of call hold / multiparty services (AT+CHLD=? response)
pub const MAX_CALL_SERVICES: usize = 20;

/// Maximum length of a single call hold service name, e.g. "1x"
pub const CALL_SERVICE_NAME_SIZE: usize = 3;

/// Maximum length of an indicator name / description
pub const INDICATOR_NAME_SIZE: usize = 20;

/// Maximum length of a network operator name
pub const OPERATOR_NAME_SIZE: usize = 17;

/// Maximum length of a phone number carried in CLIP/CCWA/CNUM/ATD
pub const PHONE_NUMBER_SIZE: usize = 25;

/// Parser scratch buffer capacity; longer tokens are silently truncated
pub const LINE_BUFFER_SIZE: usize = 32;

/// Capacity for one outbound AT command or response line
pub const OUTBOUND_LINE_SIZE: usize = 256;

/// Mandatory AG indicator names that the peer may not disable via AT+BIA
pub const MANDATORY_INDICATORS: [&str; 3] = ["call", "callsetup", "callheld"];

/// HF supported features bitmap positions (AT+BRSF argument)
pub mod hf_features {
    /// EC and/or NR function
    pub const EC_NR: u32 = 1 << 0;
    /// Three-way calling
    pub const THREE_WAY_CALLING: u32 = 1 << 1;
    /// CLI presentation capability
    pub const CLI_PRESENTATION: u32 = 1 << 2;
    /// Remote volume control
    pub const REMOTE_VOLUME_CONTROL: u32 = 1 << 4;
    /// Codec negotiation
    pub const CODEC_NEGOTIATION: u32 = 1 << 7;
    /// eSCO S4 (and T2) settings supported
    pub const ESCO_S4: u32 = 1 << 9;
}

/// AG supported features bitmap positions (+BRSF response)
pub mod ag_features {
    /// Three-way calling
    pub const THREE_WAY_CALLING: u32 = 1 << 0;
    /// EC and/or NR function
    pub const EC_NR: u32 = 1 << 1;
    /// In-band ring tone capability
    pub const IN_BAND_RING_TONE: u32 = 1 << 3;
    /// Ability to reject a call
    pub const REJECT_CALL: u32 = 1 << 5;
    /// Extended error result codes
    pub const EXTENDED_ERRORS: u32 = 1 << 8;
    /// Codec negotiation
    pub const CODEC_NEGOTIATION: u32 = 1 << 9;
    /// eSCO S4 (and T2) settings supported
    pub const ESCO_S4: u32 = 1 << 11;
}

/// Default HF supported features
pub const DEFAULT_HF_FEATURES: u32 = hf_features::CODEC_NEGOTIATION
    | hf_features::THREE_WAY_CALLING
    | hf_features::CLI_PRESENTATION
    | hf_features::REMOTE_VOLUME_CONTROL
    | hf_features::ESCO_S4;

/// Default AG supported features
pub const DEFAULT_AG_FEATURES: u32 = ag_features::THREE_WAY_CALLING
    | ag_features::IN_BAND_RING_TONE
    | ag_features::REJECT_CALL
    | ag_features::CODEC_NEGOTIATION
    | ag_features::ESCO_S4;

/// SCO packet type mask bits, used for the administrative packet-type filter
pub mod sco_packet_types {
    /// HV1
    pub const HV1: u16 = 0x0001;
    /// HV2
    pub const HV2: u16 = 0x0002;
    /// HV3
    pub const HV3: u16 = 0x0004;
    /// EV3
    pub const EV3: u16 = 0x0008;
    /// EV4
    pub const EV4: u16 = 0x0010;
    /// EV5
    pub const EV5: u16 = 0x0020;
    /// 2-EV3
    pub const EV3_2: u16 = 0x0040;
    /// 3-EV3
    pub const EV3_3: u16 = 0x0080;
    /// 2-EV5
    pub const EV5_2: u16 = 0x0100;
    /// 3-EV5
    pub const EV5_3: u16 = 0x0200;
    /// All packet types allowed
    pub const ALL: u16 = 0x03FF;
}
