//! Synchronous voice-link settings: the ordered tier table and the pure
//! negotiation function that selects the best tier both sides can run,
//! walking strictly downward on failure.

use crate::codec::Codec;
use crate::constants::sco_packet_types;

/// Voice-link quality tiers, ordered from lowest to highest quality.
///
/// D tiers are plain SCO, S tiers are eSCO under CVSD, T tiers are eSCO
/// under mSBC. S4 and T2 additionally require the eSCO S4 feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkSetting {
    /// SCO, HV1
    D0,
    /// SCO, HV3
    D1,
    /// eSCO, EV3
    S1,
    /// eSCO, 2-EV3
    S2,
    /// eSCO, 2-EV3, 10 ms latency
    S3,
    /// eSCO, 2-EV3, 12 ms latency, requires S4 support
    S4,
    /// eSCO, EV3, mSBC
    T1,
    /// eSCO, 2-EV3, mSBC, requires S4 support
    T2,
}

/// One row of the link-settings table; read-only at runtime
#[derive(Debug, Clone, Copy)]
pub struct LinkSettingRow {
    /// Codec this tier is defined for
    pub codec: Codec,
    /// Whether the tier requires an eSCO link
    pub esco: bool,
    /// Max latency in ms, 0xFFFF = don't care
    pub max_latency: u16,
    /// Retransmission effort, 0xFF = don't care
    pub retransmission_effort: u8,
    /// Packet type value for the link-layer setup command
    pub packet_types: u16,
    /// Packet types this tier actually uses, in [`sco_packet_types`] bits
    pub packet_mask: u16,
}

/// Tier table indexed by [`LinkSetting`] rank; values match the HFP spec
/// recommended audio parameter sets.
static LINK_SETTINGS: [LinkSettingRow; 8] = [
    // D0, HV1
    LinkSettingRow {
        codec: Codec::Cvsd,
        esco: false,
        max_latency: 0xFFFF,
        retransmission_effort: 0xFF,
        packet_types: 0x03C1,
        packet_mask: sco_packet_types::HV1,
    },
    // D1, HV3
    LinkSettingRow {
        codec: Codec::Cvsd,
        esco: false,
        max_latency: 0xFFFF,
        retransmission_effort: 0xFF,
        packet_types: 0x03C4,
        packet_mask: sco_packet_types::HV3,
    },
    // S1, EV3
    LinkSettingRow {
        codec: Codec::Cvsd,
        esco: true,
        max_latency: 0x0007,
        retransmission_effort: 0x01,
        packet_types: 0x03C8,
        packet_mask: sco_packet_types::EV3,
    },
    // S2, 2-EV3
    LinkSettingRow {
        codec: Codec::Cvsd,
        esco: true,
        max_latency: 0x0007,
        retransmission_effort: 0x01,
        packet_types: 0x0380,
        packet_mask: sco_packet_types::EV3_2,
    },
    // S3, 2-EV3
    LinkSettingRow {
        codec: Codec::Cvsd,
        esco: true,
        max_latency: 0x000A,
        retransmission_effort: 0x01,
        packet_types: 0x0380,
        packet_mask: sco_packet_types::EV3_2,
    },
    // S4, 2-EV3
    LinkSettingRow {
        codec: Codec::Cvsd,
        esco: true,
        max_latency: 0x000C,
        retransmission_effort: 0x02,
        packet_types: 0x0380,
        packet_mask: sco_packet_types::EV3_2,
    },
    // T1, EV3
    LinkSettingRow {
        codec: Codec::Msbc,
        esco: true,
        max_latency: 0x0008,
        retransmission_effort: 0x02,
        packet_types: 0x03C8,
        packet_mask: sco_packet_types::EV3,
    },
    // T2, 2-EV3
    LinkSettingRow {
        codec: Codec::Msbc,
        esco: true,
        max_latency: 0x000D,
        retransmission_effort: 0x02,
        packet_types: 0x0380,
        packet_mask: sco_packet_types::EV3_2,
    },
];

impl LinkSetting {
    const ALL: [LinkSetting; 8] = [
        LinkSetting::D0,
        LinkSetting::D1,
        LinkSetting::S1,
        LinkSetting::S2,
        LinkSetting::S3,
        LinkSetting::S4,
        LinkSetting::T1,
        LinkSetting::T2,
    ];

    /// Table row for this tier
    #[must_use]
    pub fn row(self) -> &'static LinkSettingRow {
        &LINK_SETTINGS[self as usize]
    }

    /// Rank within the ordered table, 0 = lowest quality
    #[must_use]
    pub const fn rank(self) -> usize {
        self as usize
    }

    fn from_rank(rank: usize) -> Option<Self> {
        Self::ALL.get(rank).copied()
    }
}

/// Capability inputs for tier selection, fixed for the connection lifetime
#[derive(Debug, Clone, Copy)]
pub struct LinkCapabilities {
    /// Local controller supports eSCO
    pub local_esco: bool,
    /// Remote controller supports eSCO
    pub remote_esco: bool,
    /// Both sides advertise the eSCO S4 settings feature
    pub s4_supported: bool,
    /// Administratively allowed packet types, in [`sco_packet_types`] bits
    pub allowed_packet_types: u16,
}

impl Default for LinkCapabilities {
    fn default() -> Self {
        Self {
            local_esco: true,
            remote_esco: true,
            s4_supported: true,
            allowed_packet_types: sco_packet_types::ALL,
        }
    }
}

impl LinkCapabilities {
    fn admits(&self, setting: LinkSetting, codec: Codec) -> bool {
        let row = setting.row();
        if row.esco && !(self.local_esco && self.remote_esco) {
            return false;
        }
        if matches!(setting, LinkSetting::S4 | LinkSetting::T2) && !self.s4_supported {
            return false;
        }
        if row.codec != codec {
            return false;
        }
        if row.packet_mask & self.allowed_packet_types == 0 {
            return false;
        }
        true
    }
}

/// Select the next lower tier for the given codec and capabilities.
///
/// Walks the tier table strictly downward from `current`, skipping tiers the
/// capabilities rule out, and returns the first admissible one. `None` means
/// no usable tier remains below `current`.
#[must_use]
pub fn next_link_setting(
    current: LinkSetting,
    capabilities: &LinkCapabilities,
    codec: Codec,
) -> Option<LinkSetting> {
    let mut rank = current.rank();
    while rank > 0 {
        rank -= 1;
        let setting = LinkSetting::from_rank(rank)?;
        if capabilities.admits(setting, codec) {
            return Some(setting);
        }
    }
    None
}

/// Determine the highest tier to try for the first voice-link attempt.
///
/// D1 is the baseline when nothing better is admissible, matching the
/// mandatory narrowband fallback every controller supports.
#[must_use]
pub fn initial_link_setting(capabilities: &LinkCapabilities, codec: Codec) -> LinkSetting {
    let mut rank = LINK_SETTINGS.len();
    while rank > 0 {
        rank -= 1;
        if let Some(setting) = LinkSetting::from_rank(rank) {
            if capabilities.admits(setting, codec) {
                return setting;
            }
        }
    }
    LinkSetting::D1
}

/// Voice-link setup failure causes reported by the link-layer collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetupFailure {
    /// 0x0D: connection rejected due to limited resources
    LimitedResources,
    /// 0x11: unsupported feature or parameter value
    UnsupportedParameter,
    /// 0x1F: unspecified error
    Unspecified,
    /// Peer refused the setup on the protocol level (ERROR reply to AT+BCC)
    PeerRejected,
    /// Any other failure status
    Other(u8),
}

impl SetupFailure {
    /// Classify a link-layer status code
    #[must_use]
    pub const fn from_status(status: u8) -> Self {
        match status {
            0x0D => SetupFailure::LimitedResources,
            0x11 => SetupFailure::UnsupportedParameter,
            0x1F => SetupFailure::Unspecified,
            other => SetupFailure::Other(other),
        }
    }

    /// Whether the cause permits a retry at a lower tier
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        matches!(
            self,
            SetupFailure::LimitedResources
                | SetupFailure::UnsupportedParameter
                | SetupFailure::Unspecified
        )
    }
}

/// Outcome of the failure-driven fallback decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Retry the setup at this tier with the codec unchanged
    Retry(LinkSetting),
    /// Give up on the wideband codec: renegotiate CVSD and retry at D1.
    /// Taken at most once per connection.
    SwitchToCvsd,
    /// No usable tier remains, or the cause is not recoverable
    Abandon,
}

/// Decide how to proceed after a failed voice-link setup attempt.
///
/// `wideband_already_failed` is the per-connection latch that prevents the
/// mSBC reset from being taken twice in one session.
#[must_use]
pub fn fallback_after_failure(
    failed_tier: LinkSetting,
    capabilities: &LinkCapabilities,
    codec: Codec,
    cause: SetupFailure,
    wideband_already_failed: bool,
) -> Fallback {
    if !cause.is_recoverable() {
        return Fallback::Abandon;
    }
    if let Some(setting) = next_link_setting(failed_tier, capabilities, codec) {
        return Fallback::Retry(setting);
    }
    if codec == Codec::Msbc && !wideband_already_failed {
        return Fallback::SwitchToCvsd;
    }
    Fallback::Abandon
}

/// Parameters handed to the voice-link collaborator for one setup attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkParameters {
    /// Tier the parameters were derived from
    pub setting: LinkSetting,
    /// Codec in effect for the link
    pub codec: Codec,
    /// Max latency in ms
    pub max_latency: u16,
    /// Retransmission effort
    pub retransmission_effort: u8,
    /// Link-layer packet type value
    pub packet_types: u16,
    /// Transparent air mode, set for wideband codecs
    pub transparent_data: bool,
}

impl LinkParameters {
    /// Derive setup parameters from a tier and the codec in effect
    #[must_use]
    pub fn for_setting(setting: LinkSetting, codec: Codec) -> Self {
        let row = setting.row();
        Self {
            setting,
            codec,
            max_latency: row.max_latency,
            retransmission_effort: row.retransmission_effort,
            packet_types: row.packet_types,
            transparent_data: codec != Codec::Cvsd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_caps() -> LinkCapabilities {
        LinkCapabilities::default()
    }

    #[test]
    fn test_initial_setting_prefers_best_tier() {
        assert_eq!(
            initial_link_setting(&full_caps(), Codec::Cvsd),
            LinkSetting::S4
        );
        assert_eq!(
            initial_link_setting(&full_caps(), Codec::Msbc),
            LinkSetting::T2
        );
    }

    #[test]
    fn test_initial_setting_without_s4() {
        let caps = LinkCapabilities {
            s4_supported: false,
            ..full_caps()
        };
        assert_eq!(initial_link_setting(&caps, Codec::Cvsd), LinkSetting::S3);
        assert_eq!(initial_link_setting(&caps, Codec::Msbc), LinkSetting::T1);
    }

    #[test]
    fn test_initial_setting_without_esco() {
        let caps = LinkCapabilities {
            remote_esco: false,
            ..full_caps()
        };
        assert_eq!(initial_link_setting(&caps, Codec::Cvsd), LinkSetting::D1);
        // no mSBC tier works without eSCO; baseline applies
        assert_eq!(initial_link_setting(&caps, Codec::Msbc), LinkSetting::D1);
    }

    #[test]
    fn test_next_setting_strictly_decreasing() {
        let caps = full_caps();
        let mut current = LinkSetting::S4;
        let mut seen = heapless::Vec::<LinkSetting, 8>::new();
        while let Some(next) = next_link_setting(current, &caps, Codec::Cvsd) {
            assert!(next.rank() < current.rank());
            seen.push(next).unwrap();
            current = next;
        }
        assert_eq!(
            seen.as_slice(),
            &[
                LinkSetting::S3,
                LinkSetting::S2,
                LinkSetting::S1,
                LinkSetting::D1,
                LinkSetting::D0
            ]
        );
    }

    #[test]
    fn test_next_setting_skips_wrong_codec() {
        // below T1 there is no mSBC tier at all
        assert_eq!(next_link_setting(LinkSetting::T1, &full_caps(), Codec::Msbc), None);
        assert_eq!(
            next_link_setting(LinkSetting::T2, &full_caps(), Codec::Msbc),
            Some(LinkSetting::T1)
        );
    }

    #[test]
    fn test_next_setting_packet_type_filter() {
        // with 2-EV3 disallowed, S4/S3/S2 are all skipped
        let caps = LinkCapabilities {
            allowed_packet_types: sco_packet_types::ALL & !sco_packet_types::EV3_2,
            ..full_caps()
        };
        assert_eq!(
            next_link_setting(LinkSetting::S4, &caps, Codec::Cvsd),
            Some(LinkSetting::S1)
        );
    }

    #[test]
    fn test_fallback_recoverable_walks_down() {
        let outcome = fallback_after_failure(
            LinkSetting::S4,
            &full_caps(),
            Codec::Cvsd,
            SetupFailure::Unspecified,
            false,
        );
        assert_eq!(outcome, Fallback::Retry(LinkSetting::S3));
    }

    #[test]
    fn test_fallback_fatal_cause_abandons() {
        let outcome = fallback_after_failure(
            LinkSetting::S4,
            &full_caps(),
            Codec::Cvsd,
            SetupFailure::Other(0x04),
            false,
        );
        assert_eq!(outcome, Fallback::Abandon);
    }

    #[test]
    fn test_fallback_wideband_reset_taken_once() {
        let outcome = fallback_after_failure(
            LinkSetting::T1,
            &full_caps(),
            Codec::Msbc,
            SetupFailure::UnsupportedParameter,
            false,
        );
        assert_eq!(outcome, Fallback::SwitchToCvsd);

        let outcome = fallback_after_failure(
            LinkSetting::T1,
            &full_caps(),
            Codec::Msbc,
            SetupFailure::UnsupportedParameter,
            true,
        );
        assert_eq!(outcome, Fallback::Abandon);
    }

    #[test]
    fn test_fallback_bottom_of_table_abandons() {
        let outcome = fallback_after_failure(
            LinkSetting::D0,
            &full_caps(),
            Codec::Cvsd,
            SetupFailure::LimitedResources,
            false,
        );
        assert_eq!(outcome, Fallback::Abandon);
    }

    #[test]
    fn test_link_parameters_transparent_for_wideband() {
        let params = LinkParameters::for_setting(LinkSetting::T2, Codec::Msbc);
        assert!(params.transparent_data);
        assert_eq!(params.max_latency, 0x000D);
        assert_eq!(params.packet_types, 0x0380);

        let params = LinkParameters::for_setting(LinkSetting::S1, Codec::Cvsd);
        assert!(!params.transparent_data);
        assert_eq!(params.packet_types, 0x03C8);
    }
}
