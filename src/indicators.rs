//! AG status indicators: named, ranged values exchanged during service level
//! connection setup and updated by unsolicited +CIEV messages.

use crate::constants::{INDICATOR_NAME_SIZE, MANDATORY_INDICATORS, MAX_INDICATORS};
use heapless::{String, Vec};

/// One AG status indicator
#[derive(Debug, Clone, Default)]
pub struct Indicator {
    /// Indicator name, e.g. "call" or "battchg"
    pub name: String<INDICATOR_NAME_SIZE>,
    /// Lowest valid value
    pub min_range: u8,
    /// Highest valid value
    pub max_range: u8,
    /// Current value
    pub status: u8,
    /// Whether the peer may not disable this indicator via AT+BIA
    pub mandatory: bool,
    /// Whether status change notifications are active
    pub enabled: bool,
    /// Set when an unsolicited update changed the status
    pub status_changed: bool,
}

impl Indicator {
    /// Create a named indicator with the given range and initial value
    #[must_use]
    pub fn new(name: &str, min_range: u8, max_range: u8, status: u8) -> Self {
        let mut truncated = String::new();
        for c in name.chars().take(INDICATOR_NAME_SIZE) {
            if truncated.push(c).is_err() {
                break;
            }
        }
        let mandatory = MANDATORY_INDICATORS.contains(&truncated.as_str());
        Self {
            name: truncated,
            min_range,
            max_range,
            status,
            mandatory,
            enabled: true,
            status_changed: false,
        }
    }
}

/// Fixed-capacity indicator table; indices on the wire are 1-based
#[derive(Debug, Clone, Default)]
pub struct IndicatorTable {
    entries: Vec<Indicator, MAX_INDICATORS>,
}

impl IndicatorTable {
    /// Empty table
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an indicator; a full table rejects the insert
    pub fn push(&mut self, indicator: Indicator) -> bool {
        self.entries.push(indicator).is_ok()
    }

    /// Number of indicators
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no indicators
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indicator at the given 0-based position
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Indicator> {
        self.entries.get(index)
    }

    /// Mutable indicator at the given 0-based position
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Indicator> {
        self.entries.get_mut(index)
    }

    /// Find an indicator position by name
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|i| i.name.as_str() == name)
    }

    /// Iterate over the indicators
    pub fn iter(&self) -> impl Iterator<Item = &Indicator> {
        self.entries.iter()
    }

    /// Iterate mutably over the indicators
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Indicator> {
        self.entries.iter_mut()
    }

    /// Remove all indicators
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Clamp a 1-based wire index to a valid 0-based table position.
    ///
    /// Out-of-range indices are clamped rather than rejected: index 0 maps to
    /// the first entry, anything past the capacity maps to the last valid
    /// slot. Mirrors the tolerant handling required for non-conforming peers.
    #[must_use]
    pub fn clamp_wire_index(index: u32) -> usize {
        if index as usize > MAX_INDICATORS {
            warn!("indicator index {} exceeds table capacity", index);
            return MAX_INDICATORS - 1;
        }
        if index == 0 {
            warn!("indicator index 0 is invalid");
            return 0;
        }
        (index - 1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mandatory_detection() {
        assert!(Indicator::new("call", 0, 1, 0).mandatory);
        assert!(Indicator::new("callsetup", 0, 3, 0).mandatory);
        assert!(Indicator::new("callheld", 0, 2, 0).mandatory);
        assert!(!Indicator::new("battchg", 0, 5, 5).mandatory);
    }

    #[test]
    fn test_name_truncation() {
        let indicator = Indicator::new("averyveryverylongindicatorname", 0, 1, 0);
        assert_eq!(indicator.name.len(), INDICATOR_NAME_SIZE);
    }

    #[test]
    fn test_table_bounded() {
        let mut table = IndicatorTable::new();
        for i in 0..MAX_INDICATORS {
            assert!(table.push(Indicator::new("signal", 0, 5, i as u8)));
        }
        assert!(!table.push(Indicator::new("extra", 0, 1, 0)));
        assert_eq!(table.len(), MAX_INDICATORS);
    }

    #[test]
    fn test_clamp_wire_index() {
        assert_eq!(IndicatorTable::clamp_wire_index(1), 0);
        assert_eq!(IndicatorTable::clamp_wire_index(4), 3);
        assert_eq!(IndicatorTable::clamp_wire_index(0), 0);
        assert_eq!(
            IndicatorTable::clamp_wire_index(MAX_INDICATORS as u32 + 5),
            MAX_INDICATORS - 1
        );
    }

    #[test]
    fn test_position_by_name() {
        let mut table = IndicatorTable::new();
        table.push(Indicator::new("service", 0, 1, 1));
        table.push(Indicator::new("call", 0, 1, 0));
        assert_eq!(table.position("call"), Some(1));
        assert_eq!(table.position("roam"), None);
    }
}
