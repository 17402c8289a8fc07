use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Hybrid logical timestamp of an entry or page.
///
/// Field order is the comparison order: wall-clock milliseconds, then the
/// logical counter, then the node id as a final tie-break. All timestamps of
/// one ledger come from one clock and are therefore strictly increasing.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemporalAnchor {
    pub physical_ms: u64,
    pub logical: u32,
    pub node_id: u16,
}

impl TemporalAnchor {
    pub fn new(physical_ms: u64, logical: u32, node_id: u16) -> Self {
        Self {
            physical_ms,
            logical,
            node_id,
        }
    }
}

impl fmt::Debug for TemporalAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TemporalAnchor({self})")
    }
}

/// `<physical_ms>.<logical>.n<node_id>`: the form hashed into entries and
/// pages, so it must never change.
impl fmt::Display for TemporalAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.n{}", self.physical_ms, self.logical, self.node_id)
    }
}

impl FromStr for TemporalAnchor {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidTimestamp(s.to_string());
        let mut parts = s.split('.');
        let (Some(physical), Some(logical), Some(node), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        let node = node.strip_prefix('n').ok_or_else(invalid)?;
        Ok(Self::new(
            physical.parse().map_err(|_| invalid())?,
            logical.parse().map_err(|_| invalid())?,
            node.parse().map_err(|_| invalid())?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_physical_then_logical_then_node() {
        let mut anchors = vec![
            TemporalAnchor::new(200, 0, 0),
            TemporalAnchor::new(100, 2, 0),
            TemporalAnchor::new(100, 1, 9),
            TemporalAnchor::new(100, 1, 3),
        ];
        anchors.sort();
        assert_eq!(
            anchors,
            vec![
                TemporalAnchor::new(100, 1, 3),
                TemporalAnchor::new(100, 1, 9),
                TemporalAnchor::new(100, 2, 0),
                TemporalAnchor::new(200, 0, 0),
            ]
        );
    }

    #[test]
    fn canonical_form() {
        let anchor = TemporalAnchor::new(1_700_000_000_123, 5, 3);
        assert_eq!(anchor.to_string(), "1700000000123.5.n3");
        assert_eq!(format!("{anchor:?}"), "TemporalAnchor(1700000000123.5.n3)");
        assert_eq!("1700000000123.5.n3".parse::<TemporalAnchor>(), Ok(anchor));
    }

    #[test]
    fn rejects_malformed_strings() {
        for s in ["", "1.2", "1.2.3", "1.2.n", "1.2.n3.4", "x.2.n3", "1.-2.n3", "1.2.n70000"] {
            assert_eq!(
                s.parse::<TemporalAnchor>(),
                Err(TypeError::InvalidTimestamp(s.to_string())),
                "{s}"
            );
        }
    }
}
