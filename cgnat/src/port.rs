// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Port ranges handed out to private hosts, and the cursor carving them sequentially out of the
//! port space of one public address.

use std::fmt::Display;
use std::num::NonZero;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortRangeError {
    #[error("invalid port ({0})")]
    InvalidPort(u16),
    #[error("port range {0}-{1} ends before it starts")]
    Inverted(u16, u16),
    #[error("malformed port range '{0}'")]
    Malformed(String),
}

/// An inclusive range of TCP/UDP ports, within [1, 65535].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRange {
    start: NonZero<u16>,
    end: NonZero<u16>,
}

impl PortRange {
    /// # Errors
    ///
    /// Fails if either bound is 0 or if `end` is lower than `start`.
    pub fn new(start: u16, end: u16) -> Result<Self, PortRangeError> {
        let start = NonZero::new(start).ok_or(PortRangeError::InvalidPort(start))?;
        let end = NonZero::new(end).ok_or(PortRangeError::InvalidPort(end))?;
        if end < start {
            return Err(PortRangeError::Inverted(start.get(), end.get()));
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn start(&self) -> u16 {
        self.start.get()
    }
    #[must_use]
    pub fn end(&self) -> u16 {
        self.end.get()
    }
    /// Number of ports in the range
    #[must_use]
    pub fn width(&self) -> u32 {
        u32::from(self.end()) - u32::from(self.start()) + 1
    }
    #[must_use]
    pub fn contains(&self, port: u16) -> bool {
        (self.start()..=self.end()).contains(&port)
    }
    #[must_use]
    pub fn overlaps(&self, other: &PortRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for PortRange {
    type Err = PortRangeError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let malformed = || PortRangeError::Malformed(input.to_string());
        let (start, end) = input.split_once('-').ok_or_else(malformed)?;
        let start = start.trim().parse::<u16>().map_err(|_| malformed())?;
        let end = end.trim().parse::<u16>().map_err(|_| malformed())?;
        PortRange::new(start, end)
    }
}

/// Hands out consecutive ranges of `width` ports starting at a base port, until the next range
/// would go past port 65535.
#[derive(Debug, Clone)]
pub(crate) struct PortCursor {
    // u32 so that the end of a range can be computed past u16::MAX
    next: u32,
    width: u32,
}

impl PortCursor {
    pub(crate) fn new(base: NonZero<u16>, width: NonZero<u16>) -> Self {
        Self {
            next: u32::from(base.get()),
            width: u32::from(width.get()),
        }
    }

    /// The end port of the next range, which may not fit in the port space
    pub(crate) fn next_end(&self) -> u32 {
        self.next + self.width - 1
    }

    /// Take the next range, or `None` if it would exceed port 65535. A cursor that returned
    /// `None` keeps doing so.
    pub(crate) fn take(&mut self) -> Option<PortRange> {
        let start = u16::try_from(self.next).ok()?;
        let end = u16::try_from(self.next_end()).ok()?;
        let range = PortRange::new(start, end).ok()?;
        self.next += self.width;
        Some(range)
    }
}

#[cfg(test)]
mod test {
    use super::{PortCursor, PortRange, PortRangeError};
    use std::num::NonZero;

    #[test]
    fn test_port_range_new() {
        let range = PortRange::new(1, 1000).unwrap();
        assert_eq!(range.width(), 1000);
        assert_eq!(range.to_string(), "1-1000");
        assert!(range.contains(1) && range.contains(1000) && !range.contains(1001));

        assert_eq!(PortRange::new(0, 10), Err(PortRangeError::InvalidPort(0)));
        assert_eq!(PortRange::new(10, 9), Err(PortRangeError::Inverted(10, 9)));
        assert_eq!(PortRange::new(65535, 65535).unwrap().width(), 1);
    }

    #[test]
    fn test_port_range_from_str() {
        assert_eq!("61001-62000".parse(), PortRange::new(61001, 62000));
        assert!("1000".parse::<PortRange>().is_err());
        assert!("1-65536".parse::<PortRange>().is_err());
        assert!("a-b".parse::<PortRange>().is_err());
        assert!("0-10".parse::<PortRange>().is_err());
    }

    #[test]
    fn test_port_range_overlaps() {
        let a = PortRange::new(1, 1000).unwrap();
        let b = PortRange::new(1000, 2000).unwrap();
        let c = PortRange::new(1001, 2000).unwrap();
        assert!(a.overlaps(&b) && b.overlaps(&a));
        assert!(!a.overlaps(&c) && !c.overlaps(&a));
    }

    #[test]
    fn test_cursor_sequence() {
        let mut cursor = PortCursor::new(NonZero::new(1).unwrap(), NonZero::new(1000).unwrap());
        let ranges: Vec<PortRange> = std::iter::from_fn(|| cursor.take()).collect();
        assert_eq!(ranges.len(), 65);
        assert_eq!(ranges[0], PortRange::new(1, 1000).unwrap());
        assert_eq!(ranges[64], PortRange::new(64001, 65000).unwrap());
        assert_eq!(cursor.next_end(), 66000);
        assert!(cursor.take().is_none());
    }

    #[test]
    fn test_cursor_full_port_space() {
        let max = NonZero::new(u16::MAX).unwrap();
        let mut cursor = PortCursor::new(NonZero::new(1).unwrap(), max);
        assert_eq!(cursor.take(), PortRange::new(1, u16::MAX).ok());
        assert!(cursor.take().is_none());

        let mut cursor = PortCursor::new(max, max);
        assert!(cursor.take().is_none());
    }

    #[test]
    fn test_cursor_ranges_are_disjoint_and_increasing() {
        bolero::check!()
            .with_type::<(u16, u16)>()
            .cloned()
            .for_each(|(base, width)| {
                let (Some(base), Some(width)) = (NonZero::new(base), NonZero::new(width)) else {
                    return;
                };
                let mut cursor = PortCursor::new(base, width);
                let ranges: Vec<PortRange> = std::iter::from_fn(|| cursor.take()).collect();
                for range in &ranges {
                    assert_eq!(range.width(), u32::from(width.get()));
                    assert!(range.start() >= base.get());
                }
                for pair in ranges.windows(2) {
                    assert!(pair[0].end() < pair[1].start());
                    assert!(!pair[0].overlaps(&pair[1]));
                }
                assert!(cursor.next_end() > u32::from(u16::MAX));
            });
    }
}
