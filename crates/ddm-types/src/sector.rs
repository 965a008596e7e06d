use std::str::FromStr;

/// A human-friendly way to address a byte offset on a device, resolved to an
/// absolute byte offset via `Sector::resolve`.
///
/// Grounded on `disk-types::sector::Sector` / `SectorExt::get_sector`, kept
/// in terms of bytes rather than 512-byte sectors since the DDM core works
/// in byte offsets throughout (spec.md §3).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Sector {
    Start,
    End,
    Unit(u64),
    UnitFromEnd(u64),
    Megabyte(u64),
    MegabyteFromEnd(u64),
    Percent(u16),
}

impl Sector {
    /// Resolves this sector specification to an absolute byte offset on a
    /// device of the given total `size` in bytes, reserving a 1 MiB
    /// alignment gap at the start and end the way the teacher's
    /// `get_sector` does (`MIB2` in `disk_trait.rs`, halved here since we
    /// deal in bytes, not 512-byte sectors: one MiB head/tail clearance).
    pub fn resolve(self, size: u64) -> u64 {
        const ALIGN: u64 = 1024 * 1024;
        let end = || size.saturating_sub(ALIGN);
        let megabyte = |count: u64| count * 1_000_000;

        match self {
            Sector::Start => ALIGN,
            Sector::End => end(),
            Sector::Unit(bytes) => bytes,
            Sector::UnitFromEnd(bytes) => end().saturating_sub(bytes),
            Sector::Megabyte(count) => megabyte(count),
            Sector::MegabyteFromEnd(count) => end().saturating_sub(megabyte(count)),
            Sector::Percent(value) => {
                if value >= 100 {
                    size
                } else {
                    (size / 100) * u64::from(value)
                }
            }
        }
    }
}

impl From<u64> for Sector {
    fn from(bytes: u64) -> Sector { Sector::Unit(bytes) }
}

impl FromStr for Sector {
    type Err = &'static str;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if let Some(value) = input.strip_suffix('M') {
            if let Some(value) = value.strip_prefix('-') {
                return value.parse().map(Sector::MegabyteFromEnd).map_err(|_| "invalid megabyte value");
            }
            return value.parse().map(Sector::Megabyte).map_err(|_| "invalid megabyte value");
        }
        if let Some(value) = input.strip_suffix('%') {
            return match value.parse::<u16>() {
                Ok(v) if v <= 100 => Ok(Sector::Percent(v)),
                _ => Err("invalid percent value"),
            };
        }
        match input {
            "start" => Ok(Sector::Start),
            "end" => Ok(Sector::End),
            _ => {
                if let Some(value) = input.strip_prefix('-') {
                    value.parse().map(Sector::UnitFromEnd).map_err(|_| "invalid sector value")
                } else {
                    input.parse().map(Sector::Unit).map_err(|_| "invalid sector value")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_start_and_end() {
        let size = 100_000_000;
        assert_eq!(Sector::Start.resolve(size), 1024 * 1024);
        assert_eq!(Sector::End.resolve(size), size - 1024 * 1024);
    }

    #[test]
    fn resolve_percent() {
        assert_eq!(Sector::Percent(0).resolve(1_000_000), 0);
        assert_eq!(Sector::Percent(50).resolve(1_000_000), 500_000);
        assert_eq!(Sector::Percent(100).resolve(1_000_000), 1_000_000);
    }

    #[test]
    fn parse_units_and_suffixes() {
        assert_eq!("1024".parse::<Sector>(), Ok(Sector::Unit(1024)));
        assert_eq!("-1024".parse::<Sector>(), Ok(Sector::UnitFromEnd(1024)));
        assert_eq!("500M".parse::<Sector>(), Ok(Sector::Megabyte(500)));
        assert_eq!("-500M".parse::<Sector>(), Ok(Sector::MegabyteFromEnd(500)));
        assert_eq!("50%".parse::<Sector>(), Ok(Sector::Percent(50)));
        assert_eq!("start".parse::<Sector>(), Ok(Sector::Start));
        assert_eq!("end".parse::<Sector>(), Ok(Sector::End));
    }
}
