use std::fmt;
use std::ops::Add;

use crate::select::ScanStats;

/// Summary of a single filter run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterStat {
    pub record_events: usize,
    pub bytes_written: usize,
    pub scan: Option<ScanStats>,
}

impl Add<&[u8]> for FilterStat {
    type Output = FilterStat;

    fn add(mut self, payload: &[u8]) -> Self {
        self.record_events += 1;
        self.bytes_written += payload.len();
        self
    }
}

impl fmt::Display for FilterStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "Summary")?;
        writeln!(f, "{:19} {}", "Record events:", self.record_events)?;
        writeln!(f, "{:19} {}", "Bytes written:", self.bytes_written)?;

        if let Some(scan) = self.scan {
            writeln!(f, "{:19} {}", "Bytes scanned:", scan.bytes_scanned)?;
            writeln!(f, "{:19} {}", "Bytes processed:", scan.bytes_processed)?;
            writeln!(f, "{:19} {}", "Bytes returned:", scan.bytes_returned)?;
        }

        Ok(())
    }
}
