//! ALFA Reveal - Size Formatting

use serde::{Deserialize, Serialize};

/// Unit ladder used when showing byte counts to the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnits {
    /// B, KB, MB, ... (factor 1000)
    Decimal,
    /// B, KiB, MiB, ... (factor 1024)
    Binary,
}

impl Default for SizeUnits {
    fn default() -> Self {
        Self::Decimal
    }
}

impl SizeUnits {
    pub fn factor(&self) -> f64 {
        match self {
            Self::Decimal => 1000.0,
            Self::Binary => 1024.0,
        }
    }

    fn ladder(&self) -> &'static [&'static str] {
        match self {
            Self::Decimal => &["B", "KB", "MB", "GB", "TB", "PB"],
            Self::Binary => &["B", "KiB", "MiB", "GiB", "TiB", "PiB"],
        }
    }

    /// Format `bytes`: whole bytes below one unit step, two decimals above
    pub fn format(&self, bytes: u64) -> String {
        let factor = self.factor();
        let ladder = self.ladder();

        if (bytes as f64) < factor {
            return format!("{} {}", bytes, ladder[0]);
        }

        let mut value = bytes as f64;
        let mut step = 0;
        while value >= factor && step < ladder.len() - 1 {
            value /= factor;
            step += 1;
        }

        format!("{:.2} {}", value, ladder[step])
    }
}
