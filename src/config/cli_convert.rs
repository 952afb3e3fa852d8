//! CLI to Config conversion utilities

use crate::config::cli;
use crate::config::workload;
use crate::distribution::AccessPattern;
use anyhow::{Context, Result};

/// Parse a time string (e.g., "100us", "1ms", "2s") to microseconds
///
/// A bare number is taken as microseconds.
pub fn parse_time_us(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("us") {
        (n, 1u64)
    } else if let Some(n) = s.strip_suffix("ms") {
        (n, 1000)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000_000)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid time format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Time out of range: {}", s))
}

/// Convert CLI ScriptType to workload WorkloadScript
pub fn convert_script(cli_script: cli::ScriptType) -> workload::WorkloadScript {
    match cli_script {
        cli::ScriptType::NestedCreateStat => workload::WorkloadScript::NestedCreateStat,
        cli::ScriptType::Lifecycle => workload::WorkloadScript::Lifecycle,
        cli::ScriptType::PrivateMkdir => workload::WorkloadScript::PrivateMkdir,
        cli::ScriptType::SkewedStat => workload::WorkloadScript::SkewedStat,
    }
}

/// Convert CLI DistributionType to an access pattern
pub fn convert_distribution(cli_dist: cli::DistributionType, zipf_alpha: f64) -> AccessPattern {
    match cli_dist {
        cli::DistributionType::Sequential => AccessPattern::Sequential,
        cli::DistributionType::Uniform => AccessPattern::Uniform,
        cli::DistributionType::Zipf => AccessPattern::Zipf { alpha: zipf_alpha },
    }
}

/// Convert CLI ThrottleModeArg to workload ThrottleMode
pub fn convert_throttle_mode(cli_mode: cli::ThrottleModeArg) -> workload::ThrottleMode {
    match cli_mode {
        cli::ThrottleModeArg::Sleep => workload::ThrottleMode::Sleep,
        cli::ThrottleModeArg::Spin => workload::ThrottleMode::Spin,
    }
}

/// Convert CLI Backend to workload BackendType
pub fn convert_backend(cli_backend: cli::Backend) -> workload::BackendType {
    match cli_backend {
        cli::Backend::Local => workload::BackendType::Local,
        cli::Backend::Remote => workload::BackendType::Remote,
        cli::Backend::Memory => workload::BackendType::Memory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_us() {
        assert_eq!(parse_time_us("100us").unwrap(), 100);
        assert_eq!(parse_time_us("1ms").unwrap(), 1000);
        assert_eq!(parse_time_us("1s").unwrap(), 1_000_000);
        assert_eq!(parse_time_us("250").unwrap(), 250);
    }

    #[test]
    fn test_parse_time_us_invalid() {
        assert!(parse_time_us("fast").is_err());
        assert!(parse_time_us("").is_err());
    }

    #[test]
    fn test_convert_distribution() {
        assert_eq!(
            convert_distribution(cli::DistributionType::Zipf, 1.3),
            AccessPattern::Zipf { alpha: 1.3 }
        );
        assert_eq!(convert_distribution(cli::DistributionType::Uniform, 1.3), AccessPattern::Uniform);
    }
}
