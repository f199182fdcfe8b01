//! Parsing of `--cpu` and `--memory` arguments
//!
//! Accepts the Kubernetes quantity spellings people actually type
//! (`2`, `0.5`, `500m` for CPU; `512Mi`, `4Gi`, `4G` for memory) and
//! normalises them to millicores and MiB.

/// Parse a CPU quantity into millicores
pub fn parse_cpu(input: &str) -> Result<u32, String> {
    let input = input.trim();
    if let Some(millis) = input.strip_suffix('m') {
        return millis
            .parse::<u32>()
            .map_err(|_| format!("invalid CPU quantity '{}'", input));
    }

    let cores: f64 = input
        .parse()
        .map_err(|_| format!("invalid CPU quantity '{}'", input))?;
    if !cores.is_finite() || cores < 0.0 {
        return Err(format!("invalid CPU quantity '{}'", input));
    }

    let millis = (cores * 1000.0).round();
    if millis > u32::MAX as f64 {
        return Err(format!("CPU quantity '{}' is too large", input));
    }
    Ok(millis as u32)
}

/// Parse a memory quantity into MiB
///
/// A bare number is read as MiB.
pub fn parse_memory(input: &str) -> Result<u32, String> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid memory quantity '{}'", input))?;

    let mib = match unit {
        "" | "Mi" => Some(value),
        "Gi" => value.checked_mul(1024),
        "Ti" => value.checked_mul(1024 * 1024),
        "M" => value.checked_mul(1_000_000).map(|b| b / (1024 * 1024)),
        "G" => value.checked_mul(1_000_000_000).map(|b| b / (1024 * 1024)),
        _ => return Err(format!("unknown memory unit '{}' in '{}'", unit, input)),
    };

    mib.and_then(|m| u32::try_from(m).ok())
        .ok_or_else(|| format!("memory quantity '{}' is too large", input))
}
