use std::path::Path;

use anyhow::{Context, Result, bail};
use tc_core::sample::{SAMPLE_COLUMNS, Sample};

/// Read a per-class sample file.
///
/// One row per sampling interval, four whitespace-separated counters:
/// `bytes_up bytes_down packets_up packets_down`. Blank lines are skipped.
///
/// # Errors
/// Returns an error if the file cannot be read or a row is malformed.
///
/// # Example
/// ```no_run
/// use tc_features::dataset::read_samples;
/// let samples = read_samples("datasets/youtube.dat").unwrap();
/// ```
pub fn read_samples(path: impl AsRef<Path>) -> Result<Vec<Sample>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot open dataset file: {}", path.display()))?;
    let samples =
        parse_samples(&content).with_context(|| format!("Malformed dataset: {}", path.display()))?;

    log::info!("Read {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

/// Parse dataset text into samples.
///
/// # Errors
/// Returns an error naming the first malformed line (1-based).
pub fn parse_samples(content: &str) -> Result<Vec<Sample>> {
    let mut samples = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut values = [0u64; SAMPLE_COLUMNS];
        let mut count = 0;
        for token in line.split_whitespace() {
            if count == SAMPLE_COLUMNS {
                bail!("line {}: more than {SAMPLE_COLUMNS} columns", idx + 1);
            }
            values[count] = parse_counter(token)
                .with_context(|| format!("line {}: invalid counter '{token}'", idx + 1))?;
            count += 1;
        }
        if count != SAMPLE_COLUMNS {
            bail!(
                "line {}: expected {SAMPLE_COLUMNS} columns, found {count}",
                idx + 1
            );
        }

        samples.push(Sample::from(values));
    }

    Ok(samples)
}

/// Counters are integers; `12.0` style values written by float tooling are accepted.
fn parse_counter(token: &str) -> Result<u64> {
    if let Ok(v) = token.parse::<u64>() {
        return Ok(v);
    }
    let v: f64 = token.parse().context("not a number")?;
    if !v.is_finite() || v < 0.0 || v.fract() != 0.0 {
        bail!("not a non-negative integer");
    }
    Ok(v as u64)
}
