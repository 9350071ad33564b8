//! Adapter for the GNU `time` metrics line.
//!
//! The wrapper is invoked with [`TIME_FORMAT`], which makes it print a single line of six
//! whitespace-separated fields once the measured command exits:
//!
//! ```text
//! %E       %P   %S   %U   %K  %M
//! 0:01.52  98%  0.04 1.45 0   7412
//! ```
//!
//! Nothing outside this module knows about that layout.

use super::Measurement;

/// Elapsed, CPU%, system seconds, user seconds, average memory KB, max RSS KB.
pub const TIME_FORMAT: &str = "%E %P %S %U %K %M";

const FIELD_COUNT: usize = 6;

/// Parses the metrics line out of the wrapper's stderr.
///
/// The codec may write its own diagnostics to stderr before the wrapper does, so only the last
/// non-empty line is considered.
pub fn parse_stderr(stderr: &str) -> Result<Measurement, String> {
    let line = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .ok_or_else(|| "no metrics line on stderr".to_string())?;
    parse_line(line)
}

/// Parses one metrics line produced with [`TIME_FORMAT`].
pub fn parse_line(line: &str) -> Result<Measurement, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != FIELD_COUNT {
        return Err(format!("expected {} metric fields, found {} in '{}'", FIELD_COUNT, fields.len(), line));
    }

    let real_seconds =
        parse_elapsed(fields[0]).ok_or_else(|| format!("unrecognised elapsed time '{}'", fields[0]))?;
    if !fields[1].ends_with('%') {
        return Err(format!("unrecognised CPU percentage '{}'", fields[1]));
    }

    Ok(Measurement {
        real: fields[0].to_string(),
        real_seconds,
        cpu: fields[1].to_string(),
        sys: parse_number(fields[2], "system time")?,
        user: parse_number(fields[3], "user time")?,
        avg: parse_number(fields[4], "average memory")?,
        max: parse_number(fields[5], "maximum resident memory")?,
    })
}

/// Converts `[hours:]minutes:seconds` into seconds.
pub fn parse_elapsed(elapsed: &str) -> Option<f64> {
    let parts: Vec<&str> = elapsed.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [minutes, seconds] => ("0", *minutes, *seconds),
        [hours, minutes, seconds] => (*hours, *minutes, *seconds),
        _ => return None,
    };
    let hours: u64 = hours.parse().ok()?;
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some((hours * 3600 + minutes * 60) as f64 + seconds)
}

fn parse_number<T: std::str::FromStr>(field: &str, what: &str) -> Result<T, String> {
    field.parse().map_err(|_| format!("unrecognised {} '{}'", what, field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_elapsed_line() {
        let m = parse_line("0:00.05 87% 0.00 0.04 0 2048").unwrap();
        assert_eq!(m.real, "0:00.05");
        assert_eq!(m.real_seconds, 0.05);
        assert_eq!(m.cpu, "87%");
        assert_eq!(m.sys, 0.0);
        assert_eq!(m.user, 0.04);
        assert_eq!(m.avg, 0);
        assert_eq!(m.max, 2048);
    }

    #[test]
    fn parses_hour_elapsed() {
        let m = parse_line("1:02:03.50 100% 1.25 3700.10 512 65536").unwrap();
        assert_eq!(m.real, "1:02:03.50");
        assert_eq!(m.real_seconds, 3723.5);
        assert_eq!(m.max, 65536);
    }

    #[test]
    fn keeps_unknown_cpu_share_verbatim() {
        // GNU time prints `?%` when the elapsed time is too small to divide by.
        let m = parse_line("0:00.00 ?% 0.00 0.00 0 1024").unwrap();
        assert_eq!(m.cpu, "?%");
    }

    #[test]
    fn only_the_last_stderr_line_is_metrics() {
        let stderr = "zstd: warning: something\nCommand exited with non-zero status 1\n0:00.01 50% 0.00 0.00 0 900\n\n";
        let m = parse_stderr(stderr).unwrap();
        assert_eq!(m.max, 900);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_stderr("").is_err());
        assert!(parse_line("0:00.05 87% 0.00 0.04 0").is_err());
        assert!(parse_line("0:00.05 87 0.00 0.04 0 10").is_err());
        assert!(parse_line("soon 87% 0.00 0.04 0 10").is_err());
        assert!(parse_line("0:00.05 87% 0.00 0.04 0 lots").is_err());
        assert!(parse_line("gzip: invalid option -- '0'").is_err());
    }

    #[test]
    fn elapsed_forms() {
        assert_eq!(parse_elapsed("0:01.52"), Some(1.52));
        assert_eq!(parse_elapsed("2:00.00"), Some(120.0));
        assert_eq!(parse_elapsed("1.5"), None);
        assert_eq!(parse_elapsed("a:b:c"), None);
    }
}
