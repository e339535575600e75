//! Config validation: unknown-key detection with Levenshtein suggestions
//! and signal-processing range checks.
//!
//! The raw TOML is walked as a `toml::Value` tree before serde sees it, so
//! a typo such as `short_sampels` is reported with a suggestion instead of
//! being silently replaced by its default. Warnings never reject a config.

use std::collections::HashSet;

use super::MonitorConfig;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path for `MonitorConfig`.
///
/// Kept in step with the section structs in monitor_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        "sensor",
        "sensor.name",
        "sensor.sample_rate_hz",
        "sensor.batch_len",
        "windows",
        "windows.raw_samples",
        "windows.short_samples",
        "windows.long_samples",
        "spectrum",
        "spectrum.freq_limit_hz",
        "spectrogram",
        "spectrogram.rows",
        "ingest",
        "ingest.min_interval_ms",
        "ingest.policy",
        "ingest.queue_capacity",
        "server",
        "server.addr",
        "transport",
        "transport.connect_timeout_secs",
        "transport.read_timeout_secs",
        "transport.max_reconnect_attempts",
        "storage",
        "storage.path",
        "storage.flush_samples",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively collects all dotted key paths of a `toml::Value` tree.
///
/// `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Closest known key within edit distance 3, if any.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, d)| d <= 3)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation
// ============================================================================

/// Warnings for every unknown key in a raw TOML document.
///
/// Parse errors are left for serde to report.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Warnings
// ============================================================================

/// Values that are legal but probably not what the operator meant.
pub fn validate_ranges(config: &MonitorConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let nyquist = config.sensor.sample_rate_hz / 2.0;
    if config.spectrum.freq_limit_hz > nyquist {
        warnings.push(ValidationWarning {
            field: "spectrum.freq_limit_hz".to_string(),
            message: format!(
                "spectrum.freq_limit_hz = {:.1} exceeds Nyquist ({:.1} Hz); spectra stop at Nyquist",
                config.spectrum.freq_limit_hz, nyquist
            ),
            suggestion: None,
        });
    }

    if config.windows.long_samples < config.windows.short_samples {
        warnings.push(ValidationWarning {
            field: "windows.long_samples".to_string(),
            message: format!(
                "windows.long_samples ({}) is shorter than windows.short_samples ({})",
                config.windows.long_samples, config.windows.short_samples
            ),
            suggestion: None,
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein("hello", "hello"), 0);
        assert_eq!(levenshtein("sampels", "samples"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [windows]
            short_samples = 4000
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"windows".to_string()));
        assert!(keys.contains(&"windows.short_samples".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let warnings = validate_unknown_keys("[windows]\nshort_sampels = 4000\n");
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("windows.short_samples")
        );
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let toml_str = r#"
[sensor]
name = "bench"
sample_rate_hz = 400.0

[ingest]
policy = "drop_batch"

[storage]
flush_samples = 4000
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {warnings:?}");
    }

    #[test]
    fn test_unknown_section_without_close_match() {
        let warnings = validate_unknown_keys("[zzzzzzzzzzzzzz]\nq = 1\n");
        assert!(warnings.iter().any(|w| w.field == "zzzzzzzzzzzzzz"));
        assert!(warnings.iter().all(|w| w.suggestion.is_none()));
    }

    #[test]
    fn test_range_warnings() {
        let mut config = MonitorConfig::default();
        assert!(validate_ranges(&config).is_empty());

        config.spectrum.freq_limit_hz = 300.0;
        config.windows.long_samples = 100;
        let warnings = validate_ranges(&config);
        assert_eq!(warnings.len(), 2);
    }
}
