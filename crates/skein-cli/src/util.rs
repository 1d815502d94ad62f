use std::path::PathBuf;

use anyhow::Result;
use chrono::{Local, TimeZone};
use skein_core::constants::files;
use skein_core::CoreConfig;

/// `<platform data dir>/skein`, or `./skein_data` when there is none
pub(crate) fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|base| base.join("skein"))
        .unwrap_or_else(|| PathBuf::from("skein_data"))
}

/// Resolve the config: an explicit `--config` must exist, the implicit
/// `<data dir>/config.json` may be absent. `--data-dir` wins over the file.
pub(crate) fn load_config(data_dir: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<CoreConfig> {
    let base_dir = data_dir.clone().unwrap_or_else(default_data_dir);
    let mut config = match config_path {
        Some(path) => CoreConfig::load(&path)?,
        None => CoreConfig::load_or_default(&base_dir.join(files::CONFIG), &base_dir)?,
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    Ok(config)
}

pub(crate) fn format_date(timestamp: i64) -> String {
    match Local.timestamp_opt(timestamp, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => "????-??-?? ??:??".to_string(),
    }
}

/// First line of `body`, cut to `max_chars`
pub(crate) fn preview(body: &str, max_chars: usize) -> String {
    let line = body.lines().find(|line| !line.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() <= max_chars {
        return line.to_string();
    }
    let mut cut: String = line.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// First eight characters of `hex`
pub(crate) fn short_hex(hex: &str) -> &str {
    match hex.char_indices().nth(8) {
        Some((end, _)) => &hex[..end],
        None => hex,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_preview_takes_first_line() {
        assert_eq!(preview("\n  hello world \nsecond", 40), "hello world");
        assert_eq!(preview("", 10), "");
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("abcdefghij", 5), "abcd…");
        assert_eq!(preview("abcde", 5), "abcde");
    }

    #[test]
    fn test_short_hex() {
        assert_eq!(short_hex("0123456789abcdef"), "01234567");
        assert_eq!(short_hex("abc"), "abc");
    }

    #[test]
    fn test_short_hex_multibyte() {
        assert_eq!(short_hex("ééééééééé"), "éééééééé");
        assert_eq!(short_hex("ab\u{1F600}"), "ab\u{1F600}");
    }

    #[test]
    fn test_format_date_shape() {
        let formatted = format_date(1_700_000_000);
        assert_eq!(formatted.len(), "2023-11-14 22:13".len());
    }

    #[test]
    fn test_data_dir_flag_wins() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"dataDir": "elsewhere"}"#).unwrap();
        let config = load_config(Some(dir.path().to_path_buf()), None).unwrap();
        assert_eq!(config.data_dir, dir.path());
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempdir().unwrap();
        assert!(load_config(Some(dir.path().to_path_buf()), Some(dir.path().join("missing.json"))).is_err());
    }
}
