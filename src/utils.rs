use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    fn app_name(self) -> &'static str {
        match self {
            Profile::Dev => "refillr-dev",
            Profile::Prod => "refillr",
        }
    }
}

/// Get the configuration directory path for refillr
/// If profile is Dev, uses "refillr-dev" instead of "refillr"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "refillr", profile.app_name())
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path for refillr, where the item file lives
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "refillr", profile.app_name())
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Join the non-empty parts with " • ", or None if nothing is left
pub fn join_bits<'a, I>(parts: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let bits: Vec<&str> = parts
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if bits.is_empty() {
        None
    } else {
        Some(bits.join(" • "))
    }
}

/// Format a quantity with at most two decimals, trimming trailing zeros
pub fn trim_quantity(value: f64) -> String {
    let s = format!("{:.2}", value);
    if let Some(whole) = s.strip_suffix(".00") {
        return whole.to_string();
    }
    if let Some(tenths) = s.strip_suffix('0') {
        return tenths.to_string();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path_without_tilde() {
        assert_eq!(expand_path("/tmp/items.json"), PathBuf::from("/tmp/items.json"));
    }

    #[test]
    fn test_join_bits_skips_empty() {
        assert_eq!(
            join_bits([Some("thorne"), None, Some("  "), Some("10,000 IU")]),
            Some("thorne • 10,000 IU".to_string())
        );
        assert_eq!(join_bits([None, Some("")]), None);
    }

    #[test]
    fn test_trim_quantity() {
        assert_eq!(trim_quantity(2.0), "2");
        assert_eq!(trim_quantity(2.5), "2.5");
        assert_eq!(trim_quantity(0.25), "0.25");
    }
}
