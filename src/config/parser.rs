use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use forum_archiver::config::load_config;
///
/// let config = load_config(Path::new("archiver.toml")).unwrap();
/// println!("Archive root: {}", config.archive.root.display());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so archive runs can be matched to the settings they
/// used.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Loads a configuration and returns both the config and its hash
///
/// The file is read once, so the hash always matches the parsed content.
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_content(&content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackExchangeSite;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const USER_AGENT: &str = r#"
[user-agent]
crawler-name = "TestArchiver"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"
"#;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(USER_AGENT).unwrap();

        assert_eq!(config.crawler.item_delay_ms, 600);
        assert_eq!(config.crawler.continuation_delay_ms, 600);
        assert_eq!(config.crawler.posts_per_request, 50);
        assert_eq!(config.crawler.empty_page_retries, 60);
        assert!(!config.crawler.patrol);
        assert_eq!(config.archive.divisions, 500);
        assert_eq!(config.aops.file_prefix, "aops");
        assert_eq!(config.aops.bootstrap_marker, "AoPS.bootstrap_data");
        assert_eq!(config.stackexchange.site, StackExchangeSite::Mse);
        assert_eq!(
            config.stackexchange.effective_root(),
            "https://math.stackexchange.com"
        );
        assert!(config.stackexchange.overwrite);
        assert_eq!(config.feed.fields["site"], vec!["url", "url2site"]);
    }

    #[test]
    fn test_load_full_config() {
        let content = format!(
            r#"
[crawler]
item-delay-ms = 1500
patrol = true
hook-script = "./after.sh"
{}
[archive]
root = "/data/archive"
save-preview = true

[stackexchange]
site = "mof"
overwrite = false

[feed]
indexd-urls = ["http://a:8934/index", "http://b:8934/index"]
max-items = 10
[feed.fields]
url = ["url"]
"#,
            USER_AGENT
        );
        let file = create_temp_config(&content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.item_delay_ms, 1500);
        assert_eq!(config.crawler.hook_script.as_deref(), Some("./after.sh"));
        assert!(config.archive.save_preview);
        assert_eq!(config.stackexchange.site, StackExchangeSite::Mof);
        assert_eq!(config.stackexchange.effective_root(), "https://mathoverflow.net");
        assert!(!config.stackexchange.overwrite);
        assert_eq!(config.feed.indexd_urls.len(), 2);
        assert_eq!(config.feed.fields.len(), 1);
    }

    #[test]
    fn test_missing_user_agent_is_parse_error() {
        assert!(matches!(
            parse_config("[crawler]\npatrol = true\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_site_is_parse_error() {
        let content = format!("{}\n[stackexchange]\nsite = \"reddit\"\n", USER_AGENT);
        assert!(matches!(parse_config(&content), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = format!("{}\n[crawler]\nposts-per-request = 0\n", USER_AGENT);
        let file = create_temp_config(&content);
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_config_hash() {
        let file1 = create_temp_config(USER_AGENT);
        let file2 = create_temp_config("content 2");

        let (_, hash) = load_config_with_hash(file1.path()).unwrap();
        assert_eq!(hash, compute_config_hash(file1.path()).unwrap());
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, compute_config_hash(file2.path()).unwrap());
    }
}
