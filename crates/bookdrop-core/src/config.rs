use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::ImportTarget, errors::Error, Result};

/// Typed configuration for the ingestion pipeline, loaded from the
/// environment (with `.env` support for local development).
#[derive(Clone, Debug)]
pub struct Config {
    // Access control
    pub allowed_user_ids: Vec<i64>,

    // Transfer policy
    pub download_folder: PathBuf,
    pub allowed_file_types: Vec<String>,
    pub max_file_size_mb: u64,

    // Remote library
    pub library_api_url: String,
    pub library_api_token: String,
    pub auto_import: bool,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub import_timeout: Duration,
    pub default_target: ImportTarget,

    // Preferences
    pub preferences_file: Option<PathBuf>,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let allowed_user_ids = parse_csv_i64(env_str("ALLOWED_USER_IDS"));
        if allowed_user_ids.is_empty() {
            return Err(Error::Config(
                "ALLOWED_USER_IDS environment variable is required".to_string(),
            ));
        }

        let download_folder =
            env_path("DOWNLOAD_FOLDER").unwrap_or_else(|| PathBuf::from("downloads"));
        fs::create_dir_all(&download_folder)?;

        let allowed_file_types = match env_str("ALLOWED_FILE_TYPES").and_then(non_empty) {
            Some(raw) => parse_csv_lower(Some(raw)),
            None => default_file_types(),
        };

        let max_file_size_mb = env_u64("MAX_FILE_SIZE_MB").unwrap_or(20);

        let library_api_url = env_str("LIBRARY_API_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_default();
        let library_api_token = env_str("LIBRARY_API_TOKEN").and_then(non_empty).unwrap_or_default();

        // Auto-import defaults to on whenever a token is configured.
        let auto_import = env_bool("AUTO_IMPORT").unwrap_or(!library_api_token.is_empty());

        let retry_attempts = env_u32("IMPORT_RETRY_ATTEMPTS").filter(|n| *n > 0).unwrap_or(3);
        let retry_delay = Duration::from_secs(
            env_u64("IMPORT_RETRY_DELAY").filter(|n| *n > 0).unwrap_or(3),
        );
        let import_timeout = Duration::from_secs(env_u64("IMPORT_TIMEOUT").unwrap_or(60));

        let default_target = ImportTarget {
            library_id: env_i64("DEFAULT_LIBRARY_ID").filter(|n| *n > 0),
            path_id: env_i64("DEFAULT_PATH_ID").filter(|n| *n > 0),
        };

        let preferences_file = env_path("PREFERENCES_FILE");

        let audit_log_path = PathBuf::from(
            env_str("AUDIT_LOG_PATH").unwrap_or("/tmp/bookdrop-audit.log".to_string()),
        );
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(false);

        Ok(Self {
            allowed_user_ids,
            download_folder,
            allowed_file_types,
            max_file_size_mb,
            library_api_url,
            library_api_token,
            auto_import,
            retry_attempts,
            retry_delay,
            import_timeout,
            default_target,
            preferences_file,
            audit_log_path,
            audit_log_json,
        })
    }

    /// True when the remote-library client has everything it needs.
    pub fn library_enabled(&self) -> bool {
        !self.library_api_url.is_empty() && !self.library_api_token.is_empty()
    }
}

fn default_file_types() -> Vec<String> {
    [
        ".pdf", ".doc", ".docx", ".txt", ".jpg", ".jpeg", ".png", ".zip", ".rar",
    ]
    .into_iter()
    .map(|s| s.to_string())
    .collect()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_i64(key: &str) -> Option<i64> {
    env_str(key).and_then(|s| s.trim().parse::<i64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn parse_csv_lower(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_csv_i64_skips_blanks_and_garbage() {
        let out = parse_csv_i64(Some("1, 2,, x, 3".to_string()));
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn parse_csv_lower_normalizes_extensions() {
        let out = parse_csv_lower(Some(" .PDF, .Epub ".to_string()));
        assert_eq!(out, vec![".pdf".to_string(), ".epub".to_string()]);
    }

    #[test]
    fn default_file_types_are_lowercased_with_dots() {
        for ext in default_file_types() {
            assert!(ext.starts_with('.'));
            assert_eq!(ext, ext.to_lowercase());
        }
    }
}
