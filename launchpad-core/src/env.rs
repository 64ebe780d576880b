use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use crate::errors::ConfigError;

static ENV_VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex is valid")
});

/// Expand `${VAR}` references using `env` only. Unknown variables expand to
/// the empty string, like an unset shell variable.
pub fn expand_env(s: &str, env: &HashMap<String, String>) -> String {
    ENV_VAR_REGEX
        .replace_all(s, |caps: &regex::Captures| {
            env.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Load variables from a dotenv file
pub fn load_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::EnvFileNotFound(path.to_path_buf()));
    }

    let mut env = HashMap::new();
    let iter = dotenvy::from_path_iter(path).map_err(|e| ConfigError::EnvFileParse {
        path: path.to_path_buf(),
        source: e,
    })?;

    for item in iter {
        let (key, value) = item.map_err(|e| ConfigError::EnvFileParse {
            path: path.to_path_buf(),
            source: e,
        })?;
        env.insert(key, value);
    }

    Ok(env)
}

/// Layer `file_env` underneath `process_env`: the process environment wins,
/// so `docker run -e` always overrides a baked-in env file.
pub fn merge_under(
    process_env: HashMap<String, String>,
    file_env: HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = file_env;
    merged.extend(process_env);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_expand_known_and_unknown() {
        let vars = env(&[("HOST", "0.0.0.0"), ("PORT", "8000")]);
        assert_eq!(expand_env("--bind=${HOST}:${PORT}", &vars), "--bind=0.0.0.0:8000");
        assert_eq!(expand_env("${MISSING}x", &vars), "x");
        assert_eq!(expand_env("$HOST", &vars), "$HOST");
    }

    #[test]
    fn test_load_env_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("launchpad.env");
        std::fs::write(
            &path,
            "# deployment defaults\nLAUNCHPAD_REPO_URL=https://example.com/r.git\nLAUNCHPAD_PORT=9000\n",
        )
        .unwrap();

        let loaded = load_env_file(&path).unwrap();
        assert_eq!(loaded.get("LAUNCHPAD_REPO_URL").unwrap(), "https://example.com/r.git");
        assert_eq!(loaded.get("LAUNCHPAD_PORT").unwrap(), "9000");
    }

    #[test]
    fn test_load_missing_env_file() {
        let temp = TempDir::new().unwrap();
        let err = load_env_file(&temp.path().join("absent.env")).unwrap_err();
        assert!(matches!(err, ConfigError::EnvFileNotFound(_)));
    }

    #[test]
    fn test_process_env_wins() {
        let merged = merge_under(
            env(&[("LAUNCHPAD_PORT", "8080")]),
            env(&[("LAUNCHPAD_PORT", "9000"), ("LAUNCHPAD_HOST", "127.0.0.1")]),
        );
        assert_eq!(merged.get("LAUNCHPAD_PORT").unwrap(), "8080");
        assert_eq!(merged.get("LAUNCHPAD_HOST").unwrap(), "127.0.0.1");
    }
}
