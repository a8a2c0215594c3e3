use serde::Deserialize;
use std::path::Path;
use std::path::PathBuf;

pub const DEALA_HOME_ENV_VAR: &str = "DEALA_HOME";
pub const DEALA_API_URL_ENV_VAR: &str = "DEALA_API_URL";

const CONFIG_TOML_FILE: &str = "config.toml";
const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

/// Runtime configuration. Values come from `$DEALA_HOME/config.toml`, with
/// environment variables taking precedence.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_base_url: String,
    pub deala_home: PathBuf,
}

#[derive(Default, Deserialize)]
struct ConfigToml {
    api_base_url: Option<String>,
}

impl Config {
    pub fn load() -> std::io::Result<Self> {
        let deala_home = find_deala_home()?;
        Self::load_from_deala_home(&deala_home)
    }

    pub fn load_from_deala_home(deala_home: &Path) -> std::io::Result<Self> {
        let config_toml = load_config_toml(deala_home)?;
        let api_base_url = env_var_non_empty(DEALA_API_URL_ENV_VAR)
            .or(config_toml.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        Ok(Self {
            api_base_url,
            deala_home: deala_home.to_path_buf(),
        })
    }
}

/// Returns the directory holding auth.json and config.toml: `$DEALA_HOME` if
/// set, otherwise `~/.deala`.
fn find_deala_home() -> std::io::Result<PathBuf> {
    if let Some(home) = env_var_non_empty(DEALA_HOME_ENV_VAR) {
        return Ok(PathBuf::from(home));
    }

    let mut home = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "could not find home directory",
        )
    })?;
    home.push(".deala");
    Ok(home)
}

fn load_config_toml(deala_home: &Path) -> std::io::Result<ConfigToml> {
    let config_path = deala_home.join(CONFIG_TOML_FILE);
    let contents = match std::fs::read_to_string(&config_path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ConfigToml::default());
        }
        Err(err) => return Err(err),
    };
    toml::from_str(&contents)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
}

fn env_var_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_config_toml_falls_back_to_defaults() -> anyhow::Result<()> {
        let deala_home = tempdir()?;
        let config = Config::load_from_deala_home(deala_home.path())?;
        assert_eq!(DEFAULT_API_BASE_URL, config.api_base_url);
        assert_eq!(deala_home.path(), config.deala_home);
        Ok(())
    }

    #[test]
    fn config_toml_sets_base_url() -> anyhow::Result<()> {
        let deala_home = tempdir()?;
        std::fs::write(
            deala_home.path().join(CONFIG_TOML_FILE),
            "api_base_url = \"https://api.deala.example\"\n",
        )?;

        let config = Config::load_from_deala_home(deala_home.path())?;
        assert_eq!("https://api.deala.example", config.api_base_url);
        Ok(())
    }

    #[test]
    fn malformed_config_toml_is_an_error() -> anyhow::Result<()> {
        let deala_home = tempdir()?;
        std::fs::write(deala_home.path().join(CONFIG_TOML_FILE), "api_base_url = [")?;

        let result = Config::load_from_deala_home(deala_home.path());
        assert!(result.is_err());
        Ok(())
    }
}
