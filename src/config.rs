use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

const CONFIG_PATH_REL_HOME: &str = ".config/guildbot/config.toml";
/// Environment variable that takes precedence over `general.discord_token`.
const TOKEN_ENV_VAR: &str = "TOKEN";

/// Bot configuration
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub general: General,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub reminders: Reminders,
    #[serde(default)]
    pub health: Health,
    #[serde(default)]
    pub content: Content,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct General {
    #[serde(default)]
    pub discord_token: String,
    #[serde(default)]
    pub bot_owners: Vec<String>,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
pub struct Storage {
    /// Where persisted documents live.  Defaults to `~/.config/guildbot`.
    pub data_dir: Option<PathBuf>,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct Reminders {
    pub sweep_interval_seconds: u64,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct Health {
    pub bind: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct Content {
    pub joke_url: String,
    pub quote_url: String,
    pub meme_url: String,
}

fn default_command_prefix() -> String {
    "!".to_string()
}

impl Default for Reminders {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: 60,
        }
    }
}

impl Default for Health {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Self {
            joke_url: "https://official-joke-api.appspot.com/random_joke".to_string(),
            quote_url: "https://zenquotes.io/api/random".to_string(),
            meme_url: "https://meme-api.com/gimme".to_string(),
        }
    }
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            anyhow!(
                "Could not open configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut config = Self::parse(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            config.general.discord_token = token;
        }

        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    pub async fn reload(&mut self) -> Result<()> {
        let new = Self::load().await?;
        *self = new;
        Ok(())
    }

    /// The Discord token, or an error if none was configured.
    pub fn discord_token(&self) -> Result<&str> {
        match self.general.discord_token.trim() {
            "" => Err(anyhow!(
                "No Discord token: set `general.discord_token` or the `{}` environment variable",
                TOKEN_ENV_VAR
            )),
            token => Ok(token),
        }
    }
}
