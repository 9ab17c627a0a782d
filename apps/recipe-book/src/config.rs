//! Recipe book configuration

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use catalog::{EncoderSettings, SortKey, DEFAULT_MAX_DIMENSION};
use entities::Author;
use serde::{Deserialize, Serialize};

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Whole collection under one key in a SQLite file.
    #[default]
    Local,
    /// In-process document store with live snapshots. Nothing outlives the
    /// process.
    Sync,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Sync => "sync",
        })
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "sync" => Ok(Self::Sync),
            _ => Err(ConfigError::invalid("backend", s)),
        }
    }
}

/// Recipe book configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Persistence backend
    pub backend: Backend,

    /// SQLite file used by the local backend
    pub database_path: PathBuf,

    /// Key the local backend stores the collection under
    pub storage_key: String,

    /// Longer side bound for log photos, in pixels
    pub photo_max_dimension: u32,

    /// JPEG quality for log photos (1-100)
    pub photo_quality: u8,

    /// Sort applied by `list` when none is given
    pub default_sort: SortKey,

    /// Display name stamped on new recipes and logs
    pub user_name: Option<String>,

    /// Stable user id stamped on new recipes
    pub user_id: Option<String>,

    /// Log level
    pub log_level: String,

    /// Emit logs as JSON
    pub log_json: bool,
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("recipe-book").join("recipes.db"))
        .unwrap_or_else(|| PathBuf::from("recipes.db"))
}

fn default_storage_key() -> String {
    recipe_store::DEFAULT_STORAGE_KEY.to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        let encoder = EncoderSettings::default();
        Self {
            backend: Backend::default(),
            database_path: default_database_path(),
            storage_key: default_storage_key(),
            photo_max_dimension: encoder.max_dimension,
            photo_quality: encoder.quality,
            default_sort: SortKey::default(),
            user_name: None,
            user_id: None,
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, a config file and the environment.
    ///
    /// An explicit `path` must exist; otherwise the standard locations are
    /// searched and a missing file is fine. Environment variables win over
    /// the file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let mut config = match path.map(Path::to_path_buf).or_else(Self::find_config_file) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects photo settings outside what the encoder supports.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=DEFAULT_MAX_DIMENSION).contains(&self.photo_max_dimension) {
            return Err(ConfigError::invalid(
                "photo_max_dimension",
                &self.photo_max_dimension.to_string(),
            ));
        }
        if !(1..=100).contains(&self.photo_quality) {
            return Err(ConfigError::invalid(
                "photo_quality",
                &self.photo_quality.to_string(),
            ));
        }
        Ok(())
    }

    /// Parse a TOML config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Override fields from `RECIPE_BOOK_*` variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("RECIPE_BOOK_BACKEND") {
            self.backend = backend.parse()?;
        }

        if let Some(path) = lookup("RECIPE_BOOK_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }

        if let Some(key) = lookup("RECIPE_BOOK_STORAGE_KEY") {
            self.storage_key = key;
        }

        if let Some(max) = lookup("RECIPE_BOOK_PHOTO_MAX_DIMENSION") {
            self.photo_max_dimension = max
                .parse()
                .map_err(|_| ConfigError::invalid("photo_max_dimension", &max))?;
        }

        if let Some(quality) = lookup("RECIPE_BOOK_PHOTO_QUALITY") {
            self.photo_quality = quality
                .parse()
                .map_err(|_| ConfigError::invalid("photo_quality", &quality))?;
        }

        if let Some(sort) = lookup("RECIPE_BOOK_DEFAULT_SORT") {
            self.default_sort =
                SortKey::parse(&sort).ok_or_else(|| ConfigError::invalid("default_sort", &sort))?;
        }

        if let Some(name) = lookup("RECIPE_BOOK_USER_NAME") {
            self.user_name = Some(name);
        }

        if let Some(id) = lookup("RECIPE_BOOK_USER_ID") {
            self.user_id = Some(id);
        }

        if let Some(level) = lookup("RECIPE_BOOK_LOG_LEVEL") {
            self.log_level = level;
        }

        if let Some(val) = lookup("RECIPE_BOOK_LOG_JSON") {
            self.log_json = val
                .parse()
                .map_err(|_| ConfigError::invalid("log_json", &val))?;
        }

        Ok(())
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let locations = [
            Some(PathBuf::from("recipe-book.toml")),
            dirs::config_dir().map(|p| p.join("recipe-book").join("config.toml")),
        ];

        locations.into_iter().flatten().find(|p| p.exists())
    }

    /// Photo encoder settings
    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            max_dimension: self.photo_max_dimension,
            quality: self.photo_quality,
        }
    }

    /// The author to sign in as. The display name doubles as the id when no
    /// id is configured.
    pub fn author(&self) -> Option<Author> {
        let uid = self.user_id.clone().or_else(|| self.user_name.clone())?;
        let author = Author::new(uid);
        Some(match &self.user_name {
            Some(name) => author.with_display_name(name),
            None => author,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
        }
    }
}
