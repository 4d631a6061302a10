//! Loading and saving `videomaker.toml`.
//!
//! Writes go through a sibling `.toml.tmp` file that is renamed over the
//! real one. A file with missing keys or stale tables is normalized on load.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{DocumentMut, Item, Table};

use super::settings::{ConfigSection, Settings};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot access config file: {0}")]
    Io(#[from] io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config document: {0}")]
    Document(#[from] toml_edit::TomlError),

    #[error("no config file at {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Owns the settings together with the file they came from.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Starts from defaults; nothing is read until `load` or `load_or_create`.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// In-memory edits; persist them with `save` or `update_section`.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Strict load: the file has to exist.
    pub fn load(&mut self) -> ConfigResult<()> {
        let text = self.read_existing()?.ok_or_else(|| ConfigError::NotFound(self.config_path.clone()))?;
        self.settings = toml::from_str(&text)?;
        Ok(())
    }

    /// Load, writing a default file first when there is none. An existing
    /// file that lacks keys or carries unknown tables is rewritten in full.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        let Some(text) = self.read_existing()? else {
            self.settings = Settings::default();
            self.save()?;
            tracing::info!(path = %self.config_path.display(), "wrote default config");
            return Ok(());
        };

        let (settings, needs_rewrite) = Self::parse_and_clean(&text)?;
        self.settings = settings;
        if needs_rewrite {
            tracing::debug!(path = %self.config_path.display(), "normalizing config");
            self.save()?;
        }
        Ok(())
    }

    /// Create the output, plan and log folders named in `[paths]`.
    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        let paths = &self.settings.paths;
        [&paths.output_folder, &paths.plans_folder, &paths.logs_folder]
            .into_iter()
            .try_for_each(fs::create_dir_all)?;
        Ok(())
    }

    pub fn logs_folder(&self) -> PathBuf {
        PathBuf::from(&self.settings.paths.logs_folder)
    }

    /// Write every table, each preceded by its comment.
    pub fn save(&self) -> ConfigResult<()> {
        let mut text = String::from(
            "# VideoMaker Configuration\n# API keys are read from the environment variables named below.\n",
        );
        for section in ConfigSection::all() {
            text.push_str(&format!("\n# {}\n[{}]\n", section.comment(), section.table_name()));
            text.push_str(&self.section_toml(*section)?);
            if !text.ends_with('\n') {
                text.push('\n');
            }
        }
        self.atomic_write(&text)?;
        Ok(())
    }

    /// Replace one table in the file on disk. Everything else in the file,
    /// comments included, stays as it was.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        let mut doc = match self.read_existing()? {
            Some(text) if !text.trim().is_empty() => text.parse::<DocumentMut>()?,
            _ => DocumentMut::new(),
        };

        let replacement: DocumentMut = self.section_toml(section)?.parse()?;
        let table: Table = replacement.as_table().clone();
        doc[section.table_name()] = Item::Table(table);

        self.atomic_write(&doc.to_string())?;
        Ok(())
    }

    fn read_existing(&self) -> ConfigResult<Option<String>> {
        match fs::read_to_string(&self.config_path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Parse `text` and report whether writing it back would change it.
    fn parse_and_clean(text: &str) -> ConfigResult<(Settings, bool)> {
        let doc: DocumentMut = text.parse()?;
        let settings: Settings = toml::from_str(text)?;
        let known = |name: &str| ConfigSection::all().iter().any(|s| s.table_name() == name);

        let stale_table = doc.iter().any(|(name, _)| !known(name));

        let complete: DocumentMut = toml::to_string_pretty(&settings)?.parse()?;
        let missing_key = ConfigSection::all().iter().any(|section| {
            let name = section.table_name();
            let Some(expected) = complete.get(name).and_then(Item::as_table) else {
                return false;
            };
            match doc.get(name).and_then(Item::as_table) {
                Some(present) => expected.iter().any(|(key, _)| !present.contains_key(key)),
                None => true,
            }
        });

        Ok((settings, stale_table || missing_key))
    }

    fn section_toml(&self, section: ConfigSection) -> ConfigResult<String> {
        let s = &self.settings;
        Ok(match section {
            ConfigSection::Paths => toml::to_string_pretty(&s.paths)?,
            ConfigSection::Logging => toml::to_string_pretty(&s.logging)?,
            ConfigSection::Planning => toml::to_string_pretty(&s.planning)?,
            ConfigSection::Speech => toml::to_string_pretty(&s.speech)?,
            ConfigSection::Video => toml::to_string_pretty(&s.video)?,
            ConfigSection::Retry => toml::to_string_pretty(&s.retry)?,
            ConfigSection::Composition => toml::to_string_pretty(&s.composition)?,
        })
    }

    fn atomic_write(&self, text: &str) -> io::Result<()> {
        if let Some(dir) = self.config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.config_path.with_extension("toml.tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.config_path)
    }
}
