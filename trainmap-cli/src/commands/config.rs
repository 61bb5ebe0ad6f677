//! `trainmap config`: inspect and edit `~/.trainmap/config.ini`.
//!
//! Settings are addressed as `section.key`. Every subcommand fails on a file
//! that does not parse instead of falling back to defaults.

use std::path::Path;

use clap::Subcommand;
use console::style;
use trainmap::config::{config_file_path, ConfigError, ConfigFile, ConfigKey};

use crate::error::CliError;

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print one setting, e.g. `display.timezone`
    Get { key: String },

    /// Validate and store one setting
    Set { key: String, value: String },

    /// Restore one setting to its built-in default
    Reset { key: String },

    /// Show every setting, marking the ones changed from the defaults
    List,

    /// Show where the file lives and whether it exists yet
    Path,
}

pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    let path = config_file_path();
    match command {
        ConfigCommands::Get { key } => {
            let key: ConfigKey = key.parse()?;
            let config = ConfigFile::load_from(&path)?;
            println!("{}", shown(&key.get(&config)));
        }
        ConfigCommands::Set { key, value } => {
            let key: ConfigKey = key.parse()?;
            let change = update(&path, key, |config| key.set(config, &value))?;
            print_change(key, &change);
        }
        ConfigCommands::Reset { key } => {
            let key: ConfigKey = key.parse()?;
            let change = update(&path, key, |config| {
                key.set(config, &key.get(&ConfigFile::default()))
            })?;
            print_change(key, &change);
        }
        ConfigCommands::List => list(&path)?,
        ConfigCommands::Path => {
            let state = if path.exists() {
                style("exists").green()
            } else {
                style("not created, run `trainmap init`").yellow()
            };
            println!("{} ({})", path.display(), state);
        }
    }
    Ok(())
}

/// Value before and after an edit.
#[derive(Debug, PartialEq, Eq)]
struct Change {
    before: String,
    after: String,
}

fn update(
    path: &Path,
    key: ConfigKey,
    edit: impl FnOnce(&mut ConfigFile) -> Result<(), ConfigError>,
) -> Result<Change, CliError> {
    let mut config = ConfigFile::load_from(path)?;
    let before = key.get(&config);
    edit(&mut config)?;
    let after = key.get(&config);
    if before != after || !path.exists() {
        config.save_to(path)?;
    }
    Ok(Change { before, after })
}

fn print_change(key: ConfigKey, change: &Change) {
    if change.before == change.after {
        println!("{} unchanged: {}", key, shown(&change.after));
    } else {
        println!(
            "{}: {} -> {}",
            key,
            style(shown(&change.before)).dim(),
            style(shown(&change.after)).bold()
        );
    }
}

/// One row of `config list`.
#[derive(Debug, PartialEq, Eq)]
struct Setting {
    key: ConfigKey,
    value: String,
    default: String,
}

impl Setting {
    fn changed(&self) -> bool {
        self.value != self.default
    }
}

fn settings(config: &ConfigFile) -> Vec<Setting> {
    let defaults = ConfigFile::default();
    ConfigKey::all()
        .iter()
        .map(|&key| Setting {
            key,
            value: key.get(config),
            default: key.get(&defaults),
        })
        .collect()
}

fn list(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;
    let rows = settings(&config);
    let width = rows
        .iter()
        .map(|row| row.key.name().len())
        .max()
        .unwrap_or(0);

    println!("{}", style(path.display()).dim());
    for row in &rows {
        let name = format!("{:<width$}", row.key.name(), width = width);
        if row.changed() {
            println!(
                "* {} {}  {}",
                style(name).bold(),
                shown(&row.value),
                style(format!("(default {})", shown(&row.default))).dim()
            );
        } else {
            println!("  {} {}", name, shown(&row.value));
        }
    }

    let changed = rows.iter().filter(|row| row.changed()).count();
    println!();
    println!("{} of {} settings changed", changed, rows.len());
    Ok(())
}

fn shown(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_have_no_changes() {
        let rows = settings(&ConfigFile::default());
        assert_eq!(rows.len(), ConfigKey::all().len());
        assert!(rows.iter().all(|row| !row.changed()));
    }

    #[test]
    fn test_changed_settings_are_marked() {
        let mut config = ConfigFile::default();
        ConfigKey::MapLineColor.set(&mut config, "red").unwrap();
        ConfigKey::DisplayTimezone.set(&mut config, "Europe/Vienna").unwrap();

        let changed: Vec<ConfigKey> = settings(&config)
            .into_iter()
            .filter(Setting::changed)
            .map(|row| row.key)
            .collect();
        assert_eq!(
            changed,
            vec![ConfigKey::MapLineColor, ConfigKey::DisplayTimezone]
        );
    }

    #[test]
    fn test_update_saves_and_reports_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");

        let change = update(&path, ConfigKey::MapZoom, |c| ConfigKey::MapZoom.set(c, "9")).unwrap();
        assert_eq!(change.after, "9");
        assert_ne!(change.before, change.after);
        assert_eq!(ConfigFile::load_from(&path).unwrap().map.zoom, 9);

        let reset = update(&path, ConfigKey::MapZoom, |c| {
            ConfigKey::MapZoom.set(c, &ConfigKey::MapZoom.get(&ConfigFile::default()))
        })
        .unwrap();
        assert_eq!(reset.before, "9");
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_update_refuses_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[map]\nzoom = near\n").unwrap();

        let result = update(&path, ConfigKey::MapLineColor, |c| {
            ConfigKey::MapLineColor.set(c, "red")
        });
        assert!(matches!(result, Err(CliError::Config(ref msg)) if msg.contains("zoom")));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[map]\nzoom = near\n");
    }

    #[test]
    fn test_invalid_value_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");

        let result = update(&path, ConfigKey::DisplayTimeFormat, |c| {
            ConfigKey::DisplayTimeFormat.set(c, "%Q")
        });
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_shown_marks_empty_values() {
        assert_eq!(shown(""), "-");
        assert_eq!(shown("%H:%M"), "%H:%M");
    }
}
