use crate::error::{CliError, Result};
use catrace::engine::config::TracingConfig;
use std::path::Path;
use toml::{Table, Value};
use tracing::debug;

/// The layered TOML configuration before it is resolved into a [`TracingConfig`].
///
/// Keys follow the kebab-case field names of the core configuration, grouped
/// in `[walk]`, `[refine]`, `[mask]` and `[helix]` tables, with `use-mask` at
/// the top level.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FileConfig {
    table: Table,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        Ok(Self {
            table: toml::from_str(content)?,
        })
    }

    /// Applies `KEY=VALUE` overrides, where `KEY` is a dotted path such as
    /// `walk.min-distance` and `VALUE` is read as a TOML value (falling back to
    /// a plain string).
    pub fn apply_set_values(mut self, set_values: &[String]) -> Result<Self> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(CliError::Config(format!(
                    "Missing key in --set value '{}'",
                    kv_pair
                )));
            }
            insert_dotted(&mut self.table, key, parse_value(value_str.trim()))?;
        }
        Ok(self)
    }

    /// Resolves the layered values over the core defaults.
    pub fn into_tracing_config(self) -> Result<TracingConfig> {
        Value::Table(self.table)
            .try_into()
            .map_err(|e: toml::de::Error| CliError::Config(e.to_string()))
    }
}

fn parse_value(raw: &str) -> Value {
    toml::from_str::<Table>(&format!("value = {raw}"))
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

fn insert_dotted(table: &mut Table, key: &str, value: Value) -> Result<()> {
    let mut parts: Vec<&str> = key.split('.').collect();
    let Some(leaf) = parts.pop() else {
        return Ok(());
    };
    let mut current = table;
    for part in parts {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        current = entry.as_table_mut().ok_or_else(|| {
            CliError::Config(format!(
                "Cannot set '{}': '{}' is not a table",
                key, part
            ))
        })?;
    }
    current.insert(leaf.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn empty_file_resolves_to_defaults() {
        let config = FileConfig::default().into_tracing_config().unwrap();
        assert_eq!(config, TracingConfig::default());
    }

    #[test]
    fn file_values_override_defaults_per_field() {
        let config = FileConfig::from_toml(
            r#"
            use-mask = true

            [walk]
            min-start-confidence = 9.5
            max-bfs-steps = 6

            [helix]
            max-offset = 1.5
            "#,
        )
        .unwrap()
        .into_tracing_config()
        .unwrap();

        assert!(config.use_mask);
        assert_eq!(config.walk.min_start_confidence, 9.5);
        assert_eq!(config.walk.max_bfs_steps, 6);
        assert_eq!(config.walk.max_distance, 4.5);
        assert_eq!(config.helix.max_offset, 1.5);
        assert_eq!(config.refine.rounds, 2);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = FileConfig::from_toml("[walk]\nmin-start = 3.0\n").unwrap();
        assert!(matches!(file.into_tracing_config(), Err(CliError::Config(_))));
    }

    #[test]
    fn set_values_create_and_override_nested_keys() {
        let file = FileConfig::from_toml("[walk]\nmax-distance = 4.0\n")
            .unwrap()
            .apply_set_values(&[
                "walk.max-distance=4.2".to_string(),
                "refine.rounds=3".to_string(),
                "use-mask=true".to_string(),
            ])
            .unwrap();
        let config = file.into_tracing_config().unwrap();

        assert_eq!(config.walk.max_distance, 4.2);
        assert_eq!(config.refine.rounds, 3);
        assert!(config.use_mask);
    }

    #[test]
    fn malformed_set_values_are_rejected() {
        let file = FileConfig::default();
        assert!(matches!(
            file.clone().apply_set_values(&["walk.max-distance".to_string()]),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            file.apply_set_values(&["=3".to_string()]),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn set_value_through_a_scalar_is_rejected() {
        let file = FileConfig::from_toml("use-mask = false\n").unwrap();
        let result = file.apply_set_values(&["use-mask.inner=1".to_string()]);
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn string_values_fail_type_checks_when_resolved() {
        let file = FileConfig::default()
            .apply_set_values(&["walk.max-distance=far".to_string()])
            .unwrap();
        assert!(matches!(file.into_tracing_config(), Err(CliError::Config(_))));
    }

    #[test]
    fn from_file_reports_the_path_on_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[walk\n").unwrap();

        match FileConfig::from_file(&path) {
            Err(CliError::FileParsing { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
