use crate::error::{Error, Result};
use crate::schedule::{resolve_timezone, Frequency, DEFAULT_FREQUENCY, DEFAULT_TIMEZONE};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: i64 = 1;
const SETTINGS_FILE: &str = "settings.json";
const DEFAULT_DATABASE_FILE: &str = "tally.db";

/// Typed view of `settings.json` after migration and sanitizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub database_path: PathBuf,
    pub default_frequency: String,
    pub default_timezone: String,
}

pub fn load_effective_settings(data_dir: &Path) -> Result<EffectiveSettings> {
    let settings = load_settings_from_disk(data_dir)?;
    let text = |key: &str, default: &str| {
        settings
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };

    Ok(EffectiveSettings {
        database_path: data_dir.join(text("databaseFile", DEFAULT_DATABASE_FILE)),
        default_frequency: text("defaultFrequency", DEFAULT_FREQUENCY),
        default_timezone: text("defaultTimezone", DEFAULT_TIMEZONE),
    })
}

/// Read, migrate and sanitize the settings file, writing it back when anything
/// changed (including when it did not exist yet).
pub fn load_settings_from_disk(data_dir: &Path) -> Result<Value> {
    let path = settings_path(data_dir);
    ensure_data_dir(data_dir)?;

    let original = if path.exists() {
        let raw = fs::read_to_string(&path)?;
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|e| {
            log::warn!("ignoring unreadable {}: {e}", path.display());
            json!({})
        })
    } else {
        json!({})
    };

    let migrated = migrate_settings(original.clone());
    if migrated != original || !path.exists() {
        write_settings_file(&path, &migrated)?;
    }

    Ok(migrated)
}

/// Merge a partial settings object over the stored one and persist the result.
pub fn save_settings(data_dir: &Path, patch: Value) -> Result<Value> {
    if !patch.is_object() {
        return Err(Error::Settings("settings patch must be a JSON object".to_string()));
    }

    let mut merged = load_settings_from_disk(data_dir)?;
    merge_settings(&mut merged, &patch);

    let migrated = migrate_settings(merged);
    write_settings_file(&settings_path(data_dir), &migrated)?;
    Ok(migrated)
}

fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE)
}

fn ensure_data_dir(data_dir: &Path) -> Result<()> {
    fs::create_dir_all(data_dir)?;
    Ok(())
}

fn write_settings_file(path: &Path, settings: &Value) -> Result<()> {
    let raw = serde_json::to_string_pretty(settings)?;
    fs::write(path, raw)?;
    Ok(())
}

fn default_settings() -> Value {
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "databaseFile": DEFAULT_DATABASE_FILE,
        "defaultFrequency": DEFAULT_FREQUENCY,
        "defaultTimezone": DEFAULT_TIMEZONE
    })
}

fn migrate_settings(input: Value) -> Value {
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    let version = out
        .get("schema_version")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    if version > SETTINGS_SCHEMA_VERSION {
        log::warn!("settings schema v{version} is newer than this build (v{SETTINGS_SCHEMA_VERSION})");
    }

    deep_merge_defaults(&mut out, &default_settings());
    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };

    for (key, default_value) in default_obj {
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    sanitize_str(obj, "defaultFrequency", DEFAULT_FREQUENCY, |f| {
        Frequency::parse(f).is_ok()
    });
    sanitize_str(obj, "defaultTimezone", DEFAULT_TIMEZONE, |tz| {
        resolve_timezone(tz).is_ok()
    });
    sanitize_str(obj, "databaseFile", DEFAULT_DATABASE_FILE, |file| {
        !file.trim().is_empty()
    });
}

fn sanitize_str(
    map: &mut Map<String, Value>,
    key: &str,
    default: &str,
    is_valid: impl Fn(&str) -> bool,
) {
    let current = map.get(key).and_then(Value::as_str);
    if current.is_some_and(&is_valid) {
        return;
    }
    log::warn!("settings: {key} = {:?} is invalid, using {default:?}", map.get(key));
    map.insert(key.to_string(), json!(default));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_defaults_and_stamps_version() {
        let migrated = migrate_settings(json!({}));
        assert_eq!(migrated, default_settings());

        let from_garbage = migrate_settings(json!([1, 2, 3]));
        assert_eq!(from_garbage, default_settings());
    }

    #[test]
    fn unversioned_file_keeps_user_values_and_gains_version() {
        let migrated = migrate_settings(json!({
            "defaultFrequency": "2w",
            "defaultTimezone": "Europe/Budapest",
            "unknownKey": true
        }));

        assert_eq!(migrated["defaultFrequency"], json!("2w"));
        assert_eq!(migrated["defaultTimezone"], json!("Europe/Budapest"));
        assert_eq!(migrated["databaseFile"], json!("tally.db"));
        assert_eq!(migrated["unknownKey"], json!(true));
        assert_eq!(migrated["schema_version"], json!(1));
    }

    #[test]
    fn replaces_invalid_values() {
        let migrated = migrate_settings(json!({
            "schema_version": 1,
            "defaultFrequency": "1m",
            "defaultTimezone": "Mars/Olympus",
            "databaseFile": "  "
        }));

        assert_eq!(migrated["defaultFrequency"], json!("1d"));
        assert_eq!(migrated["defaultTimezone"], json!("UTC"));
        assert_eq!(migrated["databaseFile"], json!("tally.db"));
    }

    #[test]
    fn merges_partial_settings_without_losing_existing_values() {
        let mut existing = default_settings();
        merge_settings(&mut existing, &json!({ "defaultFrequency": "6h" }));
        let migrated = migrate_settings(existing);

        assert_eq!(migrated["defaultFrequency"], json!("6h"));
        assert_eq!(migrated["defaultTimezone"], json!("UTC"));
        assert_eq!(migrated["databaseFile"], json!("tally.db"));
    }

    #[test]
    fn persists_through_the_data_dir() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("nested");

        let effective = load_effective_settings(&dir).expect("load");
        assert_eq!(effective.database_path, dir.join("tally.db"));
        assert_eq!(effective.default_frequency, "1d");
        assert!(dir.join(SETTINGS_FILE).exists());

        save_settings(&dir, json!({ "defaultTimezone": "Asia/Kolkata" })).expect("save");
        let effective = load_effective_settings(&dir).expect("reload");
        assert_eq!(effective.default_timezone, "Asia/Kolkata");
        assert_eq!(effective.default_frequency, "1d");

        assert!(matches!(save_settings(&dir, json!("nope")), Err(Error::Settings(_))));
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().expect("tempdir");
        fs::write(tmp.path().join(SETTINGS_FILE), "{ not json").expect("write");

        let settings = load_settings_from_disk(tmp.path()).expect("load");
        assert_eq!(settings, default_settings());

        let raw = fs::read_to_string(tmp.path().join(SETTINGS_FILE)).expect("read back");
        assert!(serde_json::from_str::<Value>(&raw).is_ok());
    }
}
