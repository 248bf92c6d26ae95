//! # Serialization Utilities
//!
//! Save/load helpers for the three on-disk formats used around the pipeline:
//! binary object snapshots (`bincode`), JSON and YAML. Everything goes through
//! `serde`, so tensors (`ndarray` with its `serde` feature) work in all three.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

// --- Error Type ---
#[derive(thiserror::Error, Debug)]
pub enum SerializationError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization Error (Bincode): {0}")]
    Bincode(#[from] bincode::Error),
    #[error("Serialization Error (JSON): {0}")]
    Json(#[from] serde_json::Error),
    #[error("Serialization Error (YAML): {0}")]
    Yaml(#[from] serde_yaml::Error),
}

const JSON_INDENT: &[u8] = b"    ";

// --- Binary snapshots ---

/// Writes `obj` to `path` as a bincode snapshot.
pub fn save_pickle<P, T>(path: P, obj: &T) -> Result<(), SerializationError>
where
    P: AsRef<Path>,
    T: Serialize + ?Sized,
{
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    bincode::serialize_into(&mut writer, obj)?;
    writer.flush()?;
    tracing::debug!(path = %path.as_ref().display(), "binary snapshot saved");
    Ok(())
}

/// Reads a bincode snapshot written by [`save_pickle`].
///
/// bincode is not self-describing: `T` must be the concrete type that was
/// saved. Types that deserialize via `deserialize_any`, such as
/// `serde_json::Value` or `serde_yaml::Value`, fail with a
/// [`SerializationError::Bincode`] error; use [`save_json`] or [`save_yaml`]
/// for those.
pub fn load_pickle<P, T>(path: P) -> Result<T, SerializationError>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(bincode::deserialize_from(reader)?)
}

// --- JSON ---

/// Writes `obj` as JSON indented by four spaces.
///
/// With `sort_keys` every object is written with its keys in lexicographic
/// order; otherwise keys keep their serialization order.
pub fn save_json<P, T>(path: P, obj: &T, sort_keys: bool) -> Result<(), SerializationError>
where
    P: AsRef<Path>,
    T: Serialize + ?Sized,
{
    let mut value = serde_json::to_value(obj)?;
    if sort_keys {
        sort_json_keys(&mut value);
    }

    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    let formatter = PrettyFormatter::with_indent(JSON_INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    value.serialize(&mut serializer)?;
    writer.flush()?;
    tracing::debug!(path = %path.as_ref().display(), sort_keys, "json saved");
    Ok(())
}

fn sort_json_keys(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<(String, serde_json::Value)> =
                std::mem::take(map).into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, mut child) in entries {
                sort_json_keys(&mut child);
                map.insert(key, child);
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(sort_json_keys),
        _ => {}
    }
}

/// Reads UTF-8 JSON from `path`.
pub fn load_json<P, T>(path: P) -> Result<T, SerializationError>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let text = fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&text)?)
}

// --- YAML ---

/// Writes `obj` as YAML; mapping keys keep their insertion order.
pub fn save_yaml<P, T>(path: P, obj: &T) -> Result<(), SerializationError>
where
    P: AsRef<Path>,
    T: Serialize + ?Sized,
{
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_yaml::to_writer(&mut writer, obj)?;
    writer.flush()?;
    tracing::debug!(path = %path.as_ref().display(), "yaml saved");
    Ok(())
}

pub fn load_yaml<P, T>(path: P) -> Result<T, SerializationError>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(serde_yaml::from_reader(reader)?)
}
