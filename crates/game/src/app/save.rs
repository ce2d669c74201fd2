use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use actor_runtime::{ActorId, SnapshotError, WorldSnapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::roster::RosterEntry;

pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveGame {
    pub save_version: u32,
    pub tick: u64,
    pub roster: Vec<SavedRosterEntry>,
    pub world: WorldSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRosterEntry {
    pub actor: ActorId,
    pub entry: RosterEntry,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("write save '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("read save '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encode save json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("parse save json: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("parse save json at {path}: {source}")]
    ParseAt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {path}: {message}")]
    Validation { path: String, message: String },
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

pub fn write_save(path: &Path, save: &SaveGame) -> Result<(), SaveError> {
    let json = serde_json::to_string_pretty(save).map_err(SaveError::Encode)?;
    write_text_atomic(path, &json).map_err(|source| SaveError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), tick = save.tick, "save_written");
    Ok(())
}

pub fn read_save(path: &Path) -> Result<SaveGame, SaveError> {
    let raw = fs::read_to_string(path).map_err(|source| SaveError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let save = parse_save_json(&raw)?;
    validate_save(&save)?;
    Ok(save)
}

pub fn parse_save_json(raw: &str) -> Result<SaveGame, SaveError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, SaveGame>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        if path.is_empty() || path == "." {
            SaveError::Parse(source)
        } else {
            SaveError::ParseAt { path, source }
        }
    })
}

fn validation_err(path: &str, message: impl Into<String>) -> SaveError {
    SaveError::Validation {
        path: path.to_string(),
        message: message.into(),
    }
}

pub fn validate_save(save: &SaveGame) -> Result<(), SaveError> {
    if save.save_version != SAVE_VERSION {
        return Err(validation_err(
            "save_version",
            format!("expected {SAVE_VERSION}, got {}", save.save_version),
        ));
    }
    actor_runtime::validate_snapshot(&save.world)?;

    let world_actors = save
        .world
        .actors
        .iter()
        .map(|actor| actor.actor)
        .collect::<HashSet<_>>();
    let mut seen = HashSet::with_capacity(save.roster.len());
    for (index, saved) in save.roster.iter().enumerate() {
        let path = format!("roster[{index}].actor");
        if !seen.insert(saved.actor) {
            return Err(validation_err(
                &path,
                format!("duplicate roster entry for actor {}", saved.actor.0),
            ));
        }
        if !world_actors.contains(&saved.actor) {
            return Err(validation_err(
                &path,
                format!("actor {} is not in the world snapshot", saved.actor.0),
            ));
        }
    }
    if let Some(missing) = world_actors.iter().find(|actor| !seen.contains(*actor)) {
        return Err(validation_err(
            "roster",
            format!("actor {} has no roster entry", missing.0),
        ));
    }
    Ok(())
}

fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, text)?;
    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("save.json");
    let tmp_name = format!("{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use actor_runtime::WorldConfig;

    use super::*;
    use crate::app::scenario::Simulation;
    use crate::content::{parse_armory, DEFAULT_ARMORY_XML};

    fn demo_save() -> SaveGame {
        let armory = parse_armory(Path::new("builtin"), DEFAULT_ARMORY_XML).expect("armory");
        let mut sim = Simulation::demo(armory, WorldConfig::default());
        for _ in 0..10 {
            sim.tick(0.1);
        }
        sim.to_save()
    }

    #[test]
    fn write_then_read_leaves_no_temp_file() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("slot_1.json");
        let save = demo_save();

        write_save(&path, &save).expect("write");

        assert!(!dir.path().join("slot_1.json.tmp").exists());
        assert_eq!(read_save(&path).expect("read"), save);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::TempDir::new().expect("temp dir");

        let err = read_save(&dir.path().join("nope.json")).expect_err("missing");
        assert!(matches!(err, SaveError::Read { .. }));
    }

    #[test]
    fn parse_error_reports_json_path() {
        let mut value = serde_json::to_value(demo_save()).expect("to value");
        value["world"]["actors"][0]["vitals"]["hit_points"] = serde_json::json!("lots");
        let raw = serde_json::to_string(&value).expect("to string");

        let err = parse_save_json(&raw).expect_err("bad field");
        match err {
            SaveError::ParseAt { path, .. } => {
                assert_eq!(path, "world.actors[0].vitals.hit_points");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut save = demo_save();
        save.save_version = SAVE_VERSION + 1;

        let err = validate_save(&save).expect_err("version");
        assert!(err.to_string().starts_with("validation failed at save_version"));
    }

    #[test]
    fn roster_must_cover_every_world_actor() {
        let mut save = demo_save();
        save.roster.pop();

        let err = validate_save(&save).expect_err("missing roster entry");
        assert!(matches!(err, SaveError::Validation { ref path, .. } if path == "roster"));

        let mut save = demo_save();
        let first = save.roster[0].clone();
        save.roster.push(first);
        let err = validate_save(&save).expect_err("duplicate");
        assert!(err.to_string().contains("duplicate roster entry"));
    }
}
