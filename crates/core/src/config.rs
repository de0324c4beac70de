use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// State that a surface persists between sessions.
pub trait PersistentState: Serialize + DeserializeOwned + Default + Clone {
    /// File name used under the default configuration directory.
    const FILE_NAME: &'static str;

    /// Check value ranges. Returns every problem found, not just the first.
    fn validate(&self) -> Result<(), Vec<String>> {
        Ok(())
    }
}

/// Persisted file format wrapping the surface state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile<T> {
    pub version: String,
    pub state: T,
    pub modified_at: String,
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to read state file: {0}")]
    ReadError(String),

    #[error("Failed to parse state file: {0}")]
    ParseError(String),

    #[error("Failed to serialize state: {0}")]
    SerializeError(String),

    #[error("Failed to write state file: {0}")]
    WriteError(String),

    #[error("State validation errors: {}", .0.join(", "))]
    ValidationError(Vec<String>),
}

/// Loads and saves one surface's state blob as JSON.
pub struct StateStore<T: PersistentState> {
    path: PathBuf,
    _state: PhantomData<T>,
}

impl<T: PersistentState> StateStore<T> {
    /// Create a store. Without an explicit path the file lives in
    /// `<config dir>/padbridge/`, falling back to the working directory.
    pub fn new(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(|| {
            dirs::config_dir()
                .map(|dir| dir.join("padbridge").join(T::FILE_NAME))
                .unwrap_or_else(|| PathBuf::from(T::FILE_NAME))
        });

        Self {
            path,
            _state: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state. A missing file is created with defaults.
    pub fn load(&self) -> Result<T, StateError> {
        if !self.path.exists() {
            let state = T::default();
            self.save(&state)?;
            return Ok(state);
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| StateError::ReadError(e.to_string()))?;

        let file: StateFile<T> =
            serde_json::from_str(&content).map_err(|e| StateError::ParseError(e.to_string()))?;

        if file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "State file version {} doesn't match {}; missing fields use defaults",
                file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        file.state.validate().map_err(StateError::ValidationError)?;

        Ok(file.state)
    }

    pub fn save(&self, state: &T) -> Result<(), StateError> {
        state.validate().map_err(StateError::ValidationError)?;

        if let Some(parent) = self.path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| StateError::WriteError(e.to_string()))?;
            }
        }

        let file = StateFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: state.clone(),
            modified_at: chrono::Utc::now().to_rfc3339(),
        };

        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| StateError::SerializeError(e.to_string()))?;

        fs::write(&self.path, content).map_err(|e| StateError::WriteError(e.to_string()))?;

        log::debug!("Saved surface state to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct TestState {
        #[serde(default)]
        root: u8,
        #[serde(default)]
        name: String,
    }

    impl PersistentState for TestState {
        const FILE_NAME: &'static str = "test.json";

        fn validate(&self) -> Result<(), Vec<String>> {
            if self.root > 11 {
                return Err(vec![format!("root {} out of range", self.root)]);
            }
            Ok(())
        }
    }

    #[test]
    fn test_missing_file_creates_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("state.json");

        let store = StateStore::<TestState>::new(Some(path.clone()));
        let state = store.load().unwrap();

        assert_eq!(state, TestState::default());
        assert!(path.exists());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");

        let store = StateStore::<TestState>::new(Some(path.clone()));
        let state = TestState {
            root: 7,
            name: "pads".to_string(),
        };
        store.save(&state).unwrap();

        let store2 = StateStore::<TestState>::new(Some(path));
        assert_eq!(store2.load().unwrap(), state);
    }

    #[test]
    fn test_validation_rejects_save() {
        let temp_dir = TempDir::new().unwrap();
        let store = StateStore::<TestState>::new(Some(temp_dir.path().join("state.json")));

        let bad = TestState {
            root: 12,
            name: String::new(),
        };
        assert!(matches!(
            store.save(&bad),
            Err(StateError::ValidationError(_))
        ));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let store = StateStore::<TestState>::new(Some(path));
        assert!(matches!(store.load(), Err(StateError::ParseError(_))));
    }
}
