//! Where model files come from: a local directory or a Hugging Face repository.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use hf_hub::api::sync::{ApiBuilder, ApiError, ApiRepo};
use hf_hub::{Repo, RepoType};

const HUB_SCHEME: &str = "hf://";

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("Invalid hub URI '{0}'. Expected hf://owner/name[@revision]")]
    InvalidUri(String),
    #[error("Model file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Model hub error: {0}")]
    Hub(#[from] ApiError),
}

/// A location holding pretrained model files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A directory on disk.
    Local(PathBuf),
    /// A model repository on the Hugging Face hub.
    Hub {
        repo_id: String,
        revision: Option<String>,
    },
}

impl FromStr for ModelSource {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(stripped) = s.strip_prefix(HUB_SCHEME) else {
            return Ok(Self::Local(PathBuf::from(s)));
        };

        let (repo_id, revision) = match stripped.split_once('@') {
            Some((repo, rev)) => (repo, Some(rev)),
            None => (stripped, None),
        };

        let mut parts = repo_id.split('/');
        let valid = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
        );
        if !valid || revision.is_some_and(str::is_empty) {
            return Err(SourceError::InvalidUri(s.to_string()));
        }

        Ok(Self::Hub {
            repo_id: repo_id.to_string(),
            revision: revision.map(str::to_string),
        })
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(dir) => write!(f, "{}", dir.display()),
            Self::Hub {
                repo_id,
                revision: Some(rev),
            } => write!(f, "{HUB_SCHEME}{repo_id}@{rev}"),
            Self::Hub {
                repo_id,
                revision: None,
            } => write!(f, "{HUB_SCHEME}{repo_id}"),
        }
    }
}

impl ModelSource {
    /// Open the source for file lookups.
    ///
    /// Hub sources are opened lazily: nothing is downloaded until
    /// [`ModelFiles::get`] asks for a file.
    pub fn open(&self) -> Result<ModelFiles, SourceError> {
        match self {
            Self::Local(dir) => {
                if !dir.is_dir() {
                    return Err(SourceError::NotFound(dir.clone()));
                }
                Ok(ModelFiles::Local(dir.clone()))
            }
            Self::Hub { repo_id, revision } => {
                let api = ApiBuilder::new().with_progress(false).build()?;
                let repo = match revision {
                    Some(rev) => Repo::with_revision(repo_id.clone(), RepoType::Model, rev.clone()),
                    None => Repo::model(repo_id.clone()),
                };
                Ok(ModelFiles::Hub(Box::new(api.repo(repo))))
            }
        }
    }
}

/// An opened [`ModelSource`] that resolves relative file names to local paths.
pub enum ModelFiles {
    Local(PathBuf),
    Hub(Box<ApiRepo>),
}

impl ModelFiles {
    /// Resolve `name` to a local path, downloading it into the hub cache if needed.
    pub fn get(&self, name: &str) -> Result<PathBuf, SourceError> {
        match self {
            Self::Local(dir) => {
                let path = dir.join(name);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(SourceError::NotFound(path))
                }
            }
            Self::Hub(repo) => {
                log::debug!("Fetching {name} from model hub");
                Ok(repo.get(name)?)
            }
        }
    }

    /// Like [`get`](Self::get), but a missing file is `None` rather than an error.
    pub fn get_optional(&self, name: &str) -> Option<PathBuf> {
        match self.get(name) {
            Ok(path) => Some(path),
            Err(e) => {
                log::debug!("Optional model file {name} unavailable: {e}");
                None
            }
        }
    }
}
