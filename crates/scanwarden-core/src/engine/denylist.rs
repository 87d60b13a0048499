/// Name-denylist engine.
///
/// A stand-in collaborator so the binary can run end to end: a file is
/// `Infected` when its file name matches an entry of the denylist
/// (case-insensitive), otherwise `Clean`. This is not a detection
/// algorithm; real engines plug in through [`ScanEngine`].
///
/// Denylists are JSON arrays of file names:
///
/// ```json
/// ["eicar.com", "invoice.pdf.exe"]
/// ```
use super::{EngineError, Finding, Findings, ScanEngine};
use crate::enumerate::DirectoryTree;
use crate::error::Result;
use crate::target::TargetKind;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Threat label given to every denylisted file.
pub const DENYLIST_THREAT: &str = "Denylisted";

#[derive(Debug, Clone, Default)]
pub struct DenylistEngine {
    names: HashSet<String>,
}

impl DenylistEngine {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    /// Parse a JSON array of names.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let names: Vec<String> = serde_json::from_reader(reader)?;
        Ok(Self::from_names(names))
    }

    /// Load a denylist file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let engine = Self::from_json_reader(std::io::BufReader::new(file))?;
        debug!("Loaded {} denylist entries from {}", engine.len(), path.display());
        Ok(engine)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn check(&self, path: &Path) -> Finding {
        let listed = path
            .file_name()
            .map(|n| self.names.contains(&n.to_string_lossy().to_lowercase()))
            .unwrap_or(false);
        if listed {
            Finding::infected(path, DENYLIST_THREAT)
        } else {
            Finding::clean(path)
        }
    }
}

impl ScanEngine for DenylistEngine {
    fn name(&self) -> &str {
        "denylist"
    }

    fn scan<'a>(&'a self, tree: &'a DirectoryTree) -> Findings<'a> {
        let root = tree.root();

        if tree.kind() == TargetKind::File {
            let item = match std::fs::symlink_metadata(root) {
                Ok(_) => Ok(self.check(root)),
                Err(err) => Err(EngineError::new(root, err.to_string())),
            };
            return Box::new(std::iter::once(item));
        }

        let walker = jwalk::WalkDir::new(root)
            .skip_hidden(false)
            .follow_links(false)
            .sort(true);

        Box::new(walker.into_iter().filter_map(move |entry_result| match entry_result {
            Ok(entry) if entry.file_type().is_file() => Some(Ok(self.check(&entry.path()))),
            Ok(_) => None,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                Some(Err(EngineError::new(path, err.to_string())))
            }
        }))
    }
}
