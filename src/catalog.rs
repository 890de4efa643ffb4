use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::{AnnotateError, Result};
use crate::store::BoxStore;

/// Sorted names of the regular files in `dir`, skipping dotfiles.
pub fn visible_file_names(dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|e| AnnotateError::io(dir, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AnnotateError::io(dir, e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| AnnotateError::io(entry.path(), e))?
            .is_file();
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            log::warn!("skipping non utf-8 file name in {}", dir.display());
            continue;
        };
        if is_file && !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// What the batch already knows about each raw image when it starts.
#[derive(Clone, Debug, Default)]
pub struct ImageSet {
    pub raw: Vec<String>,
    pub annotated: BTreeSet<String>,
}

impl ImageSet {
    pub fn scan(raw_dir: &Path, store: &BoxStore) -> Result<Self> {
        Ok(Self {
            raw: visible_file_names(raw_dir)?,
            annotated: store.annotated_images()?.into_iter().collect(),
        })
    }

    #[cfg(test)]
    pub fn new<I, J, S, T>(raw: I, annotated: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut raw: Vec<String> = raw.into_iter().map(Into::into).collect();
        raw.sort();
        Self {
            raw,
            annotated: annotated.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_annotated(&self, name: &str) -> bool {
        self.annotated.contains(name)
    }
}
