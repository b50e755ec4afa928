// src/generator/workspace.rs

//! Scratch workspace for one generation run
//!
//! The workspace mirrors the archive layout and is removed when the guard is
//! dropped, on success and on every error path alike.

use crate::error::{Error, Result};
use crate::patch::{META_INF_DIR, MISC_DIR};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Upper bound on name attempts before giving up
const MAX_ATTEMPTS: u32 = 10_000;

/// Owned temporary directory `patchgen-<id>-<n>`
#[derive(Debug)]
pub struct ScratchWorkspace {
    root: PathBuf,
}

impl ScratchWorkspace {
    /// Allocate a fresh workspace under `base_dir` for `patch_id`
    ///
    /// Tries `n = 1, 2, ...` until an unused name is found. Creation of the
    /// directory itself is the claim, so two runs can not end up sharing one.
    pub fn create(base_dir: &Path, patch_id: &str) -> Result<Self> {
        fs::create_dir_all(base_dir).map_err(|e| Error::io(base_dir, e))?;
        let stem = sanitize(patch_id);

        for n in 1..=MAX_ATTEMPTS {
            let candidate = base_dir.join(format!("patchgen-{}-{}", stem, n));
            match fs::create_dir(&candidate) {
                Ok(()) => {
                    // Guard first, so a failure below still cleans up
                    let workspace = Self { root: candidate };
                    let meta_inf = workspace.meta_inf_dir();
                    fs::create_dir(&meta_inf).map_err(|e| Error::io(&meta_inf, e))?;
                    let misc = workspace.misc_dir();
                    fs::create_dir(&misc).map_err(|e| Error::io(&misc, e))?;
                    debug!("Created workspace {}", workspace.root.display());
                    return Ok(workspace);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(Error::io(candidate, e)),
            }
        }

        Err(Error::io(
            base_dir,
            std::io::Error::new(
                ErrorKind::AlreadyExists,
                format!("no free workspace name for patch {}", patch_id),
            ),
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta_inf_dir(&self) -> PathBuf {
        self.root.join(META_INF_DIR)
    }

    pub fn misc_dir(&self) -> PathBuf {
        self.root.join(MISC_DIR)
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.root)
            && e.kind() != ErrorKind::NotFound
        {
            warn!("Failed to remove workspace {}: {}", self.root.display(), e);
        }
    }
}

/// Keep ids usable as a single path component
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
