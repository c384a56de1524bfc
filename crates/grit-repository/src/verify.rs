//! Unsupported-feature detection.
//!
//! Repositories using features this library cannot honor must fail to
//! open with a descriptive error rather than silently misread data.

use std::path::Path;

use grit_config::ConfigFile;

use crate::RepoError;

pub(crate) fn reject_unsupported(git_dir: &Path, config: &ConfigFile) -> Result<(), RepoError> {
    let objects = git_dir.join("objects");

    if objects.join("info").join("alternates").is_file() {
        return Err(unsupported("objects/info/alternates"));
    }
    if objects.join("info").join("http-alternates").is_file() {
        return Err(unsupported("objects/info/http-alternates"));
    }
    if git_dir.join("reftable").is_dir() {
        return Err(unsupported("reftable reference storage"));
    }
    if has_promisor_pack(&objects.join("pack"))? {
        return Err(unsupported("promisor packs (partial clone)"));
    }

    if let Some(version) = config.get_int("core.repositoryformatversion")? {
        if version > 1 {
            return Err(unsupported(&format!(
                "repositoryformatversion {version}"
            )));
        }
    }

    if let Some(format) = config.get_string("extensions.objectformat") {
        if format != "sha1" {
            return Err(unsupported(&format!("object format {format}")));
        }
    }
    if let Some(storage) = config.get_string("extensions.refstorage") {
        if storage == "reftable" {
            return Err(unsupported("reftable reference storage"));
        }
    }
    if config.get_bool("extensions.worktreeconfig")?.unwrap_or(false) {
        return Err(unsupported("extensions.worktreeConfig"));
    }
    if config.get("extensions.partialclone").is_some() {
        return Err(unsupported("partial clone"));
    }

    Ok(())
}

fn has_promisor_pack(pack_dir: &Path) -> Result<bool, RepoError> {
    if !pack_dir.is_dir() {
        return Ok(false);
    }
    for entry in std::fs::read_dir(pack_dir)? {
        let entry = entry?;
        if entry.path().extension().is_some_and(|ext| ext == "promisor") {
            return Ok(true);
        }
    }
    Ok(false)
}

fn unsupported(feature: &str) -> RepoError {
    RepoError::Unsupported(feature.to_string())
}
