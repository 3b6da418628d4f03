//! Registry commands: add, list, remove

use anyhow::{bail, Result};
use std::path::Path;

use crate::error::AtlasError;
use crate::storage::Storage;

pub fn add(storage: &Storage, name: &str, path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("path does not exist: {}", path.display());
    }
    let absolute = path.canonicalize()?;
    storage.add_set(name, &absolute)?;
    println!("Added analysis set '{}' -> {}", name, absolute.display());
    Ok(())
}

pub fn list(storage: &Storage) -> Result<()> {
    let sets = storage.list_sets()?;
    if sets.is_empty() {
        println!("No analysis sets registered.");
        return Ok(());
    }

    println!("{:<20} Path", "Name");
    println!("{}", "-".repeat(60));
    for set in sets {
        println!("{:<20} {}", set.name, set.path.display());
    }
    Ok(())
}

pub fn remove(storage: &Storage, name: &str) -> Result<()> {
    if storage.remove_set(name)? {
        println!("Removed analysis set '{}'", name);
        Ok(())
    } else {
        Err(AtlasError::SetNotFound(name.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_remove_unknown_set_is_typed_error() {
        let dir = tempdir().expect("tempdir");
        let storage = Storage::new(dir.path());
        let err = remove(&storage, "nope").expect_err("missing set");
        assert!(matches!(
            err.downcast_ref::<AtlasError>(),
            Some(AtlasError::SetNotFound(_))
        ));
    }
}
