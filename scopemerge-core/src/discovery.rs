//! Input folder discovery: one entity per first-level subdirectory

use crate::error::ReconcileError;
use crate::reader::is_supported_workbook;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Workbooks belonging to one reporting entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInputs {
    /// Name of the entity folder, matched against summary sheet names
    pub name: String,
    pub files: Vec<PathBuf>,
}

/// Group every workbook below `root` by its first-level folder.
///
/// Files directly inside `root` belong to no entity and are ignored, as are
/// Office lock files (`~$Book.xlsx`). Order is by file name at every level.
/// Symbolic links are followed; entries that cannot be read (dangling links,
/// unreadable folders) are logged and skipped.
pub fn discover_inputs(root: &Path) -> Result<Vec<EntityInputs>, ReconcileError> {
    if !root.is_dir() {
        return Err(ReconcileError::FatalConfig(format!(
            "input folder {} does not exist",
            root.display()
        )));
    }

    let mut entities: Vec<EntityInputs> = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(2)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable input entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !is_supported_workbook(path) || is_lock_file(path) {
            continue;
        }

        let Some(name) = entity_name(root, path) else {
            continue;
        };

        match entities.last_mut() {
            Some(last) if last.name == name => last.files.push(path.to_path_buf()),
            _ => entities.push(EntityInputs {
                name,
                files: vec![path.to_path_buf()],
            }),
        }
    }

    log::info!(
        "Found {} entit{} in {}",
        entities.len(),
        if entities.len() == 1 { "y" } else { "ies" },
        root.display()
    );

    Ok(entities)
}

fn entity_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let first = relative.components().next()?;
    Some(first.as_os_str().to_string_lossy().to_string())
}

fn is_lock_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with("~$"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap();
    }

    #[test]
    fn test_groups_by_first_level_folder() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("Globex/2024/scope.xlsx"));
        touch(&root.join("Acme/b.xlsx"));
        touch(&root.join("Acme/a.xlsm"));
        touch(&root.join("Acme/~$a.xlsm"));
        touch(&root.join("Acme/notes.txt"));
        touch(&root.join("loose.xlsx"));
        fs::create_dir_all(root.join("Empty")).unwrap();

        let entities = discover_inputs(root).unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].name, "Acme");
        assert_eq!(
            entities[0].files,
            vec![root.join("Acme/a.xlsm"), root.join("Acme/b.xlsx")]
        );
        assert_eq!(entities[1].name, "Globex");
        assert_eq!(entities[1].files, vec![root.join("Globex/2024/scope.xlsx")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_entries_are_skipped() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("Acme/scope.xlsx"));
        std::os::unix::fs::symlink(root.join("gone.xlsx"), root.join("Acme/linked.xlsx")).unwrap();

        let entities = discover_inputs(root).unwrap();

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].files, vec![root.join("Acme/scope.xlsx")]);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = tempdir().unwrap();
        let err = discover_inputs(&dir.path().join("Input")).unwrap_err();
        assert!(err.is_fatal());
    }
}
