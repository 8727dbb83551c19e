use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn is_in_mail_dir(path: &Path) -> bool {
    path.parent()
        .and_then(Path::file_name)
        .map_or(false, |dir| dir == OsStr::new("cur") || dir == OsStr::new("new"))
}

/// Lists every file directly inside a `cur` or `new` directory anywhere
/// under `root`, sorted by path.
pub fn list_emails(root: &Path) -> walkdir::Result<Vec<PathBuf>> {
    let mut files = vec![];
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        if is_in_mail_dir(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
