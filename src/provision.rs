use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{LaunchError, LaunchResult};
use crate::paths::RunFolder;
use crate::prompt::Operator;

/// Create the run folder for `run_identifier` under `data_root`.
///
/// An existing base folder is only removed after the operator confirms; a
/// decline leaves it untouched and returns `Conflict`.
pub fn provision(
    data_root: &Path,
    run_identifier: &str,
    instances: [&str; 2],
    operator: &dyn Operator,
) -> LaunchResult<RunFolder> {
    let folder = RunFolder::resolve(data_root, run_identifier, instances);

    if folder.base_path.exists() {
        if !operator.confirm_overwrite(&folder.base_path)? {
            return Err(LaunchError::Conflict {
                what: format!(
                    "run folder {} already exists and was kept",
                    folder.base_path.display()
                ),
            });
        }
        info!(path = %folder.base_path.display(), "deleting existing run folder");
        remove_existing(&folder.base_path)?;
    }

    for instance in &folder.instance_paths {
        fs::create_dir_all(instance).map_err(|e| {
            LaunchError::io(format!("failed to create {}", instance.display()), e)
        })?;
    }

    info!(
        base = %folder.base_path.display(),
        instance0 = %folder.instance(0).display(),
        instance1 = %folder.instance(1).display(),
        "run folder created"
    );
    Ok(folder)
}

fn remove_existing(path: &Path) -> LaunchResult<()> {
    // A stray file at the run path is replaced the same way as a folder.
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| LaunchError::io(format!("failed to delete {}", path.display()), e))
}
