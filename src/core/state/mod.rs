mod paths;
mod settings;

pub use paths::LauncherPaths;
pub use settings::{default_data_dir, LauncherConfig, RESOURCES_URL, VERSION_MANIFEST_URL};
