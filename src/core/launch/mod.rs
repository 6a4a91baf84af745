pub mod arguments;
pub mod classpath;
pub mod coordinator;
pub mod natives;
pub mod task;

pub use arguments::{expand, SubstitutionTable};
pub use classpath::{build_classpath, Classpath};
pub use coordinator::{
    AssetFailurePolicy, LaunchCoordinator, LaunchRequest, LaunchState, LAUNCHER_NAME,
};
pub use natives::extract_natives;
pub use task::{launch_environment, spawn, LaunchPlan};
