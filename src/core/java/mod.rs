pub mod runtime;

pub use runtime::{probe_java, JavaInstallation, LocalRuntimeProvider, RuntimeProvider};
