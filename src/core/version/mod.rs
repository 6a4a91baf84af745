pub mod descriptor;
pub mod libraries;
pub mod manifest;
pub mod resolver;
pub mod rules;

pub use descriptor::{
    ArgumentTemplate, ArgumentToken, ArgumentValue, AssetIndexRef, DownloadArtifact, LibraryFile,
    LibrarySpec, VersionDescriptor,
};
pub use libraries::{acquire_libraries, LibraryReport};
pub use manifest::{ManifestClient, VersionEntry, VersionGroup, VersionIndex, VersionType};
pub use resolver::VersionResolver;
pub use rules::{is_allowed, is_allowed_on, ConditionRule, RuleAction, RuleEnv};
