mod artifact;

pub use artifact::MavenArtifact;

/// Default repository for libraries that carry no download URL.
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
