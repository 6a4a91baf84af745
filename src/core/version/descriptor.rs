// ─── Version Descriptor ───
// Typed view of a per-version JSON (`versions/<id>/<id>.json`).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::core::maven::MavenArtifact;
use crate::core::platform::{self, PlatformId};

use super::rules::{is_allowed, ConditionRule, RuleEnv};

/// Runtime major assumed for descriptors that predate `javaVersion`.
pub const DEFAULT_JAVA_MAJOR: u32 = 8;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    pub id: String,
    pub main_class: String,
    #[serde(rename = "type", default)]
    pub version_type: Option<String>,
    /// Legacy asset index name, superseded by `assetIndex.id`.
    #[serde(default)]
    pub assets: Option<String>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexRef>,
    #[serde(default)]
    pub downloads: Option<VersionDownloads>,
    #[serde(default)]
    pub libraries: Vec<LibrarySpec>,
    #[serde(default)]
    pub arguments: Option<ArgumentTemplate>,
    #[serde(default)]
    pub minecraft_arguments: Option<String>,
    #[serde(default)]
    pub java_version: Option<JavaRequirement>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexRef {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub total_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionDownloads {
    #[serde(default)]
    pub client: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DownloadArtifact {
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaRequirement {
    pub major_version: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub client: Option<ClientLogging>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientLogging {
    /// JVM flag with a `${path}` placeholder for the config file.
    pub argument: String,
    pub file: LogConfigFile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfigFile {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

// ─── Libraries ───

#[derive(Debug, Clone, Deserialize)]
pub struct LibrarySpec {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub rules: Option<Vec<ConditionRule>>,
    /// Platform name to classifier key, possibly containing `${arch}`.
    #[serde(default)]
    pub natives: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub extract: Option<ExtractRules>,
    /// Maven repository base for libraries without `downloads`.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default)]
    pub artifact: Option<LibraryArtifact>,
    #[serde(default)]
    pub classifiers: Option<BTreeMap<String, LibraryArtifact>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LibraryArtifact {
    #[serde(default)]
    pub path: Option<String>,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// A library file, located in the library store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryFile {
    /// Relative to the library store root.
    pub path: PathBuf,
    pub url: String,
    pub sha1: Option<String>,
}

impl LibrarySpec {
    pub fn is_applicable(&self, env: &RuleEnv) -> bool {
        is_allowed(self.rules.as_deref(), env)
    }

    pub fn coordinate(&self) -> Option<MavenArtifact> {
        MavenArtifact::parse(&self.name).ok()
    }

    /// The classpath artifact of this library, if it has one.
    ///
    /// Libraries with no `downloads` section at all fall back to their Maven
    /// coordinate under `url` (or `default_repo`), unverified. A `downloads`
    /// section without an `artifact` means the library is natives-only.
    pub fn main_artifact(&self, default_repo: &str) -> Option<LibraryFile> {
        match &self.downloads {
            Some(downloads) => {
                let artifact = downloads.artifact.as_ref()?;
                self.locate(artifact, None)
            }
            None => {
                let coord = self.coordinate()?;
                let repo = self.url.as_deref().unwrap_or(default_repo);
                Some(LibraryFile {
                    path: coord.local_path(),
                    url: coord.url(repo),
                    sha1: None,
                })
            }
        }
    }

    /// Classifier key selected by `natives` for `platform`, `${arch}` resolved.
    pub fn native_classifier(&self, platform: PlatformId) -> Option<String> {
        let key = self.natives.as_ref()?.get(platform.as_str())?;
        Some(key.replace("${arch}", platform::arch_bits()))
    }

    /// The native archive for `platform`, if this library ships one.
    pub fn native_artifact(&self, platform: PlatformId) -> Option<LibraryFile> {
        let classifier = self.native_classifier(platform)?;
        let artifact = self
            .downloads
            .as_ref()?
            .classifiers
            .as_ref()?
            .get(&classifier)?;
        self.locate(artifact, Some(&classifier))
    }

    /// Archive entry prefixes that must not be extracted.
    pub fn extract_excludes(&self) -> &[String] {
        self.extract.as_ref().map_or(&[], |e| e.exclude.as_slice())
    }

    fn locate(&self, artifact: &LibraryArtifact, classifier: Option<&str>) -> Option<LibraryFile> {
        let path = match &artifact.path {
            Some(path) => PathBuf::from(path),
            None => {
                let coord = self.coordinate()?;
                match classifier {
                    Some(c) => coord.with_classifier(c).local_path(),
                    None => coord.local_path(),
                }
            }
        };
        Some(LibraryFile {
            path,
            url: artifact.url.clone(),
            sha1: artifact.sha1.clone(),
        })
    }
}

// ─── Arguments ───

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArgumentTemplate {
    #[serde(default)]
    pub jvm: Vec<ArgumentToken>,
    #[serde(default)]
    pub game: Vec<ArgumentToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ArgumentToken {
    Literal(String),
    Conditional {
        rules: Vec<ConditionRule>,
        value: ArgumentValue,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Single(String),
    Many(Vec<String>),
}

impl ArgumentValue {
    pub fn as_slice(&self) -> &[String] {
        match self {
            ArgumentValue::Single(value) => std::slice::from_ref(value),
            ArgumentValue::Many(values) => values,
        }
    }
}

impl ArgumentToken {
    pub fn literal(value: &str) -> Self {
        ArgumentToken::Literal(value.to_string())
    }
}

/// JVM arguments implied for descriptors that only carry `minecraftArguments`.
fn legacy_jvm_template() -> Vec<ArgumentToken> {
    vec![
        ArgumentToken::Conditional {
            rules: vec![ConditionRule::allow().on_os("osx")],
            value: ArgumentValue::Single("-XstartOnFirstThread".into()),
        },
        ArgumentToken::literal("-Djava.library.path=${natives_directory}"),
        ArgumentToken::literal("-cp"),
        ArgumentToken::literal("${classpath}"),
    ]
}

// ─── Descriptor queries ───

/// Libraries split by rule evaluation, each side in descriptor order.
#[derive(Debug)]
pub struct LibraryPartition<'a> {
    pub applicable: Vec<&'a LibrarySpec>,
    pub excluded: Vec<&'a LibrarySpec>,
}

impl VersionDescriptor {
    pub fn primary_artifact(&self) -> Option<&DownloadArtifact> {
        self.downloads.as_ref()?.client.as_ref()
    }

    pub fn required_java_major(&self) -> u32 {
        self.java_version
            .as_ref()
            .map_or(DEFAULT_JAVA_MAJOR, |j| j.major_version)
    }

    /// Name of the asset index this version uses.
    pub fn asset_index_name(&self) -> &str {
        self.asset_index
            .as_ref()
            .map(|a| a.id.as_str())
            .or(self.assets.as_deref())
            .unwrap_or("legacy")
    }

    pub fn client_logging(&self) -> Option<&ClientLogging> {
        self.logging.as_ref()?.client.as_ref()
    }

    pub fn partition_libraries(&self, env: &RuleEnv) -> LibraryPartition<'_> {
        let (applicable, excluded): (Vec<_>, Vec<_>) =
            self.libraries.iter().partition(|lib| lib.is_applicable(env));
        LibraryPartition {
            applicable,
            excluded,
        }
    }

    /// The argument template, synthesised from `minecraftArguments` when the
    /// descriptor predates structured arguments.
    pub fn argument_template(&self) -> ArgumentTemplate {
        if let Some(arguments) = &self.arguments {
            return arguments.clone();
        }

        let game = self
            .minecraft_arguments
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(ArgumentToken::literal)
            .collect();

        ArgumentTemplate {
            jvm: legacy_jvm_template(),
            game,
        }
    }
}
