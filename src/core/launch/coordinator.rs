// ─── Launch Coordinator ───
// Drives one launch request from version id to a running process.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::process::Child;
use tracing::{debug, error, info, instrument, warn};

use crate::core::assets::AssetSynchronizer;
use crate::core::auth::OfflineIdentity;
use crate::core::downloader::{AbortSignal, ArtifactFetcher, ProgressEvent, ProgressSink};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::{HttpTransport, Transport};
use crate::core::java::{LocalRuntimeProvider, RuntimeProvider};
use crate::core::state::{LauncherConfig, LauncherPaths};
use crate::core::version::{
    acquire_libraries, ManifestClient, RuleEnv, VersionDescriptor, VersionIndex, VersionResolver,
};

use super::arguments::{expand, SubstitutionTable};
use super::classpath::{build_classpath, path_arg, Classpath};
use super::natives::extract_natives;
use super::task::{launch_environment, spawn, LaunchPlan};

pub const LAUNCHER_NAME: &str = "ctlauncher";
const DEFAULT_WIDTH: u32 = 854;
const DEFAULT_HEIGHT: u32 = 480;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchState {
    Idle,
    ResolvingVersion,
    AcquiringRuntime,
    AcquiringLibraries,
    AcquiringAssets,
    BuildingArguments,
    Spawning,
    Running,
    Failed,
}

/// What to do when some asset objects could not be downloaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssetFailurePolicy {
    #[default]
    Abort,
    Continue,
}

#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub version_id: String,
    pub username: String,
    /// Overrides `LauncherConfig::memory_mb`.
    pub memory_mb: Option<u32>,
    pub asset_policy: AssetFailurePolicy,
    pub abort: AbortSignal,
}

impl LaunchRequest {
    pub fn new(version_id: impl Into<String>) -> Self {
        Self {
            version_id: version_id.into(),
            username: crate::core::auth::DEFAULT_USERNAME.to_string(),
            memory_mb: None,
            asset_policy: AssetFailurePolicy::default(),
            abort: AbortSignal::new(),
        }
    }
}

/// Linear launch pipeline. One request at a time; callers wanting parallel
/// launches build one coordinator each.
pub struct LaunchCoordinator {
    config: LauncherConfig,
    paths: LauncherPaths,
    fetcher: Arc<ArtifactFetcher>,
    manifest: ManifestClient,
    resolver: VersionResolver,
    runtime: Box<dyn RuntimeProvider>,
    sink: Arc<dyn ProgressSink>,
    env: RuleEnv,
    state: LaunchState,
}

impl LaunchCoordinator {
    pub fn new(
        config: LauncherConfig,
        paths: LauncherPaths,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ProgressSink>,
        runtime: Box<dyn RuntimeProvider>,
    ) -> Self {
        let fetcher = Arc::new(
            ArtifactFetcher::new(transport)
                .with_retry(config.retry_policy())
                .with_idle_timeout(config.timeout())
                .with_concurrency(config.concurrency)
                .with_sink(sink.clone()),
        );
        let manifest = ManifestClient::new(fetcher.clone(), config.manifest_url.clone());
        let resolver = VersionResolver::new(fetcher.clone(), paths.clone());

        Self {
            config,
            paths,
            fetcher,
            manifest,
            resolver,
            runtime,
            sink,
            env: RuleEnv::current(),
            state: LaunchState::Idle,
        }
    }

    /// Production wiring: HTTP transport and locally installed runtimes.
    pub fn from_config(
        config: LauncherConfig,
        paths: LauncherPaths,
        sink: Arc<dyn ProgressSink>,
    ) -> LauncherResult<Self> {
        let transport = Arc::new(HttpTransport::new(config.timeout())?);
        let runtime = Box::new(LocalRuntimeProvider::new(
            config.java_path.clone(),
            paths.runtimes_dir(),
        ));
        Ok(Self::new(config, paths, transport, sink, runtime))
    }

    pub fn with_rule_env(mut self, env: RuleEnv) -> Self {
        self.env = env;
        self
    }

    pub fn state(&self) -> LaunchState {
        self.state
    }

    /// Fetch a fresh version index.
    pub async fn versions(&mut self) -> LauncherResult<Arc<VersionIndex>> {
        self.manifest.refresh().await
    }

    /// Run every acquisition stage and build the plan, without spawning.
    ///
    /// Each request starts from `Idle`, whatever the previous one ended in.
    /// Nothing verified by an earlier request is trusted without re-hashing.
    #[instrument(skip(self, request), fields(version = %request.version_id))]
    pub async fn prepare(&mut self, request: &LaunchRequest) -> LauncherResult<LaunchPlan> {
        let result = self.run_pipeline(request).await;
        self.settle(result)
    }

    /// Prepare, then spawn. Ends in `Running` once the process handle exists.
    pub async fn launch(&mut self, request: &LaunchRequest) -> LauncherResult<(LaunchPlan, Child)> {
        let plan = self.prepare(request).await?;

        let spawned = match check_abort(request, "spawn") {
            Ok(()) => {
                self.enter(LaunchState::Spawning);
                spawn(&plan)
            }
            Err(e) => Err(e),
        };
        let child = self.settle(spawned)?;

        self.enter(LaunchState::Running);
        info!("{} is running (pid {:?})", plan.main_class, child.id());
        Ok((plan, child))
    }

    fn enter(&mut self, state: LaunchState) {
        debug!("Launch state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.sink.emit(ProgressEvent::Stage { state });
    }

    fn settle<T>(&mut self, result: LauncherResult<T>) -> LauncherResult<T> {
        if let Err(e) = &result {
            error!("Launch failed during {:?}: {} ({:?})", self.state, e, e.kind());
            self.enter(LaunchState::Failed);
        }
        result
    }

    async fn run_pipeline(&mut self, request: &LaunchRequest) -> LauncherResult<LaunchPlan> {
        let id = request.version_id.as_str();
        if self.state != LaunchState::Idle {
            self.enter(LaunchState::Idle);
        }
        self.fetcher.begin_session().await;
        self.paths.ensure_layout().await?;

        // 1. Version descriptor
        self.enter(LaunchState::ResolvingVersion);
        let descriptor = self.resolver.resolve(&mut self.manifest, id).await?;
        check_abort(request, "version resolution")?;

        // 2. Runtime
        self.enter(LaunchState::AcquiringRuntime);
        let java_binary = self.runtime.resolve(descriptor.required_java_major()).await?;
        check_abort(request, "runtime acquisition")?;

        // 3. Client jar, libraries, log config, natives
        self.enter(LaunchState::AcquiringLibraries);
        self.acquire_primary(&descriptor).await?;
        let report = acquire_libraries(
            &self.fetcher,
            &descriptor,
            &self.env,
            &self.paths,
            &self.config.libraries_url,
        )
        .await;
        if !report.failed.is_empty() {
            warn!(
                "{} of {} library files unavailable; continuing",
                report.failed.len(),
                report.scheduled
            );
        }
        let log_config = self.acquire_log_config(&descriptor).await;
        extract_natives(&descriptor, &self.env, &self.paths).await?;
        check_abort(request, "library acquisition")?;

        // 4. Assets
        self.enter(LaunchState::AcquiringAssets);
        let game_assets = self.acquire_assets(&descriptor, request).await?;
        check_abort(request, "asset acquisition")?;

        // 5. Classpath and arguments
        self.enter(LaunchState::BuildingArguments);
        let classpath =
            build_classpath(&descriptor, &self.env, &self.paths, &self.config.libraries_url);
        self.ensure_usable_classpath(&descriptor, &classpath)?;

        let identity = OfflineIdentity::new(&request.username);
        let table = self.substitution_table(&descriptor, &identity, &classpath, game_assets);
        let memory_mb = request.memory_mb.unwrap_or(self.config.memory_mb);
        let template = descriptor.argument_template();

        let mut jvm_args = vec![
            format!("-Xmx{}M", memory_mb),
            format!("-Xms{}M", (memory_mb / 2).max(1)),
        ];
        jvm_args.extend(self.config.extra_jvm_args.iter().cloned());
        jvm_args.extend(expand(&template.jvm, &self.env, &table));
        if let (Some(logging), Some(path)) = (descriptor.client_logging(), log_config) {
            jvm_args.push(logging.argument.replace("${path}", &path_arg(&path)));
        }
        let game_args = expand(&template.game, &self.env, &table);

        let env = launch_environment(
            self.env.platform,
            &java_binary,
            &classpath.natives_dir,
            |var| std::env::var(var).ok(),
        );

        info!(
            "Prepared {}: {} classpath entries, {} JVM args, {} game args",
            id,
            classpath.entries.len(),
            jvm_args.len(),
            game_args.len()
        );

        Ok(LaunchPlan {
            java_binary,
            jvm_args,
            main_class: descriptor.main_class.clone(),
            game_args,
            working_directory: self.paths.root().to_path_buf(),
            env,
        })
    }

    /// The client jar is required. It is re-verified on every launch.
    async fn acquire_primary(&self, descriptor: &VersionDescriptor) -> LauncherResult<()> {
        let name = format!("client jar {}", descriptor.id);
        let artifact = descriptor
            .primary_artifact()
            .ok_or_else(|| LauncherError::MissingRequiredArtifact {
                name: name.clone(),
                reason: "descriptor has no client download".into(),
            })?;

        self.fetcher
            .fetch(
                &artifact.url,
                &self.paths.client_jar(&descriptor.id),
                &name,
                artifact.sha1.as_deref(),
            )
            .await
            .map_err(|e| LauncherError::MissingRequiredArtifact {
                name,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Optional: a missing log config only drops the logging argument.
    async fn acquire_log_config(&self, descriptor: &VersionDescriptor) -> Option<PathBuf> {
        let logging = descriptor.client_logging()?;
        let path = self.paths.log_config(&logging.file.id);
        match self
            .fetcher
            .fetch(
                &logging.file.url,
                &path,
                &format!("log config {}", logging.file.id),
                logging.file.sha1.as_deref(),
            )
            .await
        {
            Ok(_) => Some(path),
            Err(e) => {
                warn!("Log config {} unavailable: {}", logging.file.id, e);
                None
            }
        }
    }

    /// Returns the directory `${game_assets}` should point at.
    async fn acquire_assets(
        &self,
        descriptor: &VersionDescriptor,
        request: &LaunchRequest,
    ) -> LauncherResult<PathBuf> {
        let Some(index_ref) = &descriptor.asset_index else {
            warn!("{} has no asset index; skipping assets", descriptor.id);
            return Ok(self.paths.assets_dir());
        };

        let report = AssetSynchronizer::new(
            self.fetcher.clone(),
            self.paths.clone(),
            self.config.resources_url.clone(),
        )
        .with_progress_every(self.config.progress_every)
        .sync(index_ref, &request.abort)
        .await?;

        if !report.is_complete() {
            match request.asset_policy {
                AssetFailurePolicy::Abort => {
                    return Err(LauncherError::MissingRequiredArtifact {
                        name: format!("assets {}", index_ref.id),
                        reason: format!("{} of {} objects failed", report.failed, report.total),
                    });
                }
                AssetFailurePolicy::Continue => warn!(
                    "Continuing with {} of {} assets missing",
                    report.failed, report.total
                ),
            }
        }

        Ok(report
            .virtual_dir
            .unwrap_or_else(|| self.paths.assets_dir()))
    }

    /// A descriptor that lists classpath libraries must end up with at least
    /// one of them on disk.
    fn ensure_usable_classpath(
        &self,
        descriptor: &VersionDescriptor,
        classpath: &Classpath,
    ) -> LauncherResult<()> {
        let expected = descriptor
            .partition_libraries(&self.env)
            .applicable
            .iter()
            .filter(|lib| lib.main_artifact(&self.config.libraries_url).is_some())
            .count();

        if expected > 0 && classpath.library_count() == 0 {
            return Err(LauncherError::MissingRequiredArtifact {
                name: format!("libraries for {}", descriptor.id),
                reason: format!("none of {} classpath libraries are available", expected),
            });
        }
        Ok(())
    }

    fn substitution_table(
        &self,
        descriptor: &VersionDescriptor,
        identity: &OfflineIdentity,
        classpath: &Classpath,
        game_assets: PathBuf,
    ) -> SubstitutionTable {
        let platform = self.env.platform;
        let mut table = SubstitutionTable::new();
        table
            .insert("auth_player_name", identity.username.as_str())
            .insert("auth_uuid", identity.uuid_simple())
            .insert("auth_access_token", identity.access_token.as_str())
            .insert("auth_session", identity.access_token.as_str())
            .insert("auth_xuid", "0")
            .insert("clientid", "0")
            .insert("user_type", identity.user_type.as_str())
            .insert("user_properties", "{}")
            .insert("version_name", descriptor.id.as_str())
            .insert(
                "version_type",
                descriptor.version_type.as_deref().unwrap_or("release"),
            )
            .insert("game_directory", path_arg(self.paths.root()))
            .insert("assets_root", path_arg(&self.paths.assets_dir()))
            .insert("game_assets", path_arg(&game_assets))
            .insert("assets_index_name", descriptor.asset_index_name())
            .insert("natives_directory", path_arg(&classpath.natives_dir))
            .insert("library_directory", path_arg(&self.paths.libraries_dir()))
            .insert("classpath", classpath.join(platform))
            .insert("classpath_separator", platform.classpath_separator())
            .insert("launcher_name", LAUNCHER_NAME)
            .insert("launcher_version", env!("CARGO_PKG_VERSION"))
            .insert("resolution_width", DEFAULT_WIDTH.to_string())
            .insert("resolution_height", DEFAULT_HEIGHT.to_string());
        table
    }
}

fn check_abort(request: &LaunchRequest, stage: &str) -> LauncherResult<()> {
    if request.abort.is_aborted() {
        return Err(LauncherError::Aborted(format!("after {}", stage)));
    }
    Ok(())
}
