//! The engine's two option records. [`EngineOptions`] configures an
//! `Engine` once at construction time (cache root, trust store path,
//! default parallelism); [`Options`] is the per-call record documented in
//! §6.3, carrying exactly those recognized fields — there is no catch-all
//! field, so an unrecognized option is rejected simply by not compiling.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rcp_resolver::PromptChannel;
use rcp_scheduler::ProgressCallback;
use rcp_source::TrustPrompt;
use rcp_tools::{ActionRegistry, CustomTransformRegistry};

/// Constructor-time configuration (§B "Recipe-external settings ... are
/// passed in through `EngineOptions` rather than discovered from ambient
/// config files").
pub struct EngineOptions {
    pub cache_root: PathBuf,
    pub lock_path: PathBuf,
    pub trust_store_path: PathBuf,
    pub interactive: bool,
    pub trust_prompt: Arc<dyn TrustPrompt>,
    pub cache_ttl: Duration,
    pub default_max_parallel_steps: usize,
    pub actions: Arc<ActionRegistry>,
    pub custom_transforms: Arc<CustomTransformRegistry>,
}

impl EngineOptions {
    /// Defaults for a driver that passes nothing beyond its action/
    /// transform registrations: `~/.cache/recipe-engine/sources` for the
    /// fetch cache and `~/.local/share/recipe-engine/trust.toml` for the
    /// trust store, using the platform's standard cache/data directories.
    pub fn defaults(actions: Arc<ActionRegistry>, custom_transforms: Arc<CustomTransformRegistry>) -> Self {
        Self {
            cache_root: rcp_source::cache::default_cache_root(),
            lock_path: default_trust_lock_path(),
            trust_store_path: default_trust_store_path(),
            interactive: false,
            trust_prompt: Arc::new(rcp_source::NeverPrompt),
            cache_ttl: rcp_source::DEFAULT_TTL,
            default_max_parallel_steps: 4,
            actions,
            custom_transforms,
        }
    }
}

fn default_trust_store_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.data_dir().join("recipe-engine").join("trust.toml"))
        .unwrap_or_else(|| PathBuf::from(".recipe-engine-trust.toml"))
}

fn default_trust_lock_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.data_dir().join("recipe-engine").join("trust.lock"))
        .unwrap_or_else(|| PathBuf::from(".recipe-engine-trust.lock"))
}

/// The per-call record of §6.3: `dry_run`, `force`, `skip_prompts`,
/// `max_parallel_steps`, `global_timeout_ms`, `working_dir`,
/// `progress_callback`, `interactive_channel`.
#[derive(Clone, Default)]
pub struct Options {
    pub dry_run: bool,
    pub force: bool,
    pub skip_prompts: bool,
    pub max_parallel_steps: Option<usize>,
    pub global_timeout_ms: Option<u64>,
    pub working_dir: Option<PathBuf>,
    pub progress_callback: Option<ProgressCallback>,
    pub interactive_channel: Option<Arc<dyn PromptChannel + Send + Sync>>,
}
