//! Global constants used throughout the cloudcom codebase.
//!
//! This module contains timeout durations, concurrency parameters, and the
//! fixed names of generated files and symbols. Defining them centrally keeps
//! generated output and lookup code in agreement.

use std::time::Duration;

/// Default timeout for a single component fetch (30 seconds).
///
/// A stalled fetch would otherwise stall the whole transform for that source
/// file; on timeout the component degrades to its error artifact.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for acquiring the cache document lock (60 seconds).
pub const CACHE_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Minimum number of concurrent fetches regardless of CPU count.
pub const MIN_PARALLELISM: usize = 10;

/// Multiplier applied to CPU core count for default fetch concurrency.
pub const PARALLELISM_CORE_MULTIPLIER: usize = 2;

/// Default CPU core count when detection fails.
pub const FALLBACK_CORE_COUNT: usize = 4;

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = "cloudcom.toml";

/// Default artifact directory, relative to the configuration file.
pub const DEFAULT_ARTIFACT_DIR: &str = ".cloudcom";

/// File name of the cache document inside the artifact directory.
pub const CACHE_FILE_NAME: &str = "cache.json";

/// Default prefix for generated component identifiers.
pub const DEFAULT_IDENTIFIER_PREFIX: &str = "CloudComponent";

/// Default module the render helper delegates to.
pub const DEFAULT_RENDERER_MODULE: &str = "@mybricks/render-web";

/// Local name of the shared definition-error fallback component.
pub const DEF_ERROR_COMPONENT: &str = "CloudComponentDefError";

/// Number of hex characters of the triple digest appended to identifiers.
pub const IDENTIFIER_DIGEST_LEN: usize = 8;

/// Suffix of the companion file holding a pre-compiled runtime payload.
pub const COMPILED_CODE_SUFFIX: &str = "CompiledCode";

/// Environment variable that disables progress bars.
pub const NO_PROGRESS_ENV: &str = "CLOUDCOM_NO_PROGRESS";

/// Default fetch concurrency: twice the core count, never below [`MIN_PARALLELISM`].
pub fn default_fetch_parallelism() -> usize {
    let cores = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(FALLBACK_CORE_COUNT);
    std::cmp::max(MIN_PARALLELISM, cores * PARALLELISM_CORE_MULTIPLIER)
}
