//! Merge rules: defaults first, then the experiment file, then environment.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with experiment defaults applied.
///
/// `max_workers` is absent: it has the `processes` alias, and a default under
/// one name would collide with a file value under the other. Its default
/// comes from serde.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("state_filename", "experiment_state.strata")?
        .set_default("rotate_n_state_files", 0i64)?
        .set_default("load_state", true)?
        .set_default("save_state", true)?
        .set_default("n_replicates", 1i64)?
        .set_default("parallel", false)?
        .set_default("fail_fast", false)?
        .set_default("replicate_root", "replicates")
}
