use std::path::{Path, PathBuf};
use std::thread;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use isoquant::{ImpurityTable, QuantError, QuantParams, ReagentKind, ReporterSet};

use crate::tables::{read_impurity_table, read_reporter_table};
use crate::QuanterError;

/// The name of the configuration file read from the working directory
pub const CONFIG_FILE_NAME: &str = "isoquanter.toml";

/// The prefix of environment variables that override the configuration
pub const ENV_PREFIX: &str = "ISOQUANTER_";

/// Everything needed to quantify a batch of files.
///
/// Values are read from `isoquanter.toml` in the working directory, then an
/// optional explicit TOML file, then environment variables prefixed with
/// `ISOQUANTER_`, where `__` separates nested keys
/// (`ISOQUANTER_PARAMS__ANALYSIS_ORDER=3`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuanterConfig {
    /// The instrument files to quantify
    pub input_files: Vec<PathBuf>,

    /// The labeling reagent. `custom` requires `reporter_table`.
    pub reagent: ReagentKind,

    /// A CSV table of `Label,ReporterMass` rows defining custom channels
    pub reporter_table: Option<PathBuf>,

    /// A CSV table of percent isotopic impurities per channel and mass offset
    pub impurity_table: Option<PathBuf>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    pub threads: i32,

    /// The path to write a log file to, in addition to STDERR
    pub log_file: Option<PathBuf>,

    pub params: QuantParams,
}

impl Default for QuanterConfig {
    fn default() -> Self {
        Self {
            input_files: Vec::new(),
            reagent: ReagentKind::default(),
            reporter_table: None,
            impurity_table: None,
            threads: -1,
            log_file: None,
            params: QuantParams::default(),
        }
    }
}

impl QuanterConfig {
    pub fn create_threadpool(&self) -> Result<rayon::ThreadPool, QuanterError> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()?.into()
        };
        debug!("Using {} threads", num_threads);
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?)
    }

    /// The reporter channels to quantify
    pub fn reporter_set(&self) -> Result<ReporterSet, QuanterError> {
        if let Some(reporters) = ReporterSet::builtin(self.reagent) {
            if let Some(path) = self.reporter_table.as_ref() {
                warn!(
                    "Ignoring reporter table {} because {} has built-in channels",
                    path.display(),
                    self.reagent
                );
            }
            return Ok(reporters);
        }
        match self.reporter_table.as_ref() {
            Some(path) => read_reporter_table(path),
            None => Err(QuantError::InvalidReporterSet(
                "custom reagents need a reporter table".into(),
            )
            .into()),
        }
    }

    pub fn impurity_table(&self) -> Result<Option<ImpurityTable>, QuanterError> {
        self.impurity_table
            .as_ref()
            .map(|path| read_impurity_table(path))
            .transpose()
    }

    pub fn to_toml(&self) -> Option<String> {
        toml::to_string_pretty(self).ok()
    }
}

/// Layer the configuration sources on top of the defaults
pub fn load_config(config_file: Option<&Path>) -> Result<QuanterConfig, figment::Error> {
    let mut figment = Figment::from(Serialized::defaults(QuanterConfig::default()))
        .merge(Toml::file(CONFIG_FILE_NAME));
    if let Some(path) = config_file {
        figment = figment.merge(Toml::file_exact(path));
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract()
}
