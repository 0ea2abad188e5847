//! Configuration file wrangling
// (c) 2024 Ross Younger

use super::{Configuration, BASE_CONFIG_FILENAME};

use figment::providers::{Format as _, Serialized, Toml};
use figment::Figment;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::trace;

fn user_config_path() -> Option<PathBuf> {
    // ~/.<filename> for now
    dirs::home_dir().map(|home| home.join(format!(".{BASE_CONFIG_FILENAME}")))
}

fn system_config_path() -> PathBuf {
    PathBuf::from("/etc").join(BASE_CONFIG_FILENAME)
}

fn add_config_file(figment: Figment, path: Option<PathBuf>) -> Figment {
    let Some(path) = path else {
        return figment;
    };
    if !path.exists() {
        trace!("configuration file {path:?} not present");
        return figment;
    }
    figment.merge(Toml::file(path))
}

/// Processes and merges all possible configuration sources.
///
/// Command-line overrides are not handled here; the CLI applies them to
/// the extracted [Configuration] directly.
#[derive(Debug, Default)]
pub struct Manager {
    data: Figment,
}

impl Manager {
    /// Initialises this structure, reading the configuration files
    /// appropriate to the platform and the current user.
    #[must_use]
    pub fn new() -> Self {
        let mut data = Figment::new().merge(Serialized::defaults(Configuration::default()));
        data = add_config_file(data, Some(system_config_path()));
        // N.B. This may leave data in a fused-error state, if a file isn't parseable.
        data = add_config_file(data, user_config_path());
        Self { data }
    }

    /// The list of configuration files we would read, for diagnostics.
    #[must_use]
    pub fn config_files() -> Vec<String> {
        [Some(system_config_path()), user_config_path()]
            .into_iter()
            .flatten()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }

    /// Testing/internal constructor; does not read files from the system.
    #[must_use]
    pub(crate) fn without_files() -> Self {
        let data = Figment::new().merge(Serialized::defaults(Configuration::default()));
        Self { data }
    }

    /// Attempts to extract a particular struct from the merged data.
    pub fn get<'de, T>(&self) -> Result<T, figment::Error>
    where
        T: Deserialize<'de>,
    {
        self.data.extract::<T>()
    }
}
