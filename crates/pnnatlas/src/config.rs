use std::env;
use std::path::PathBuf;

use crate::atlas::ObsoletePolicy;

pub const DEFAULT_STRUCTURES_PATH: &str = "structures.json";
pub const DEFAULT_ID_FIELD: &str = "id";

pub const STRUCTURES_PATH_VAR: &str = "ATLAS_STRUCTURES_PATH";
pub const OBSOLETE_TABLE_VAR: &str = "ATLAS_OBSOLETE_TABLE";
pub const OBSOLETE_POLICY_VAR: &str = "ATLAS_OBSOLETE_POLICY";

/// Values given on the command line; `None`/`false` means "not given".
#[derive(Debug, Clone, Default)]
pub struct Flags {
    pub structures: Option<PathBuf>,
    pub obsolete_table: Option<PathBuf>,
    pub strict: bool,
    pub id_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub structures_path: PathBuf,
    pub obsolete_table: Option<PathBuf>,
    pub policy: ObsoletePolicy,
    pub id_field: String,
}

impl Config {
    /// Flags first, then the process environment, then defaults.
    pub fn load(flags: Flags) -> Self {
        Self::resolve(flags, |key| env::var(key).ok())
    }

    /// Same precedence as [`Config::load`] over an arbitrary variable lookup.
    ///
    /// An unparsable policy variable is ignored, leaving the default policy.
    pub fn resolve<F>(flags: Flags, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let structures_path = flags
            .structures
            .or_else(|| lookup(STRUCTURES_PATH_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STRUCTURES_PATH));
        let obsolete_table = flags
            .obsolete_table
            .or_else(|| lookup(OBSOLETE_TABLE_VAR).map(PathBuf::from));
        let policy = if flags.strict {
            ObsoletePolicy::Strict
        } else {
            lookup(OBSOLETE_POLICY_VAR)
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_default()
        };
        let id_field = flags
            .id_field
            .unwrap_or_else(|| DEFAULT_ID_FIELD.to_string());

        Config {
            structures_path,
            obsolete_table,
            policy,
            id_field,
        }
    }
}
