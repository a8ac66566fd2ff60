use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use atlas_match::ObsoleteTables;
use atlas_ontology::{ColorFormat, Ontology, RegionId};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pnnatlas::{Atlas, Config, Flags, ReferenceSet, ReindexReport, read_flat_table};

#[derive(Debug, Parser)]
#[command(name = "pnnatlas", about = "Brain-region hierarchy queries and table re-indexing")]
struct Cli {
    /// Structure list JSON (bare array or `{"msg": [...]}` envelope).
    #[arg(long, global = true)]
    structures: Option<PathBuf>,
    /// Obsolete-id tables replacing the built-in 2017 corrections.
    #[arg(long, global = true)]
    obsolete_table: Option<PathBuf>,
    /// Leave ids that fail to match unmatched instead of resolving them.
    #[arg(long, global = true)]
    strict: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the coarse, mid and cortical reference lists.
    Tiers,
    /// Acronym, name, color and layer for each id.
    Describe {
        #[arg(required = true, num_args = 1.., value_delimiter = ',')]
        ids: Vec<RegionId>,
        #[arg(long, default_value = "hex")]
        color_format: ColorFormat,
    },
    /// Attribute each id to a reference tier or list.
    Match {
        #[arg(required = true, num_args = 1.., value_delimiter = ',')]
        ids: Vec<RegionId>,
        /// `coarse`, `mid`, `cortical`, or comma separated ids.
        #[arg(long, default_value = "coarse")]
        against: ReferenceSet,
    },
    /// Current id for each possibly obsolete id.
    Resolve {
        #[arg(required = true, num_args = 1.., value_delimiter = ',')]
        ids: Vec<RegionId>,
    },
    /// Cortical layer label for each id.
    Layers {
        #[arg(required = true, num_args = 1.., value_delimiter = ',')]
        ids: Vec<RegionId>,
    },
    /// Re-key a JSON row table by coarse, mid and fine region.
    Reindex {
        table: PathBuf,
        #[arg(long)]
        id_field: Option<String>,
    },
}

#[derive(Serialize)]
struct Tiers {
    coarse: Vec<RegionId>,
    mid: Vec<RegionId>,
    cortical: Vec<RegionId>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load(flags(&cli));
    info!("using structures at {}", config.structures_path.display());
    if let Some(path) = &config.obsolete_table {
        info!("using obsolete tables at {}", path.display());
    }
    info!("obsolete policy: {:?}", config.policy);

    let start = Instant::now();
    let ontology = Ontology::load(&config.structures_path)?;
    let mut atlas = Atlas::new(ontology).with_policy(config.policy);
    if let Some(path) = &config.obsolete_table {
        atlas = atlas.with_obsolete_tables(ObsoleteTables::load(path)?);
    }
    info!("atlas loaded in {} ms", start.elapsed().as_millis());

    match cli.command {
        Command::Tiers => emit(&Tiers {
            coarse: atlas.coarse_ids(),
            mid: atlas.mid_ids(),
            cortical: atlas.cortical_ids(),
        }),
        Command::Describe { ids, color_format } => emit(&atlas.describe(&ids, color_format)),
        Command::Match { ids, against } => {
            let reference = atlas.reference_ids(&against);
            emit(&atlas.match_structure_id_lists(&ids, &reference))
        }
        Command::Resolve { ids } => emit(&atlas.resolve(&ids)),
        Command::Layers { ids } => emit(&atlas.ontology().layers(&ids)),
        Command::Reindex { table, .. } => {
            let flat = read_flat_table(&table, &config.id_field)
                .with_context(|| format!("failed to read table {}", table.display()))?;
            info!("re-indexing {} rows", flat.len());
            let report = ReindexReport::from(atlas.reindex_to_hierarchy(flat));
            info!(
                "{} rows kept, {} dropped",
                report.rows.len(),
                report.dropped.len()
            );
            emit(&report)
        }
    }
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn flags(cli: &Cli) -> Flags {
    let id_field = match &cli.command {
        Command::Reindex { id_field, .. } => id_field.clone(),
        _ => None,
    };
    Flags {
        structures: cli.structures.clone(),
        obsolete_table: cli.obsolete_table.clone(),
        strict: cli.strict,
        id_field,
    }
}

fn init_tracing() {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(directives.as_deref()))
        .with_target(false)
        .with_level(true)
        .with_writer(io::stderr)
        .init();
}

/// `RUST_LOG`-style directives, falling back to `info` when absent or invalid.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnnatlas::ObsoletePolicy;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn per_crate_directives_survive() {
        let filter = log_filter(Some("warn,atlas_match=debug"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn cli_flags_feed_config() {
        let cli = Cli::try_parse_from([
            "pnnatlas",
            "--strict",
            "--structures",
            "local.json",
            "reindex",
            "table.json",
            "--id-field",
            "structure_id",
        ])
        .unwrap();
        let config = Config::resolve(flags(&cli), |_| Some("resolve".to_string()));
        assert_eq!(config.structures_path, PathBuf::from("local.json"));
        assert_eq!(config.policy, ObsoletePolicy::Strict);
        assert_eq!(config.id_field, "structure_id");

        let cli = Cli::try_parse_from(["pnnatlas", "match", "593,526", "--against", "mid"]).unwrap();
        let Command::Match { ids, against } = &cli.command else {
            panic!("expected match subcommand");
        };
        assert_eq!(ids, &vec![RegionId(593), RegionId(526)]);
        assert_eq!(against, &ReferenceSet::Mid);
        assert_eq!(flags(&cli).id_field, None);
    }
}
