use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use vigil_core::probe::SystemClock;
use vigil_runtime::db::Database;
use vigil_runtime::directory::HttpFleetDirectory;
use vigil_runtime::store::PgInstanceStore;
use vigil_runtime::wake::{CoveragePlanner, PlanOutcome, WakeList, WakeTargets};

use super::{init_tracing, load_config};

/// Run a single planning pass and print the wake targets.
#[derive(Parser)]
pub struct PlanCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "vigil.toml")]
    pub config: String,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(long)]
    pub verbose: bool,
}

impl PlanCommand {
    pub async fn execute(self) -> Result<()> {
        init_tracing(self.verbose);
        let config = load_config(&self.config)?;

        let db = Database::from_config(&config.database).await?;
        let store = Arc::new(PgInstanceStore::new(
            db.pool().clone(),
            &config.database.region_query,
        ));
        let wake_list = Arc::new(WakeList::new());
        let planner = CoveragePlanner::new(
            Arc::new(HttpFleetDirectory::from_config(&config.fleet)?),
            store,
            wake_list.clone(),
            Arc::new(SystemClock),
            config.heartbeat.active_instance_window(),
        );

        let outcome = planner.plan_wakeups().await;
        db.close().await;

        match outcome? {
            PlanOutcome::SingleRegion => {
                println!("Single-region fleet: nothing to wake.");
            }
            PlanOutcome::Planned { regions } if regions.is_empty() => {
                println!("Every region is covered by a live instance.");
            }
            PlanOutcome::Planned { .. } => {
                print!("{}", render_targets(&wake_list.snapshot().await));
            }
        }

        Ok(())
    }
}

/// One line per region, candidates in the order they would be tried.
fn render_targets(targets: &WakeTargets) -> String {
    let mut regions: Vec<_> = targets.iter().collect();
    regions.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::new();
    for (region, uris) in regions {
        let uris: Vec<&str> = uris.iter().map(|u| u.as_str()).collect();
        out.push_str(&format!("{}: {}\n", region, uris.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::fleet::PeerUri;

    #[test]
    fn test_render_targets_is_sorted() {
        let targets = WakeTargets::from([
            (
                "EU".to_string(),
                [PeerUri::from("http://eu-2"), PeerUri::from("http://eu-1")]
                    .into_iter()
                    .collect(),
            ),
            (
                "AP".to_string(),
                [PeerUri::from("http://ap-1")].into_iter().collect(),
            ),
        ]);

        assert_eq!(
            render_targets(&targets),
            "AP: http://ap-1\nEU: http://eu-1, http://eu-2\n"
        );
    }
}
