//! `relctl purge`: drop the persisted state of a relation the agent should
//! forget. The next agent start rejoins it if the controller still has the
//! unit in scope.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use relation_core::{AgentSettings, RelationId};

use super::open_state;

/// Arguments for `relctl purge`.
#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Relation id.
    pub id: i64,
}

impl PurgeArgs {
    pub fn run(self, settings: &AgentSettings) -> Result<()> {
        let id = RelationId(self.id);
        let manager = open_state(settings)?;
        if !manager.relation_found(id) {
            bail!("relation {id} has no persisted state for {}", settings.unit);
        }
        manager
            .remove_relation(id)
            .with_context(|| format!("failed to purge relation {id}"))?;
        tracing::info!(relation = %id, unit = %settings.unit, "purged relation state");
        println!("{} relation {id}", "Purged".green());
        Ok(())
    }
}
