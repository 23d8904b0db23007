use anyhow::{Context, Result};
use clap::Args;

use relation_core::{AgentSettings, RelationId};

use super::open_state;

/// Arguments for `relctl show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Relation id.
    pub id: i64,
}

impl ShowArgs {
    pub fn run(self, settings: &AgentSettings) -> Result<()> {
        let manager = open_state(settings)?;
        let st = manager
            .relation(RelationId(self.id))
            .with_context(|| format!("no persisted state for {}", settings.unit))?;
        println!("{}", serde_json::to_string_pretty(&st)?);
        Ok(())
    }
}
