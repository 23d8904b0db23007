//! `relctl known`: persisted relations at a glance.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use relation_core::AgentSettings;
use relation_state::RelationState;

use super::open_state;

/// Arguments for `relctl known`.
#[derive(Args, Debug)]
pub struct KnownArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct KnownRow {
    #[tabled(rename = "relation")]
    id: String,
    #[tabled(rename = "created")]
    created: String,
    #[tabled(rename = "members")]
    members: String,
    #[tabled(rename = "app settings")]
    applications: String,
    #[tabled(rename = "pending change")]
    pending: String,
}

impl From<&RelationState> for KnownRow {
    fn from(st: &RelationState) -> Self {
        let versions = |pairs: Vec<String>| {
            if pairs.is_empty() {
                "-".to_string()
            } else {
                pairs.join(", ")
            }
        };
        Self {
            id: st.relation_id.to_string(),
            created: if st.created { "yes" } else { "no" }.to_string(),
            members: versions(
                st.members
                    .iter()
                    .map(|(unit, v)| format!("{unit}@{v}"))
                    .collect(),
            ),
            applications: versions(
                st.application_members
                    .iter()
                    .map(|(app, v)| format!("{app}@{v}"))
                    .collect(),
            ),
            pending: st
                .changed_pending
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
        }
    }
}

impl KnownArgs {
    pub fn run(self, settings: &AgentSettings) -> Result<()> {
        let manager = open_state(settings)?;
        let relations = manager
            .known_ids()
            .into_iter()
            .map(|id| manager.relation(id))
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read relation state")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&relations)?);
            return Ok(());
        }

        if relations.is_empty() {
            println!("No relations persisted for {}.", settings.unit);
            return Ok(());
        }

        println!("{}", format!("Relations of {}", settings.unit).bold());
        let mut table = Table::new(relations.iter().map(KnownRow::from));
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
