//! `relctl endpoints`: what the unit's charm declares.

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use relation_core::{AgentSettings, CharmDirReader, CharmReader, Endpoint};

/// Arguments for `relctl endpoints`.
#[derive(Args, Debug)]
pub struct EndpointsArgs {}

#[derive(Tabled)]
struct EndpointRow {
    #[tabled(rename = "endpoint")]
    name: String,
    #[tabled(rename = "role")]
    role: String,
    #[tabled(rename = "interface")]
    interface: String,
    #[tabled(rename = "scope")]
    scope: String,
}

impl From<Endpoint> for EndpointRow {
    fn from(ep: Endpoint) -> Self {
        Self {
            name: ep.name,
            role: ep.role.to_string(),
            interface: ep.interface,
            scope: ep.scope.to_string(),
        }
    }
}

impl EndpointsArgs {
    pub fn run(self, settings: &AgentSettings) -> Result<()> {
        let reader = CharmDirReader::new(settings.charm_dir());
        let meta = reader
            .read()
            .with_context(|| format!("failed to read charm in {}", reader.dir().display()))?;

        let endpoints = meta.endpoints();
        if endpoints.is_empty() {
            println!("Charm {} declares no relations.", meta.name);
            return Ok(());
        }

        let mut table = Table::new(endpoints.into_iter().map(EndpointRow::from));
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
