//! Allocation listing.

use anyhow::Result;
use clap::Args;
use convoy_reconcile::{AllocCategory, Reconciler, Snapshot};
use serde::Serialize;
use tabled::Tabled;

use crate::output::print_output;

use super::CommandContext;

/// List allocations and how the reconciler classifies them.
#[derive(Debug, Args)]
pub struct AllocsCommand {
    /// Only show allocations in this category (e.g. lost, migrate).
    #[arg(long)]
    category: Option<String>,
}

/// Allocation row for table display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct AllocRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "NAME")]
    pub name: String,
    #[tabled(rename = "GROUP")]
    pub group: String,
    #[tabled(rename = "NODE")]
    pub node: String,
    #[tabled(rename = "DESIRED")]
    pub desired: String,
    #[tabled(rename = "CLIENT")]
    pub client: String,
    #[tabled(rename = "CATEGORY")]
    pub category: String,
}

impl AllocsCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        let snapshot = ctx.load_snapshot()?;
        let mut rows = Vec::new();
        for job_id in ctx.job_ids(&snapshot)? {
            rows.extend(alloc_rows(&snapshot, &job_id));
        }
        if let Some(category) = self.category.as_deref() {
            rows.retain(|r| r.category == category);
        }
        print_output(&rows, ctx.format);
        Ok(())
    }
}

/// Rows for one job's allocations, in name order.
pub fn alloc_rows(snapshot: &Snapshot, job_id: &str) -> Vec<AllocRow> {
    let nodes = snapshot.node_table();
    let categories = Reconciler::from_snapshot(snapshot, job_id, &nodes).classify();

    let mut rows: Vec<AllocRow> = snapshot
        .job_allocs(job_id)
        .map(|alloc| AllocRow {
            id: alloc.id.to_string(),
            name: alloc.name.clone(),
            group: alloc.task_group.clone(),
            node: alloc
                .node_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            desired: alloc.desired_status.to_string(),
            client: alloc.client_status.to_string(),
            category: categories
                .get(&alloc.id)
                .map(AllocCategory::to_string)
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    rows
}
