//! Plan command.

use anyhow::Result;
use clap::Args;
use convoy_reconcile::{reconcile, Plan, Snapshot};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_info, print_json, print_output, print_success, OutputFormat};

use super::CommandContext;

/// Show what one reconciliation pass would do.
#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Also list allocations the pass ignores.
    #[arg(long)]
    show_ignored: bool,
}

/// One intent of a plan, flattened for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct PlanRow {
    #[tabled(rename = "JOB")]
    pub job: String,
    #[tabled(rename = "GROUP")]
    pub group: String,
    #[tabled(rename = "ACTION")]
    pub action: &'static str,
    #[tabled(rename = "NAME")]
    pub name: String,
    #[tabled(rename = "ALLOC")]
    pub alloc: String,
    #[tabled(rename = "REASON")]
    pub reason: String,
}

impl PlanCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        let snapshot = ctx.load_snapshot()?;
        let plans: Vec<Plan> = ctx
            .job_ids(&snapshot)?
            .iter()
            .map(|job_id| reconcile(&snapshot, job_id))
            .collect();

        if ctx.format == OutputFormat::Json {
            print_json(&plans);
            return Ok(());
        }

        let rows: Vec<PlanRow> = plans
            .iter()
            .flat_map(|plan| plan_rows(plan, &snapshot, self.show_ignored))
            .collect();
        print_output(&rows, ctx.format);

        for plan in &plans {
            let totals = plan.totals();
            if plan.is_empty() {
                print_success(&format!("{}: nothing to do", plan.job_id));
            } else {
                print_info(&format!(
                    "{}: place {}, stop {}, migrate {}, lost {}, reschedule {}, ignore {}",
                    plan.job_id,
                    totals.place,
                    totals.stop,
                    totals.migrate,
                    totals.lost,
                    totals.reschedule,
                    totals.ignore
                ));
            }
        }
        Ok(())
    }
}

/// Flattens a plan into rows: stops, then migrations, then placements.
pub fn plan_rows(plan: &Plan, snapshot: &Snapshot, show_ignored: bool) -> Vec<PlanRow> {
    let name_of = |id| {
        snapshot
            .allocations
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.name.clone())
            .unwrap_or_default()
    };

    let mut rows = Vec::new();
    for (group, gp) in &plan.groups {
        let row = |action, name: String, alloc: String, reason: String| PlanRow {
            job: plan.job_id.clone(),
            group: group.clone(),
            action,
            name,
            alloc,
            reason,
        };

        for stop in &gp.stop {
            rows.push(row(
                "stop",
                name_of(stop.alloc_id),
                stop.alloc_id.to_string(),
                stop.reason.to_string(),
            ));
        }
        for migrate in &gp.migrate {
            rows.push(row(
                "migrate",
                migrate.name.clone(),
                migrate.alloc_id.to_string(),
                migrate.reason.as_str().to_string(),
            ));
        }
        for place in &gp.place {
            let alloc = place
                .previous_alloc
                .map(|id| format!("replaces {id}"))
                .unwrap_or_else(|| "-".to_string());
            rows.push(row(
                "place",
                place.name.clone(),
                alloc,
                place.reason.to_string(),
            ));
        }
        if show_ignored {
            for id in &gp.ignore {
                rows.push(row("ignore", name_of(*id), id.to_string(), String::new()));
            }
        }
    }
    rows
}
