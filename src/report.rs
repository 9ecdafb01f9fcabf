//! Table rendering for the one-shot `--check` mode.

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use crate::probe::ProbeResult;

const SECONDS_PER_DAY: i64 = 86_400;

/// Renders one row per probe result: domain, seconds, whole days, status.
pub fn render_table(snapshot: &[ProbeResult]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Domain", "Seconds", "Days", "Status"]);

    for result in snapshot {
        match result {
            ProbeResult::Success {
                domain,
                seconds_until_expiry,
            } => {
                let status = if *seconds_until_expiry < 0 {
                    "EXPIRED"
                } else {
                    "VALID"
                };
                table.add_row(vec![
                    Cell::new(domain),
                    Cell::new(seconds_until_expiry),
                    Cell::new(seconds_until_expiry.div_euclid(SECONDS_PER_DAY)),
                    Cell::new(status),
                ]);
            }
            ProbeResult::Failure { domain, reason, .. } => {
                table.add_row(vec![
                    Cell::new(domain),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new(format!("ERROR: {}", reason)),
                ]);
            }
        }
    }

    table.to_string()
}
