use super::ui;
use crate::core::{FetchFailure, FetchOutcome, RefreshScheduler, Snapshot};
use anyhow::Result;
use comfy_table::Cell;
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

impl Snapshot {
    pub fn display_as_table(&self) -> String {
        let currency = &self.local_currency;
        let total = self.total_net_worth();

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("#"),
            ui::header_cell("Asset"),
            ui::header_cell("Amount"),
            ui::header_cell("Price"),
            ui::header_cell(&format!("Value ({})", currency.code)),
            ui::header_cell("Weight (%)"),
            ui::header_cell("1h"),
            ui::header_cell("24h"),
            ui::header_cell("7d"),
        ]);

        for line in &self.lines {
            let record = &line.record;
            let name = match &record.name {
                Some(name) => format!("{name} ({})", record.symbol),
                None => record.symbol.clone(),
            };
            let weight = (!total.is_zero()).then(|| line.net_worth / total * Decimal::ONE_HUNDRED);

            table.add_row(vec![
                ui::format_optional_cell(record.rank, |r| r.to_string()),
                Cell::new(name),
                ui::number_cell(line.amount.normalize().to_string()),
                ui::number_cell(currency.format(record.price)),
                ui::number_cell(currency.format(line.net_worth)),
                ui::format_optional_cell(weight, |w| format!("{:.2}%", w.round_dp(2))),
                ui::change_cell(record.percent_change_1h),
                ui::change_cell(record.percent_change_24h),
                ui::change_cell(record.percent_change_7d),
            ]);
        }

        let mut output = format!(
            "Net worth {}\n\n",
            ui::style_text(
                &self.fetched_at.format("as of %Y-%m-%d %H:%M:%S UTC").to_string(),
                ui::StyleType::Subtle
            )
        );
        output.push_str(&table.to_string());
        output.push_str(&format!(
            "\n\nTotal Value ({}): {}",
            ui::style_text(&currency.code, ui::StyleType::TotalLabel),
            ui::style_text(&currency.format(total), ui::StyleType::TotalValue)
        ));
        output
    }
}

impl FetchFailure {
    pub fn display_as_text(&self) -> String {
        let mut output = format!(
            "{}\n\n{}",
            ui::style_text(&format!("Refresh failed ({})", self.kind), ui::StyleType::Title),
            ui::style_text(&self.message, ui::StyleType::Error)
        );
        for cause in &self.trace {
            output.push_str(&format!(
                "\n  {} {}",
                ui::style_text("caused by:", ui::StyleType::Subtle),
                cause
            ));
        }
        output
    }
}

pub fn render_outcome(outcome: &FetchOutcome) -> String {
    match outcome {
        Ok(snapshot) => snapshot.display_as_table(),
        Err(failure) => failure.display_as_text(),
    }
}

async fn wait_for_outcome(scheduler: &RefreshScheduler) -> FetchOutcome {
    let pb = ui::new_spinner("Fetching prices...");
    let outcome = scheduler.current_outcome().await;
    pb.finish_and_clear();
    outcome
}

/// Prints the outcome of the first cycle.
pub async fn show(scheduler: RefreshScheduler) -> Result<()> {
    let outcome = wait_for_outcome(&scheduler).await;
    scheduler.shutdown();

    println!("{}", render_outcome(&outcome));
    match outcome {
        Ok(_) => Ok(()),
        Err(failure) => anyhow::bail!("{}", failure.message),
    }
}

/// Re-renders whenever a cycle is submitted. Enter forces a refresh, Ctrl-C quits.
pub async fn watch(scheduler: RefreshScheduler) -> Result<()> {
    let mut submitted = scheduler.subscribe();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        let outcome = tokio::select! {
            outcome = wait_for_outcome(&scheduler) => outcome,
            _ = tokio::signal::ctrl_c() => break,
        };
        println!("{}", render_outcome(&outcome));
        println!(
            "\n{}",
            ui::style_text("Press Enter to refresh, Ctrl-C to quit", ui::StyleType::Subtle)
        );

        tokio::select! {
            changed = submitted.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(_)) => scheduler.trigger_now(),
                Ok(None) | Err(_) => {
                    debug!("Stdin closed; manual refresh disabled");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
        submitted.borrow_and_update();
    }

    scheduler.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LocalCurrency;
    use crate::core::{CurrencyLine, FailureKind, PriceRecord};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn line(asset: &str, amount: Decimal, price: Decimal) -> CurrencyLine {
        let mut record = PriceRecord::new(asset, &asset.to_uppercase(), price);
        record.name = Some(asset.to_string());
        record.percent_change_24h = Some(dec!(-2.3456));
        CurrencyLine {
            record,
            amount,
            net_worth: amount * price,
        }
    }

    #[test]
    fn test_snapshot_table_shows_lines_and_total() {
        let snapshot = Snapshot {
            local_currency: LocalCurrency::new("USD"),
            lines: vec![
                line("bitcoin", dec!(2.0), dec!(20000)),
                line("ethereum", dec!(10), dec!(1500)),
            ],
            fetched_at: Utc::now(),
        };

        let output = console::strip_ansi_codes(&snapshot.display_as_table()).to_string();

        assert!(output.contains("bitcoin (BITCOIN)"));
        assert!(output.contains("40000.00 USD"));
        assert!(output.contains("15000.00 USD"));
        assert!(output.contains("Total Value (USD): 55000.00 USD"));
        assert!(output.contains("-2.35%"));
        assert!(output.contains("72.73%"));
    }

    #[test]
    fn test_empty_snapshot_has_no_weights() {
        let outcome: FetchOutcome = Ok(Arc::new(Snapshot {
            local_currency: LocalCurrency::new("EUR"),
            lines: vec![line("bitcoin", dec!(0), dec!(20000))],
            fetched_at: Utc::now(),
        }));

        let output = console::strip_ansi_codes(&render_outcome(&outcome)).to_string();
        assert!(output.contains("Total Value (EUR): 0.00 EUR"));
        assert!(output.contains("N/A"));
    }

    #[test]
    fn test_failure_text_includes_trace() {
        let outcome: FetchOutcome = Err(FetchFailure {
            kind: FailureKind::Transport,
            message: "Request to http://localhost/v1/ticker/bitcoin/ failed".to_string(),
            trace: vec!["connection refused".to_string()],
        });

        let output = console::strip_ansi_codes(&render_outcome(&outcome)).to_string();
        assert!(output.contains("Refresh failed (network error)"));
        assert!(output.contains("caused by: connection refused"));
    }
}
