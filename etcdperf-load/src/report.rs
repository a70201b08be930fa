//! Printing of load test results.

use std::io::{self, Write};
use std::time::Duration;

use yansi::Paint;

use crate::engine::LoadTestResult;
use crate::metrics::TaskStats;

/// Prints the report of a finished load test to stdout.
pub fn print_report(result: &LoadTestResult) -> io::Result<()> {
    let stdout = io::stdout();
    write_report(&mut stdout.lock(), result)
}

/// Writes the report of a finished load test.
///
/// The report contains one block per task that issued requests, a block with the totals, and a
/// table of all distinct failures.
pub fn write_report(w: &mut impl Write, result: &LoadTestResult) -> io::Result<()> {
    let metrics = &result.metrics;

    writeln!(w)?;
    write!(
        w,
        "Ran {} users for {:.2?}",
        result.users.bold(),
        result.elapsed.bold()
    )?;
    if result.interrupted {
        write!(w, " {}", "(interrupted)".yellow())?;
    }
    writeln!(w)?;

    for (task, stats) in &metrics.tasks {
        writeln!(w)?;
        write_header(w, &format!("## {task}"), stats)?;
        write_stats(w, stats, result.elapsed)?;
    }

    let total = metrics.total();
    writeln!(w)?;
    write_header(w, "## TOTALS", &total)?;
    if total.requests > 0 {
        write_stats(w, &total, result.elapsed)?;
    }

    if !metrics.failures.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", "## FAILURES".bold().red())?;
        for ((task, message), count) in &metrics.failures {
            writeln!(w, "  {}x {}: {message}", count.bold(), task.bold())?;
        }
    }

    Ok(())
}

fn write_header(w: &mut impl Write, title: &str, stats: &TaskStats) -> io::Result<()> {
    write!(w, "{} ({} requests", title.bold().green(), stats.requests.bold())?;
    if stats.failures > 0 {
        write!(
            w,
            ", {}",
            format!("{} FAILURES", stats.failures).bold().red()
        )?;
    }
    writeln!(w, ")")
}

fn write_stats(w: &mut impl Write, stats: &TaskStats, duration: Duration) -> io::Result<()> {
    writeln!(
        w,
        "  {:.2} requests/s",
        stats.requests_per_second(duration).bold()
    )?;

    let (Some(avg), Some(p50), Some(p90), Some(p95), Some(p99)) = (
        stats.average(),
        stats.quantile(0.5),
        stats.quantile(0.9),
        stats.quantile(0.95),
        stats.quantile(0.99),
    ) else {
        return Ok(());
    };
    writeln!(
        w,
        "  avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p95: {p95:.2?}; p99: {p99:.2?}",
        avg.bold()
    )
}
