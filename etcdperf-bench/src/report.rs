//! Console output of benchmark results.

use yansi::Paint;

use crate::runner::BenchmarkResult;

/// Prints the summary block of a finished benchmark to stdout.
///
/// If no operation succeeded, an error is logged instead and nothing is printed.
pub fn print_result(name: &str, result: &BenchmarkResult) {
    let Some(summary) = result.summary() else {
        tracing::error!(
            benchmark = name,
            errors = result.errors,
            "No successful operations for {name}"
        );
        return;
    };

    println!();
    println!("{}", format!("--- Results for {name} ---").bold());
    if summary.errors > 0 {
        // highlight failures, the remaining lines are printed as they are
        let text = summary.to_string();
        for line in text.lines() {
            if line.starts_with("Errors:") {
                println!("{}", line.bold().red());
            } else {
                println!("{line}");
            }
        }
    } else {
        println!("{summary}");
    }
    println!("{}", "--------------------------".dim());
    println!();
}
