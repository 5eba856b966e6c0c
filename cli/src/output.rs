//! Terminal status lines for CLI commands

use colored::Colorize;

/// Print success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", "⚠".yellow(), msg);
}

/// Print the outcome of a sweep
pub fn summary(total: usize, failed: usize) {
    if failed == 0 {
        success(&format!("{} profiling cycles completed", total));
    } else {
        warning(&format!(
            "{} of {} profiling cycles failed",
            failed.to_string().red(),
            total
        ));
    }
}
