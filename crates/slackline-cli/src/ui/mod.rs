use console::style;

// Status lines go to stderr; stdout carries command output.

/// Print success message
pub fn success(msg: &str) {
    eprintln!("{} {}", style("✔").green(), msg);
}

/// Print error message
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✖").red(), msg);
}

/// Print info message (indented)
pub fn info(msg: &str) {
    eprintln!("  {}", msg);
}

/// Print a reply received from Slack, skipping blank ones.
pub fn reply(text: &str) {
    let text = text.trim_end();
    if !text.is_empty() {
        println!("{}", style(text).cyan());
    }
}
