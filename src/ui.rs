use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{num}/{total}]").blue().bold(), msg);
}

// ============================================================================
// Notices
// ============================================================================

/// Lines of a boxed notice, without color
pub fn notice_lines(title: &str, body: &[String]) -> Vec<String> {
    let width = body
        .iter()
        .map(|l| l.chars().count())
        .chain(std::iter::once(title.chars().count()))
        .max()
        .unwrap_or(0);
    let rule = "*".repeat(width + 4);

    let mut lines = vec![
        rule.clone(),
        format!("* {title:^width$} *"),
        rule.clone(),
    ];
    lines.extend(body.iter().map(|l| format!("* {l:<width$} *")));
    lines.push(rule);
    lines
}

/// Print a boxed notice that should not be missed
pub fn notice(title: &str, body: &[String]) {
    println!();
    for line in notice_lines(title, body) {
        println!("{}", line.green().bold());
    }
    println!();
}

/// Print the stackup banner
pub fn banner() {
    println!(
        "{}",
        r"
      _             _
  ___| |_ __ _  ___| | ___   _ _ __
 / __| __/ _` |/ __| |/ / | | | '_ \
 \__ \ || (_| | (__|   <| |_| | |_) |
 |___/\__\__,_|\___|_|\_\\__,_| .__/
                              |_|
"
        .cyan()
    );
}

// ============================================================================
// Tests
// ============================================================================
