//! Styled terminal output for driftscan reports.
//!
//! Everything user-facing goes through here (via the `Output` trait);
//! diagnostics go through `tracing` instead.

use owo_colors::OwoColorize;

const GREY: (u8, u8, u8) = (160, 160, 160);
const MINT: (u8, u8, u8) = (152, 225, 152);
const CORAL: (u8, u8, u8) = (255, 160, 160);
const CREAM: (u8, u8, u8) = (255, 230, 160);
const SKY: (u8, u8, u8) = (160, 200, 255);
const LAVENDER: (u8, u8, u8) = (181, 174, 254);
const TEAL: (u8, u8, u8) = (120, 180, 195);

fn grey(text: &str) -> String {
    text.truecolor(GREY.0, GREY.1, GREY.2).to_string()
}

/// Print a success message with a green checkmark
pub fn success(message: &str) {
    println!(
        "{} {}",
        "✓".truecolor(MINT.0, MINT.1, MINT.2).bold(),
        message.bright_white()
    );
}

/// Print an error message with a red X
pub fn error(message: &str) {
    eprintln!(
        "{} {}",
        "✗".truecolor(CORAL.0, CORAL.1, CORAL.2).bold(),
        message.bright_white()
    );
}

/// Print a warning message with a yellow warning symbol
pub fn warning(message: &str) {
    println!(
        "{} {}",
        "⚠".truecolor(CREAM.0, CREAM.1, CREAM.2).bold(),
        message.bright_white()
    );
}

/// Print an info message with a blue info symbol
pub fn info(message: &str) {
    println!(
        "{} {}",
        "ℹ".truecolor(SKY.0, SKY.1, SKY.2).bold(),
        message.bright_white()
    );
}

/// Print a section header with a separator line
pub fn section(title: &str) {
    println!("\n{}", title.truecolor(LAVENDER.0, LAVENDER.1, LAVENDER.2).bold());
    println!("{}", grey(&"─".repeat(50)));
}

/// Print a small section header without separator
pub fn subsection(title: &str) {
    println!("\n{}", title.truecolor(TEAL.0, TEAL.1, TEAL.2));
    println!("{}", grey(&"·".repeat(30)));
}

/// Print a key-value pair with styled key and value
pub fn key_value(key: &str, value: &str) {
    println!("  {} {}", grey(&format!("{}:", key)), value.bright_white());
}

/// Print a key-value pair where the value is highlighted
pub fn key_value_highlight(key: &str, value: &str) {
    println!(
        "  {} {}",
        grey(&format!("{}:", key)),
        value.truecolor(TEAL.0, TEAL.1, TEAL.2).bold()
    );
}

/// Print a dimmed/muted message
pub fn dimmed(message: &str) {
    println!("{}", grey(message));
}

/// Print a remediation command
pub fn command(text: &str) {
    println!("  {}", text.truecolor(CREAM.0, CREAM.1, CREAM.2));
}

/// Print a blank line for spacing
pub fn blank() {
    println!();
}

/// Print a status check result
pub fn status_check(item: &str, available: bool) {
    if available {
        println!(
            "  {} {} {}",
            "✓".truecolor(MINT.0, MINT.1, MINT.2).bold(),
            item.bright_white(),
            grey("available")
        );
    } else {
        println!(
            "  {} {} {}",
            "✗".truecolor(CORAL.0, CORAL.1, CORAL.2).bold(),
            item.bright_white(),
            grey("not found")
        );
    }
}
