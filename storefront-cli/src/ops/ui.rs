//! 终端输出辅助：标题、键值对、简单表格。

use chrono::{DateTime, Utc};
use crossterm::style::Stylize;

const BANNER_WIDTH: usize = 56;

/// 终端显示宽度，非 ASCII 字符（CJK、emoji）按两格计
fn display_width(s: &str) -> usize {
    s.chars().map(|c| if c.is_ascii() { 1 } else { 2 }).sum()
}

/// 按显示宽度截断，超出时以 `…` 结尾
fn fit(value: &str, width: usize) -> String {
    if display_width(value) <= width {
        return format!("{}{}", value, " ".repeat(width - display_width(value)));
    }
    let mut out = String::new();
    let mut used = 0;
    for c in value.chars() {
        let w = if c.is_ascii() { 1 } else { 2 };
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    used += 1;
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

pub fn print_header(title: &str) {
    let rule = "─".repeat(BANNER_WIDTH);
    let pad = BANNER_WIDTH.saturating_sub(display_width(title)) / 2;
    println!();
    println!("{}", rule.as_str().dark_cyan());
    println!("{}{}", " ".repeat(pad), title.bold());
    println!("{}", rule.as_str().dark_cyan());
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

pub fn print_kv(key: &str, value: &str) {
    println!("  {:<16} {}", format!("{}:", key).dark_grey(), value);
}

/// 布尔值着色：真为绿色，假为红色
pub fn format_flag(value: bool, yes: &str, no: &str) -> String {
    if value {
        yes.green().to_string()
    } else {
        no.red().to_string()
    }
}

/// 时间统一显示为 UTC 秒级精度
pub fn format_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn join_cells<'a>(cells: impl Iterator<Item = (&'a str, usize)>) -> String {
    cells
        .map(|(value, width)| fit(value, width))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn print_table_header(columns: &[(&str, usize)]) {
    println!();
    println!("  {}", join_cells(columns.iter().copied()).white().bold());
    let total = columns.iter().map(|(_, w)| w + 1).sum::<usize>();
    println!("  {}", "─".repeat(total.saturating_sub(1)).dark_grey());
}

pub fn print_table_row(columns: &[(&str, usize)]) {
    println!("  {}", join_cells(columns.iter().copied()));
}

pub fn print_empty(msg: &str) {
    println!();
    println!("  {}", msg.dark_grey().italic());
    println!();
}

pub fn print_hint(msg: &str) {
    println!("  {} {}", "→".yellow(), msg.dark_grey());
}

#[cfg(test)]
mod tests {
    use super::{display_width, fit, format_time};
    use chrono::TimeZone;

    #[test]
    fn wide_chars_take_two_cells() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("商品"), 4);
    }

    #[test]
    fn fit_pads_short_values() {
        assert_eq!(fit("ab", 4), "ab  ");
    }

    #[test]
    fn fit_truncates_long_values() {
        let cell = fit("Mechanical keyboard", 8);
        assert_eq!(cell, "Mechani…");
    }

    #[test]
    fn times_render_without_fraction() {
        let at = chrono::Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(format_time(&at), "2026-03-04 05:06:07");
    }
}
