use terminal_size::{Width, Height, terminal_size};

use crate::identity::{role_icon, Outcome};
use crate::profiles::{self, Profile, ProfileId};

// Render the coach's member list as an ASCII table.
pub fn print_members(members: &[&Profile]) {
    if members.is_empty() {
        println!("no members");
        return;
    }
    let termw = get_terminal_width();
    let cols: Vec<String> = ["id", "name", "email", "school", "joined"].iter().map(|s| s.to_string()).collect();
    let rows: Vec<Vec<String>> = members.iter().map(|m| member_row(m)).collect();
    for line in render_table(&cols, &rows, termw) {
        println!("{}", line);
    }
    println!("members: {}", members.len());
}

pub fn print_profile(profile: &Profile, role_label: Option<crate::identity::Role>) {
    let name = profiles::display_name(Some(profile), None);
    println!("{} {} ({})", role_icon(role_label), name, profiles::initials(&name));
    let fields: [(&str, Option<&str>); 8] = [
        ("email", profile.email()),
        ("phone", profile.phone.as_deref()),
        ("department", profile.department.as_deref()),
        ("city", profile.city.as_deref()),
        ("school", profile.school_name.as_deref()),
        ("experience", profile.experience_level.as_deref()),
        ("bow", profile.bow_type.as_deref()),
        ("goals", profile.goals.as_deref()),
    ];
    for (label, value) in fields {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            println!("  {:<11}{}", label, v);
        }
    }
    if let Some(y) = profile.joined_year() {
        println!("  {:<11}{}", "member since", y);
    }
}

pub fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Authenticated(id) => {
            println!("\x1b[32mauthenticated\x1b[0m {} {}", role_icon(id.role()), id.email().unwrap_or("(no email)"));
        }
        Outcome::Unauthenticated { redirect, reason } => {
            println!("\x1b[33munauthenticated\x1b[0m ({:?}) -> {}", reason, redirect);
        }
        Outcome::Error { redirect, reason } => {
            println!("\x1b[31merror\x1b[0m ({:?}) -> {}", reason, redirect);
        }
    }
}

fn member_row(m: &Profile) -> Vec<String> {
    let id = match &m.id {
        Some(ProfileId::Num(n)) => n.to_string(),
        Some(ProfileId::Text(s)) => s.clone(),
        None => String::new(),
    };
    vec![
        id,
        format!("{} {}", m.first_name, m.last_name).trim().to_string(),
        m.email().unwrap_or("").to_string(),
        m.school_name.clone().unwrap_or_default(),
        m.date_joined.clone().unwrap_or_default(),
    ]
}

/// Lay out header and rows as table lines, each clipped to `maxw` visible columns.
pub fn render_table(cols: &[String], rows: &[Vec<String>], maxw: usize) -> Vec<String> {
    let mut widths: Vec<usize> = cols.iter().map(|s| visible_len(s).min(maxw)).collect();
    for r in rows {
        for (i, cell) in r.iter().enumerate().take(cols.len()) {
            let w = visible_len(cell);
            if w > widths[i] { widths[i] = w.min(maxw); }
        }
    }
    let sep = build_separator(&widths);
    let mut out = Vec::with_capacity(rows.len() + 4);
    out.push(fit_line_to_width(&sep, maxw));
    out.push(fit_line_to_width(&build_row_header_colored(cols, &widths), maxw));
    out.push(fit_line_to_width(&sep, maxw));
    for r in rows {
        out.push(fit_line_to_width(&build_row(r, &widths), maxw));
    }
    out.push(fit_line_to_width(&sep, maxw));
    out
}

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('+');
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('|');
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).cloned().unwrap_or_default();
        let (text, align_right) = (truncate(&cell, *w), is_numeric_like(&cell));
        let pad = w.saturating_sub(visible_len(&text));
        s.push(' ');
        if align_right {
            s.push_str(&" ".repeat(pad));
            s.push_str(&text);
        } else {
            s.push_str(&text);
            s.push_str(&" ".repeat(pad));
        }
        s.push(' ');
        s.push('|');
    }
    s
}

// Header cells in green; padding follows the visible width.
fn build_row_header_colored(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('|');
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).cloned().unwrap_or_default();
        let text = truncate(&cell, *w);
        s.push(' ');
        s.push_str(&format!("\x1b[32m{}\x1b[0m", text));
        s.push_str(&" ".repeat(w.saturating_sub(visible_len(&text))));
        s.push(' ');
        s.push('|');
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max { return s.to_string(); }
    if max <= 1 { return "…".to_string(); }
    s.chars().take(max - 1).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    let st = s.trim();
    !st.is_empty() && st.chars().all(|c| c.is_ascii_digit())
}

fn get_terminal_width() -> usize {
    if let Some((Width(w), Height(_h))) = terminal_size() {
        return (w as usize).saturating_sub(4).max(20);
    }
    80
}

fn fit_line_to_width(s: &str, maxw: usize) -> String {
    if visible_len(s) <= maxw { return s.to_string(); }
    // Clip visible characters, keeping escape sequences intact.
    let mut out = String::new();
    let mut seen = 0usize;
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            out.push(c);
            for n in chars.by_ref() {
                out.push(n);
                if n.is_ascii_alphabetic() { break; }
            }
            continue;
        }
        if seen + 1 >= maxw {
            out.push('…');
            break;
        }
        out.push(c);
        seen += 1;
    }
    out.push_str("\x1b[0m");
    out
}

// Visible Unicode chars, skipping ANSI CSI sequences.
fn visible_len(s: &str) -> usize {
    let mut count = 0;
    let mut in_escape = false;
    for c in s.chars() {
        if in_escape {
            if c.is_ascii_alphabetic() { in_escape = false; }
            continue;
        }
        if c == '\x1b' { in_escape = true; continue; }
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_pads_to_widest_cell() {
        let cols = vec!["id".to_string(), "name".to_string()];
        let rows = vec![vec!["7".to_string(), "Sarah Smith".to_string()], vec!["12".to_string(), "Jo".to_string()]];
        let lines = render_table(&cols, &rows, 200);
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "+----+-------------+");
        assert_eq!(lines[3], "|  7 | Sarah Smith |");
        assert_eq!(lines[4], "| 12 | Jo          |");
        assert_eq!(visible_len(&lines[1]), lines[0].chars().count());
    }

    #[test]
    fn long_lines_are_clipped() {
        let cols = vec!["school".to_string()];
        let rows = vec![vec!["Target Sports School of the North".to_string()]];
        for line in render_table(&cols, &rows, 16) {
            assert!(visible_len(&line) <= 16, "{}", line);
        }
    }

    #[test]
    fn visible_len_ignores_escapes() {
        assert_eq!(visible_len("\x1b[32mabc\x1b[0m"), 3);
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert!(is_numeric_like(" 42 "));
        assert!(!is_numeric_like("4a"));
    }
}
