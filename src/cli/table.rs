use comfy_table::{Attribute, Cell, ContentArrangement, Table};

/// Whether the current terminal is considered color-capable: respects `NO_COLOR` and
/// `TERM=dumb`, matching the existing CLI's color-detection convention.
#[must_use]
pub fn supports_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var("TERM").map(|t| t == "dumb").unwrap_or(false) {
        return false;
    }
    console::colors_enabled()
}

/// Truncates `text` to `max_len` characters, appending an ellipsis when truncated.
#[must_use]
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_len.saturating_sub(1)).collect();
    format!("{truncated}\u{2026}")
}

/// A minimal comfy-table wrapper: bold header row, dynamic content arrangement, UTF8 preset.
pub struct TableFormatter {
    table: Table,
}

impl TableFormatter {
    #[must_use]
    pub fn new(headers: &[&str]) -> Self {
        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(headers.iter().map(|h| Cell::new(h).add_attribute(Attribute::Bold)));
        Self { table }
    }

    pub fn add_row(&mut self, cells: Vec<String>) -> &mut Self {
        self.table.add_row(cells);
        self
    }

    #[must_use]
    pub fn render(self) -> String {
        self.table.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_text_unchanged() {
        assert_eq!(truncate_text("hello", 10), "hello");
    }

    #[test]
    fn truncate_long_text_appends_ellipsis() {
        let truncated = truncate_text("hello world", 5);
        assert_eq!(truncated.chars().count(), 5);
        assert!(truncated.ends_with('\u{2026}'));
    }

    #[test]
    fn table_renders_header_and_rows() {
        let mut formatter = TableFormatter::new(&["id", "status"]);
        formatter.add_row(vec!["a1".to_string(), "active".to_string()]);
        let rendered = formatter.render();
        assert!(rendered.contains("id"));
        assert!(rendered.contains("a1"));
    }
}
