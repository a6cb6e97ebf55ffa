/// Character grid available to a text region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextBudget {
    pub columns: usize,
    pub rows: usize,
}

impl TextBudget {
    /// Estimate the grid from the region's pixel size and the font's cell size.
    pub fn for_region(width_px: u32, height_px: u32, glyph_width: u32, line_height: u32) -> Self {
        Self {
            columns: (width_px / glyph_width.max(1)) as usize,
            rows: (height_px / line_height.max(1)) as usize,
        }
    }
}

/// Greedy word wrap. No line is longer than `budget.columns` characters and no more
/// than `budget.rows` lines are returned; overlong words are cut to the column width.
pub fn wrap_words(text: &str, budget: TextBudget) -> Vec<String> {
    let mut lines = Vec::new();
    if budget.columns == 0 || budget.rows == 0 {
        return lines;
    }

    let mut current = String::new();
    let mut current_len = 0usize;
    for word in text.split_whitespace() {
        let word: String = word.chars().take(budget.columns).collect();
        let word_len = word.chars().count();

        if current_len > 0 && current_len + 1 + word_len > budget.columns {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
            if lines.len() == budget.rows {
                return lines;
            }
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(&word);
        current_len += word_len;
    }
    if current_len > 0 && lines.len() < budget.rows {
        lines.push(current);
    }
    lines
}
