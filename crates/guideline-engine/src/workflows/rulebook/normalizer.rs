/// `"§ 2B1.1 "` and `"2b1.1"` both name `2B1.1`.
pub fn normalize_offense_code(value: &str) -> String {
    strip_invisible(value)
        .trim_start_matches('§')
        .split_whitespace()
        .collect::<String>()
        .to_ascii_uppercase()
}

pub(crate) fn normalize_citation(value: &str) -> String {
    strip_invisible(value)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_invisible(value: &str) -> String {
    value.replace(['\u{feff}', '\u{200b}'], "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offense_codes_drop_section_sign_and_whitespace() {
        assert_eq!(normalize_offense_code("\u{feff}§ 2b1.1 "), "2B1.1");
        assert_eq!(normalize_offense_code("2K2.1"), "2K2.1");
    }

    #[test]
    fn citations_collapse_whitespace() {
        assert_eq!(normalize_citation("  §3E1.1   (a) "), "§3E1.1 (a)");
    }
}
