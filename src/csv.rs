//! Minimal CSV codec for the configuration file format.
//!
//! Handles standard quoting: fields containing commas, quotes or newlines
//! are wrapped in double quotes with internal quotes doubled. Parsed fields
//! are whitespace-trimmed; serialization re-quotes as needed.

/// Parse a single CSV line into its fields.
///
/// Quoted fields may contain commas and doubled quotes. Each field is
/// trimmed of surrounding whitespace.
///
/// # Arguments
/// * `line` - One physical line of CSV text (no trailing newline)
///
/// # Returns
/// * `Vec<String>` - The ordered fields of the line
pub fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Doubled quote inside a quoted field
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }

    fields.push(current.trim().to_string());
    fields
}

/// Format one row of fields as a CSV line.
///
/// Fields containing a comma, quote, or newline are quoted with doubled
/// internal quotes, matching standard CSV escaping.
pub fn format_row(fields: &[String]) -> String {
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            let escaped = field.replace('"', "\"\"");
            out.push('"');
            out.push_str(&escaped);
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out
}

/// Split raw CSV text into physical lines, tolerating CRLF endings.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n').map(|l| l.trim_end_matches('\r')).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_fields() {
        assert_eq!(parse_line("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(parse_line(""), vec![""]);
        assert_eq!(parse_line("a,,c"), vec!["a", "", "c"]);
    }

    #[test]
    fn parses_quoted_fields() {
        assert_eq!(parse_line(r#"a,"b,c",d"#), vec!["a", "b,c", "d"]);
        assert_eq!(parse_line(r#""he said ""hi""",x"#), vec![r#"he said "hi""#, "x"]);
    }

    #[test]
    fn trims_whitespace_around_fields() {
        assert_eq!(parse_line(" a , b ,c "), vec!["a", "b", "c"]);
    }

    #[test]
    fn formats_with_escaping() {
        let row = vec!["plain".to_string(), "with,comma".to_string(), "q\"uote".to_string()];
        assert_eq!(format_row(&row), r#"plain,"with,comma","q""uote""#);
    }

    #[test]
    fn quoting_round_trips() {
        let row = vec!["a".to_string(), "b,c".to_string(), r#"d"e"#.to_string(), "".to_string()];
        let line = format_row(&row);
        assert_eq!(parse_line(&line), row);
    }

    #[test]
    fn splits_crlf_lines() {
        assert_eq!(split_lines("a\r\nb\nc"), vec!["a", "b", "c"]);
    }
}
