//! HTML and plain-text rendering of a buffered report.

use std::fmt::Write;

use serde_json::Value;

pub(crate) struct Rendered {
    pub html: String,
    pub text: String,
}

pub(crate) fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn render(title: &str, headers: &[String], rows: &[Vec<Value>], truncated: u64) -> Rendered {
    let mut html = String::new();
    let _ = write!(html, "<h2>{}</h2>", escape_html(title));
    html.push_str("<table border=\"1\" cellpadding=\"4\" cellspacing=\"0\"><thead><tr>");
    for h in headers {
        let _ = write!(html, "<th>{}</th>", escape_html(h));
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            let _ = write!(html, "<td>{}</td>", escape_html(&cell_text(cell)));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");

    let mut text = format!("{title}\n\n{}\n", headers.join("\t"));
    for row in rows {
        let cells: Vec<String> = row.iter().map(cell_text).collect();
        text.push_str(&cells.join("\t"));
        text.push('\n');
    }

    if truncated > 0 {
        let notice = format!("{truncated} more rows were not included.");
        let _ = write!(html, "<p><em>{notice}</em></p>");
        let _ = write!(text, "\n{notice}\n");
    }
    if rows.is_empty() {
        html.push_str("<p>The report returned no rows.</p>");
        text.push_str("\nThe report returned no rows.\n");
    }
    Rendered { html, text }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_cells_and_headers_escaped() {
        let out = render(
            "Q&A <weekly>",
            &["name".into(), "note".into()],
            &[vec![json!("<script>alert(1)</script>"), json!(null)]],
            0,
        );
        assert!(out.html.contains("<h2>Q&amp;A &lt;weekly&gt;</h2>"));
        assert!(out.html.contains("<td>&lt;script&gt;alert(1)&lt;/script&gt;</td><td></td>"));
        assert!(!out.html.contains("<script>"));
    }

    #[test]
    fn test_truncation_notice() {
        let out = render("r", &["a".into()], &[vec![json!(1)]], 41);
        assert!(out.html.contains("41 more rows were not included."));
        assert!(out.text.ends_with("41 more rows were not included.\n"));
    }

    #[test]
    fn test_plain_text_is_tab_separated() {
        let out = render("r", &["a".into(), "b".into()], &[vec![json!(1), json!(true)]], 0);
        assert_eq!(out.text, "r\n\na\tb\n1\ttrue\n");
    }
}
