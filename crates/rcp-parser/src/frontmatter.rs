//! Per-file template frontmatter parsing (§6.2). Templates embed a header
//! block delimited by `---` lines at the top of the file, written in the
//! same structured-document syntax as the recipe itself; everything after
//! the closing delimiter is the template body untouched.

use rcp_core::TemplateFrontmatter;

const DELIMITER: &str = "---";

/// Split `content` into its frontmatter (defaulted if absent) and body.
/// A file with no leading `---` line has no frontmatter at all — not an
/// error, just the default (no `to`, no `skip_if`, not `unless_exists`,
/// no `inject`).
pub fn parse_frontmatter(content: &str) -> (TemplateFrontmatter, &str) {
    let Some(rest) = content.strip_prefix(DELIMITER) else {
        return (TemplateFrontmatter::default(), content);
    };
    // allow `---` or `---\r\n` / `---\n`
    let rest = rest.strip_prefix('\r').unwrap_or(rest);
    let Some(rest) = rest.strip_prefix('\n') else {
        return (TemplateFrontmatter::default(), content);
    };

    let Some(close_idx) = find_closing_delimiter(rest) else {
        return (TemplateFrontmatter::default(), content);
    };

    let header = &rest[..close_idx];
    let body_start = close_idx + DELIMITER.len();
    let mut body = &rest[body_start..];
    body = body.strip_prefix('\r').unwrap_or(body);
    body = body.strip_prefix('\n').unwrap_or(body);

    match toml::from_str::<TemplateFrontmatter>(header) {
        Ok(frontmatter) => (frontmatter, body),
        Err(_) => (TemplateFrontmatter::default(), content),
    }
}

fn find_closing_delimiter(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == DELIMITER {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}
