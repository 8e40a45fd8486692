/// Drops every non-ASCII character and trims the result.
///
/// Removed characters are not replaced, so `"Sm\u{ef}th"` becomes `"Smth"`;
/// downstream consumers rely on this exact output. The trim also strips the
/// ASCII separators `\x1c`..=`\x1f`, which Unicode does not count as whitespace.
pub fn sanitize(text: &str) -> String {
    let ascii: String = text.chars().filter(char::is_ascii).collect();
    ascii.trim_matches(is_trimmed).to_string()
}

fn is_trimmed(ch: char) -> bool {
    ch.is_whitespace() || ('\x1c'..='\x1f').contains(&ch)
}
