//! Entity escaping for the OKS subset.
//!
//! Exactly these entities exist on the wire: `&lt; &gt; &amp; &apos;
//! &quot; &#xD; &#xA; &#x9;`. The writer escapes the corresponding
//! eight characters inside attribute values; the reader rejects any
//! other entity instead of passing it through.

use std::borrow::Cow;

/// Position and message of a failed unescape, relative to the text.
#[derive(Debug)]
pub struct EscapeError {
    pub offset: usize,
    pub message: String,
}

fn entity_for(c: char) -> Option<&'static str> {
    Some(match c {
        '<' => "&lt;",
        '>' => "&gt;",
        '&' => "&amp;",
        '\'' => "&apos;",
        '"' => "&quot;",
        '\r' => "&#xD;",
        '\n' => "&#xA;",
        '\t' => "&#x9;",
        _ => return None,
    })
}

/// Escape the OKS character set; borrows when nothing needs escaping.
pub fn escape(text: &str) -> Cow<'_, str> {
    let first = match text.find(|c| entity_for(c).is_some()) {
        Some(i) => i,
        None => return Cow::Borrowed(text),
    };

    let mut out = String::with_capacity(text.len() + 8);
    out.push_str(&text[..first]);
    for c in text[first..].chars() {
        match entity_for(c) {
            Some(entity) => out.push_str(entity),
            None => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Resolve entities of the OKS subset; any other entity is an error.
pub fn unescape(text: &str) -> Result<Cow<'_, str>, EscapeError> {
    let first = match text.find('&') {
        Some(i) => i,
        None => return Ok(Cow::Borrowed(text)),
    };

    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..first]);
    let mut rest = &text[first..];
    let mut offset = first;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        offset += start;
        let entity_rest = &rest[start..];
        let end = entity_rest.find(';').ok_or_else(|| EscapeError {
            offset,
            message: "unterminated entity".to_string(),
        })?;
        let entity = &entity_rest[..=end];
        out.push(match entity {
            "&lt;" => '<',
            "&gt;" => '>',
            "&amp;" => '&',
            "&apos;" => '\'',
            "&quot;" => '"',
            "&#xD;" | "&#13;" => '\r',
            "&#xA;" | "&#10;" => '\n',
            "&#x9;" | "&#9;" => '\t',
            other => {
                return Err(EscapeError {
                    offset,
                    message: format!("unknown entity \"{other}\""),
                });
            }
        });
        offset += entity.len();
        rest = &entity_rest[end + 1..];
    }
    out.push_str(rest);
    Ok(Cow::Owned(out))
}
