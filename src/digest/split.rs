// Telegram rejects messages over 4096 characters and messages with broken
// HTML. Long digests are split into parts that close their open tags at the
// cut and re-open them at the start of the next part.

pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

const TELEGRAM_TAGS: [&str; 6] = ["b", "i", "code", "a", "blockquote", "pre"];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open { name: String, raw: String },
    Close { name: String, raw: String },
    Text(String),
}

impl Token {
    fn len(&self) -> usize {
        match self {
            Token::Open { raw, .. } | Token::Close { raw, .. } => raw.chars().count(),
            Token::Text(text) => text.chars().count(),
        }
    }

    fn raw(&self) -> &str {
        match self {
            Token::Open { raw, .. } | Token::Close { raw, .. } => raw,
            Token::Text(text) => text,
        }
    }
}

pub fn split_html(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let groups = group_blockquotes(tokenize(text));

    let mut parts = vec![];
    let mut current = String::new();
    let mut current_len = 0;
    let mut open: Vec<Token> = vec![];

    for group in groups {
        let group_len: usize = group.iter().map(Token::len).sum();

        if current_len > 0 && current_len + group_len > limit {
            flush(&mut parts, &mut current, &mut current_len, &open);
        }

        if group_len > limit {
            // A group too large for any part (a giant blockquote) is split
            // token by token as a last resort.
            for token in group {
                if current_len > 0 && current_len + token.len() > limit {
                    flush(&mut parts, &mut current, &mut current_len, &open);
                }

                append(&mut current, &mut current_len, &mut open, token);
            }
        } else {
            for token in group {
                append(&mut current, &mut current_len, &mut open, token);
            }
        }
    }

    if current_len > 0 || parts.is_empty() {
        for token in open.iter().rev() {
            if let Token::Open { name, .. } = token {
                current.push_str(&format!("</{}>", name));
            }
        }

        parts.push(current);
    }

    parts
}

pub fn strip_tags(text: &str) -> String {
    tokenize(text)
        .into_iter()
        .filter_map(|token| match token {
            Token::Text(text) => Some(text),
            _ => None,
        })
        .collect()
}

fn flush(parts: &mut Vec<String>, current: &mut String, current_len: &mut usize, open: &[Token]) {
    let mut part = std::mem::take(current);

    for token in open.iter().rev() {
        if let Token::Open { name, .. } = token {
            part.push_str(&format!("</{}>", name));
        }
    }

    parts.push(part);

    // Tags open at the cut re-open at the start of the next part.
    for token in open {
        current.push_str(token.raw());
    }

    *current_len = 0;
}

fn append(current: &mut String, current_len: &mut usize, open: &mut Vec<Token>, token: Token) {
    *current_len += token.len();

    match &token {
        Token::Open { .. } => {
            current.push_str(token.raw());
            open.push(token);
        }
        Token::Close { name, .. } => {
            current.push_str(token.raw());

            if let Some(position) = open.iter().rposition(|open_token| {
                matches!(open_token, Token::Open { name: open_name, .. } if open_name == name)
            }) {
                open.remove(position);
            }
        }
        Token::Text(text) => {
            current.push_str(text);
        }
    }
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = vec![];
    let mut rest = text;

    while let Some(start) = rest.find('<') {
        let (before, tagged) = rest.split_at(start);

        push_text(&mut tokens, before);

        match tagged.find('>') {
            Some(end) => {
                let raw = &tagged[..=end];

                match parse_tag(raw) {
                    Some(token) => tokens.push(token),
                    // An unknown tag is plain text.
                    None => push_text(&mut tokens, raw),
                }

                rest = &tagged[end + 1..];
            }
            None => {
                push_text(&mut tokens, tagged);
                rest = "";
            }
        }
    }

    push_text(&mut tokens, rest);

    tokens
}

fn parse_tag(raw: &str) -> Option<Token> {
    let inner = raw.strip_prefix('<')?.strip_suffix('>')?;

    if let Some(name) = inner.strip_prefix('/') {
        let name = name.trim().to_lowercase();

        return TELEGRAM_TAGS.contains(&name.as_str()).then(|| Token::Close {
            name,
            raw: raw.to_string(),
        });
    }

    let name = inner
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase();

    TELEGRAM_TAGS.contains(&name.as_str()).then(|| Token::Open {
        name,
        raw: raw.to_string(),
    })
}

// Word-sized text chunks, whitespace preserved, so cuts land between words.
fn push_text(tokens: &mut Vec<Token>, text: &str) {
    if text.is_empty() {
        return;
    }

    for chunk in text.split_inclusive(char::is_whitespace) {
        tokens.push(Token::Text(chunk.to_string()));
    }
}

// Blockquotes travel whole; a cut never lands inside one unless the quote
// alone exceeds the limit.
fn group_blockquotes(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let mut groups: Vec<Vec<Token>> = vec![];
    let mut quote: Option<Vec<Token>> = None;

    for token in tokens {
        match (&token, &mut quote) {
            (Token::Open { name, .. }, None) if name == "blockquote" => {
                quote = Some(vec![token]);
            }
            (Token::Close { name, .. }, Some(collected)) if name == "blockquote" => {
                collected.push(token);
                groups.push(quote.take().unwrap());
            }
            (_, Some(collected)) => collected.push(token),
            (_, None) => groups.push(vec![token]),
        }
    }

    if let Some(collected) = quote {
        groups.push(collected);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::{split_html, strip_tags, TELEGRAM_MESSAGE_LIMIT};

    #[test]
    fn short_text_is_a_single_untouched_part() {
        let text = "<b>hello</b> world";

        assert_eq!(split_html(text, TELEGRAM_MESSAGE_LIMIT), vec![text]);
    }

    #[test]
    fn parts_respect_the_limit_with_reopen_slack() {
        let text = format!("<b>{}</b>", "word ".repeat(500));

        let parts = split_html(&text, 100);

        assert!(parts.len() > 1);

        for part in &parts {
            // The closing and re-opened tags are the allowed overhead.
            assert!(part.chars().count() <= 100 + 20);
        }
    }

    #[test]
    fn stripped_parts_concatenate_to_the_original_text() {
        let text = format!(
            "<b>title</b>\n{}<i>tail {}</i>",
            "word ".repeat(300),
            "end ".repeat(100)
        );

        let parts = split_html(&text, 120);

        let rejoined: String = parts
            .iter()
            .map(|part| strip_tags(part))
            .collect::<Vec<String>>()
            .join("");

        assert_eq!(rejoined, strip_tags(&text));
    }

    #[test]
    fn open_tags_reopen_on_the_next_part() {
        let text = format!("<b>{}</b>", "word ".repeat(60));

        let parts = split_html(&text, 100);

        assert!(parts.len() > 1);
        assert!(parts[0].ends_with("</b>"));
        assert!(parts[1].starts_with("<b>"));
    }

    #[test]
    fn links_reopen_with_their_attributes() {
        let text = format!(
            "<a href=\"https://example.com\">{}</a>",
            "word ".repeat(60)
        );

        let parts = split_html(&text, 100);

        assert!(parts.len() > 1);
        assert!(parts[1].starts_with("<a href=\"https://example.com\">"));
    }

    #[test]
    fn blockquotes_are_not_cut() {
        let quote = format!("<blockquote>{}</blockquote>", "quote ".repeat(10));
        let text = format!("{}{}", "word ".repeat(15), quote);

        let parts = split_html(&text, 100);

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1], quote);
    }

    #[test]
    fn unknown_tags_are_treated_as_text() {
        let text = "a <unknown> tag stays";

        assert_eq!(strip_tags(text), "a <unknown> tag stays");
    }
}
