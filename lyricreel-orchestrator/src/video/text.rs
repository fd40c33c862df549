//! Text handling for ffmpeg drawtext overlays

use super::LyricLine;

/// Maximum characters per on-screen lyric line
pub const LYRIC_LINE_BUDGET: usize = 38;

/// Keep only characters that survive ffmpeg filter parsing:
/// ASCII letters, digits, space and `,.?!-()`
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | ',' | '.' | '?' | '!' | '-' | '(' | ')'))
        .collect()
}

/// Sanitize, then escape for use inside a quoted drawtext `text='...'`
pub fn escape_drawtext(text: &str) -> String {
    sanitize_text(text)
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

/// Split a lyric line that exceeds `budget` characters into display lines
///
/// Break preference: last comma within the budget, any comma, last space
/// before the budget, hard break at the budget. The remainder is wrapped the
/// same way. Each piece gets a share of the line's interval proportional to
/// its character count.
pub fn wrap_lyric_line(line: &LyricLine, budget: usize) -> Vec<LyricLine> {
    let pieces = split_text(line.text.trim(), budget.max(1));
    let total_chars: usize = pieces.iter().map(|p| p.chars().count()).sum();
    if pieces.len() <= 1 || total_chars == 0 {
        return vec![line.clone()];
    }

    let span = line.end_time - line.start_time;
    let mut out = Vec::with_capacity(pieces.len());
    let mut consumed = 0usize;
    let mut start = line.start_time;
    let last = pieces.len() - 1;
    for (i, piece) in pieces.into_iter().enumerate() {
        consumed += piece.chars().count();
        let end = if i == last {
            line.end_time
        } else {
            line.start_time + span * consumed as f64 / total_chars as f64
        };
        out.push(LyricLine {
            text: piece,
            start_time: start,
            end_time: end,
        });
        start = end;
    }
    out
}

fn split_text(text: &str, budget: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= budget {
        return vec![text.to_string()];
    }

    let len = chars.len();
    let comma = (1..=budget.min(len - 1))
        .rev()
        .find(|&i| chars[i] == ',')
        .or_else(|| (1..len - 1).find(|&i| chars[i] == ','));

    let (head, tail) = match comma {
        Some(pos) => (collect(&chars[..=pos]), collect(&chars[pos + 1..])),
        None => {
            let space = (1..budget.min(len)).rev().find(|&i| chars[i] == ' ');
            let pos = space.unwrap_or(budget);
            (collect(&chars[..pos]), collect(&chars[pos..]))
        }
    };

    if head.is_empty() || tail.is_empty() {
        let (head, tail) = (collect(&chars[..budget]), collect(&chars[budget..]));
        let mut out = vec![head];
        out.extend(split_text(&tail, budget));
        return out;
    }

    let mut out = vec![head];
    out.extend(split_text(&tail, budget));
    out
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, start: f64, end: f64) -> LyricLine {
        LyricLine {
            text: text.to_string(),
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn sanitize_drops_quotes_and_colons() {
        assert_eq!(sanitize_text("Don't stop: it's 100% (live)!"), "Dont stop its 100 (live)!");
        assert_eq!(sanitize_text("naïve café"), "nave caf");
    }

    #[test]
    fn escape_only_sees_sanitized_text() {
        assert_eq!(escape_drawtext("KEY: A minor"), "KEY A minor");
        assert_eq!(escape_drawtext("rock 'n' roll"), "rock n roll");
    }

    #[test]
    fn short_line_is_untouched() {
        let l = line("under the budget", 1.0, 2.0);
        assert_eq!(wrap_lyric_line(&l, LYRIC_LINE_BUDGET), vec![l]);
    }

    #[test]
    fn prefers_comma_inside_budget() {
        let l = line("I walked along the river, under a silver moon tonight", 10.0, 20.0);
        let wrapped = wrap_lyric_line(&l, LYRIC_LINE_BUDGET);

        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped[0].text, "I walked along the river,");
        assert_eq!(wrapped[1].text, "under a silver moon tonight");
        // 25 of 52 chars
        assert!((wrapped[0].end_time - (10.0 + 10.0 * 25.0 / 52.0)).abs() < 1e-9);
        assert_eq!(wrapped[1].start_time, wrapped[0].end_time);
        assert_eq!(wrapped[1].end_time, 20.0);
    }

    #[test]
    fn falls_back_to_last_space_then_recurses() {
        let text = "one two three four five six seven eight nine ten eleven twelve thirteen";
        let wrapped = wrap_lyric_line(&line(text, 0.0, 9.0), 20);

        assert!(wrapped.len() >= 4);
        for piece in &wrapped {
            assert!(piece.text.chars().count() <= 20, "{:?}", piece.text);
        }
        assert_eq!(wrapped[0].text, "one two three four");
        assert_eq!(wrapped.last().unwrap().end_time, 9.0);
        let rejoined: Vec<&str> = wrapped.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(rejoined.join(" "), text);
    }

    #[test]
    fn hard_break_without_spaces() {
        let text = "a".repeat(50);
        let wrapped = wrap_lyric_line(&line(&text, 0.0, 5.0), LYRIC_LINE_BUDGET);

        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped[0].text.len(), 38);
        assert_eq!(wrapped[1].text.len(), 12);
    }
}
