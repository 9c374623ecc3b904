/// Convert 1-based (line, column, width) into an absolute `SourceSpan`.
///
/// `line` and `column` are 1-based to match typical compiler diagnostics;
/// `width` is the number of bytes to underline.
pub fn span_at(src: &str, line: usize, column: usize, width: usize) -> miette::SourceSpan {
    let mut offset = 0usize;
    for (i, l) in src.lines().enumerate() {
        if i + 1 == line {
            offset += column.saturating_sub(1);
            break;
        }
        offset += l.len() + 1;
    }
    miette::SourceSpan::from((offset.min(src.len()), width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_on_first_line() {
        let span = span_at("abc def", 1, 5, 3);
        assert_eq!(span.offset(), 4);
        assert_eq!(span.len(), 3);
    }

    #[test]
    fn span_on_later_line() {
        let span = span_at("ab\ncdef", 2, 2, 1);
        assert_eq!(span.offset(), 4);
    }

    #[test]
    fn span_is_clamped_to_source() {
        let span = span_at("ab", 5, 1, 1);
        assert!(span.offset() <= 2);
    }
}
