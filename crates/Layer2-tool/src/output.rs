//! Output helpers - 출력 길이 제한

/// 명령 출력 최대 길이 (head + tail 유지)
pub const MAX_OUTPUT_LENGTH: usize = 30_000;

/// 핸들러 진단 메시지 최대 길이
pub const MAX_DIAGNOSTIC_LENGTH: usize = 500;

/// 긴 출력을 앞/뒤 절반씩 남기고 자른다
pub fn truncate_output(output: &str, max_chars: usize) -> String {
    let total = output.chars().count();
    if total <= max_chars {
        return output.to_string();
    }

    let half = max_chars / 2;
    let start: String = output.chars().take(half).collect();
    let end: String = output.chars().skip(total - half).collect();

    format!(
        "{}\n\n... [truncated {} characters] ...\n\n{}",
        start,
        total - half * 2,
        end
    )
}

/// 진단 메시지를 `max_chars` 문자로 자른다 (UTF-8 경계 안전)
pub fn truncate_diagnostic(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let mut cut: String = message.chars().take(max_chars.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_output_untouched() {
        assert_eq!(truncate_output("hello", 10), "hello");
    }

    #[test]
    fn test_head_and_tail_kept() {
        let out = truncate_output("aaaaabbbbbccccc", 10);
        assert!(out.starts_with("aaaaa"));
        assert!(out.ends_with("ccccc"));
        assert!(out.contains("[truncated 5 characters]"));
    }

    #[test]
    fn test_diagnostic_limit_is_char_based() {
        let long = "가".repeat(600);
        let cut = truncate_diagnostic(&long, MAX_DIAGNOSTIC_LENGTH);
        assert_eq!(cut.chars().count(), MAX_DIAGNOSTIC_LENGTH);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_diagnostic("short", 500), "short");
    }
}
