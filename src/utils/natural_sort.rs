//! 自然排序
//!
//! `chapter 2` 排在 `chapter 10` 之前：数字段按数值比较，其余按小写比较。

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;

/// 排序键的一段
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyPart {
    Number(u128),
    Text(String),
}

fn digit_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]+").expect("digit regex is valid"))
}

/// 把字符串切分成数字段与文本段
pub fn natural_sort_key(s: &str) -> Vec<KeyPart> {
    let mut parts = Vec::new();
    let mut last = 0;
    for m in digit_runs().find_iter(s) {
        if m.start() > last {
            parts.push(KeyPart::Text(s[last..m.start()].to_lowercase()));
        }
        // 超长数字段退化为文本比较
        match m.as_str().parse::<u128>() {
            Ok(n) => parts.push(KeyPart::Number(n)),
            Err(_) => parts.push(KeyPart::Text(m.as_str().to_string())),
        }
        last = m.end();
    }
    if last < s.len() {
        parts.push(KeyPart::Text(s[last..].to_lowercase()));
    }
    parts
}

/// 自然序比较，键相同时按原字符串兜底，保证全序
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_sort_key(a)
        .cmp(&natural_sort_key(b))
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_by_value() {
        let mut names = vec!["Block 10", "block 2", "Block 1", "appendix"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["appendix", "Block 1", "block 2", "Block 10"]);
    }

    #[test]
    fn key_splits_runs() {
        assert_eq!(
            natural_sort_key("q12b"),
            vec![
                KeyPart::Text("q".to_string()),
                KeyPart::Number(12),
                KeyPart::Text("b".to_string()),
            ]
        );
    }

    #[test]
    fn case_only_difference_is_still_ordered() {
        assert_eq!(natural_cmp("A", "a"), Ordering::Less);
    }
}
