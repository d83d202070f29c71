//! 存储文件名：前缀生成与原始文件名清洗。

use chrono::Utc;
use uuid::Uuid;

use crate::config::RenamePolicy;

const RANDOM_PREFIX_BYTES: usize = 6;
const STORED_NAME_MARKER: &str = "-original-";
/// Common per-component limit (ext4, APFS, NTFS).
pub const MAX_STORED_NAME_BYTES: usize = 255;

/// 按策略生成前缀。随机十六进制不检查同名文件，碰撞概率可忽略。
pub fn generate_prefix(policy: RenamePolicy) -> String {
    match policy {
        RenamePolicy::Uuid => Uuid::new_v4().to_string(),
        RenamePolicy::Timestamp => Utc::now().timestamp_millis().to_string(),
        RenamePolicy::RandomHex => {
            let bytes: [u8; RANDOM_PREFIX_BYTES] = rand::random();
            bytes.iter().map(|byte| format!("{byte:02x}")).collect()
        }
    }
}

/// Replaces separators, control characters and reserved characters so the
/// result is always a single path segment.
pub fn sanitize_original_name(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect()
}

/// `<prefix>-original-<name>`，超长时截断文件名主体并保留扩展名。
pub fn stored_name(prefix: &str, original_name: &str) -> String {
    let head = format!("{prefix}{STORED_NAME_MARKER}");
    let budget = MAX_STORED_NAME_BYTES.saturating_sub(head.len());
    let name = fit_to_bytes(&sanitize_original_name(original_name), budget);
    format!("{head}{name}")
}

fn fit_to_bytes(name: &str, budget: usize) -> String {
    if name.len() <= budget {
        return name.to_string();
    }
    let (stem, extension) = match name.rfind('.') {
        Some(index) if name.len() - index < budget => name.split_at(index),
        _ => (name, ""),
    };
    let mut end = budget - extension.len();
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{extension}", &stem[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_hex_prefix_is_twelve_chars() {
        let prefix = generate_prefix(RenamePolicy::RandomHex);
        assert_eq!(prefix.len(), 12);
        assert!(prefix.chars().all(|ch| matches!(ch, '0'..='9' | 'a'..='f')));
        assert_ne!(prefix, generate_prefix(RenamePolicy::RandomHex));
    }

    #[test]
    fn uuid_prefix_parses() {
        let prefix = generate_prefix(RenamePolicy::Uuid);
        assert!(Uuid::parse_str(&prefix).is_ok());
    }

    #[test]
    fn timestamp_prefix_is_millis() {
        let before = Utc::now().timestamp_millis();
        let prefix: i64 = generate_prefix(RenamePolicy::Timestamp)
            .parse()
            .expect("numeric");
        assert!(prefix >= before);
    }

    #[test]
    fn stored_name_strips_separators() {
        assert_eq!(stored_name("abc", "test.png"), "abc-original-test.png");
        assert_eq!(
            stored_name("abc", "../../etc/passwd.txt"),
            "abc-original-.._.._etc_passwd.txt"
        );
        assert_eq!(stored_name("abc", "a\\b:c\0.txt"), "abc-original-a_b_c_.txt");
    }

    #[test]
    fn long_names_are_truncated_keeping_extension() {
        let prefix = generate_prefix(RenamePolicy::Uuid);
        let long = format!("{}.txt", "n".repeat(250));
        let name = stored_name(&prefix, &long);
        assert_eq!(name.len(), MAX_STORED_NAME_BYTES);
        assert!(name.starts_with(&format!("{prefix}-original-nnn")));
        assert!(name.ends_with("n.txt"));

        let wide = format!("{}.mp4", "é".repeat(200));
        let name = stored_name("abc", &wide);
        assert!(name.len() <= MAX_STORED_NAME_BYTES);
        assert!(name.ends_with("é.mp4"));

        let no_ext = "x".repeat(400);
        assert_eq!(stored_name("abc", &no_ext).len(), MAX_STORED_NAME_BYTES);

        assert_eq!(stored_name("abc", "short.png"), "abc-original-short.png");
    }
}
