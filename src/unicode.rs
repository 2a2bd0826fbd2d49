//! UTF-16 code unit helpers. Strings are stored as UTF-8 but indexed the
//! way scripts see them, in UTF-16 code units.

pub fn utf8_to_utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

pub fn utf16_to_utf8(v: &[u16]) -> String {
    String::from_utf16_lossy(v)
}

pub fn utf16_len(v: &[u16]) -> usize {
    v.len()
}

pub fn utf16_char_at(v: &[u16], index: usize) -> Option<u16> {
    v.get(index).copied()
}

/// Units in `start..end`, clamped to the string.
pub fn utf16_slice(v: &[u16], start: usize, end: usize) -> &[u16] {
    let end = end.min(v.len());
    if start >= end { &[] } else { &v[start..end] }
}

/// First occurrence of `pattern` at or after `from`.
pub fn utf16_find(v: &[u16], pattern: &[u16], from: usize) -> Option<usize> {
    if from > v.len() {
        return None;
    }
    if pattern.is_empty() {
        return Some(from);
    }
    if pattern.len() > v.len() {
        return None;
    }
    (from..=v.len() - pattern.len()).find(|&i| v[i..i + pattern.len()] == *pattern)
}

/// Last occurrence of `pattern` starting at or before `from`.
pub fn utf16_rfind(v: &[u16], pattern: &[u16], from: usize) -> Option<usize> {
    if pattern.len() > v.len() {
        return None;
    }
    let last = (v.len() - pattern.len()).min(from);
    (0..=last).rev().find(|&i| v[i..i + pattern.len()] == *pattern)
}

/// Code point starting at `index`, combining a surrogate pair.
pub fn code_point_at(v: &[u16], index: usize) -> Option<u32> {
    let first = *v.get(index)?;
    if (0xD800..0xDC00).contains(&first)
        && let Some(&second) = v.get(index + 1)
        && (0xDC00..0xE000).contains(&second)
    {
        return Some(0x10000 + ((first as u32 - 0xD800) << 10) + (second as u32 - 0xDC00));
    }
    Some(first as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn searches_are_bounded() {
        let v = utf8_to_utf16("abcabc");
        let bc = utf8_to_utf16("bc");
        assert_eq!(utf16_find(&v, &bc, 0), Some(1));
        assert_eq!(utf16_find(&v, &bc, 2), Some(4));
        assert_eq!(utf16_rfind(&v, &bc, 3), Some(1));
        assert_eq!(utf16_find(&v, &[], 6), Some(6));
        assert_eq!(utf16_find(&v, &[], 7), None);
    }

    #[test]
    fn surrogate_pairs_combine() {
        let v = utf8_to_utf16("a😀");
        assert_eq!(v.len(), 3);
        assert_eq!(code_point_at(&v, 1), Some(0x1F600));
        assert_eq!(code_point_at(&v, 2), Some(0xDE00));
    }
}
