//! Natural ordering for the constituent files of a catalog item, so that
//! "ch2.mp3" plays before "ch10.mp3".

use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut result = Vec::new();
    let mut start = 0;
    let mut in_digits: Option<bool> = None;
    for (i, c) in s.char_indices() {
        let is_digit = c.is_ascii_digit();
        match in_digits {
            Some(prev) if prev != is_digit => {
                result.push(make_chunk(&s[start..i], prev));
                start = i;
            }
            _ => {}
        }
        in_digits = Some(is_digit);
    }
    if let Some(prev) = in_digits {
        result.push(make_chunk(&s[start..], prev));
    }
    result
}

fn make_chunk(s: &str, digits: bool) -> Chunk<'_> {
    if digits {
        Chunk::Digits(s)
    } else {
        Chunk::Text(s)
    }
}

/// Compares digit runs by numeric value without parsing, so runs of any
/// length work.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

fn cmp_chunk(a: &Chunk<'_>, b: &Chunk<'_>) -> Ordering {
    match (a, b) {
        (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
        (Chunk::Text(x), Chunk::Text(y)) => cmp_text(x, y),
        // Digits before text, as in a plain byte-wise comparison
        (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
        (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
    }
}

/// Natural comparison: digit runs numerically, text runs case-insensitively,
/// and a sequence that is a prefix of the other sorts first.
///
/// Names equal under those rules ("a01" / "a1", "A" / "a") fall back to a
/// byte-wise comparison, so the order is total and sorting is deterministic.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a_chunks = chunks(a);
    let b_chunks = chunks(b);
    a_chunks
        .iter()
        .zip(b_chunks.iter())
        .map(|(x, y)| cmp_chunk(x, y))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or_else(|| a_chunks.len().cmp(&b_chunks.len()))
        .then_with(|| a.cmp(b))
}

/// Sorts `names` in place in natural order.
pub fn sort_naturally<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}
