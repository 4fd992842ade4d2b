//! Whitespace bookkeeping shared by comma-separated lists.
//!
//! A list is stored as entries carrying the verbatim whitespace before and
//! after their value, so `join(entries)` reproduces the source text. Insert
//! and remove infer the list's style (comma-leading or comma-trailing,
//! continuation indent, trailing comma) from the neighbouring entries.

use std::fmt;

/// A list item together with the whitespace around it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Spaced<T> {
    pub head: String,
    pub value: T,
    pub tail: String,
}

impl<T> Spaced<T> {
    pub fn new(value: T) -> Self {
        Self {
            head: String::new(),
            value,
            tail: String::new(),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Spaced<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.head, self.value, self.tail)
    }
}

/// Values that can stand for "formatting only" in a list.
pub trait Blank {
    fn is_blank(&self) -> bool;
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

/// Split `segment` into leading whitespace, trimmed body and trailing
/// whitespace. A whitespace-only segment keeps all of it as the head.
pub(crate) fn split_spacing(segment: &str) -> (String, &str, String) {
    let body = segment.trim();
    if body.is_empty() {
        return (segment.to_string(), "", String::new());
    }
    let start = segment.len() - segment.trim_start().len();
    let end = start + body.len();
    (
        segment[..start].to_string(),
        body,
        segment[end..].to_string(),
    )
}

/// Split on `sep` outside parentheses. `None` if the parentheses do not
/// balance.
pub(crate) fn split_top_level(text: &str, sep: char) -> Option<Vec<&str>> {
    let mut depth = 0usize;
    let mut start = 0;
    let mut parts = Vec::new();
    for (i, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    parts.push(&text[start..]);
    Some(parts)
}

pub(crate) fn join<T: fmt::Display>(entries: &[Spaced<T>]) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Output of an edit that changed something: whitespace-only becomes empty
/// and trailing newlines go.
pub(crate) fn normalize(text: String) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    text.trim_end_matches('\n').to_string()
}

fn filled<T: Blank>(entries: &[Spaced<T>]) -> Vec<usize> {
    (0..entries.len())
        .filter(|&i| !entries[i].value.is_blank())
        .collect()
}

/// Insert `value` before the `position`-th non-blank entry (or after the
/// last one when `position` equals their count). Callers check the bound.
pub(crate) fn insert<T: Blank>(entries: &mut Vec<Spaced<T>>, position: usize, value: T) {
    let filled = filled(entries);
    let n = filled.len();
    if n == 0 {
        entries.clear();
        entries.push(Spaced::new(value));
        return;
    }

    let first = filled[0];
    let last = filled[n - 1];
    let continuation_head = if n >= 2 {
        entries[last].head.clone()
    } else if entries[first].head.contains('\n') {
        entries[first].head.clone()
    } else {
        " ".to_string()
    };
    let inner_tail = if n >= 2 {
        entries[filled[n - 2]].tail.clone()
    } else {
        String::new()
    };

    if position == 0 {
        let head = std::mem::replace(&mut entries[first].head, continuation_head);
        entries.insert(
            first,
            Spaced {
                head,
                value,
                tail: inner_tail,
            },
        );
    } else if position < n {
        entries.insert(
            filled[position],
            Spaced {
                head: continuation_head,
                value,
                tail: inner_tail,
            },
        );
    } else {
        let tail = std::mem::replace(&mut entries[last].tail, inner_tail);
        entries.insert(
            last + 1,
            Spaced {
                head: continuation_head,
                value,
                tail,
            },
        );
    }
}

/// Remove the entry at `index`, handing its outer whitespace to the
/// neighbour that becomes first or last.
pub(crate) fn remove<T: Blank>(entries: &mut Vec<Spaced<T>>, index: usize) {
    let previous = (0..index).rev().find(|&i| !entries[i].value.is_blank());
    let next = (index + 1..entries.len()).find(|&i| !entries[i].value.is_blank());
    match (previous, next) {
        (None, None) => {
            entries.clear();
            return;
        }
        (None, Some(next)) => {
            entries[next].head = entries[index].head.clone();
        }
        (Some(previous), None) => {
            entries[previous].tail = entries[index].tail.clone();
            // Dangling separators after the old last entry go with it.
            entries.truncate(index + 1);
        }
        (Some(_), Some(_)) => {}
    }
    entries.remove(index);
}
