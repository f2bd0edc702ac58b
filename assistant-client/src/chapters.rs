//! Turns the assistant's numbered-list reply into chapter records.

use serde::{Deserialize, Serialize};

/// Marks where the chapter list starts in the reply.
const LIST_ANCHOR: &str = "1.";

/// A chapter of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// 1-based position in the list
    pub id: usize,
    /// The reply line verbatim, numbering included
    pub name: String,
    pub topics: Vec<String>,
    pub done: bool,
}

impl Chapter {
    pub fn new(id: usize, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            topics: Vec::new(),
            done: false,
        }
    }
}

/// Parse every non-empty line from the first `1.` onward into a chapter.
///
/// Lines are not checked for a `N. name` shape, and only exactly empty lines
/// are skipped. A reply without `1.` yields no chapters.
pub fn parse_chapters(raw: &str) -> Vec<Chapter> {
    let Some(start) = raw.find(LIST_ANCHOR) else {
        return Vec::new();
    };

    raw[start..]
        .split('\n')
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| Chapter::new(i + 1, line))
        .collect()
}
