// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Ultralytics export metadata stored in ONNX custom properties
//!
//! Exports carry `task`, `names` and `imgsz` as Python literal strings,
//! e.g. `names = "{0: 'cardboard', 1: 'glass'}"` and `imgsz = "[224, 224]"`.

/// Ids beyond this are treated as malformed metadata
const MAX_CLASS_ID: usize = 100_000;

/// What the exported head produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YoloTask {
    Classify,
    Detect,
    /// segment, pose, obb and anything newer
    Other(String),
}

impl YoloTask {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "classify" => YoloTask::Classify,
            "detect" => YoloTask::Detect,
            other => YoloTask::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct YoloMetadata {
    pub task: Option<YoloTask>,
    /// Class names by id; gaps are filled with `class_{id}`
    pub names: Vec<String>,
    pub imgsz: Option<u32>,
}

impl YoloMetadata {
    pub fn from_properties(task: Option<&str>, names: Option<&str>, imgsz: Option<&str>) -> Self {
        Self {
            task: task.map(YoloTask::parse),
            names: names.map(parse_names).unwrap_or_default(),
            imgsz: imgsz.and_then(parse_imgsz),
        }
    }
}

/// Parse a Python dict literal of `{id: 'name'}` pairs
///
/// Malformed entries are skipped rather than failing the whole load.
pub fn parse_names(value: &str) -> Vec<String> {
    let mut pairs: Vec<(usize, String)> = Vec::new();
    let mut chars = value.trim().trim_start_matches('{').chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }

        let mut digits = String::new();
        while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(c);
            chars.next();
        }
        let Ok(id) = digits.parse::<usize>() else {
            break;
        };

        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ':') {
            chars.next();
        }

        let Some(quote) = chars.next().filter(|c| *c == '\'' || *c == '"') else {
            break;
        };

        let mut name = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        name.push(escaped);
                    }
                }
                c if c == quote => {
                    closed = true;
                    break;
                }
                c => name.push(c),
            }
        }
        if !closed {
            break;
        }
        if id <= MAX_CLASS_ID {
            pairs.push((id, name));
        }
    }

    let Some(max_id) = pairs.iter().map(|(id, _)| *id).max() else {
        return Vec::new();
    };

    let mut names: Vec<String> = (0..=max_id).map(|id| format!("class_{}", id)).collect();
    for (id, name) in pairs {
        names[id] = name;
    }
    names
}

/// First integer of `imgsz`, which is either `640` or `[640, 640]`
pub fn parse_imgsz(value: &str) -> Option<u32> {
    value
        .split(|c: char| !c.is_ascii_digit())
        .find(|part| !part.is_empty())
        .and_then(|part| part.parse().ok())
        .filter(|size| *size > 0)
}
