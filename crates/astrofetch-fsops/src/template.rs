//! Placeholder templates such as `{object}/{telescope}/{format}`.

use crate::error::{FsOpsError, FsOpsResult};

/// Value a placeholder expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placeholder {
    Object,
    Telescope,
    Instrument,
    Format,
    Kind,
    Filename,
    Title,
    Mission,
    Date,
    Year,
    Month,
    Day,
    Id,
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "object" => Self::Object,
            "telescope" | "device" => Self::Telescope,
            "instrument" => Self::Instrument,
            "format" | "type" => Self::Format,
            "kind" => Self::Kind,
            "filename" => Self::Filename,
            "title" => Self::Title,
            "mission" | "group" => Self::Mission,
            "date" => Self::Date,
            "year" => Self::Year,
            "month" => Self::Month,
            "day" => Self::Day,
            "id" => Self::Id,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Slot(Placeholder),
}

/// Parsed template; rendering cannot fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Template {
    pieces: Vec<Piece>,
}

impl Template {
    pub(crate) fn parse(field: &'static str, raw: &str) -> FsOpsResult<Self> {
        if raw.trim().is_empty() {
            return Err(FsOpsError::template(field, "template must not be blank", raw));
        }

        let mut pieces = Vec::new();
        let mut rest = raw;
        while let Some(open) = rest.find(['{', '}']) {
            if rest[open..].starts_with('}') {
                return Err(FsOpsError::template(field, "unbalanced braces", raw));
            }
            if open > 0 {
                pieces.push(Piece::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                return Err(FsOpsError::template(field, "unbalanced braces", raw));
            };
            let name = &after[..close];
            let Some(placeholder) = Placeholder::parse(name) else {
                return Err(FsOpsError::template(field, "unknown placeholder", name));
            };
            pieces.push(Piece::Slot(placeholder));
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            pieces.push(Piece::Literal(rest.to_string()));
        }
        Ok(Self { pieces })
    }

    /// Expand every placeholder through `resolve`.
    pub(crate) fn render(&self, mut resolve: impl FnMut(Placeholder) -> String) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Slot(placeholder) => out.push_str(&resolve(*placeholder)),
            }
        }
        out
    }
}
