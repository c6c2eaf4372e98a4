// SPDX-License-Identifier: Apache-2.0

use crate::ast::Span;

/// Line and column of a position, line based one and column based zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Maps byte offsets of one source file to line and column numbers
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(contents: &str) -> Self {
        let line_starts = contents
            .char_indices()
            .filter(|(_, c)| *c == '\n')
            .map(|(ind, _)| ind + 1)
            .collect();

        LineIndex { line_starts }
    }

    /// Convert an offset to line and column number, based zero
    pub fn offset_to_line_column(&self, loc: usize) -> (usize, usize) {
        let line_no = self
            .line_starts
            .partition_point(|line_start| loc >= *line_start);

        let col_no = if line_no > 0 {
            loc - self.line_starts[line_no - 1]
        } else {
            loc
        };

        (line_no, col_no)
    }

    pub fn position(&self, offset: usize) -> Position {
        let (line, column) = self.offset_to_line_column(offset);

        Position {
            line: line + 1,
            column,
        }
    }

    pub fn span_positions(&self, span: Span) -> (Position, Position) {
        (self.position(span.start), self.position(span.end))
    }
}
