//! # Line List
//!
//! A `Deck` is the ordered, mutable sequence of netlist lines the expander
//! works on. Lines live in an arena and are linked by index, so splicing a
//! region in or out only touches the neighbours of that region.
//!
//! ## Ownership
//!
//! - A `Line` belongs to exactly one `Deck` at a time. Splicing moves lines,
//!   it never shares them.
//! - `LineId` is a generational index. An id that outlived its line (the slot
//!   was freed and reused) resolves to `None` instead of a different line.
//!
//! Disabled lines are retained for traceability and render with a leading `*`.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// LINE
// ============================================================================

/// A single netlist record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// The statement text, without any comment marker.
    pub text: String,
    /// 1-based line number in the originating source, 0 when synthesized.
    pub line_no: usize,
    /// Error or warning attached by the expander.
    pub error: Option<String>,
    /// Commented out. Disabled lines are never expanded or translated.
    pub disabled: bool,
}

impl Line {
    pub fn new(text: impl Into<String>, line_no: usize) -> Self {
        Self {
            text: text.into(),
            line_no,
            error: None,
            disabled: false,
        }
    }

    /// A line created by the expander rather than read from a source.
    pub fn synthesized(text: impl Into<String>) -> Self {
        Self::new(text, 0)
    }

    pub fn comment_out(&mut self) {
        self.disabled = true;
    }

    pub fn is_live(&self) -> bool {
        !self.disabled
    }

    /// The first whitespace-delimited word of the statement.
    pub fn keyword(&self) -> &str {
        self.text.split_whitespace().next().unwrap_or("")
    }

    /// Attaches a message, keeping the first one if several are reported.
    pub fn set_error(&mut self, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(message.into());
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.disabled {
            write!(f, "*{}", self.text)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

// ============================================================================
// DECK
// ============================================================================

/// Handle to a line inside one particular `Deck`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Slot {
    line: Option<Line>,
    generation: u32,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Ordered list of lines with O(1) local insertion and removal.
#[derive(Debug, Clone, Default)]
pub struct Deck {
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl Deck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a deck from already split lines.
    pub fn from_lines<I: IntoIterator<Item = Line>>(lines: I) -> Self {
        let mut deck = Self::new();
        for line in lines {
            deck.push_back(line);
        }
        deck
    }

    /// Splits source text into lines.
    ///
    /// Lines starting with `+` continue the previous statement. Lines starting
    /// with `*` are comments and come in disabled. Blank lines are dropped.
    pub fn from_source(source: &str) -> Self {
        let mut deck = Self::new();
        for (idx, raw) in source.lines().enumerate() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix('+') {
                if let Some(tail) = deck.last_mut() {
                    if tail.is_live() {
                        tail.text.push(' ');
                        tail.text.push_str(rest.trim());
                        continue;
                    }
                }
            }
            let mut line = Line::new(trimmed, idx + 1);
            if let Some(comment) = trimmed.strip_prefix('*') {
                line.text = comment.to_string();
                line.comment_out();
            }
            deck.push_back(line);
        }
        deck
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when the deck holds no live line.
    pub fn is_blank(&self) -> bool {
        self.iter().all(|line| !line.is_live())
    }

    pub fn first(&self) -> Option<LineId> {
        self.head.map(|index| self.id_at(index))
    }

    pub fn last(&self) -> Option<LineId> {
        self.tail.map(|index| self.id_at(index))
    }

    pub fn next(&self, id: LineId) -> Option<LineId> {
        let slot = self.slot(id)?;
        slot.next.map(|index| self.id_at(index))
    }

    pub fn prev(&self, id: LineId) -> Option<LineId> {
        let slot = self.slot(id)?;
        slot.prev.map(|index| self.id_at(index))
    }

    pub fn get(&self, id: LineId) -> Option<&Line> {
        self.slot(id)?.line.as_ref()
    }

    pub fn get_mut(&mut self, id: LineId) -> Option<&mut Line> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.line.as_mut()
    }

    fn last_mut(&mut self) -> Option<&mut Line> {
        let index = self.tail?;
        self.slots[index].line.as_mut()
    }

    /// Snapshot of the current line ids, in order.
    pub fn ids(&self) -> Vec<LineId> {
        let mut ids = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(index) = cursor {
            ids.push(self.id_at(index));
            cursor = self.slots[index].next;
        }
        ids
    }

    pub fn iter(&self) -> DeckIter<'_> {
        DeckIter {
            deck: self,
            cursor: self.head,
        }
    }

    pub fn push_back(&mut self, line: Line) -> LineId {
        let index = self.alloc(line);
        self.link_after(self.tail, index);
        self.id_at(index)
    }

    pub fn push_front(&mut self, line: Line) -> LineId {
        let index = self.alloc(line);
        self.link_after(None, index);
        self.id_at(index)
    }

    /// Inserts `line` right after `at`. Returns `None` for a stale id.
    pub fn insert_after(&mut self, at: LineId, line: Line) -> Option<LineId> {
        self.slot(at)?;
        let index = self.alloc(line);
        self.link_after(Some(at.index), index);
        Some(self.id_at(index))
    }

    /// Unlinks and returns a line, freeing its slot.
    pub fn remove(&mut self, id: LineId) -> Option<Line> {
        self.slot(id)?;
        let (prev, next) = {
            let slot = &self.slots[id.index];
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
        let slot = &mut self.slots[id.index];
        slot.prev = None;
        slot.next = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        slot.line.take()
    }

    /// Marks a line disabled. Returns false for a stale id.
    pub fn comment_out(&mut self, id: LineId) -> bool {
        match self.get_mut(id) {
            Some(line) => {
                line.comment_out();
                true
            }
            None => false,
        }
    }

    /// Moves every line of `other` in after `at`, preserving order.
    ///
    /// Cost is proportional to `other.len()`. Returns the id of the last line
    /// spliced in, or `at` itself when `other` was empty.
    pub fn splice_after(&mut self, at: LineId, other: Deck) -> Option<LineId> {
        self.slot(at)?;
        let mut anchor = at.index;
        for line in other.into_lines() {
            let index = self.alloc(line);
            self.link_after(Some(anchor), index);
            anchor = index;
        }
        Some(self.id_at(anchor))
    }

    /// Moves every line of `other` to the front of this deck.
    pub fn splice_front(&mut self, other: Deck) {
        let mut anchor: Option<usize> = None;
        for line in other.into_lines() {
            let index = self.alloc(line);
            self.link_after(anchor, index);
            anchor = Some(index);
        }
    }

    /// Clones the lines from `from` to `to` inclusive into a fresh deck.
    pub fn copy_range(&self, from: LineId, to: LineId) -> Deck {
        let mut out = Deck::new();
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            if let Some(line) = self.get(id) {
                out.push_back(line.clone());
            }
            if id == to {
                break;
            }
            cursor = self.next(id);
        }
        out
    }

    /// Independent, compacted copy of the deck.
    pub fn copy_deep(&self) -> Deck {
        Deck::from_lines(self.iter().cloned())
    }

    /// Drops every line.
    pub fn destroy(&mut self) {
        *self = Deck::new();
    }

    pub fn into_lines(self) -> Vec<Line> {
        let mut slots = self.slots;
        let mut lines = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(index) = cursor {
            cursor = slots[index].next;
            if let Some(line) = slots[index].line.take() {
                lines.push(line);
            }
        }
        lines
    }

    /// Renders only the live lines.
    pub fn enabled_text(&self) -> String {
        let mut out = String::new();
        for line in self.iter().filter(|line| line.is_live()) {
            out.push_str(&line.text);
            out.push('\n');
        }
        out
    }

    // ------------------------------------------------------------------------
    // Arena plumbing
    // ------------------------------------------------------------------------

    fn id_at(&self, index: usize) -> LineId {
        LineId {
            index,
            generation: self.slots[index].generation,
        }
    }

    fn slot(&self, id: LineId) -> Option<&Slot> {
        let slot = self.slots.get(id.index)?;
        if slot.generation != id.generation || slot.line.is_none() {
            return None;
        }
        Some(slot)
    }

    fn alloc(&mut self, line: Line) -> usize {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.line = Some(line);
            slot.prev = None;
            slot.next = None;
            return index;
        }
        self.slots.push(Slot {
            line: Some(line),
            generation: 0,
            prev: None,
            next: None,
        });
        self.slots.len() - 1
    }

    // Links `index` after `anchor`, or at the head when `anchor` is None.
    fn link_after(&mut self, anchor: Option<usize>, index: usize) {
        let next = match anchor {
            Some(a) => self.slots[a].next,
            None => self.head,
        };
        self.slots[index].prev = anchor;
        self.slots[index].next = next;
        match anchor {
            Some(a) => self.slots[a].next = Some(index),
            None => self.head = Some(index),
        }
        match next {
            Some(n) => self.slots[n].prev = Some(index),
            None => self.tail = Some(index),
        }
    }
}

impl fmt::Display for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.iter() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

impl FromIterator<Line> for Deck {
    fn from_iter<I: IntoIterator<Item = Line>>(iter: I) -> Self {
        Deck::from_lines(iter)
    }
}

/// Borrowing iterator over a deck's lines, in order.
pub struct DeckIter<'a> {
    deck: &'a Deck,
    cursor: Option<usize>,
}

impl<'a> Iterator for DeckIter<'a> {
    type Item = &'a Line;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let slot = &self.deck.slots[index];
        self.cursor = slot.next;
        slot.line.as_ref()
    }
}
