use std::cell::RefCell;
use std::rc::Rc;

struct Buffer {
    text: String,
    limit: usize,
    truncated: bool,
}

/// Text written by `print`, capped at a byte limit.
/// Cloning an `Output` shares the buffer.
#[derive(Clone)]
pub struct Output(Rc<RefCell<Buffer>>);

impl Output {
    pub fn new(limit: usize) -> Self {
        Self(Rc::new(RefCell::new(Buffer {
            text: String::new(),
            limit,
            truncated: false,
        })))
    }

    /// Appends `text`. Whatever does not fit under the limit is dropped.
    pub fn write(&self, text: &str) {
        let mut buffer = self.0.borrow_mut();
        let room = buffer.limit.saturating_sub(buffer.text.len());
        if text.len() <= room {
            buffer.text.push_str(text);
            return;
        }

        let mut end = room;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        buffer.text.push_str(&text[..end]);
        buffer.truncated = true;
    }

    pub fn text(&self) -> String {
        self.0.borrow().text.clone()
    }

    /// Empties the buffer and returns what it held.
    pub fn take(&self) -> String {
        std::mem::take(&mut self.0.borrow_mut().text)
    }

    /// Empties the buffer and forgets about earlier truncation.
    pub fn clear(&self) {
        let mut buffer = self.0.borrow_mut();
        buffer.text.clear();
        buffer.truncated = false;
    }

    /// `true` if anything was dropped since the last [`Output::clear`].
    pub fn is_truncated(&self) -> bool {
        self.0.borrow().truncated
    }
}
