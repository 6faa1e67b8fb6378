/// Rolling window of the most recently typed characters.
///
/// Never holds more than `bound` characters; older input falls off the front.
#[derive(Debug, Clone, Default)]
pub struct TypingBuffer {
    text: String,
    bound: usize,
}

impl TypingBuffer {
    pub fn new(bound: usize) -> Self {
        Self {
            text: String::with_capacity(bound),
            bound,
        }
    }

    /// Append a character. Whitespace ends the current word and empties the buffer.
    pub fn push(&mut self, c: char) {
        if c.is_whitespace() {
            self.text.clear();
            return;
        }
        self.text.push(c);
        self.truncate_to_bound();
    }

    /// Remove the last character, mirroring a backspace.
    pub fn pop_one(&mut self) -> Option<char> {
        self.text.pop()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Change the bound, keeping the most recent characters.
    pub fn resize_bound(&mut self, bound: usize) {
        self.bound = bound;
        self.truncate_to_bound();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn truncate_to_bound(&mut self) {
        let excess = self.len().saturating_sub(self.bound);
        if excess == 0 {
            return;
        }
        let cut = self
            .text
            .char_indices()
            .nth(excess)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len());
        self.text.drain(..cut);
    }
}
