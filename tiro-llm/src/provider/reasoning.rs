//! Removal of `<think>…</think>` blocks from model output
//!
//! Reasoning models (qwen3, deepseek-r1) prefix answers with a thinking
//! section. Providers run every reply through a `ReasoningFilter` when the
//! request asks for hidden reasoning, so the learner only sees the answer.

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

/// Incremental filter; tags may be split across any number of chunks.
#[derive(Debug, Default)]
pub struct ReasoningFilter {
    pending: String,
    inside: bool,
    trim_next: bool,
}

impl ReasoningFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk, returning the visible text it releases
    pub fn push(&mut self, chunk: &str) -> String {
        self.pending.push_str(chunk);
        let mut visible = String::new();

        loop {
            let tag = if self.inside { CLOSE_TAG } else { OPEN_TAG };

            if let Some(pos) = self.pending.find(tag) {
                if !self.inside {
                    let before = self.pending[..pos].to_string();
                    self.emit(&before, &mut visible);
                }
                self.pending.drain(..pos + tag.len());
                self.inside = !self.inside;
                if !self.inside {
                    self.trim_next = true;
                }
                continue;
            }

            // Hold back a suffix that could still grow into the tag.
            let held = partial_tag_len(&self.pending, tag);
            let release = self.pending.len() - held;
            if !self.inside {
                let text = self.pending[..release].to_string();
                self.emit(&text, &mut visible);
            }
            self.pending.drain(..release);
            return visible;
        }
    }

    /// Flush whatever was held back once the reply has ended
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        let mut visible = String::new();
        if !self.inside {
            self.emit(&rest, &mut visible);
        }
        visible
    }

    fn emit(&mut self, text: &str, out: &mut String) {
        if self.trim_next {
            let trimmed = text.trim_start();
            if trimmed.is_empty() {
                return;
            }
            self.trim_next = false;
            out.push_str(trimmed);
        } else {
            out.push_str(text);
        }
    }
}

/// Strip reasoning from a complete reply
pub fn strip_reasoning(text: &str) -> String {
    let mut filter = ReasoningFilter::new();
    let mut visible = filter.push(text);
    visible.push_str(&filter.finish());
    visible
}

fn partial_tag_len(text: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&n| text.ends_with(&tag[..n]))
        .unwrap_or(0)
}
