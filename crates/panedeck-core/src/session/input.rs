/// Collapses raw keystrokes into history records: one record per completed
/// command line, plus one immediate record per special key.
#[derive(Debug, Default)]
pub struct InputAccumulator {
    current: String,
}

fn special_key_label(data: &str) -> Option<&'static str> {
    Some(match data {
        "\t" => "<Tab>",
        "\x03" => "^C",
        "\x1b[A" | "\x1bOA" => "<Up>",
        "\x1b[B" | "\x1bOB" => "<Down>",
        "\x1b[C" | "\x1bOC" => "<Right>",
        "\x1b[D" | "\x1bOD" => "<Left>",
        _ => return None,
    })
}

impl InputAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw input and returns the records it completes.
    pub fn feed(&mut self, data: &str) -> Vec<String> {
        if let Some(label) = special_key_label(data) {
            if data == "\x03" {
                self.current.clear();
            }
            return vec![label.to_string()];
        }

        let mut records = Vec::new();
        let mut chars = data.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\r' | '\n' => {
                    if !self.current.is_empty() {
                        records.push(std::mem::take(&mut self.current));
                    }
                }
                '\x7f' | '\x08' => {
                    self.current.pop();
                }
                // Skip CSI sequences embedded in pasted text.
                '\x1b' => {
                    if chars.peek() == Some(&'[') {
                        chars.next();
                        for f in chars.by_ref() {
                            if ('@'..='~').contains(&f) {
                                break;
                            }
                        }
                    }
                }
                c if c.is_control() => {}
                c => self.current.push(c),
            }
        }
        records
    }

    pub fn pending(&self) -> &str {
        &self.current
    }

    pub fn reset(&mut self) {
        self.current.clear();
    }
}
