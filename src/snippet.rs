//! Interactive snippet strings, used to build completion boilerplate with
//! user interaction. See
//! <https://code.visualstudio.com/docs/editor/userdefinedsnippets>.

/// Builds LSP snippet-syntax text (`${n}`, `${n:placeholder}`,
/// `${n|a,b|}`), auto-numbering tabstops as they're added.
#[derive(Debug, Default, Clone)]
pub struct Snippet {
    text: String,
    next_tabstop: u32,
}

impl Snippet {
    /// Start a new snippet with some raw text.
    pub fn new(value: impl Into<String>) -> Self {
        Snippet {
            text: value.into(),
            next_tabstop: 1,
        }
    }

    /// Append raw text, unescaped.
    pub fn add_text(&mut self, text: &str) -> &mut Self {
        self.text.push_str(text);
        self
    }

    /// A point for the user to enter their own text, moving the cursor
    /// there after the surrounding text is accepted. Tabstop `0` is where
    /// the cursor lands once the user is done editing; by default that's
    /// the end of the snippet.
    pub fn add_tabstop(&mut self) -> &mut Self {
        let n = self.next_tabstop;
        self.text.push_str(&format!("${{{n}}}"));
        self.next_tabstop = n + 1;
        self
    }

    /// Like [`Self::add_tabstop`], but with placeholder text shown until
    /// the user types over it.
    pub fn add_placeholder(&mut self, text: &str) -> &mut Self {
        let n = self.next_tabstop;
        self.text.push_str(&format!("${{{n}:{text}}}"));
        self.next_tabstop = n + 1;
        self
    }

    /// A tabstop offering a dropdown of `choices`, the first being the
    /// default accepted on Tab/Enter.
    pub fn add_choice(&mut self, choices: &[&str]) -> &mut Self {
        let n = self.next_tabstop;
        if choices.is_empty() {
            self.text.push_str(&format!("${{{n}}}"));
        } else {
            self.text.push_str(&format!("${{{n}|{}|}}", choices.join(",")));
        }
        self.next_tabstop = n + 1;
        self
    }

    pub fn finish(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabstops_auto_number() {
        let mut s = Snippet::new("CONFIG_FOO=");
        s.add_tabstop();
        s.add_text(" ");
        s.add_tabstop();
        assert_eq!(s.finish(), "CONFIG_FOO=${1} ${2}");
    }

    #[test]
    fn choice_lists_options_under_one_tabstop() {
        let mut s = Snippet::new("");
        s.add_choice(&["y", "n"]);
        assert_eq!(s.finish(), "${1|y,n|}");
    }

    #[test]
    fn empty_choice_list_degrades_to_plain_tabstop() {
        let mut s = Snippet::new("");
        s.add_choice(&[]);
        assert_eq!(s.finish(), "${1}");
    }

    #[test]
    fn placeholder_carries_default_text() {
        let mut s = Snippet::new("");
        s.add_placeholder("hello");
        assert_eq!(s.finish(), "${1:hello}");
    }
}
