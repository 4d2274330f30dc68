//! Paged selection menu

use crate::types::ReplyOption;

/// Key of the reserved terminal entry
pub const DONE_KEY: &str = "Done";
/// Description of the reserved terminal entry
pub const DONE_DESCRIPTION: &str = "Say \"We're Done!\" (End the session)";
/// Reply that shows the previous page
pub const PREVIOUS_PAGE: &str = "<";
/// Reply that shows the next page
pub const NEXT_PAGE: &str = ">";

const INTRO: &str = "Select a way to work with the Wand:\n";
const PROMPT: &str = "Choose from the options or type in what you wish to do...";

/// One selectable line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    /// Reply that selects the entry
    pub key: String,
    /// Text shown after the key
    pub description: String,
}

/// Entries keyed `"1".."n"` followed by [`DONE_KEY`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    entries: Vec<MenuEntry>,
    per_page: usize,
}

impl Menu {
    /// Number the descriptions from 1 and append the terminal entry
    #[must_use]
    pub fn new<I, S>(descriptions: I, per_page: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries: Vec<MenuEntry> = descriptions
            .into_iter()
            .enumerate()
            .map(|(i, d)| MenuEntry {
                key: (i + 1).to_string(),
                description: d.into(),
            })
            .collect();
        entries.push(MenuEntry {
            key: DONE_KEY.into(),
            description: DONE_DESCRIPTION.into(),
        });
        Self {
            entries,
            per_page: per_page.max(1),
        }
    }

    /// All entries including the terminal one
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    /// Number of pages, at least 1
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.entries.len().div_ceil(self.per_page).max(1)
    }

    /// Entry for an exact key
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&MenuEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Entry whose description is exactly `description`
    #[must_use]
    pub fn lookup_description(&self, description: &str) -> Option<&MenuEntry> {
        self.entries.iter().find(|e| e.description == description)
    }

    /// Prompt text and quick replies for `page`, clamped to the last page
    #[must_use]
    pub fn render(&self, page: usize) -> (String, Vec<ReplyOption>) {
        let last = self.page_count() - 1;
        let page = page.min(last);
        let start = page * self.per_page;
        let end = (start + self.per_page).min(self.entries.len());

        let mut text = String::from(INTRO);
        let mut options = Vec::with_capacity(end - start + 2);
        if page > 0 {
            text.push_str("(Click < for previous page)\n");
            options.push(ReplyOption::same(PREVIOUS_PAGE));
        }
        for entry in &self.entries[start..end] {
            text.push_str(&format!("[{}] {}\n", entry.key, entry.description));
            options.push(ReplyOption::same(entry.key.clone()));
        }
        if page < last {
            text.push_str("(Click > for next page)\n");
            options.push(ReplyOption::same(NEXT_PAGE));
        }
        text.push_str(PROMPT);
        (text, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn menu(n: usize, per_page: usize) -> Menu {
        Menu::new((0..n).map(|i| format!("Unit {i}.")), per_page)
    }

    #[test]
    fn keys_are_numbered_and_done_is_last() {
        let m = menu(2, 6);
        let keys: Vec<&str> = m.entries().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["1", "2", "Done"]);
        assert_eq!(m.lookup("2").unwrap().description, "Unit 1.");
        assert!(m.lookup("3").is_none());
        assert_eq!(m.lookup_description(DONE_DESCRIPTION).unwrap().key, "Done");
    }

    #[test]
    fn single_page_has_no_navigation() {
        let (text, options) = menu(1, 6).render(0);
        assert_eq!(
            text,
            "Select a way to work with the Wand:\n[1] Unit 0.\n[Done] Say \"We're Done!\" (End the session)\n\
             Choose from the options or type in what you wish to do..."
        );
        assert_eq!(options.len(), 2);
    }

    #[test]
    fn pages_carry_navigation() {
        let m = menu(7, 3);
        assert_eq!(m.page_count(), 3);

        let (first, opts) = m.render(0);
        assert!(first.contains("(Click > for next page)"));
        assert!(!first.contains("previous page"));
        assert_eq!(opts.last().unwrap().value, ">");

        let (middle, opts) = m.render(1);
        assert!(middle.contains("previous page") && middle.contains("next page"));
        assert_eq!(opts.len(), 5);

        let (last, opts) = m.render(9);
        assert!(last.contains("[Done]"));
        assert!(!last.contains("next page"));
        assert_eq!(opts[0].value, "<");
    }
}
