//! Minimal view over a parsed HTML page.
//!
//! The site heuristics in [`crate::locator`], [`crate::gallery`] and
//! [`crate::enumerator`] only need to find elements by tag or class, read
//! attributes and text, and walk up to an enclosing element. [`Element`] and
//! [`Document`] capture exactly that, and [`HtmlPage`] implements them on top
//! of the `scraper` crate.

use scraper::{ElementRef, Html, Selector};

pub trait Element: Sized + Clone {
    fn attr(&self, name: &str) -> Option<&str>;
    fn text(&self) -> String;
    fn has_class(&self, class: &str) -> bool;

    /// Nearest ancestor with the given tag name.
    fn enclosing(&self, tag: &str) -> Option<Self>;

    /// Descendants with the given tag name, in document order.
    fn find_all(&self, tag: &str) -> Vec<Self>;

    fn find_first(&self, tag: &str) -> Option<Self> {
        self.find_all(tag).into_iter().next()
    }
}

pub trait Document {
    type Element<'a>: Element
    where
        Self: 'a;

    fn find_all(&self, tag: &str) -> Vec<Self::Element<'_>>;

    fn text(&self) -> String;

    fn find_by_class(&self, tag: &str, class: &str) -> Vec<Self::Element<'_>> {
        self.find_all(tag)
            .into_iter()
            .filter(|el| el.has_class(class))
            .collect()
    }

    /// Every anchor carrying an `href`, as `(href, visible text)` pairs.
    fn links(&self) -> Vec<PageLink> {
        self.find_all("a")
            .into_iter()
            .filter_map(|a| PageLink::from_element(&a))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub href: String,
    pub text: String,
}

impl PageLink {
    pub fn new(href: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            text: text.into(),
        }
    }

    pub fn from_element<E: Element>(el: &E) -> Option<Self> {
        let href = el.attr("href")?.trim();
        if href.is_empty() {
            return None;
        }
        Some(Self::new(href, el.text().trim()))
    }
}

pub struct HtmlPage {
    html: Html,
}

impl HtmlPage {
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }
}

impl std::fmt::Debug for HtmlPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlPage").finish_non_exhaustive()
    }
}

fn tag_selector(tag: &str) -> Option<Selector> {
    Selector::parse(tag).ok()
}

impl Document for HtmlPage {
    type Element<'a> = ElementRef<'a>;

    fn find_all(&self, tag: &str) -> Vec<ElementRef<'_>> {
        match tag_selector(tag) {
            Some(selector) => self.html.select(&selector).collect(),
            None => Vec::new(),
        }
    }

    fn text(&self) -> String {
        self.html.root_element().text().collect()
    }
}

impl<'a> Element for ElementRef<'a> {
    fn attr(&self, name: &str) -> Option<&str> {
        self.value().attr(name)
    }

    fn text(&self) -> String {
        ElementRef::text(self).collect()
    }

    fn has_class(&self, class: &str) -> bool {
        self.value().classes().any(|c| c == class)
    }

    fn enclosing(&self, tag: &str) -> Option<Self> {
        self.ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name().eq_ignore_ascii_case(tag))
    }

    fn find_all(&self, tag: &str) -> Vec<Self> {
        match tag_selector(tag) {
            Some(selector) => self.select(&selector).collect(),
            None => Vec::new(),
        }
    }
}
