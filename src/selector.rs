use crate::dom::{Dom, NodeId};
use crate::{Error, Result};

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectorList(Vec<Complex>);

/// Compounds are kept right to left. Each chain entry carries the combinator
/// that links it to the compound on its right.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    subject: Compound,
    chain: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
    states: Vec<State>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrTest {
    name: String,
    expected: Option<(AttrOp, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Prefix,
    Suffix,
    Substring,
    Word,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    FirstChild,
    LastChild,
    Checked,
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

impl SelectorList {
    fn parse(src: &str) -> Result<Self> {
        let mut parser = SelectorParser {
            src,
            chars: src.chars().collect(),
            pos: 0,
        };
        let mut groups = vec![parser.complex()?];
        while parser.eat(',') {
            groups.push(parser.complex()?);
        }
        parser.skip_ws();
        if parser.peek().is_some() {
            return Err(parser.error());
        }
        Ok(Self(groups))
    }
}

impl AttrTest {
    fn matches(&self, actual: Option<&String>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        let Some((op, value)) = &self.expected else {
            return true;
        };
        match op {
            AttrOp::Equals => actual == value,
            AttrOp::Word => actual.split_ascii_whitespace().any(|word| word == value),
            _ if value.is_empty() => false,
            AttrOp::Prefix => actual.starts_with(value.as_str()),
            AttrOp::Suffix => actual.ends_with(value.as_str()),
            AttrOp::Substring => actual.contains(value.as_str()),
        }
    }
}

struct SelectorParser<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl SelectorParser<'_> {
    fn error(&self) -> Error {
        Error::UnsupportedSelector(self.src.to_string())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Returns whether any whitespace was consumed.
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|ch| ch.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn slice(&self, start: usize) -> String {
        self.chars[start..self.pos].iter().collect()
    }

    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> Option<String> {
        let start = self.pos;
        while self.peek().is_some_and(&accept) {
            self.pos += 1;
        }
        (self.pos > start).then(|| self.slice(start))
    }

    fn ident(&mut self) -> Option<String> {
        self.take_while(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    }

    fn complex(&mut self) -> Result<Complex> {
        self.skip_ws();
        let mut compounds = vec![self.compound()?];
        let mut links = Vec::new();
        loop {
            let spaced = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => Combinator::Child,
                Some('+') => Combinator::Adjacent,
                Some('~') => Combinator::Sibling,
                Some(_) if spaced => Combinator::Descendant,
                Some(_) => return Err(self.error()),
            };
            if combinator != Combinator::Descendant {
                self.pos += 1;
                self.skip_ws();
            }
            links.push(combinator);
            compounds.push(self.compound()?);
        }

        let mut compounds = compounds.into_iter().rev();
        let subject = compounds.next().ok_or_else(|| self.error())?;
        let chain = links.into_iter().rev().zip(compounds).collect();
        Ok(Complex { subject, chain })
    }

    fn compound(&mut self) -> Result<Compound> {
        let start = self.pos;
        let mut compound = Compound::default();
        if self.peek() == Some('*') {
            self.pos += 1;
        } else if let Some(tag) = self.ident() {
            compound.tag = Some(tag.to_ascii_lowercase());
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    let id = self.ident().ok_or_else(|| self.error())?;
                    if compound.id.replace(id).is_some() {
                        return Err(self.error());
                    }
                }
                Some('.') => {
                    self.pos += 1;
                    let class_name = self.ident().ok_or_else(|| self.error())?;
                    compound.classes.push(class_name);
                }
                Some('[') => {
                    self.pos += 1;
                    let test = self.attr_test()?;
                    compound.attrs.push(test);
                }
                Some(':') => {
                    self.pos += 1;
                    let state = match self.ident().as_deref() {
                        Some("first-child") => State::FirstChild,
                        Some("last-child") => State::LastChild,
                        Some("checked") => State::Checked,
                        Some("disabled") => State::Disabled,
                        Some("enabled") => State::Enabled,
                        _ => return Err(self.error()),
                    };
                    compound.states.push(state);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(self.error());
        }
        Ok(compound)
    }

    fn attr_test(&mut self) -> Result<AttrTest> {
        self.skip_ws();
        let name = self
            .take_while(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | ':' | '.'))
            .ok_or_else(|| self.error())?
            .to_ascii_lowercase();
        if self.eat(']') {
            return Ok(AttrTest {
                name,
                expected: None,
            });
        }

        let op = match self.peek() {
            Some('=') => AttrOp::Equals,
            Some('^') => AttrOp::Prefix,
            Some('$') => AttrOp::Suffix,
            Some('*') => AttrOp::Substring,
            Some('~') => AttrOp::Word,
            _ => return Err(self.error()),
        };
        self.pos += 1;
        if op != AttrOp::Equals {
            if self.peek() != Some('=') {
                return Err(self.error());
            }
            self.pos += 1;
        }
        self.skip_ws();

        let value = self.attr_value()?;
        if !self.eat(']') {
            return Err(self.error());
        }
        Ok(AttrTest {
            name,
            expected: Some((op, value)),
        })
    }

    fn attr_value(&mut self) -> Result<String> {
        if let Some(quote @ ('"' | '\'')) = self.peek() {
            self.pos += 1;
            let start = self.pos;
            while self.peek().is_some_and(|ch| ch != quote) {
                self.pos += 1;
            }
            if self.peek().is_none() {
                return Err(self.error());
            }
            let value = self.slice(start);
            self.pos += 1;
            return Ok(value);
        }
        self.take_while(|ch| !ch.is_ascii_whitespace() && ch != ']')
            .ok_or_else(|| self.error())
    }
}

impl Dom {
    /// Matching elements in document order.
    pub(crate) fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let SelectorList(groups) = SelectorList::parse(selector)?;
        Ok(self
            .descendant_elements(self.root)
            .into_iter()
            .filter(|node| {
                groups
                    .iter()
                    .any(|complex| self.matches_complex(*node, &complex.subject, &complex.chain))
            })
            .collect())
    }

    pub(crate) fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    fn matches_complex(
        &self,
        node_id: NodeId,
        compound: &Compound,
        rest: &[(Combinator, Compound)],
    ) -> bool {
        if !self.matches_compound(node_id, compound) {
            return false;
        }
        let Some(((combinator, next), rest)) = rest.split_first() else {
            return true;
        };
        match combinator {
            Combinator::Child => self
                .parent(node_id)
                .is_some_and(|parent| self.matches_complex(parent, next, rest)),
            Combinator::Descendant => std::iter::successors(self.parent(node_id), |node| {
                self.parent(*node)
            })
            .any(|ancestor| self.matches_complex(ancestor, next, rest)),
            Combinator::Adjacent => self
                .previous_element_sibling(node_id)
                .is_some_and(|sibling| self.matches_complex(sibling, next, rest)),
            Combinator::Sibling => {
                std::iter::successors(self.previous_element_sibling(node_id), |node| {
                    self.previous_element_sibling(*node)
                })
                .any(|sibling| self.matches_complex(sibling, next, rest))
            }
        }
    }

    fn previous_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let siblings = self.element_children(self.parent(node_id)?);
        let pos = siblings.iter().position(|id| *id == node_id)?;
        pos.checked_sub(1).map(|prev| siblings[prev])
    }

    fn matches_compound(&self, node_id: NodeId, compound: &Compound) -> bool {
        let Some(element) = self.element(node_id) else {
            return false;
        };
        compound
            .tag
            .as_ref()
            .is_none_or(|tag| element.tag_name.eq_ignore_ascii_case(tag))
            && compound
                .id
                .as_ref()
                .is_none_or(|id| element.attrs.get("id") == Some(id))
            && compound
                .classes
                .iter()
                .all(|class_name| self.class_contains(node_id, class_name))
            && compound
                .attrs
                .iter()
                .all(|test| test.matches(element.attrs.get(&test.name)))
            && compound.states.iter().all(|state| match state {
                State::FirstChild => self.previous_element_sibling(node_id).is_none(),
                State::LastChild => self
                    .parent(node_id)
                    .is_some_and(|parent| self.element_children(parent).last() == Some(&node_id)),
                State::Checked => element.checked,
                State::Disabled => element.disabled,
                State::Enabled => !element.disabled,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_html;

    fn texts(dom: &Dom, selector: &str) -> Result<Vec<String>> {
        Ok(dom
            .query_selector_all(selector)?
            .into_iter()
            .map(|node| dom.text_content(node))
            .collect())
    }

    #[test]
    fn compound_and_combinator_selectors_match() -> Result<()> {
        let dom = parse_html(
            r#"<div id="root"><ul class="list"><li class="a">1</li><li>2</li></ul><p>3</p></div>"#,
        )?;
        assert_eq!(texts(&dom, "#root > ul li")?, ["1", "2"]);
        assert_eq!(texts(&dom, "li.a")?, ["1"]);
        assert_eq!(texts(&dom, "li + li")?, ["2"]);
        assert_eq!(texts(&dom, "ul ~ p")?, ["3"]);
        assert_eq!(texts(&dom, "li:last-child, p")?, ["2", "3"]);
        assert_eq!(texts(&dom, "p, li:first-child")?, ["1", "3"]);
        Ok(())
    }

    #[test]
    fn descendant_combinator_tries_every_ancestor() -> Result<()> {
        let dom = parse_html("<div class='a'><div><div><p><b>t</b></p></div></div></div>")?;
        assert_eq!(texts(&dom, ".a > div b")?, ["t"]);
        assert!(texts(&dom, ".a > p b")?.is_empty());
        Ok(())
    }

    #[test]
    fn attribute_selectors_compare_values() -> Result<()> {
        let dom = parse_html(
            r#"<div><span data-k="one two">x</span><span data-k="other">y</span></div>"#,
        )?;
        assert_eq!(texts(&dom, "[data-k~=two]")?, ["x"]);
        assert_eq!(texts(&dom, "span[data-k^='oth']")?, ["y"]);
        assert_eq!(texts(&dom, "[data-k*=\"n\"]")?, ["x"]);
        assert!(texts(&dom, "[data-k^='']")?.is_empty());
        assert_eq!(dom.query_selector_all("[data-k]")?.len(), 2);
        Ok(())
    }

    #[test]
    fn malformed_selectors_are_rejected() -> Result<()> {
        let dom = parse_html("<div></div>")?;
        for selector in ["", "div,", "> div", "div[", "div:hover", "**", "#a#b"] {
            assert!(
                matches!(
                    dom.query_selector_all(selector),
                    Err(Error::UnsupportedSelector(_))
                ),
                "{selector} should be rejected"
            );
        }
        Ok(())
    }
}
