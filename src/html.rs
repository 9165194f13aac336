use std::collections::BTreeMap;

use crate::dom::{Dom, NodeId};
use crate::{Error, Result};

/// Start tags that implicitly end an open element. Each entry lists the
/// triggering tags, the element they close and the ancestors that stop the
/// search.
const IMPLIED_END_TAGS: &[(&[&str], &str, &[&str])] = &[
    (&["li"], "li", &["ol", "ul", "menu"]),
    (
        &["option", "optgroup"],
        "option",
        &["optgroup", "select", "datalist"],
    ),
    (
        &[
            "address",
            "article",
            "aside",
            "blockquote",
            "details",
            "div",
            "dl",
            "fieldset",
            "figcaption",
            "figure",
            "footer",
            "form",
            "h1",
            "h2",
            "h3",
            "h4",
            "h5",
            "h6",
            "header",
            "hr",
            "main",
            "nav",
            "ol",
            "p",
            "pre",
            "section",
            "table",
            "ul",
        ],
        "p",
        &[],
    ),
];

/// Parses markup into a fresh tree rooted at a document node, then seeds
/// textarea and select values from their content.
pub(crate) fn parse_html(html: &str) -> Result<Dom> {
    let mut builder = TreeBuilder {
        src: html,
        pos: 0,
        stack: Vec::new(),
        dom: Dom::new(),
    };
    builder.stack.push(builder.dom.root);
    builder.run()?;
    let mut dom = builder.dom;
    dom.initialize_form_control_values()?;
    Ok(dom)
}

pub(crate) fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "title" | "textarea")
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

fn is_attr_name_char(ch: char) -> bool {
    is_name_char(ch) || matches!(ch, ':' | '.' | '@')
}

struct StartTag {
    name: String,
    attrs: BTreeMap<String, String>,
    self_closing: bool,
}

struct TreeBuilder<'a> {
    src: &'a str,
    pos: usize,
    stack: Vec<NodeId>,
    dom: Dom,
}

impl TreeBuilder<'_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|ch| ch.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> &str {
        let start = self.pos;
        while let Some(ch) = self.peek().filter(|ch| accept(*ch)) {
            self.pos += ch.len_utf8();
        }
        &self.src[start..self.pos]
    }

    fn current_parent(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(self.dom.root)
    }

    fn run(&mut self) -> Result<()> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if let Some(comment) = rest.strip_prefix("<!--") {
                let end = comment
                    .find("-->")
                    .ok_or_else(|| Error::HtmlParse("unclosed HTML comment".into()))?;
                self.pos += 4 + end + 3;
            } else if rest.starts_with("</") {
                let name = self.end_tag()?;
                self.close_element(&name);
            } else if rest.starts_with("<!") {
                self.skip_declaration()?;
            } else if rest.starts_with('<')
                && rest[1..].starts_with(|ch: char| ch.is_ascii_alphabetic())
            {
                let tag = self.start_tag()?;
                self.open_element(tag)?;
            } else {
                self.text();
            }
        }
        Ok(())
    }

    fn text(&mut self) {
        let start = self.pos;
        self.bump();
        self.take_while(|ch| ch != '<');
        let decoded = decode_character_references(&self.src[start..self.pos]);
        if !decoded.is_empty() {
            let parent = self.current_parent();
            self.dom.create_text(parent, decoded);
        }
    }

    fn open_element(&mut self, tag: StartTag) -> Result<()> {
        self.apply_implied_end_tags(&tag.name);
        let parent = self.current_parent();
        let node = self
            .dom
            .create_element(parent, tag.name.clone(), tag.attrs);

        if tag.self_closing {
            return Ok(());
        }
        if is_raw_text_tag(&tag.name) {
            return self.raw_text_body(node, &tag.name);
        }
        if !is_void_tag(&tag.name) {
            self.stack.push(node);
        }
        Ok(())
    }

    /// Consumes everything up to the matching end tag as a single text child.
    fn raw_text_body(&mut self, node: NodeId, name: &str) -> Result<()> {
        let close = find_raw_end_tag(self.rest(), name)
            .ok_or_else(|| Error::HtmlParse(format!("unclosed <{name}>")))?;
        let body = &self.rest()[..close];
        let body = if matches!(name, "script" | "style") {
            body.to_string()
        } else {
            decode_character_references(body)
        };
        if !body.is_empty() {
            self.dom.create_text(node, body);
        }
        self.pos += close;
        self.end_tag()?;
        Ok(())
    }

    fn close_element(&mut self, name: &str) {
        // Unmatched end tags are dropped.
        if let Some(depth) = self
            .stack
            .iter()
            .rposition(|node| self.dom.tag_name(*node) == Some(name))
        {
            self.stack.truncate(depth.max(1));
        }
    }

    fn apply_implied_end_tags(&mut self, name: &str) {
        for (triggers, open, barriers) in IMPLIED_END_TAGS {
            if !triggers.contains(&name) {
                continue;
            }
            for depth in (1..self.stack.len()).rev() {
                match self.dom.tag_name(self.stack[depth]) {
                    Some(tag) if tag == *open => {
                        self.stack.truncate(depth);
                        break;
                    }
                    Some(tag) if barriers.contains(&tag) => break,
                    _ => {}
                }
            }
        }
    }

    fn start_tag(&mut self) -> Result<StartTag> {
        self.bump();
        let name = self.take_while(is_name_char).to_ascii_lowercase();
        if name.is_empty() {
            return Err(Error::HtmlParse("empty tag name".into()));
        }

        let mut attrs = BTreeMap::new();
        loop {
            self.skip_ws();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(Error::HtmlParse(format!("unclosed start tag <{name}>")));
            }
            if rest.starts_with('>') {
                self.pos += 1;
                return Ok(StartTag {
                    name,
                    attrs,
                    self_closing: false,
                });
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                return Ok(StartTag {
                    name,
                    attrs,
                    self_closing: true,
                });
            }

            let attr_name = self.take_while(is_attr_name_char).to_ascii_lowercase();
            if attr_name.is_empty() {
                self.skip_junk();
                continue;
            }
            self.skip_ws();
            let value = if self.peek() == Some('=') {
                self.pos += 1;
                self.skip_ws();
                self.attr_value()?
            } else {
                String::new()
            };
            // First occurrence wins.
            attrs.entry(attr_name).or_insert(value);
        }
    }

    /// Skips stray characters inside a start tag up to the next attribute
    /// boundary.
    fn skip_junk(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace() || ch == '>' || self.rest().starts_with("/>") {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn attr_value(&mut self) -> Result<String> {
        match self.peek() {
            None => Err(Error::HtmlParse("missing attribute value".into())),
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let body = self.take_while(|ch| ch != quote);
                let value = decode_character_references(body);
                if self.bump().is_none() {
                    return Err(Error::HtmlParse("unclosed quoted attribute value".into()));
                }
                Ok(value)
            }
            Some(_) => {
                let start = self.pos;
                while let Some(ch) = self.peek() {
                    if ch.is_ascii_whitespace() || ch == '>' || self.rest().starts_with("/>") {
                        break;
                    }
                    self.pos += ch.len_utf8();
                }
                Ok(decode_character_references(&self.src[start..self.pos]))
            }
        }
    }

    fn end_tag(&mut self) -> Result<String> {
        self.pos += 2;
        self.skip_ws();
        let name = self.take_while(is_name_char).to_ascii_lowercase();
        self.take_while(|ch| ch != '>');
        if self.bump().is_none() {
            return Err(Error::HtmlParse(format!("unclosed end tag </{name}")));
        }
        Ok(name)
    }

    fn skip_declaration(&mut self) -> Result<()> {
        self.pos += 2;
        let mut quote = None;
        while let Some(ch) = self.bump() {
            match quote {
                Some(q) if ch == q => quote = None,
                Some(_) => {}
                None if ch == '"' || ch == '\'' => quote = Some(ch),
                None if ch == '>' => return Ok(()),
                None => {}
            }
        }
        Err(Error::HtmlParse("unclosed declaration tag".into()))
    }
}

/// Byte offset of the `</name` that ends a raw text element, ignoring case
/// and whitespace after the slash.
fn find_raw_end_tag(src: &str, name: &str) -> Option<usize> {
    src.match_indices("</").map(|(at, _)| at).find(|at| {
        let candidate = src[at + 2..].trim_start_matches(|ch: char| ch.is_ascii_whitespace());
        candidate
            .get(..name.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(name))
            && !candidate[name.len()..].starts_with(|ch: char| ch.is_ascii_alphanumeric())
    })
}

fn named_reference(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "euro" => '€',
        "hellip" => '…',
        "middot" => '·',
        "laquo" => '«',
        "raquo" => '»',
        "times" => '×',
        "divide" => '÷',
        _ => return None,
    })
}

fn numeric_reference(digits: &str) -> Option<char> {
    let codepoint = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(codepoint)
}

/// Decodes `&name;`, `&#n;` and `&#xh;`. Unknown or unterminated references
/// are kept as written.
fn decode_character_references(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut pieces = src.split('&');
    if let Some(head) = pieces.next() {
        out.push_str(head);
    }
    for piece in pieces {
        let decoded = piece.split_once(';').and_then(|(reference, tail)| {
            let ch = match reference.strip_prefix('#') {
                Some(digits) => numeric_reference(digits),
                None => named_reference(reference),
            }?;
            Some((ch, tail))
        });
        match decoded {
            Some((ch, tail)) => {
                out.push(ch);
                out.push_str(tail);
            }
            None => {
                out.push('&');
                out.push_str(piece);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_valueless_attributes() -> Result<()> {
        let dom = parse_html("<div id='a'><input hidden disabled value=x><span>t</span></div>")?;
        assert_eq!(
            dom.dump_node(dom.root),
            r#"<div id="a"><input disabled hidden value="x"><span>t</span></div>"#
        );
        Ok(())
    }

    #[test]
    fn binding_attribute_values_keep_script_punctuation() -> Result<()> {
        let dom = parse_html(r#"<p vm-attr-bind="title::$vm.model.a < 3 ? 'lo' : 'hi'"></p>"#)?;
        let p = dom.all_element_nodes()[0];
        assert_eq!(
            dom.attr(p, "vm-attr-bind").as_deref(),
            Some("title::$vm.model.a < 3 ? 'lo' : 'hi'")
        );
        Ok(())
    }

    #[test]
    fn comments_are_skipped_and_entities_decoded() -> Result<()> {
        let dom = parse_html("<p><!-- note -->a &lt; b &amp;c &unknown; &#65;&#x42; & d</p>")?;
        assert_eq!(dom.text_content(dom.root), "a < b &c &unknown; AB & d");
        Ok(())
    }

    #[test]
    fn list_items_close_implicitly() -> Result<()> {
        let dom = parse_html("<ul><li>a<li>b</ul><p>x<div>y</div>")?;
        assert_eq!(
            dom.dump_node(dom.root),
            "<ul><li>a</li><li>b</li></ul><p>x</p><div>y</div>"
        );
        Ok(())
    }

    #[test]
    fn textarea_body_seeds_its_value() -> Result<()> {
        let dom = parse_html("<textarea>x &amp; <b>y</b></TEXTAREA >")?;
        let textarea = dom.all_element_nodes()[0];
        assert_eq!(dom.value(textarea)?, "x & <b>y</b>");
        Ok(())
    }

    #[test]
    fn lone_angle_bracket_is_text() -> Result<()> {
        let dom = parse_html("<p>1 < 2 <3</p>")?;
        assert_eq!(dom.text_content(dom.root), "1 < 2 <3");
        Ok(())
    }

    #[test]
    fn doctype_is_skipped() -> Result<()> {
        let dom = parse_html("<!DOCTYPE html><p>ok</p>")?;
        assert_eq!(dom.dump_node(dom.root), "<p>ok</p>");
        Ok(())
    }

    #[test]
    fn unterminated_markup_is_an_error() {
        for html in ["<div><!-- open", "<div id='x", "<span", "<script>x"] {
            assert!(
                matches!(parse_html(html), Err(Error::HtmlParse(_))),
                "{html} should fail"
            );
        }
    }
}
