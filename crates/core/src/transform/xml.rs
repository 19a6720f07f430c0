//! Minimal element tree over quick-xml, enough to merge descriptor files.
//!
//! Comments, processing instructions and mixed content are not preserved:
//! an element holds attributes, child elements and its concatenated text.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

pub type XmlResult<T> = std::result::Result<T, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn add_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Trimmed text content.
    pub fn value(&self) -> &str {
        self.text.trim()
    }

    pub fn parse(bytes: &[u8]) -> XmlResult<Element> {
        let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;
        loop {
            match reader.read_event().map_err(|e| e.to_string())? {
                Event::Start(start) => stack.push(open(&start)?),
                Event::Empty(start) => {
                    let element = open(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or("unbalanced end tag")?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text.unescape().map_err(|e| e.to_string())?);
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if !stack.is_empty() {
            return Err(format!("unclosed element <{}>", stack[stack.len() - 1].name));
        }
        root.ok_or_else(|| "document has no root element".to_string())
    }

    /// Serializes with two-space indentation and no XML declaration.
    pub fn to_xml(&self) -> XmlResult<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.write(&mut writer)?;
        let mut out = writer.into_inner();
        out.push(b'\n');
        Ok(out)
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>) -> XmlResult<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        let text = self.value();
        if self.children.is_empty() && text.is_empty() {
            return writer
                .write_event(Event::Empty(start))
                .map_err(|e| e.to_string());
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| e.to_string())?;
        if !text.is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| e.to_string())?;
        }
        for child in &self.children {
            child.write(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(|e| e.to_string())
    }
}

fn open(start: &BytesStart<'_>) -> XmlResult<Element> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| e.to_string())?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> XmlResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.add_child(element),
        None if root.is_none() => *root = Some(element),
        None => return Err("more than one root element".to_string()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tree() {
        let doc = br#"<?xml version="1.0"?>
<!-- header -->
<component-set>
  <components>
    <component kind="x">
      <role>a.B</role>
      <role-hint>&lt;default&gt;</role-hint>
      <configuration/>
    </component>
  </components>
</component-set>"#;
        let root = Element::parse(doc).unwrap();
        assert_eq!(root.name, "component-set");
        let component = root.child("components").unwrap().child("component").unwrap();
        assert_eq!(component.attributes, vec![("kind".to_string(), "x".to_string())]);
        assert_eq!(component.child("role").unwrap().value(), "a.B");
        assert_eq!(component.child("role-hint").unwrap().value(), "<default>");
        assert!(component.child("configuration").is_some());
        assert_eq!(component.children_named("role").count(), 1);
    }

    #[test]
    fn test_write_round_trips_structure() {
        let mut root = Element::new("a");
        let mut b = Element::new("b");
        b.add_child(Element::new("c").with_text("x & y"));
        root.add_child(b);
        root.add_child(Element::new("d"));

        let xml = String::from_utf8(root.to_xml().unwrap()).unwrap();
        assert!(xml.contains("x &amp; y"));
        assert!(!xml.starts_with("<?xml"));
        assert_eq!(Element::parse(xml.as_bytes()).unwrap(), root);
    }

    #[test]
    fn test_malformed_documents() {
        assert!(Element::parse(b"<a><b></a>").is_err());
        assert!(Element::parse(b"<a>").is_err());
        assert!(Element::parse(b"").is_err());
    }
}
