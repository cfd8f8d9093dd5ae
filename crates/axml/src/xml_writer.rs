use std::io::{self, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::node::{XmlElement, XmlNode, XmlNodeKind};

/// Writes decoded nodes as indented text XML
///
/// Nodes are consumed one at a time, so the document never has to be kept in
/// memory as a tree. Namespace declarations go to the next start element,
/// an element without children is collapsed to `<name/>`.
pub struct XmlSerializer<W: Write> {
    writer: Writer<W>,
    declaration_written: bool,

    /// Declarations not yet attached to an element
    pending_namespaces: Vec<(Option<String>, String)>,

    /// (prefix, uri) in scope, innermost last
    scope: Vec<(Option<String>, String)>,

    /// Start element waiting to learn whether it has children
    pending_start: Option<BytesStart<'static>>,
}

impl XmlSerializer<Vec<u8>> {
    pub fn new() -> Self {
        Self::with_writer(Vec::new())
    }

    /// Finish the document and return it as text
    pub fn into_string(self) -> io::Result<String> {
        let bytes = self.finish()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Default for XmlSerializer<Vec<u8>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> XmlSerializer<W> {
    pub fn with_writer(inner: W) -> Self {
        XmlSerializer {
            writer: Writer::new_with_indent(inner, b'\t', 1),
            declaration_written: false,
            pending_namespaces: Vec::new(),
            scope: Vec::new(),
            pending_start: None,
        }
    }

    fn write_declaration(&mut self) -> io::Result<()> {
        if !self.declaration_written {
            self.declaration_written = true;
            self.writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        }
        Ok(())
    }

    /// Emit the held start element as `<name ...>`
    fn flush_start(&mut self) -> io::Result<()> {
        if let Some(start) = self.pending_start.take() {
            self.writer.write_event(Event::Start(start))?;
        }
        Ok(())
    }

    fn qualified(&self, namespace: Option<&str>, name: &str) -> String {
        let prefix = namespace.and_then(|uri| {
            self.scope
                .iter()
                .rev()
                .find(|(_, u)| u == uri)
                .and_then(|(p, _)| p.as_deref())
        });

        match prefix {
            Some(prefix) => format!("{}:{}", prefix, name),
            None => name.to_owned(),
        }
    }

    fn start_element(&mut self, element: &XmlElement) -> io::Result<()> {
        let name = self.qualified(element.namespace.as_deref(), &element.name);
        let mut start = BytesStart::new(name);

        for (prefix, uri) in self.pending_namespaces.drain(..) {
            let key = match prefix {
                Some(prefix) => format!("xmlns:{}", prefix),
                None => "xmlns".to_owned(),
            };
            start.push_attribute((key.as_str(), uri.as_str()));
        }

        for attribute in &element.attributes {
            let key = match &attribute.prefix {
                Some(_) => attribute.qualified_name(),
                None => self.qualified(attribute.namespace.as_deref(), &attribute.name),
            };
            start.push_attribute((key.as_str(), attribute.value.as_str()));
        }

        self.pending_start = Some(start);
        Ok(())
    }

    pub fn write_node(&mut self, node: &XmlNode) -> io::Result<()> {
        self.write_declaration()?;

        match &node.kind {
            XmlNodeKind::StartNamespace(decl) => {
                self.pending_namespaces
                    .push((decl.prefix.clone(), decl.uri.clone()));
                self.scope.push((decl.prefix.clone(), decl.uri.clone()));
            }
            XmlNodeKind::EndNamespace(decl) => {
                if let Some(idx) = self.scope.iter().rposition(|(_, u)| *u == decl.uri) {
                    self.scope.remove(idx);
                }
            }
            XmlNodeKind::StartElement(element) => {
                self.flush_start()?;
                self.start_element(element)?;
            }
            XmlNodeKind::EndElement { namespace, name } => match self.pending_start.take() {
                Some(start) => {
                    self.writer.write_event(Event::Empty(start))?;
                }
                None => {
                    let name = self.qualified(namespace.as_deref(), name);
                    self.writer.write_event(Event::End(BytesEnd::new(name)))?;
                }
            },
            XmlNodeKind::Text(text) => {
                self.flush_start()?;
                self.writer.write_event(Event::Text(BytesText::new(text)))?;
            }
            XmlNodeKind::Comment(text) => {
                self.flush_start()?;
                self.writer
                    .write_event(Event::Comment(BytesText::from_escaped(comment_body(text))))?;
            }
        }

        Ok(())
    }

    /// Flush everything and return the underlying writer
    pub fn finish(mut self) -> io::Result<W> {
        self.write_declaration()?;
        self.flush_start()?;

        let mut inner = self.writer.into_inner();
        inner.flush()?;
        Ok(inner)
    }
}

/// `--` is not allowed inside a comment and the body can't end with `-`
fn comment_body(text: &str) -> String {
    let mut body = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        if c == '-' && body.ends_with('-') {
            body.push(' ');
        }
        body.push(c);
    }
    if body.ends_with('-') {
        body.push(' ');
    }
    body
}

#[cfg(test)]
mod tests {
    use quick_xml::Reader;

    use super::*;
    use crate::axml::{ANDROID_NAMESPACE, AXML};
    use crate::testing::XmlBuilder;

    fn serialize(bytes: &[u8]) -> String {
        let mut serializer = XmlSerializer::new();
        for node in AXML::decode(bytes, None).unwrap() {
            serializer.write_node(&node.unwrap()).unwrap();
        }
        serializer.into_string().unwrap()
    }

    #[derive(Debug, PartialEq)]
    enum Item {
        Element(String, Vec<(String, String)>),
        Text(String),
        End(String),
    }

    fn parse_back(xml: &str) -> Vec<Item> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut items = Vec::new();
        loop {
            let event = reader.read_event().unwrap();
            let start = match &event {
                Event::Start(e) | Event::Empty(e) => Some(e),
                _ => None,
            };

            if let Some(e) = start {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let attrs = e
                    .attributes()
                    .map(|a| {
                        let a = a.unwrap();
                        (
                            String::from_utf8_lossy(a.key.as_ref()).into_owned(),
                            String::from_utf8_lossy(&a.value).into_owned(),
                        )
                    })
                    .collect();
                items.push(Item::Element(name.clone(), attrs));

                if matches!(event, Event::Empty(_)) {
                    items.push(Item::End(name));
                }
                continue;
            }

            match event {
                Event::Text(e) => items.push(Item::Text(String::from_utf8_lossy(&e).into_owned())),
                Event::End(e) => {
                    items.push(Item::End(String::from_utf8_lossy(e.name().as_ref()).into_owned()))
                }
                Event::Eof => break,
                _ => {}
            }
        }
        items
    }

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_owned(), value.to_owned())
    }

    #[test]
    fn round_trip() {
        let bytes = XmlBuilder::new()
            .namespace("android", ANDROID_NAMESPACE)
            .start("manifest")
            .attr_string(None, "package", "com.example.app")
            .attr_int(Some(ANDROID_NAMESPACE), "versionCode", 0x0101021b, 42)
            .start("application")
            .attr_bool(Some(ANDROID_NAMESPACE), "debuggable", 0x0101000f, true)
            .start("meta-data")
            .attr_string(Some(ANDROID_NAMESPACE), "name", "channel")
            .end()
            .start("description")
            .text("Example application")
            .end()
            .end()
            .end()
            .build();

        let xml = serialize(&bytes);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));

        assert_eq!(
            parse_back(&xml),
            vec![
                Item::Element(
                    "manifest".to_owned(),
                    vec![
                        pair("xmlns:android", ANDROID_NAMESPACE),
                        pair("package", "com.example.app"),
                        pair("android:versionCode", "42"),
                    ]
                ),
                Item::Element(
                    "application".to_owned(),
                    vec![pair("android:debuggable", "true")]
                ),
                Item::Element(
                    "meta-data".to_owned(),
                    vec![pair("android:name", "channel")]
                ),
                Item::End("meta-data".to_owned()),
                Item::Element("description".to_owned(), vec![]),
                Item::Text("Example application".to_owned()),
                Item::End("description".to_owned()),
                Item::End("application".to_owned()),
                Item::End("manifest".to_owned()),
            ]
        );
    }

    #[test]
    fn indented_layout() {
        let bytes = XmlBuilder::new()
            .start("manifest")
            .start("uses-sdk")
            .attr_int(None, "minSdkVersion", 0, 21)
            .end()
            .end()
            .build();

        assert_eq!(
            serialize(&bytes),
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <manifest>\n\
             \t<uses-sdk minSdkVersion=\"21\"/>\n\
             </manifest>"
        );
    }

    fn comments(xml: &str) -> Vec<String> {
        let mut reader = Reader::from_str(xml);
        let mut comments = Vec::new();
        loop {
            match reader.read_event().unwrap() {
                Event::Comment(e) => comments.push(String::from_utf8_lossy(&e).into_owned()),
                Event::Eof => break,
                _ => {}
            }
        }
        comments
    }

    #[test]
    fn dashes_in_comments() {
        let bytes = XmlBuilder::new()
            .comment("a---b")
            .start("manifest")
            .comment("x-")
            .start("application")
            .end()
            .comment("----")
            .start("uses-sdk")
            .end()
            .end()
            .build();

        let xml = serialize(&bytes);
        let found = comments(&xml);

        assert_eq!(found, vec!["a- - -b", "x- ", "- - - - "]);
        for comment in &found {
            assert!(!comment.contains("--"), "{:?}", comment);
            assert!(!comment.ends_with('-'), "{:?}", comment);
        }
    }

    #[test]
    fn comments_and_escaping() {
        let bytes = XmlBuilder::new()
            .comment("generated -- do not edit")
            .start("string")
            .attr_string(None, "name", "a<b")
            .text("x & y")
            .end()
            .build();

        let xml = serialize(&bytes);
        assert!(xml.contains("<!--generated - - do not edit-->"));
        assert!(xml.contains("name=\"a&lt;b\""));
        assert!(xml.contains("x &amp; y"));
    }
}
