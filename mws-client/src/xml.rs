//! Minimal XML tree for service responses.
//!
//! Responses are small documents that resource parsers walk by element name,
//! so the whole body is read into an owned [`XmlNode`] tree with
//! [`quick_xml`]. Namespace prefixes are dropped: the service declares a
//! default namespace on every envelope and parsers only ever match on local
//! names.

use std::str;

use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

use crate::error::{MwsError, Result};

/// An element with its attributes, text content and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    /// Creates an empty element.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Sets the text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Appends a child element.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Parses a document and returns its root element.
    ///
    /// # Errors
    ///
    /// Returns [`MwsError::Xml`] if the document is malformed, has no root
    /// element, or has more than one.
    ///
    /// # Examples
    ///
    /// ```
    /// use mws_client::xml::XmlNode;
    ///
    /// let root = XmlNode::parse("<A><B id=\"1\">x</B><B id=\"2\">y</B></A>").unwrap();
    /// assert_eq!(root.name(), "A");
    /// assert_eq!(root.children_named("B").count(), 2);
    /// assert_eq!(root.child("B").and_then(|b| b.attribute("id")), Some("1"));
    /// ```
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Self> = Vec::new();
        let mut root: Option<Self> = None;

        loop {
            match reader.read_event()? {
                Event::Start(ref e) => stack.push(Self::from_start(e)?),
                Event::Empty(ref e) => {
                    let node = Self::from_start(e)?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| MwsError::Xml("unbalanced closing tag".to_owned()))?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::Text(ref e) => {
                    if let Some(current) = stack.last_mut() {
                        let text = e.unescape()?;
                        current.text.push_str(&text);
                    }
                }
                Event::CData(e) => {
                    if let Some(current) = stack.last_mut() {
                        let raw = e.into_inner();
                        let text = str::from_utf8(&raw)
                            .map_err(|err| MwsError::Xml(format!("invalid UTF-8 in CDATA: {err}")))?;
                        current.text.push_str(text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(MwsError::Xml(format!(
                "unexpected end of document inside <{}>",
                stack.last().map_or("", |n| n.name.as_str())
            )));
        }
        root.ok_or_else(|| MwsError::Xml("document has no root element".to_owned()))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = utf8(start.local_name().as_ref())?.to_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| MwsError::Xml(e.to_string()))?;
            let key = utf8(attr.key.local_name().as_ref())?.to_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self { name, attributes, text: String::new(), children: Vec::new() })
    }

    /// Local element name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Text content, trimmed.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attribute value by local name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// All child elements in document order.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// First child element with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Child elements with the given name.
    pub fn children_named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a Self> + use<'a, 'n> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first child with the given name.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(Self::text)
    }

    /// Follows a `/`-separated path of child names, taking the first match at
    /// each step. An empty path returns `self`.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Self> {
        path.split('/').filter(|s| !s.is_empty()).try_fold(self, |node, step| node.child(step))
    }

    /// All elements reached by a `/`-separated path, fanning out over
    /// repeated elements at every step.
    #[must_use]
    pub fn find_all(&self, path: &str) -> Vec<&Self> {
        let mut current = vec![self];
        for step in path.split('/').filter(|s| !s.is_empty()) {
            current = current.into_iter().flat_map(|n| n.children_named(step)).collect();
        }
        current
    }

    /// Flattens the leaves below this element into `path = text` pairs.
    ///
    /// Paths are relative to this element and joined with `/`.
    #[must_use]
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for child in &self.children {
            child.flatten_into(child.name.clone(), &mut out);
        }
        out
    }

    fn flatten_into(&self, prefix: String, out: &mut Vec<(String, String)>) {
        if self.children.is_empty() {
            out.push((prefix, self.text.clone()));
            return;
        }
        for child in &self.children {
            child.flatten_into(format!("{prefix}/{}", child.name), out);
        }
    }
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    if root.is_some() {
        return Err(MwsError::Xml(format!("second root element <{}>", node.name)));
    }
    *root = Some(node);
    Ok(())
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    str::from_utf8(bytes).map_err(|e| MwsError::Xml(format!("invalid UTF-8 in name: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_ORDERS: &str = r#"<?xml version="1.0"?>
<ListOrdersResponse xmlns="https://mws.amazonservices.com/Orders/2013-09-01">
  <ListOrdersResult>
    <NextToken>2YgYW55IGNhcm5hbCBwbGVhcw==</NextToken>
    <Orders>
      <Order><AmazonOrderId>902-3159896-1390916</AmazonOrderId><OrderStatus>Pending</OrderStatus></Order>
      <Order><AmazonOrderId>483-3488972-0896720</AmazonOrderId><OrderStatus>Shipped</OrderStatus></Order>
    </Orders>
  </ListOrdersResult>
  <ResponseMetadata><RequestId>88faca76-b600-46d2-b53c-0c8c4533e43a</RequestId></ResponseMetadata>
</ListOrdersResponse>"#;

    #[test]
    fn test_parse_envelope() {
        let root = XmlNode::parse(LIST_ORDERS).unwrap();
        assert_eq!(root.name(), "ListOrdersResponse");
        let result = root.child("ListOrdersResult").unwrap();
        assert_eq!(result.child_text("NextToken"), Some("2YgYW55IGNhcm5hbCBwbGVhcw=="));
    }

    #[test]
    fn test_find_all_fans_out() {
        let root = XmlNode::parse(LIST_ORDERS).unwrap();
        let orders = root.find_all("ListOrdersResult/Orders/Order");
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[1].child_text("OrderStatus"), Some("Shipped"));
    }

    #[test]
    fn test_found_nodes_outlive_path() {
        let root = XmlNode::parse(LIST_ORDERS).unwrap();
        let orders = {
            let path = format!("{}/Orders/{}", "ListOrdersResult", "Order");
            root.find_all(&path)
        };
        let ids: Vec<_> = orders.iter().filter_map(|o| o.child_text("AmazonOrderId")).collect();
        assert_eq!(ids, ["902-3159896-1390916", "483-3488972-0896720"]);

        let named: Vec<_> = {
            let name = String::from("ResponseMetadata");
            root.children_named(&name).collect()
        };
        assert_eq!(named.len(), 1);
    }

    #[test]
    fn test_find_path() {
        let root = XmlNode::parse(LIST_ORDERS).unwrap();
        let id = root.find("ResponseMetadata/RequestId").map(XmlNode::text);
        assert_eq!(id, Some("88faca76-b600-46d2-b53c-0c8c4533e43a"));
        assert!(root.find("Missing/Path").is_none());
        assert_eq!(root.find("").map(XmlNode::name), Some("ListOrdersResponse"));
    }

    #[test]
    fn test_namespace_prefix_dropped() {
        let root = XmlNode::parse("<ns:Root xmlns:ns=\"urn:x\"><ns:Item>1</ns:Item></ns:Root>").unwrap();
        assert_eq!(root.name(), "Root");
        assert_eq!(root.child_text("Item"), Some("1"));
    }

    #[test]
    fn test_entities_unescaped() {
        let root = XmlNode::parse("<A t=\"a&amp;b\">x &lt; y</A>").unwrap();
        assert_eq!(root.text(), "x < y");
        assert_eq!(root.attribute("t"), Some("a&b"));
    }

    #[test]
    fn test_cdata_text() {
        let root = XmlNode::parse("<A><![CDATA[<raw>]]></A>").unwrap();
        assert_eq!(root.text(), "<raw>");
    }

    #[test]
    fn test_empty_document_rejected() {
        assert!(matches!(XmlNode::parse(""), Err(MwsError::Xml(_))));
        assert!(matches!(XmlNode::parse("<?xml version=\"1.0\"?>"), Err(MwsError::Xml(_))));
    }

    #[test]
    fn test_unclosed_document_rejected() {
        assert!(XmlNode::parse("<A><B>").is_err());
    }

    #[test]
    fn test_second_root_rejected() {
        assert!(XmlNode::parse("<A/><B/>").is_err());
    }

    #[test]
    fn test_flatten_paths() {
        let node = XmlNode::new("Order")
            .with_child(XmlNode::new("AmazonOrderId").with_text("1"))
            .with_child(
                XmlNode::new("ShippingAddress").with_child(XmlNode::new("City").with_text("Seattle")),
            );
        assert_eq!(
            node.flatten(),
            vec![
                ("AmazonOrderId".to_owned(), "1".to_owned()),
                ("ShippingAddress/City".to_owned(), "Seattle".to_owned()),
            ]
        );
    }
}
