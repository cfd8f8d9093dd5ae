use crate::structs::ResourceValue;

/// Why a reference was left as a `@XXXXXXXX` placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// Document was decoded without a resource table
    NoTable,

    /// Resource table has no entry for the id or for a link of its chain
    Missing,

    /// Reference chain loops back on itself
    Cycle,

    /// Entry exists, but its value can't be rendered
    Invalid,
}

/// How the attribute value was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Value is stored in the document itself
    Literal,

    /// Reference to `id` replaced by the value from the resource table
    Resolved { id: u32 },

    /// Reference to `id` kept as a placeholder
    Unresolved { id: u32, reason: UnresolvedReason },
}

impl Resolution {
    #[inline]
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Resolution::Unresolved { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Local name
    pub name: String,

    pub namespace: Option<String>,

    /// Prefix of `namespace` from the declarations in scope
    pub prefix: Option<String>,

    /// Framework attribute id from the resource map
    pub resource_id: Option<u32>,

    /// Original string value, compilers drop it for most typed values
    pub raw_value: Option<String>,

    pub typed_value: ResourceValue,

    /// Rendered value
    pub value: String,

    pub resolution: Resolution,
}

impl XmlAttribute {
    /// `prefix:name` or just `name`
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<XmlAttribute>,
}

impl XmlElement {
    /// First attribute with the local `name`
    pub fn attr(&self, name: &str) -> Option<&XmlAttribute> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    /// First attribute with the framework resource `id`
    pub fn attr_by_id(&self, id: u32) -> Option<&XmlAttribute> {
        self.attributes
            .iter()
            .find(|attr| attr.resource_id == Some(id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNamespaceDecl {
    /// `None` for the default namespace
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNodeKind {
    StartNamespace(XmlNamespaceDecl),
    EndNamespace(XmlNamespaceDecl),
    StartElement(XmlElement),
    EndElement {
        namespace: Option<String>,
        name: String,
    },
    Text(String),
    Comment(String),
}

/// Single item of a binary XML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    /// Line in the source file the document was compiled from
    pub line_number: u32,

    pub kind: XmlNodeKind,
}
