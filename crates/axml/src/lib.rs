//! Decoders for the compiled resource formats found inside an APK:
//! binary XML (`AndroidManifest.xml`, layouts) and the resource table
//! (`resources.arsc`).

pub mod arsc;
pub mod axml;
pub mod errors;
pub mod node;
pub mod xml_writer;

pub(crate) mod structs;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use arsc::{ARSC, PackageInfo, ResolvedValue, ResourceDump};
pub use axml::{ANDROID_NAMESPACE, AXML, DecodeOptions, XmlNodes};
pub use errors::{ResourceTableError, XmlDecodeError};
pub use node::{
    Resolution, UnresolvedReason, XmlAttribute, XmlElement, XmlNamespaceDecl, XmlNode,
    XmlNodeKind,
};
pub use structs::common::{ResourceValue, ValueType};
pub use structs::resource_table::{ResTableEntry, ResTableMap, ResTableMapEntry};
pub use structs::system_types::{get_attr_id, get_attr_name, get_resource_name};
pub use xml_writer::XmlSerializer;
