pub(crate) mod attrs_manifest;
pub(crate) mod chunk;
pub(crate) mod common;
pub(crate) mod res_table_config;
pub(crate) mod resource_table;
pub(crate) mod string_pool;
pub(crate) mod system_types;
pub(crate) mod xml_elements;

pub(crate) use chunk::*;
pub(crate) use common::*;
pub(crate) use res_table_config::*;
pub(crate) use resource_table::*;
pub(crate) use string_pool::*;
pub(crate) use xml_elements::*;
