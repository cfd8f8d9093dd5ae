// generated by build.rs from src/assets/public.json
include!(concat!(env!("OUT_DIR"), "/system_types.rs"));

/// Framework attribute name, `0x0101021b` is `versionCode`
#[inline(always)]
pub fn get_attr_name(id: u32) -> Option<&'static str> {
    get_resource_name(id)
        .filter(|(type_, _)| *type_ == "attr")
        .map(|(_, name)| name)
}

/// Reverse lookup, used when a manifest attribute name was stripped
#[inline]
pub fn get_attr_id(name: &str) -> Option<u32> {
    SYSTEM_ATTR_IDS.get(name).copied()
}

/// `(type, name)` of a public framework resource, `0x01040000` is `("string", "cancel")`
#[inline]
pub fn get_resource_name(id: u32) -> Option<(&'static str, &'static str)> {
    SYSTEM_RESOURCES.get(&id).copied()
}
