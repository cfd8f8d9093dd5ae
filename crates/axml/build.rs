use std::path::PathBuf;
use std::{env, fs};

use phf_codegen::Map;
use serde_json::Value;

/// Resource types of `public-final.xml` dumped into `public.json`
const RESOURCE_TYPES: &[&str] = &[
    "attr",
    "id",
    "style",
    "string",
    "dimen",
    "color",
    "array",
    "drawable",
    "layout",
    "anim",
    "integer",
    "animator",
    "interpolator",
    "mipmap",
    "transition",
    "raw",
];

fn main() {
    let json_path = PathBuf::from("src/assets/public.json");
    let out_path = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"))
        .join("system_types.rs");

    let json_str = fs::read_to_string(&json_path).expect("cannot read public.json");
    let json: Value = serde_json::from_str(&json_str).expect("invalid JSON in public.json");

    let mut resources = Map::new();
    let mut attr_ids = Map::new();

    for &type_ in RESOURCE_TYPES {
        let Some(entries) = json.get(type_).and_then(Value::as_object) else {
            continue;
        };

        for (id, name) in entries {
            let (Ok(id), Some(name)) = (id.parse::<u32>(), name.as_str()) else {
                continue;
            };

            resources.entry(id, format!("({:?}, {:?})", type_, name));
            if type_ == "attr" {
                attr_ids.entry(name.to_owned(), format!("0x{:08x}", id));
            }
        }
    }

    let output = format!(
        "/// Framework resource id to `(type, name)`\n\
         static SYSTEM_RESOURCES: phf::Map<u32, (&'static str, &'static str)> = {};\n\n\
         /// Framework attribute name to id\n\
         static SYSTEM_ATTR_IDS: phf::Map<&'static str, u32> = {};\n",
        resources.build(),
        attr_ids.build()
    );

    fs::write(&out_path, output).expect("cannot write generated system types");
    println!("cargo:rerun-if-changed={}", json_path.display());
}
