use phf::phf_map;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttrKind {
    Enum,
    Flag,
}

type AttrValues = (AttrKind, &'static [(&'static str, i64)]);

/// Symbolic values of manifest attributes declared as `enum` or `flag` in attrs_manifest.xml
///
/// See: https://cs.android.com/android/platform/superproject/main/+/main:frameworks/base/core/res/res/values/attrs_manifest.xml
static ATTRS_MANIFEST: phf::Map<&'static str, AttrValues> = phf_map! {
    "installLocation" => (AttrKind::Enum, &[
        ("auto", 0),
        ("internalOnly", 1),
        ("preferExternal", 2),
    ]),
    "launchMode" => (AttrKind::Enum, &[
        ("standard", 0),
        ("singleTop", 1),
        ("singleTask", 2),
        ("singleInstance", 3),
        ("singleInstancePerTask", 4),
    ]),
    "documentLaunchMode" => (AttrKind::Enum, &[
        ("none", 0),
        ("intoExisting", 1),
        ("always", 2),
        ("never", 3),
    ]),
    "screenOrientation" => (AttrKind::Enum, &[
        ("unspecified", -1),
        ("landscape", 0),
        ("portrait", 1),
        ("user", 2),
        ("behind", 3),
        ("sensor", 4),
        ("nosensor", 5),
        ("sensorLandscape", 6),
        ("sensorPortrait", 7),
        ("reverseLandscape", 8),
        ("reversePortrait", 9),
        ("fullSensor", 10),
        ("userLandscape", 11),
        ("userPortrait", 12),
        ("fullUser", 13),
        ("locked", 14),
    ]),
    "uiOptions" => (AttrKind::Enum, &[
        ("none", 0),
        ("splitActionBarWhenNarrow", 1),
    ]),
    "configChanges" => (AttrKind::Flag, &[
        ("mcc", 0x0001),
        ("mnc", 0x0002),
        ("locale", 0x0004),
        ("touchscreen", 0x0008),
        ("keyboard", 0x0010),
        ("keyboardHidden", 0x0020),
        ("navigation", 0x0040),
        ("orientation", 0x0080),
        ("screenLayout", 0x0100),
        ("uiMode", 0x0200),
        ("screenSize", 0x0400),
        ("smallestScreenSize", 0x0800),
        ("density", 0x1000),
        ("layoutDirection", 0x2000),
        ("colorMode", 0x4000),
        ("grammaticalGender", 0x8000),
        ("fontWeightAdjustment", 0x10000000),
        ("fontScale", 0x40000000),
    ]),
    "recreateOnConfigChanges" => (AttrKind::Flag, &[
        ("mcc", 0x0001),
        ("mnc", 0x0002),
    ]),
    "windowSoftInputMode" => (AttrKind::Flag, &[
        ("stateUnspecified", 0x00),
        ("stateUnchanged", 0x01),
        ("stateHidden", 0x02),
        ("stateAlwaysHidden", 0x03),
        ("stateVisible", 0x04),
        ("stateAlwaysVisible", 0x05),
        ("adjustResize", 0x10),
        ("adjustPan", 0x20),
        ("adjustNothing", 0x30),
    ]),
    "protectionLevel" => (AttrKind::Flag, &[
        ("normal", 0x00),
        ("dangerous", 0x01),
        ("signature", 0x02),
        ("signatureOrSystem", 0x03),
        ("privileged", 0x10),
        ("development", 0x20),
        ("appop", 0x40),
        ("pre23", 0x80),
        ("installer", 0x100),
        ("verifier", 0x200),
        ("preinstalled", 0x400),
        ("setup", 0x800),
    ]),
};

/// Get symbolic representation of an integer attribute
#[inline]
pub(crate) fn get_attr_value(name: &str, value: u32) -> Option<String> {
    let (kind, values) = ATTRS_MANIFEST.get(name)?;
    let i64_value = if value == u32::MAX { -1 } else { value as i64 };

    match kind {
        AttrKind::Enum => {
            for &(item_name, item_value) in values.iter() {
                if item_value == i64_value {
                    return Some(item_name.to_string());
                }
            }
            Some(i64_value.to_string())
        }
        AttrKind::Flag => {
            let mut result = String::new();
            for &(flag_name, flag_value) in values.iter() {
                if flag_value == i64_value {
                    result.push_str(flag_name);
                    break;
                } else if flag_value != 0 && flag_value & i64_value == flag_value {
                    if !result.is_empty() {
                        result.push('|');
                    }
                    result.push_str(flag_name);
                }
            }
            Some(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_attr_value_1() {
        let value = get_attr_value("installLocation", 1);
        assert_eq!(value, Some("internalOnly".to_owned()))
    }

    #[test]
    fn get_attr_value_2() {
        let value = get_attr_value("recreateOnConfigChanges", 3);
        assert_eq!(value, Some("mcc|mnc".to_owned()))
    }

    #[test]
    fn get_attr_value_3() {
        let value = get_attr_value("configChanges", 0x130);
        assert_eq!(
            value,
            Some("keyboard|keyboardHidden|screenLayout".to_owned())
        )
    }

    #[test]
    fn unknown_enum_value_and_attribute() {
        assert_eq!(
            get_attr_value("screenOrientation", u32::MAX),
            Some("unspecified".to_owned())
        );
        assert_eq!(get_attr_value("launchMode", 42), Some("42".to_owned()));
        assert_eq!(get_attr_value("versionCode", 1), None);
    }
}
