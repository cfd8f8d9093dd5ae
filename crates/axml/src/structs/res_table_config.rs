use std::fmt::{self, Display, Write};

use log::warn;
use winnow::binary::le_u32;
use winnow::error::{ErrMode, Needed};
use winnow::prelude::*;
use winnow::token::take;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Orientation {
    Any,
    Port,
    Land,
    Square,
    Unknown(u8),
}

impl From<u8> for Orientation {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Any,
            1 => Self::Port,
            2 => Self::Land,
            3 => Self::Square,
            v => Self::Unknown(v),
        }
    }
}

impl Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => Ok(()),
            Self::Port => write!(f, "port"),
            Self::Land => write!(f, "land"),
            Self::Square => write!(f, "square"),
            Self::Unknown(v) => write!(f, "orientation={}", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Density {
    Default,
    Low,
    Medium,
    TV,
    High,
    XHigh,
    XXHigh,
    XXXHigh,
    Any,
    None,
    Unknown(u16),
}

impl From<u16> for Density {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Default,
            120 => Self::Low,
            160 => Self::Medium,
            213 => Self::TV,
            240 => Self::High,
            320 => Self::XHigh,
            480 => Self::XXHigh,
            640 => Self::XXXHigh,
            0xfffe => Self::Any,
            0xffff => Self::None,
            v => Self::Unknown(v),
        }
    }
}

impl Display for Density {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => Ok(()),
            Self::Low => write!(f, "ldpi"),
            Self::Medium => write!(f, "mdpi"),
            Self::TV => write!(f, "tvdpi"),
            Self::High => write!(f, "hdpi"),
            Self::XHigh => write!(f, "xhdpi"),
            Self::XXHigh => write!(f, "xxhdpi"),
            Self::XXXHigh => write!(f, "xxxhdpi"),
            Self::Any => write!(f, "anydpi"),
            Self::None => write!(f, "nodpi"),
            Self::Unknown(v) => write!(f, "{}dpi", v),
        }
    }
}

/// Describes a particular resource configuration
///
/// Only the leading fields are decoded, the rest is kept raw so the default
/// configuration can still be recognized.
///
/// [Source code](https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=967)
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ResTableConfig {
    /// Number of bytes in this structure, including the size field
    pub(crate) size: u32,

    /// mcc (low u16) and mnc (high u16)
    pub(crate) imsi: u32,

    /// Packed language and country, big-endian
    pub(crate) locale: u32,

    /// orientation, touchscreen and density
    pub(crate) screen_type: u32,

    /// sdkVersion (low u16) and minorVersion (high u16)
    pub(crate) version: u32,

    /// Every byte after `size`
    raw: Vec<u8>,
}

impl ResTableConfig {
    const VERSION_OFFSET: usize = 20;

    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTableConfig> {
        let size = le_u32.parse_next(input)?;

        if size < 4 {
            return Err(ErrMode::Incomplete(Needed::Unknown));
        }

        if size > 64 {
            warn!("got unexpected ResTable_config size {}, newer platform?", size);
        }

        let raw = take(size as usize - 4).parse_next(input)?;
        let field = |offset: usize| -> u32 {
            raw.get(offset..offset + 4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .unwrap_or_default()
        };

        Ok(ResTableConfig {
            size,
            imsi: field(0),
            locale: field(4),
            screen_type: field(8),
            version: field(Self::VERSION_OFFSET),
            raw: raw.to_vec(),
        })
    }

    /// Configuration without any qualifier
    #[inline]
    pub(crate) fn is_default(&self) -> bool {
        self.raw.iter().all(|&b| b == 0)
    }

    /// Convert [`ResTableConfig::imsi`] to union like field
    pub(crate) fn get_mcc_mnc(&self) -> (u16, u16) {
        let mcc = (self.imsi & 0x0000_FFFF) as u16;
        let mnc = ((self.imsi >> 16) & 0x0000_FFFF) as u16;
        (mcc, mnc)
    }

    /// Decode a 16-bit packed language or country code
    fn decode_lang_or_country(raw: u16) -> Option<String> {
        if raw == 0 {
            return None;
        }

        let bytes = raw.to_be_bytes();

        // two 7-bit ASCII letters
        if bytes[0] & 0x80 == 0 {
            return Some(String::from_utf8_lossy(&bytes).to_string());
        }

        // packed 3-letter ISO-639-2 code: {1, t, t, t, t, t, s, s, s, s, s, f, f, f, f, f}
        let f = (raw & 0x1F) as u8;
        let s = ((raw >> 5) & 0x1F) as u8;
        let t = ((raw >> 10) & 0x1F) as u8;

        Some(String::from_utf8_lossy(&[f + b'a', s + b'a', t + b'a']).to_string())
    }

    /// Convert [`ResTableConfig::locale`] to language and region
    pub(crate) fn get_language_and_country(&self) -> (Option<String>, Option<String>) {
        let bytes = self.locale.to_le_bytes();

        // stored as two byte arrays, not as u16 values
        let lang_raw = u16::from_be_bytes([bytes[0], bytes[1]]);
        let country_raw = u16::from_be_bytes([bytes[2], bytes[3]]);

        (
            Self::decode_lang_or_country(lang_raw),
            Self::decode_lang_or_country(country_raw),
        )
    }

    /// Convert [`ResTableConfig::screen_type`] to union like
    pub(crate) fn get_orientation_touchscreen_density(&self) -> (u8, u8, u16) {
        let orientation = (self.screen_type & 0x0000_00FF) as u8;
        let touchscreen = ((self.screen_type >> 8) & 0x0000_00FF) as u8;
        let density = ((self.screen_type >> 16) & 0x0000_FFFF) as u16;
        (orientation, touchscreen, density)
    }

    pub(crate) fn get_sdk_minor_version(&self) -> (u16, u16) {
        let sdk_version = (self.version & 0x0000_FFFF) as u16;
        let minor_version = ((self.version >> 16) & 0x0000_FFFF) as u16;
        (sdk_version, minor_version)
    }

    /// Qualifier string in the `values-<qualifiers>` directory form
    ///
    /// Only mcc/mnc, locale, orientation, density and sdk version are rendered,
    /// anything else shows up as `+other`.
    pub(crate) fn as_string(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        let (mcc, mnc) = self.get_mcc_mnc();
        if mcc != 0 {
            parts.push(format!("mcc{}", mcc));
        }
        if mnc != 0 {
            parts.push(format!("mnc{}", mnc));
        }

        let (language, country) = self.get_language_and_country();
        if let Some(language) = language {
            parts.push(language);
        }
        if let Some(country) = country {
            parts.push(format!("r{}", country));
        }

        let (orientation, _, density) = self.get_orientation_touchscreen_density();
        let orientation = Orientation::from(orientation);
        if orientation != Orientation::Any {
            parts.push(orientation.to_string());
        }

        let density = Density::from(density);
        if density != Density::Default {
            parts.push(density.to_string());
        }

        let (sdk_version, minor_version) = self.get_sdk_minor_version();
        if sdk_version != 0 {
            let mut version = format!("v{}", sdk_version);
            if minor_version != 0 {
                let _ = write!(version, ".{}", minor_version);
            }
            parts.push(version);
        }

        // touchscreen byte and everything after version aren't rendered
        let touchscreen = self.raw.get(9).copied().unwrap_or_default();
        let has_other = touchscreen != 0
            || self.raw.get(12..Self::VERSION_OFFSET).is_some_and(|b| b.iter().any(|&x| x != 0))
            || self.raw.get(Self::VERSION_OFFSET + 4..).is_some_and(|b| b.iter().any(|&x| x != 0));
        if has_other {
            parts.push("+other".to_owned());
        }

        if parts.is_empty() {
            "default".to_owned()
        } else {
            parts.join("-")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(fields: &[(usize, &[u8])]) -> ResTableConfig {
        let mut raw = vec![0u8; 60];
        for (offset, bytes) in fields {
            raw[*offset..*offset + bytes.len()].copy_from_slice(bytes);
        }

        let mut input = 64u32.to_le_bytes().to_vec();
        input.extend(raw);
        ResTableConfig::parse(&mut &input[..]).unwrap()
    }

    #[test]
    fn default_config() {
        let config = config(&[]);
        assert!(config.is_default());
        assert_eq!(config.as_string(), "default");
    }

    #[test]
    fn locale_density_version() {
        // language "ru", region "RU", density xhdpi (320), sdk 21
        let config = config(&[
            (4, b"ruRU"),
            (10, &320u16.to_le_bytes()),
            (20, &21u16.to_le_bytes()),
        ]);

        assert!(!config.is_default());
        assert_eq!(config.as_string(), "ru-rRU-xhdpi-v21");
    }

    #[test]
    fn short_config_is_padded() {
        let mut input = 28u32.to_le_bytes().to_vec();
        input.extend([0u8; 24]);
        // orientation: land
        input[12] = 2;

        let config = ResTableConfig::parse(&mut &input[..]).unwrap();
        assert_eq!(config.version, 0);
        assert_eq!(config.as_string(), "land");
    }
}
