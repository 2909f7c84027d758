//! Global tokens and header constants.

pub(crate) const SWITCH_PAGE: u8 = 0x00;
pub(crate) const END: u8 = 0x01;
pub(crate) const ENTITY: u8 = 0x02;
pub(crate) const STR_I: u8 = 0x03;
pub(crate) const LITERAL: u8 = 0x04;
pub(crate) const EXT_I_0: u8 = 0x40;
pub(crate) const EXT_I_2: u8 = 0x42;
pub(crate) const PI: u8 = 0x43;
pub(crate) const LITERAL_C: u8 = 0x44;
pub(crate) const EXT_T_0: u8 = 0x80;
pub(crate) const EXT_T_2: u8 = 0x82;
pub(crate) const STR_T: u8 = 0x83;
pub(crate) const LITERAL_A: u8 = 0x84;
pub(crate) const EXT_0: u8 = 0xC0;
pub(crate) const EXT_2: u8 = 0xC2;
pub(crate) const OPAQUE: u8 = 0xC3;
pub(crate) const LITERAL_AC: u8 = 0xC4;

/// Set on a tag token when content follows.
pub(crate) const WITH_CONTENT: u8 = 0x40;
/// Set on a tag token when attributes follow.
pub(crate) const WITH_ATTRIBUTES: u8 = 0x80;
pub(crate) const TAG_MASK: u8 = 0x3F;

/// WBXML 1.3.
pub(crate) const VERSION_1_3: u8 = 0x03;
/// "Unknown" public identifier.
pub(crate) const PUBLIC_ID_UNKNOWN: u8 = 0x01;
/// IANA MIBenum for UTF-8.
pub(crate) const CHARSET_UTF8: u8 = 0x6A;

/// Returns true for global tokens this codec refuses to decode.
pub(crate) fn is_unsupported(token: u8) -> bool {
    matches!(
        token,
        LITERAL | PI | LITERAL_C | LITERAL_A | LITERAL_AC
    ) || (EXT_I_0..=EXT_I_2).contains(&token)
        || (EXT_T_0..=EXT_T_2).contains(&token)
        || (EXT_0..=EXT_2).contains(&token)
}
