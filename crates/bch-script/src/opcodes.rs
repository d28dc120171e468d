//! Bitcoin Cash script opcode constants and the name map.
//!
//! Covers the full BCH instruction set, including the 2018-2019 additions
//! (OP_CAT, OP_SPLIT, OP_CHECKDATASIG, OP_REVERSEBYTES). The name map is
//! attached to compilation environments so that `OP_*` tokens in template
//! scripts resolve to their byte values.

use std::collections::HashMap;

// -----------------------------------------------------------------------
// Push opcodes (0x00 - 0x60)
// -----------------------------------------------------------------------

/// Push an empty byte array.
pub const OP_0: u8 = 0x00;
/// Push the next byte as data length.
pub const OP_PUSHDATA1: u8 = 0x4c;
/// Push the next 2 bytes (little-endian) as data length.
pub const OP_PUSHDATA2: u8 = 0x4d;
/// Push the next 4 bytes (little-endian) as data length.
pub const OP_PUSHDATA4: u8 = 0x4e;
/// Push the number -1.
pub const OP_1NEGATE: u8 = 0x4f;
/// Reserved; fails the script if executed.
pub const OP_RESERVED: u8 = 0x50;
/// Push the number 1.
pub const OP_1: u8 = 0x51;
/// Push the number 2.
pub const OP_2: u8 = 0x52;
/// Push the number 3.
pub const OP_3: u8 = 0x53;
/// Push the number 4.
pub const OP_4: u8 = 0x54;
/// Push the number 5.
pub const OP_5: u8 = 0x55;
/// Push the number 6.
pub const OP_6: u8 = 0x56;
/// Push the number 7.
pub const OP_7: u8 = 0x57;
/// Push the number 8.
pub const OP_8: u8 = 0x58;
/// Push the number 9.
pub const OP_9: u8 = 0x59;
/// Push the number 10.
pub const OP_10: u8 = 0x5a;
/// Push the number 11.
pub const OP_11: u8 = 0x5b;
/// Push the number 12.
pub const OP_12: u8 = 0x5c;
/// Push the number 13.
pub const OP_13: u8 = 0x5d;
/// Push the number 14.
pub const OP_14: u8 = 0x5e;
/// Push the number 15.
pub const OP_15: u8 = 0x5f;
/// Push the number 16.
pub const OP_16: u8 = 0x60;

// -----------------------------------------------------------------------
// Flow control (0x61 - 0x6a)
// -----------------------------------------------------------------------

/// Do nothing.
pub const OP_NOP: u8 = 0x61;
/// Reserved; fails the script if executed.
pub const OP_VER: u8 = 0x62;
/// Execute the following block if the top stack item is truthy.
pub const OP_IF: u8 = 0x63;
/// Execute the following block if the top stack item is falsy.
pub const OP_NOTIF: u8 = 0x64;
/// Reserved; fails the script even if unexecuted.
pub const OP_VERIF: u8 = 0x65;
/// Reserved; fails the script even if unexecuted.
pub const OP_VERNOTIF: u8 = 0x66;
/// Execute if the preceding OP_IF block did not.
pub const OP_ELSE: u8 = 0x67;
/// Close an OP_IF/OP_NOTIF block.
pub const OP_ENDIF: u8 = 0x68;
/// Fail unless the top stack item is truthy; pop it.
pub const OP_VERIFY: u8 = 0x69;
/// Fail the script unconditionally.
pub const OP_RETURN: u8 = 0x6a;

// -----------------------------------------------------------------------
// Stack (0x6b - 0x7d)
// -----------------------------------------------------------------------

/// Move the top stack item to the alt stack.
pub const OP_TOALTSTACK: u8 = 0x6b;
/// Move the top alt stack item to the stack.
pub const OP_FROMALTSTACK: u8 = 0x6c;
/// Drop the top two stack items.
pub const OP_2DROP: u8 = 0x6d;
/// Duplicate the top two stack items.
pub const OP_2DUP: u8 = 0x6e;
/// Duplicate the top three stack items.
pub const OP_3DUP: u8 = 0x6f;
/// Copy items two spaces back to the top.
pub const OP_2OVER: u8 = 0x70;
/// Move the fifth and sixth items to the top.
pub const OP_2ROT: u8 = 0x71;
/// Swap the top two pairs of items.
pub const OP_2SWAP: u8 = 0x72;
/// Duplicate the top item if it is truthy.
pub const OP_IFDUP: u8 = 0x73;
/// Push the stack depth.
pub const OP_DEPTH: u8 = 0x74;
/// Drop the top stack item.
pub const OP_DROP: u8 = 0x75;
/// Duplicate the top stack item.
pub const OP_DUP: u8 = 0x76;
/// Remove the second-from-top stack item.
pub const OP_NIP: u8 = 0x77;
/// Copy the second-from-top stack item to the top.
pub const OP_OVER: u8 = 0x78;
/// Copy the item n back to the top.
pub const OP_PICK: u8 = 0x79;
/// Move the item n back to the top.
pub const OP_ROLL: u8 = 0x7a;
/// Rotate the top three stack items.
pub const OP_ROT: u8 = 0x7b;
/// Swap the top two stack items.
pub const OP_SWAP: u8 = 0x7c;
/// Copy the top item below the second item.
pub const OP_TUCK: u8 = 0x7d;

// -----------------------------------------------------------------------
// Splice (0x7e - 0x82)
// -----------------------------------------------------------------------

/// Concatenate the top two byte arrays.
pub const OP_CAT: u8 = 0x7e;
/// Split a byte array at an index.
pub const OP_SPLIT: u8 = 0x7f;
/// Convert a number to a byte array of a given length.
pub const OP_NUM2BIN: u8 = 0x80;
/// Convert a byte array to a minimally-encoded number.
pub const OP_BIN2NUM: u8 = 0x81;
/// Push the length of the top byte array.
pub const OP_SIZE: u8 = 0x82;

// -----------------------------------------------------------------------
// Bitwise logic (0x83 - 0x88)
// -----------------------------------------------------------------------

/// Disabled.
pub const OP_INVERT: u8 = 0x83;
/// Bitwise AND of the top two byte arrays.
pub const OP_AND: u8 = 0x84;
/// Bitwise OR of the top two byte arrays.
pub const OP_OR: u8 = 0x85;
/// Bitwise XOR of the top two byte arrays.
pub const OP_XOR: u8 = 0x86;
/// Push 1 if the top two items are byte-equal, else 0.
pub const OP_EQUAL: u8 = 0x87;
/// OP_EQUAL followed by OP_VERIFY.
pub const OP_EQUALVERIFY: u8 = 0x88;
/// Reserved; fails the script if executed.
pub const OP_RESERVED1: u8 = 0x89;
/// Reserved; fails the script if executed.
pub const OP_RESERVED2: u8 = 0x8a;

// -----------------------------------------------------------------------
// Arithmetic (0x8b - 0xa5)
// -----------------------------------------------------------------------

/// Add 1 to the top number.
pub const OP_1ADD: u8 = 0x8b;
/// Subtract 1 from the top number.
pub const OP_1SUB: u8 = 0x8c;
/// Disabled.
pub const OP_2MUL: u8 = 0x8d;
/// Disabled.
pub const OP_2DIV: u8 = 0x8e;
/// Negate the top number.
pub const OP_NEGATE: u8 = 0x8f;
/// Absolute value of the top number.
pub const OP_ABS: u8 = 0x90;
/// Push 1 if the top number is 0, else 0.
pub const OP_NOT: u8 = 0x91;
/// Push 0 if the top number is 0, else 1.
pub const OP_0NOTEQUAL: u8 = 0x92;
/// Add the top two numbers.
pub const OP_ADD: u8 = 0x93;
/// Subtract the top number from the second.
pub const OP_SUB: u8 = 0x94;
/// Multiply the top two numbers.
pub const OP_MUL: u8 = 0x95;
/// Integer-divide the second number by the top.
pub const OP_DIV: u8 = 0x96;
/// Remainder of dividing the second number by the top.
pub const OP_MOD: u8 = 0x97;
/// Disabled.
pub const OP_LSHIFT: u8 = 0x98;
/// Disabled.
pub const OP_RSHIFT: u8 = 0x99;
/// Push 1 if both numbers are nonzero, else 0.
pub const OP_BOOLAND: u8 = 0x9a;
/// Push 1 if either number is nonzero, else 0.
pub const OP_BOOLOR: u8 = 0x9b;
/// Push 1 if the numbers are equal, else 0.
pub const OP_NUMEQUAL: u8 = 0x9c;
/// OP_NUMEQUAL followed by OP_VERIFY.
pub const OP_NUMEQUALVERIFY: u8 = 0x9d;
/// Push 1 if the numbers differ, else 0.
pub const OP_NUMNOTEQUAL: u8 = 0x9e;
/// Push 1 if the second number is less than the top.
pub const OP_LESSTHAN: u8 = 0x9f;
/// Push 1 if the second number is greater than the top.
pub const OP_GREATERTHAN: u8 = 0xa0;
/// Push 1 if the second number is <= the top.
pub const OP_LESSTHANOREQUAL: u8 = 0xa1;
/// Push 1 if the second number is >= the top.
pub const OP_GREATERTHANOREQUAL: u8 = 0xa2;
/// Push the smaller of the top two numbers.
pub const OP_MIN: u8 = 0xa3;
/// Push the larger of the top two numbers.
pub const OP_MAX: u8 = 0xa4;
/// Push 1 if the third number is within [second, top).
pub const OP_WITHIN: u8 = 0xa5;

// -----------------------------------------------------------------------
// Crypto (0xa6 - 0xaf)
// -----------------------------------------------------------------------

/// RIPEMD-160 of the top byte array.
pub const OP_RIPEMD160: u8 = 0xa6;
/// SHA-1 of the top byte array.
pub const OP_SHA1: u8 = 0xa7;
/// SHA-256 of the top byte array.
pub const OP_SHA256: u8 = 0xa8;
/// RIPEMD-160 of SHA-256 of the top byte array.
pub const OP_HASH160: u8 = 0xa9;
/// Double SHA-256 of the top byte array.
pub const OP_HASH256: u8 = 0xaa;
/// Mark the signature-covered script start.
pub const OP_CODESEPARATOR: u8 = 0xab;
/// Verify a transaction signature.
pub const OP_CHECKSIG: u8 = 0xac;
/// OP_CHECKSIG followed by OP_VERIFY.
pub const OP_CHECKSIGVERIFY: u8 = 0xad;
/// Verify m-of-n transaction signatures.
pub const OP_CHECKMULTISIG: u8 = 0xae;
/// OP_CHECKMULTISIG followed by OP_VERIFY.
pub const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;

// -----------------------------------------------------------------------
// Locktime and later additions (0xb0 - 0xbc)
// -----------------------------------------------------------------------

/// Do nothing (upgradable).
pub const OP_NOP1: u8 = 0xb0;
/// Fail unless the locktime satisfies the top number.
pub const OP_CHECKLOCKTIMEVERIFY: u8 = 0xb1;
/// Fail unless the input sequence satisfies the top number.
pub const OP_CHECKSEQUENCEVERIFY: u8 = 0xb2;
/// Do nothing (upgradable).
pub const OP_NOP4: u8 = 0xb3;
/// Do nothing (upgradable).
pub const OP_NOP5: u8 = 0xb4;
/// Do nothing (upgradable).
pub const OP_NOP6: u8 = 0xb5;
/// Do nothing (upgradable).
pub const OP_NOP7: u8 = 0xb6;
/// Do nothing (upgradable).
pub const OP_NOP8: u8 = 0xb7;
/// Do nothing (upgradable).
pub const OP_NOP9: u8 = 0xb8;
/// Do nothing (upgradable).
pub const OP_NOP10: u8 = 0xb9;
/// Verify a signature over arbitrary data.
pub const OP_CHECKDATASIG: u8 = 0xba;
/// OP_CHECKDATASIG followed by OP_VERIFY.
pub const OP_CHECKDATASIGVERIFY: u8 = 0xbb;
/// Reverse the top byte array.
pub const OP_REVERSEBYTES: u8 = 0xbc;

/// Build the opcode name map attached to compilation environments.
///
/// Maps every canonical `OP_*` name (plus the `OP_FALSE`/`OP_TRUE`
/// aliases) to its byte value.
///
/// # Returns
/// A fresh `HashMap` from opcode name to byte.
pub fn opcode_map() -> HashMap<String, u8> {
    let entries: &[(&str, u8)] = &[
        ("OP_0", OP_0),
        ("OP_FALSE", OP_0),
        ("OP_PUSHDATA1", OP_PUSHDATA1),
        ("OP_PUSHDATA2", OP_PUSHDATA2),
        ("OP_PUSHDATA4", OP_PUSHDATA4),
        ("OP_1NEGATE", OP_1NEGATE),
        ("OP_RESERVED", OP_RESERVED),
        ("OP_1", OP_1),
        ("OP_TRUE", OP_1),
        ("OP_2", OP_2),
        ("OP_3", OP_3),
        ("OP_4", OP_4),
        ("OP_5", OP_5),
        ("OP_6", OP_6),
        ("OP_7", OP_7),
        ("OP_8", OP_8),
        ("OP_9", OP_9),
        ("OP_10", OP_10),
        ("OP_11", OP_11),
        ("OP_12", OP_12),
        ("OP_13", OP_13),
        ("OP_14", OP_14),
        ("OP_15", OP_15),
        ("OP_16", OP_16),
        ("OP_NOP", OP_NOP),
        ("OP_VER", OP_VER),
        ("OP_IF", OP_IF),
        ("OP_NOTIF", OP_NOTIF),
        ("OP_VERIF", OP_VERIF),
        ("OP_VERNOTIF", OP_VERNOTIF),
        ("OP_ELSE", OP_ELSE),
        ("OP_ENDIF", OP_ENDIF),
        ("OP_VERIFY", OP_VERIFY),
        ("OP_RETURN", OP_RETURN),
        ("OP_TOALTSTACK", OP_TOALTSTACK),
        ("OP_FROMALTSTACK", OP_FROMALTSTACK),
        ("OP_2DROP", OP_2DROP),
        ("OP_2DUP", OP_2DUP),
        ("OP_3DUP", OP_3DUP),
        ("OP_2OVER", OP_2OVER),
        ("OP_2ROT", OP_2ROT),
        ("OP_2SWAP", OP_2SWAP),
        ("OP_IFDUP", OP_IFDUP),
        ("OP_DEPTH", OP_DEPTH),
        ("OP_DROP", OP_DROP),
        ("OP_DUP", OP_DUP),
        ("OP_NIP", OP_NIP),
        ("OP_OVER", OP_OVER),
        ("OP_PICK", OP_PICK),
        ("OP_ROLL", OP_ROLL),
        ("OP_ROT", OP_ROT),
        ("OP_SWAP", OP_SWAP),
        ("OP_TUCK", OP_TUCK),
        ("OP_CAT", OP_CAT),
        ("OP_SPLIT", OP_SPLIT),
        ("OP_NUM2BIN", OP_NUM2BIN),
        ("OP_BIN2NUM", OP_BIN2NUM),
        ("OP_SIZE", OP_SIZE),
        ("OP_INVERT", OP_INVERT),
        ("OP_AND", OP_AND),
        ("OP_OR", OP_OR),
        ("OP_XOR", OP_XOR),
        ("OP_EQUAL", OP_EQUAL),
        ("OP_EQUALVERIFY", OP_EQUALVERIFY),
        ("OP_RESERVED1", OP_RESERVED1),
        ("OP_RESERVED2", OP_RESERVED2),
        ("OP_1ADD", OP_1ADD),
        ("OP_1SUB", OP_1SUB),
        ("OP_2MUL", OP_2MUL),
        ("OP_2DIV", OP_2DIV),
        ("OP_NEGATE", OP_NEGATE),
        ("OP_ABS", OP_ABS),
        ("OP_NOT", OP_NOT),
        ("OP_0NOTEQUAL", OP_0NOTEQUAL),
        ("OP_ADD", OP_ADD),
        ("OP_SUB", OP_SUB),
        ("OP_MUL", OP_MUL),
        ("OP_DIV", OP_DIV),
        ("OP_MOD", OP_MOD),
        ("OP_LSHIFT", OP_LSHIFT),
        ("OP_RSHIFT", OP_RSHIFT),
        ("OP_BOOLAND", OP_BOOLAND),
        ("OP_BOOLOR", OP_BOOLOR),
        ("OP_NUMEQUAL", OP_NUMEQUAL),
        ("OP_NUMEQUALVERIFY", OP_NUMEQUALVERIFY),
        ("OP_NUMNOTEQUAL", OP_NUMNOTEQUAL),
        ("OP_LESSTHAN", OP_LESSTHAN),
        ("OP_GREATERTHAN", OP_GREATERTHAN),
        ("OP_LESSTHANOREQUAL", OP_LESSTHANOREQUAL),
        ("OP_GREATERTHANOREQUAL", OP_GREATERTHANOREQUAL),
        ("OP_MIN", OP_MIN),
        ("OP_MAX", OP_MAX),
        ("OP_WITHIN", OP_WITHIN),
        ("OP_RIPEMD160", OP_RIPEMD160),
        ("OP_SHA1", OP_SHA1),
        ("OP_SHA256", OP_SHA256),
        ("OP_HASH160", OP_HASH160),
        ("OP_HASH256", OP_HASH256),
        ("OP_CODESEPARATOR", OP_CODESEPARATOR),
        ("OP_CHECKSIG", OP_CHECKSIG),
        ("OP_CHECKSIGVERIFY", OP_CHECKSIGVERIFY),
        ("OP_CHECKMULTISIG", OP_CHECKMULTISIG),
        ("OP_CHECKMULTISIGVERIFY", OP_CHECKMULTISIGVERIFY),
        ("OP_NOP1", OP_NOP1),
        ("OP_CHECKLOCKTIMEVERIFY", OP_CHECKLOCKTIMEVERIFY),
        ("OP_CHECKSEQUENCEVERIFY", OP_CHECKSEQUENCEVERIFY),
        ("OP_NOP4", OP_NOP4),
        ("OP_NOP5", OP_NOP5),
        ("OP_NOP6", OP_NOP6),
        ("OP_NOP7", OP_NOP7),
        ("OP_NOP8", OP_NOP8),
        ("OP_NOP9", OP_NOP9),
        ("OP_NOP10", OP_NOP10),
        ("OP_CHECKDATASIG", OP_CHECKDATASIG),
        ("OP_CHECKDATASIGVERIFY", OP_CHECKDATASIGVERIFY),
        ("OP_REVERSEBYTES", OP_REVERSEBYTES),
    ];
    entries
        .iter()
        .map(|(name, byte)| (name.to_string(), *byte))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_covers_known_opcodes() {
        let map = opcode_map();
        assert_eq!(map["OP_DUP"], 0x76);
        assert_eq!(map["OP_HASH160"], 0xa9);
        assert_eq!(map["OP_CHECKSIG"], 0xac);
        assert_eq!(map["OP_CHECKDATASIG"], 0xba);
        assert_eq!(map["OP_REVERSEBYTES"], 0xbc);
    }

    #[test]
    fn test_aliases_share_bytes() {
        let map = opcode_map();
        assert_eq!(map["OP_FALSE"], map["OP_0"]);
        assert_eq!(map["OP_TRUE"], map["OP_1"]);
    }

    #[test]
    fn test_unknown_name_is_absent() {
        let map = opcode_map();
        assert!(!map.contains_key("OP_BOGUS"));
    }
}
