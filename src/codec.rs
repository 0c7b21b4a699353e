//! MsgPack codec for frame payloads, using `rmp-serde`.
//!
//! Structs are encoded as maps (`to_vec_named`) rather than positional
//! arrays, so a payload stays decodable when either peer adds fields.
//!
//! # Example
//!
//! ```
//! use wirecall::codec::MsgPackCodec;
//! use wirecall::Message;
//!
//! let msg = Message::new("hello");
//! let encoded = MsgPackCodec::encode(&msg).unwrap();
//! let decoded: Message = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use crate::error::Result;

/// MessagePack codec for structured payloads.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map format).
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn test_encode_decode_message() {
        let original = Message::new("round trip");
        let encoded = MsgPackCodec::encode(&original).unwrap();
        let decoded: Message = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_encode_decode_string() {
        let encoded = MsgPackCodec::encode(&"DoUnaryUnary").unwrap();
        let decoded: String = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, "DoUnaryUnary");
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result: Result<Message> = MsgPackCodec::decode(&[0xc1, 0xff, 0x00]);
        assert!(result.is_err());
    }
}
