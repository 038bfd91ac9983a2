//! Session envelope: `<discriminator>|<json>`.
//!
//! Channel events use the channel name as discriminator and a JSON array
//! of parameters as body. Remote calls and their replies share the
//! reserved discriminator [`RPC_DISCRIMINATOR`] and carry a JSON object
//! with the call id (`id`), method (`m`, calls only), parameters (`p`) and
//! an optional error (`e`, replies only).

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{EnvelopeError, SessionError};

use super::validator::validate_channel_name;

/// Discriminator reserved for call and reply traffic.
pub const RPC_DISCRIMINATOR: &str = "rpc";

/// Separates the discriminator from the JSON body.
pub const DELIMITER: char = '|';

/// A decoded session-layer message.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Message on a named channel.
    Event {
        /// Channel name; see [`validate_channel_name`] for what survives a
        /// round trip.
        channel: String,
        /// Ordered parameters.
        params: Vec<Value>,
    },
    /// Remote call request.
    Call {
        /// Correlation id.
        id: u64,
        /// Method name.
        method: String,
        /// Ordered parameters.
        params: Vec<Value>,
    },
    /// Remote call reply.
    Reply {
        /// Id of the call being answered.
        id: u64,
        /// Result values.
        params: Vec<Value>,
        /// Error reported by the server instead of a result.
        error: Option<String>,
    },
}

#[derive(Deserialize)]
struct RpcBody {
    id: u64,
    #[serde(rename = "m", default)]
    method: Option<String>,
    #[serde(rename = "p", alias = "result", default)]
    params: Vec<Value>,
    #[serde(rename = "e", default)]
    error: Option<String>,
}

impl Envelope {
    /// Channel event.
    ///
    /// Fails for names that could not be decoded back as a channel: empty,
    /// containing `|`, or the reserved `rpc`.
    pub fn event(channel: impl Into<String>, params: Vec<Value>) -> Result<Self, SessionError> {
        let channel = channel.into();
        validate_channel_name(&channel)?;
        Ok(Self::Event { channel, params })
    }

    /// Call request.
    pub fn call(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self::Call {
            id,
            method: method.into(),
            params,
        }
    }

    /// Successful reply.
    pub fn reply(id: u64, params: Vec<Value>) -> Self {
        Self::Reply {
            id,
            params,
            error: None,
        }
    }

    /// Serializes the envelope.
    ///
    /// Object keys are written in sorted order so the output is identical
    /// whichever map backing `serde_json` was built with.
    pub fn encode(&self) -> String {
        match self {
            Self::Event { channel, params } => {
                format!("{channel}{DELIMITER}{}", Value::Array(params.clone()))
            }
            Self::Call { id, method, params } => {
                let mut body = Map::new();
                body.insert("id".to_string(), Value::from(*id));
                body.insert("m".to_string(), Value::String(method.clone()));
                body.insert("p".to_string(), Value::Array(params.clone()));
                format!("{RPC_DISCRIMINATOR}{DELIMITER}{}", Value::Object(body))
            }
            Self::Reply { id, params, error } => {
                let mut body = Map::new();
                if let Some(error) = error {
                    body.insert("e".to_string(), Value::String(error.clone()));
                }
                body.insert("id".to_string(), Value::from(*id));
                body.insert("p".to_string(), Value::Array(params.clone()));
                format!("{RPC_DISCRIMINATOR}{DELIMITER}{}", Value::Object(body))
            }
        }
    }

    /// Parses an envelope.
    pub fn decode(raw: &str) -> Result<Self, EnvelopeError> {
        let (discriminator, body) = raw
            .split_once(DELIMITER)
            .ok_or(EnvelopeError::MissingDelimiter)?;

        if discriminator.is_empty() {
            return Err(EnvelopeError::EmptyDiscriminator);
        }

        if discriminator == RPC_DISCRIMINATOR {
            let body: RpcBody = serde_json::from_str(body)?;
            return Ok(match body.method {
                Some(method) => Self::Call {
                    id: body.id,
                    method,
                    params: body.params,
                },
                None => Self::Reply {
                    id: body.id,
                    params: body.params,
                    error: body.error,
                },
            });
        }

        let params: Vec<Value> = serde_json::from_str(body)?;
        Ok(Self::Event {
            channel: discriminator.to_string(),
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let envelope = Envelope::event("chat", vec![json!("hello")]).unwrap();
        assert_eq!(envelope.encode(), r#"chat|["hello"]"#);
    }

    #[test]
    fn test_call_wire_format() {
        let envelope = Envelope::call(1, "add", vec![json!(2), json!(3)]);
        assert_eq!(envelope.encode(), r#"rpc|{"id":1,"m":"add","p":[2,3]}"#);
    }

    #[test]
    fn test_reply_with_error_wire_format() {
        let envelope = Envelope::Reply {
            id: 7,
            params: vec![],
            error: Some("no such method".to_string()),
        };
        assert_eq!(
            envelope.encode(),
            r#"rpc|{"e":"no such method","id":7,"p":[]}"#
        );
    }

    #[test]
    fn test_canonical_strings_survive_decode_encode() {
        let canonical = [
            r#"chat|["hello"]"#,
            r#"room:42|[]"#,
            r#"stats|[1,2.5,null,true,{"a":[1]}]"#,
            r#"rpc|{"id":1,"m":"add","p":[2,3]}"#,
            r#"rpc|{"id":1,"p":[5]}"#,
            r#"rpc|{"e":"boom","id":9,"p":[]}"#,
        ];
        for raw in canonical {
            let decoded = Envelope::decode(raw).unwrap();
            assert_eq!(decoded.encode(), raw);
        }
    }

    #[test]
    fn test_body_may_contain_delimiter() {
        let envelope = Envelope::event("chat", vec![json!("a|b")]).unwrap();
        let decoded = Envelope::decode(&envelope.encode()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_event_rejects_undecodable_channels() {
        for name in ["", "a|b", RPC_DISCRIMINATOR] {
            assert!(matches!(
                Envelope::event(name, vec![]),
                Err(SessionError::InvalidChannel { .. })
            ));
        }
    }

    #[test]
    fn test_float_params_keep_exact_value() {
        for f in [1.0715660391465826e-75, -1.81996730402717e-179, 0.1, f64::MAX, f64::MIN_POSITIVE] {
            let envelope = Envelope::event("chat", vec![json!(f)]).unwrap();
            let decoded = Envelope::decode(&envelope.encode()).unwrap();
            assert_eq!(decoded, envelope, "value {f:e}");
        }
    }

    #[test]
    fn test_reply_accepts_result_alias() {
        let decoded = Envelope::decode(r#"rpc|{"id":1,"result":[5]}"#).unwrap();
        assert_eq!(decoded, Envelope::reply(1, vec![json!(5)]));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            Envelope::decode("no delimiter"),
            Err(EnvelopeError::MissingDelimiter)
        ));
        assert!(matches!(
            Envelope::decode(r#"|["x"]"#),
            Err(EnvelopeError::EmptyDiscriminator)
        ));
        assert!(matches!(
            Envelope::decode(r#"chat|{"not":"array"}"#),
            Err(EnvelopeError::Body(_))
        ));
        assert!(matches!(
            Envelope::decode(r#"rpc|{"m":"missing id"}"#),
            Err(EnvelopeError::Body(_))
        ));
    }

    mod proptests {
        use super::*;
        use proptest::num::f64::{NEGATIVE, NORMAL, POSITIVE, SUBNORMAL, ZERO};
        use proptest::prelude::*;

        fn finite() -> impl Strategy<Value = f64> {
            (POSITIVE | NEGATIVE | NORMAL | SUBNORMAL | ZERO).prop_filter("finite", |f| f.is_finite())
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(2048))]

            #[test]
            fn event_round_trips_floats(
                channel in "ch_[a-z0-9:_]{0,15}",
                values in proptest::collection::vec(finite(), 0..8),
            ) {
                let params = values.into_iter().map(|f| json!(f)).collect();
                let envelope = Envelope::event(channel, params).unwrap();
                let encoded = envelope.encode();
                let decoded = Envelope::decode(&encoded).unwrap();
                prop_assert_eq!(decoded.encode(), encoded);
                prop_assert_eq!(decoded, envelope);
            }

            #[test]
            fn reply_round_trips_floats(id in any::<u64>(), value in finite()) {
                let envelope = Envelope::reply(id, vec![json!(value)]);
                let decoded = Envelope::decode(&envelope.encode()).unwrap();
                prop_assert_eq!(decoded, envelope);
            }
        }
    }
}
