//! Request and response records exchanged with the networking daemon.
//!
//! Field names on the wire are PascalCase and must not change. Missing
//! fields and JSON `null` decode to the zero value; unknown fields are
//! ignored. Option/data maps keep the difference between `null` and `{}`.
//!
//! [`decode_request`] reads only the first JSON value of a body, treats a
//! bare `null` as the zero request and matches top-level keys ignoring ASCII
//! case, the way the daemon's own decoder does.

use std::collections::HashMap;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Free-form string map attached to pools and addresses.
pub type Options = HashMap<String, String>;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Like [`null_as_default`] for the map itself, and `null` values become `""`.
fn nullable_options<'de, D>(deserializer: D) -> Result<Option<Options>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<HashMap<String, Option<String>>>::deserialize(deserializer)?;
    Ok(raw.map(|map| {
        map.into_iter()
            .map(|(key, value)| (key, value.unwrap_or_default()))
            .collect()
    }))
}

/// A record the daemon sends as a request body.
pub trait WireRequest: DeserializeOwned + Default {
    /// Wire names of the top-level fields.
    const FIELDS: &'static [&'static str];
}

impl WireRequest for PoolRequest {
    const FIELDS: &'static [&'static str] = &["AddressSpace", "Pool", "SubPool", "Options", "V6"];
}

impl WireRequest for PoolReleaseRequest {
    const FIELDS: &'static [&'static str] = &["PoolID"];
}

impl WireRequest for AddressRequest {
    const FIELDS: &'static [&'static str] = &["PoolID", "Address", "Options"];
}

impl WireRequest for AddressReleaseRequest {
    const FIELDS: &'static [&'static str] = &["PoolID", "Address"];
}

fn fold_keys(map: Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| {
            if fields.contains(&key.as_str()) {
                return (key, value);
            }
            let key = fields
                .iter()
                .find(|field| field.eq_ignore_ascii_case(&key))
                .map_or(key, |field| field.to_string());
            (key, value)
        })
        .collect()
}

/// Decode the first JSON value of `body` into a request record.
///
/// Anything after the first value is ignored. An empty body is an error.
pub fn decode_request<T: WireRequest>(body: &[u8]) -> serde_json::Result<T> {
    let first = serde_json::Deserializer::from_slice(body)
        .into_iter::<Value>()
        .next();

    match first {
        None => Err(serde_json::Error::custom("empty request body")),
        Some(Err(e)) => Err(e),
        Some(Ok(Value::Null)) => Ok(T::default()),
        Some(Ok(Value::Object(map))) => {
            serde_json::from_value(Value::Object(fold_keys(map, T::FIELDS)))
        }
        Some(Ok(other)) => serde_json::from_value(other),
    }
}

/// Ask the driver for an address pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PoolRequest {
    #[serde(deserialize_with = "null_as_default")]
    pub address_space: String,
    /// Preferred pool in CIDR form; empty lets the driver choose.
    #[serde(deserialize_with = "null_as_default")]
    pub pool: String,
    /// Sub-range of `pool` to allocate addresses from; may be empty.
    #[serde(deserialize_with = "null_as_default")]
    pub sub_pool: String,
    #[serde(deserialize_with = "nullable_options")]
    pub options: Option<Options>,
    #[serde(rename = "V6", deserialize_with = "null_as_default")]
    pub v6: bool,
}

/// Pool handed out by the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PoolResponse {
    #[serde(rename = "PoolID", deserialize_with = "null_as_default")]
    pub pool_id: String,
    /// CIDR form.
    #[serde(deserialize_with = "null_as_default")]
    pub pool: String,
    #[serde(deserialize_with = "nullable_options")]
    pub data: Option<Options>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolReleaseRequest {
    #[serde(rename = "PoolID", deserialize_with = "null_as_default")]
    pub pool_id: String,
}

/// Ask the driver for an address from a pool, optionally a specific one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AddressRequest {
    #[serde(rename = "PoolID", deserialize_with = "null_as_default")]
    pub pool_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(deserialize_with = "nullable_options")]
    pub options: Option<Options>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AddressResponse {
    /// Allocated address in CIDR form.
    #[serde(deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(deserialize_with = "nullable_options")]
    pub data: Option<Options>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AddressReleaseRequest {
    #[serde(rename = "PoolID", deserialize_with = "null_as_default")]
    pub pool_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub address: String,
}

/// Default local and global address spaces of this IPAM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AddressSpacesResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub local_default_address_space: String,
    #[serde(deserialize_with = "null_as_default")]
    pub global_default_address_space: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CapabilitiesResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub requires_mac_address: bool,
}

/// Error envelope understood by the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "Err", default, deserialize_with = "null_as_default")]
    pub err: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { err: msg.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compact<T: Serialize>(value: &T) -> String {
        serde_json::to_string(value).unwrap()
    }

    #[test]
    fn pool_request_decodes_partial_body() {
        let req: PoolRequest =
            serde_json::from_str(r#"{"AddressSpace":"172.18.0.1/16","Pool":"172.18.0.1/24"}"#)
                .unwrap();

        assert_eq!(req.address_space, "172.18.0.1/16");
        assert_eq!(req.pool, "172.18.0.1/24");
        assert_eq!(req.sub_pool, "");
        assert!(req.options.is_none());
        assert!(!req.v6);
    }

    #[test]
    fn pool_request_decodes_full_body() {
        let req: PoolRequest = serde_json::from_str(
            r#"{"AddressSpace":"GlobalDefault","Pool":"10.0.0.0/8","SubPool":"10.1.0.0/16",
                "Options":{"driver":"macvlan"},"V6":true}"#,
        )
        .unwrap();

        assert_eq!(req.sub_pool, "10.1.0.0/16");
        assert_eq!(
            req.options.unwrap().get("driver").map(String::as_str),
            Some("macvlan")
        );
        assert!(req.v6);
    }

    #[test]
    fn nulls_decode_as_zero_values() {
        let req: PoolRequest = serde_json::from_str(
            r#"{"AddressSpace":null,"Pool":null,"SubPool":null,"Options":null,"V6":null}"#,
        )
        .unwrap();
        assert_eq!(req, PoolRequest::default());

        let req: AddressReleaseRequest =
            serde_json::from_str(r#"{"PoolID":null,"Address":"10.0.0.2/24"}"#).unwrap();
        assert_eq!(req.pool_id, "");
        assert_eq!(req.address, "10.0.0.2/24");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let req: PoolReleaseRequest =
            serde_json::from_str(r#"{"PoolID":"pool-1","Extra":[1,2,3]}"#).unwrap();
        assert_eq!(req.pool_id, "pool-1");
    }

    #[test]
    fn options_keep_empty_map_distinct_from_null() {
        let empty: AddressRequest =
            serde_json::from_str(r#"{"PoolID":"p","Options":{}}"#).unwrap();
        assert_eq!(empty.options, Some(Options::new()));

        let absent: AddressRequest = serde_json::from_str(r#"{"PoolID":"p"}"#).unwrap();
        assert_eq!(absent.options, None);
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let err = serde_json::from_str::<PoolRequest>(r#"{"V6":"yes"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn null_option_values_decode_as_empty_strings() {
        let req: AddressRequest =
            serde_json::from_str(r#"{"PoolID":"p","Options":{"k":null,"j":"v"}}"#).unwrap();
        let options = req.options.unwrap();
        assert_eq!(options.get("k").map(String::as_str), Some(""));
        assert_eq!(options.get("j").map(String::as_str), Some("v"));

        let res: PoolResponse = serde_json::from_str(r#"{"Data":{"gw":null}}"#).unwrap();
        assert_eq!(res.data.unwrap().get("gw").map(String::as_str), Some(""));
    }

    #[test]
    fn decode_request_reads_first_value_only() {
        let req: PoolReleaseRequest =
            decode_request(b"{\"PoolID\":\"p\"} trailing {").unwrap();
        assert_eq!(req.pool_id, "p");

        let req: PoolReleaseRequest =
            decode_request(b"{\"PoolID\":\"a\"}\n{\"PoolID\":\"b\"}").unwrap();
        assert_eq!(req.pool_id, "a");
    }

    #[test]
    fn decode_request_null_body_is_zero_request() {
        let req: PoolRequest = decode_request(b"null").unwrap();
        assert_eq!(req, PoolRequest::default());
        let req: AddressReleaseRequest = decode_request(b"  null\n").unwrap();
        assert_eq!(req, AddressReleaseRequest::default());
    }

    #[test]
    fn decode_request_folds_key_case() {
        let req: AddressRequest =
            decode_request(br#"{"poolid":"p","ADDRESS":"10.0.0.4","options":{"Key":"v"}}"#)
                .unwrap();
        assert_eq!(req.pool_id, "p");
        assert_eq!(req.address, "10.0.0.4");
        // Map keys are data, not field names.
        assert_eq!(
            req.options.unwrap().get("Key").map(String::as_str),
            Some("v")
        );

        let req: PoolRequest = decode_request(br#"{"v6":true,"subpool":"10.1.0.0/16"}"#).unwrap();
        assert!(req.v6);
        assert_eq!(req.sub_pool, "10.1.0.0/16");
    }

    #[test]
    fn decode_request_rejects_empty_and_broken_bodies() {
        assert!(decode_request::<PoolRequest>(b"").is_err());
        assert!(decode_request::<PoolRequest>(b"   \n").is_err());
        assert!(decode_request::<PoolRequest>(b"{\"Pool\":").is_err());
        assert!(decode_request::<PoolRequest>(b"[1,2]").is_err());
        assert!(decode_request::<PoolRequest>(br#"{"pool":7}"#).is_err());
    }

    #[test]
    fn empty_pool_response_wire_shape() {
        insta::assert_snapshot!(
            compact(&PoolResponse::default()),
            @r#"{"PoolID":"","Pool":"","Data":null}"#
        );
    }

    #[test]
    fn pool_response_wire_shape() {
        let res = PoolResponse {
            pool_id: "local/10.10.0.0/16".to_string(),
            pool: "10.10.0.0/16".to_string(),
            data: Some(Options::from([(
                "com.docker.network.gateway".to_string(),
                "10.10.0.1/16".to_string(),
            )])),
        };
        insta::assert_snapshot!(
            compact(&res),
            @r#"{"PoolID":"local/10.10.0.0/16","Pool":"10.10.0.0/16","Data":{"com.docker.network.gateway":"10.10.0.1/16"}}"#
        );
    }

    #[test]
    fn address_response_wire_shape() {
        let res = AddressResponse {
            address: "10.10.0.5/16".to_string(),
            data: Some(Options::new()),
        };
        insta::assert_snapshot!(compact(&res), @r#"{"Address":"10.10.0.5/16","Data":{}}"#);
    }

    #[test]
    fn address_spaces_wire_shape() {
        let res = AddressSpacesResponse {
            local_default_address_space: "LocalDefault".to_string(),
            global_default_address_space: "GlobalDefault".to_string(),
        };
        insta::assert_snapshot!(
            compact(&res),
            @r#"{"LocalDefaultAddressSpace":"LocalDefault","GlobalDefaultAddressSpace":"GlobalDefault"}"#
        );
    }

    #[test]
    fn capabilities_and_error_wire_shape() {
        let caps = CapabilitiesResponse {
            requires_mac_address: true,
        };
        insta::assert_snapshot!(compact(&caps), @r#"{"RequiresMacAddress":true}"#);
        insta::assert_snapshot!(compact(&ErrorResponse::new("no pool")), @r#"{"Err":"no pool"}"#);
    }

    #[test]
    fn request_records_encode_with_wire_names() {
        let req = AddressReleaseRequest {
            pool_id: "p1".to_string(),
            address: "10.0.0.9".to_string(),
        };
        insta::assert_snapshot!(compact(&req), @r#"{"PoolID":"p1","Address":"10.0.0.9"}"#);

        let req = PoolRequest {
            v6: true,
            ..Default::default()
        };
        insta::assert_snapshot!(
            compact(&req),
            @r#"{"AddressSpace":"","Pool":"","SubPool":"","Options":null,"V6":true}"#
        );
    }
}
