//! Shared COSI enums and protocol records.
//!
//! Enums serialize as their proto3 names. Deserialization also accepts the
//! numeric wire value, as proto3 JSON parsers do.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

macro_rules! proto_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $( $(#[$vmeta:meta])* $variant:ident = $num:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Proto3 enum value name.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($variant), )+
                }
            }

            /// Numeric wire value.
            #[must_use]
            pub fn as_i32(self) -> i32 {
                match self {
                    $( Self::$variant => $num, )+
                }
            }

            /// Look up a value by proto3 name.
            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( stringify!($variant) => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Look up a value by its numeric wire value.
            #[must_use]
            pub fn from_i32(value: i32) -> Option<Self> {
                match value {
                    $( $num => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct EnumVisitor;

                impl Visitor<'_> for EnumVisitor {
                    type Value = $name;

                    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        f.write_str(concat!("a ", stringify!($name), " name or number"))
                    }

                    fn visit_str<E: de::Error>(self, v: &str) -> Result<$name, E> {
                        $name::from_name(v)
                            .ok_or_else(|| E::unknown_variant(v, &[$( stringify!($variant) ),+]))
                    }

                    fn visit_i64<E: de::Error>(self, v: i64) -> Result<$name, E> {
                        i32::try_from(v)
                            .ok()
                            .and_then($name::from_i32)
                            .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
                    }

                    fn visit_u64<E: de::Error>(self, v: u64) -> Result<$name, E> {
                        i32::try_from(v)
                            .ok()
                            .and_then($name::from_i32)
                            .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
                    }
                }

                deserializer.deserialize_any(EnumVisitor)
            }
        }
    };
}

proto_enum! {
    /// How a workload authenticates against the bucket.
    #[allow(clippy::upper_case_acronyms)]
    AuthenticationType {
        /// Unset.
        #[default]
        UnknownAuthenticationType = 0,
        /// Access key and secret key.
        Key = 1,
        /// Cloud IAM identity.
        IAM = 2,
    }
}

proto_enum! {
    /// S3 request signing scheme.
    S3SignatureVersion {
        /// Unset.
        #[default]
        UnknownSignature = 0,
        /// AWS Signature Version 2.
        S3V2 = 1,
        /// AWS Signature Version 4.
        S3V4 = 2,
    }
}

// ---------------------------------------------------------------------------
// Protocol records
// ---------------------------------------------------------------------------

/// Protocol details of a provisioned bucket. Exactly one member is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    /// S3-compatible bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Protocol>,
}

impl Protocol {
    /// Protocol record of an S3 bucket in `region`.
    #[must_use]
    pub fn s3(region: impl Into<String>, signature_version: S3SignatureVersion) -> Self {
        Self {
            s3: Some(S3Protocol {
                region: region.into(),
                signature_version,
            }),
        }
    }
}

/// S3 protocol record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct S3Protocol {
    /// Bucket region.
    pub region: String,
    /// Signing scheme clients must use.
    pub signature_version: S3SignatureVersion,
}

/// Secrets of one credential set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CredentialDetails {
    /// Secret values keyed by name.
    pub secrets: std::collections::HashMap<String, String>,
}
