//! Execution definition model
//!
//! Value types describing an analytical query (the *execution definition*)
//! and the result metadata a backend computes for it. Every type derives
//! `Serialize`/`Deserialize` and follows the JSON shape used on the wire:
//! camelCase keys and externally tagged unions (`{"measureDefinition": {...}}`).
//!
//! Identity is structural: two definitions with equal content are equal,
//! regardless of where they came from.

pub mod definition;
pub mod filter;
pub mod results;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use definition::*;
pub use filter::*;
pub use results::*;

/// Literal dimension item standing for "all measures of the execution"
pub const MEASURE_GROUP: &str = "measureGroup";

/// Reference to a metadata object (display form, fact, metric, data set ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjRef {
    Uri {
        uri: String,
    },
    Identifier {
        identifier: String,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        object_type: Option<String>,
    },
}

impl ObjRef {
    pub fn identifier(id: impl Into<String>) -> Self {
        ObjRef::Identifier {
            identifier: id.into(),
            object_type: None,
        }
    }

    pub fn uri(uri: impl Into<String>) -> Self {
        ObjRef::Uri { uri: uri.into() }
    }
}

/// Renders the identifying part of the reference: the uri or the identifier.
impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjRef::Uri { uri } => write!(f, "{}", uri),
            ObjRef::Identifier { identifier, .. } => write!(f, "{}", identifier),
        }
    }
}

/// Reference to an attribute or measure defined inside the same execution definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalIdRef {
    pub local_identifier: String,
}

/// Either a local reference or a reference to a metadata object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjRefInScope {
    LocalId(LocalIdRef),
    Ref(ObjRef),
}

impl ObjRefInScope {
    pub fn local(local_identifier: impl Into<String>) -> Self {
        ObjRefInScope::LocalId(LocalIdRef {
            local_identifier: local_identifier.into(),
        })
    }

    /// The referenced local identifier, if this is a local reference
    pub fn local_id(&self) -> Option<&str> {
        match self {
            ObjRefInScope::LocalId(r) => Some(&r.local_identifier),
            ObjRefInScope::Ref(_) => None,
        }
    }

    pub fn local_id_mut(&mut self) -> Option<&mut String> {
        match self {
            ObjRefInScope::LocalId(r) => Some(&mut r.local_identifier),
            ObjRefInScope::Ref(_) => None,
        }
    }
}

impl fmt::Display for ObjRefInScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjRefInScope::LocalId(r) => write!(f, "{}", r.local_identifier),
            ObjRefInScope::Ref(r) => write!(f, "{}", r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obj_ref_untagged_forms() {
        let by_id: ObjRef = serde_json::from_str(r#"{"identifier": "label.region"}"#).unwrap();
        assert_eq!(by_id, ObjRef::identifier("label.region"));

        let by_uri: ObjRef = serde_json::from_str(r#"{"uri": "/gdc/md/p/obj/1"}"#).unwrap();
        assert_eq!(by_uri.to_string(), "/gdc/md/p/obj/1");

        let typed: ObjRef =
            serde_json::from_str(r#"{"identifier": "fact.price", "type": "fact"}"#).unwrap();
        assert_eq!(
            typed,
            ObjRef::Identifier {
                identifier: "fact.price".into(),
                object_type: Some("fact".into())
            }
        );
    }

    #[test]
    fn test_obj_ref_in_scope_prefers_local_id() {
        let local: ObjRefInScope = serde_json::from_str(r#"{"localIdentifier": "m1"}"#).unwrap();
        assert_eq!(local.local_id(), Some("m1"));

        let global: ObjRefInScope = serde_json::from_str(r#"{"identifier": "metric.x"}"#).unwrap();
        assert_eq!(global.local_id(), None);
        assert_eq!(global.to_string(), "metric.x");
    }
}
