use bstr::{BString, ByteSlice};
use rgit_hash::ObjectId;
use rgit_utils::date::Signature;

use crate::commit::{parse_oid_value, parse_signature, push_header, split_headers};
use crate::{ObjectError, ObjectType};

/// A git annotated tag object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// OID of the tagged object.
    pub target: ObjectId,
    /// Type of the tagged object.
    pub target_type: ObjectType,
    /// Tag name.
    pub tag_name: BString,
    /// Tagger identity (optional in some historical tags).
    pub tagger: Option<Signature>,
    /// Tag message.
    pub message: BString,
}

impl Tag {
    /// The tagged `(type, oid)` pair, the link followed when peeling.
    pub fn object(&self) -> (ObjectType, ObjectId) {
        (self.target_type, self.target)
    }

    /// Parse tag content from raw bytes (no object header).
    pub fn parse(content: &[u8]) -> Result<Self, ObjectError> {
        let mut target: Option<ObjectId> = None;
        let mut target_type: Option<ObjectType> = None;
        let mut tag_name: Option<BString> = None;
        let mut tagger: Option<Signature> = None;

        let (headers, message) = split_headers(content);
        for (key, value) in headers {
            match key.as_slice() {
                b"object" => target = Some(parse_oid_value(&value)?),
                b"type" => target_type = Some(ObjectType::from_bytes(&value)?),
                b"tag" => tag_name = Some(value),
                b"tagger" => tagger = Some(parse_signature(value.as_bstr())?),
                _ => {}
            }
        }

        Ok(Self {
            target: target.ok_or(ObjectError::MissingTagField { field: "object" })?,
            target_type: target_type.ok_or(ObjectError::MissingTagField { field: "type" })?,
            tag_name: tag_name.ok_or(ObjectError::MissingTagField { field: "tag" })?,
            tagger,
            message,
        })
    }

    /// Serialize to canonical tag format.
    pub fn serialize_content(&self) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::new();
        push_header(&mut out, b"object", self.target.to_hex().as_bytes());
        push_header(&mut out, b"type", self.target_type.as_bytes());
        push_header(&mut out, b"tag", &self.tag_name);
        if let Some(ref tagger) = self.tagger {
            push_header(&mut out, b"tagger", &tagger.to_bytes());
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }
}
