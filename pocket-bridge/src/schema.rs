//! Bit-field codec schemas
//!
//! A schema describes the exact bit layout of one packed structure: an
//! ordered list of named fields, each a fixed-width primitive. The schema is
//! the single source of truth for everything downstream: the packer
//! ([`crate::packing`]), the Lua decoder emitter ([`crate::emit`]), the
//! generic normalizer ([`normalize`]), and the region sizing in
//! [`crate::memmap`] are all derived from the same immutable value. None of
//! them may compute a bit offset on their own.
//!
//! Schemas are validated at construction and never mutated afterwards.

use thiserror::Error;

/// Schema construction error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Field width outside the supported range
    #[error("field '{0}' has unsupported width {1} bits")]
    BadWidth(String, u8),
    /// Two fields in one struct share a name (after flattening)
    #[error("duplicate field name '{0}' in struct '{1}'")]
    DuplicateField(String, String),
    /// Struct with no fields
    #[error("struct '{0}' has no fields")]
    EmptyStruct(String),
    /// Two enum variants share a name
    #[error("duplicate variant name '{0}' in enum '{1}'")]
    DuplicateEnumName(String, String),
    /// Two enum variants map to the same value
    #[error("duplicate variant value {0} in enum '{1}'")]
    DuplicateEnumValue(i64, String),
    /// Enum variant value does not fit the declared bit width
    #[error("variant '{0}' = {1} does not fit in {2} bits (enum '{3}')")]
    EnumValueTooWide(String, i64, u8, String),
}

/// Maximum width of a single field in bits
pub const MAX_FIELD_BITS: u8 = 32;

// =============================================================================
// Codec nodes
// =============================================================================

/// One serializable shape
///
/// Every node knows its exact bit size; a structure's size is the sum of its
/// fields' with no padding or alignment anywhere. `Struct` composition is
/// supported for schema authoring, but all packing-facing consumers see the
/// flattened field list (see [`StructDef::flat_fields`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Codec {
    /// Unsigned integer, `n` bits, range `[0, 2^n - 1]`
    UInt(u8),
    /// Signed two's-complement integer, `n` bits, range `[-2^(n-1), 2^(n-1) - 1]`
    SInt(u8),
    /// Single bit, `0` or `1`
    Bool,
    /// `n`-bit unsigned value restricted to a closed set of named constants
    Enum(EnumDef),
    /// Ordered sequence of named fields
    Struct(StructDef),
}

impl Codec {
    /// Unsigned integer field, `bits` wide
    pub fn uint(bits: u8) -> Self {
        Codec::UInt(bits)
    }

    /// Signed integer field, `bits` wide (two's complement)
    pub fn sint(bits: u8) -> Self {
        Codec::SInt(bits)
    }

    /// Single-bit boolean field
    pub fn boolean() -> Self {
        Codec::Bool
    }

    /// Total size of this node in bits
    pub fn bit_size(&self) -> u32 {
        match self {
            Codec::UInt(n) | Codec::SInt(n) => u32::from(*n),
            Codec::Bool => 1,
            Codec::Enum(e) => u32::from(e.bits),
            Codec::Struct(s) => s.bit_size(),
        }
    }
}

/// Closed set of named integer constants packed as an unsigned field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    /// Enum name (used in diagnostics and emitted layout comments)
    pub name: String,
    /// Field width in bits
    pub bits: u8,
    /// `(variant name, value)` pairs in declaration order
    variants: Vec<(String, i64)>,
}

impl EnumDef {
    /// Build an enum codec, validating width and the variant mapping
    pub fn new(
        name: impl Into<String>,
        bits: u8,
        variants: &[(&str, i64)],
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        if bits == 0 || bits > MAX_FIELD_BITS {
            return Err(SchemaError::BadWidth(name, bits));
        }

        let limit = 1i64 << bits;
        let mut seen = Vec::with_capacity(variants.len());
        for (variant, value) in variants {
            if variants.iter().filter(|(v, _)| v == variant).count() > 1 {
                return Err(SchemaError::DuplicateEnumName(variant.to_string(), name));
            }
            if seen.contains(value) {
                return Err(SchemaError::DuplicateEnumValue(*value, name));
            }
            if *value < 0 || *value >= limit {
                return Err(SchemaError::EnumValueTooWide(
                    variant.to_string(),
                    *value,
                    bits,
                    name,
                ));
            }
            seen.push(*value);
        }

        Ok(Self {
            name,
            bits,
            variants: variants
                .iter()
                .map(|(v, x)| (v.to_string(), *x))
                .collect(),
        })
    }

    /// Variants in declaration order
    pub fn variants(&self) -> &[(String, i64)] {
        &self.variants
    }

    /// Check whether `value` is one of the mapped constants
    pub fn contains_value(&self, value: i64) -> bool {
        self.variants.iter().any(|(_, v)| *v == value)
    }

    /// Name of the variant mapped to `value`
    pub fn value_name(&self, value: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    /// Value mapped to the variant named `name`
    pub fn name_value(&self, name: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

// =============================================================================
// Structures
// =============================================================================

/// One named field inside a struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub codec: Codec,
}

/// Ordered, validated field list
///
/// Field order is the only source of truth for the byte layout: the packer
/// writes fields in this order and the emitter computes the same running bit
/// cursor from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDef {
    /// Struct name (used in diagnostics and emitted decoder names)
    pub name: String,
    fields: Vec<Field>,
}

impl StructDef {
    /// Build a struct codec from ordered `(name, codec)` pairs
    pub fn new(
        name: impl Into<String>,
        fields: Vec<(&str, Codec)>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        if fields.is_empty() {
            return Err(SchemaError::EmptyStruct(name));
        }

        for (field, codec) in &fields {
            match codec {
                Codec::UInt(n) if *n == 0 || *n > MAX_FIELD_BITS => {
                    return Err(SchemaError::BadWidth(field.to_string(), *n));
                }
                // A 1-bit two's-complement field can only hold {-1, 0};
                // reject it as an authoring mistake.
                Codec::SInt(n) if *n < 2 || *n > MAX_FIELD_BITS => {
                    return Err(SchemaError::BadWidth(field.to_string(), *n));
                }
                _ => {}
            }
        }

        let def = Self {
            name,
            fields: fields
                .into_iter()
                .map(|(n, codec)| Field {
                    name: n.to_string(),
                    codec,
                })
                .collect(),
        };

        // Names must be unique after flattening nested structs, since that
        // is the namespace the packer and emitter operate in.
        let flat = def.flat_fields();
        for (i, (name, _)) in flat.iter().enumerate() {
            if flat[i + 1..].iter().any(|(n, _)| n == name) {
                return Err(SchemaError::DuplicateField(name.clone(), def.name));
            }
        }

        Ok(def)
    }

    /// Declared fields in order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Total serialized size in bits (sum of all fields, no padding)
    pub fn bit_size(&self) -> u32 {
        self.fields.iter().map(|f| f.codec.bit_size()).sum()
    }

    /// Serialized size in bytes: `ceil(bit_size / 8)`
    pub fn byte_size(&self) -> u32 {
        self.bit_size().div_ceil(8)
    }

    /// Fields with nested structs flattened, in packing order
    ///
    /// A nested field `env` containing `attack` appears as `env_attack`.
    /// Every consumer that walks fields (packer, emitter, normalizer,
    /// metadata) walks this list, so all of them agree on order and offsets
    /// by construction.
    pub fn flat_fields(&self) -> Vec<(String, Codec)> {
        let mut out = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match &field.codec {
                Codec::Struct(inner) => {
                    for (name, codec) in inner.flat_fields() {
                        out.push((format!("{}_{}", field.name, name), codec));
                    }
                }
                codec => out.push((field.name.clone(), codec.clone())),
            }
        }
        out
    }

    /// Derive the metadata table for every (flattened) field
    pub fn field_meta(&self) -> Vec<FieldMeta> {
        self.flat_fields()
            .iter()
            .map(|(name, codec)| FieldMeta::derive(name, codec))
            .collect()
    }
}

// =============================================================================
// Field metadata and normalization
// =============================================================================

/// Derived per-field range metadata
///
/// Never hand-written: derived from the codec node so the normalizer can
/// never drift from the schema. Adding a field to a schema requires zero
/// additional normalization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    pub name: String,
    pub bit_size: u8,
    pub min: i64,
    pub max: i64,
    pub signed: bool,
    /// Enum fields are not clamped by [`normalize`]; the packer validates
    /// them against the mapping instead.
    pub is_enum: bool,
}

impl FieldMeta {
    fn derive(name: &str, codec: &Codec) -> Self {
        let name = name.to_string();
        match codec {
            Codec::UInt(n) => Self {
                name,
                bit_size: *n,
                min: 0,
                max: (1i64 << n) - 1,
                signed: false,
                is_enum: false,
            },
            Codec::SInt(n) => Self {
                name,
                bit_size: *n,
                min: -(1i64 << (n - 1)),
                max: (1i64 << (n - 1)) - 1,
                signed: true,
                is_enum: false,
            },
            Codec::Bool => Self {
                name,
                bit_size: 1,
                min: 0,
                max: 1,
                signed: false,
                is_enum: false,
            },
            Codec::Enum(e) => Self {
                name,
                bit_size: e.bits,
                min: 0,
                max: (1i64 << e.bits) - 1,
                signed: false,
                is_enum: true,
            },
            // flat_fields() never yields a struct node
            Codec::Struct(s) => unreachable!("nested struct '{}' not flattened", s.name),
        }
    }
}

/// Clamp every provided value into its field's legal range
///
/// Integer and boolean fields are clamped to `[min, max]`; enum fields pass
/// through unchanged and are validated by the packer against the enum's
/// value set. Fields absent from the record stay absent (the packer reports
/// them as missing).
pub fn normalize(def: &StructDef, record: &crate::packing::Record) -> crate::packing::Record {
    let mut out = crate::packing::Record::new();
    for meta in def.field_meta() {
        if let Some(value) = record.get(&meta.name) {
            let value = if meta.is_enum {
                value
            } else {
                value.clamp(meta.min, meta.max)
            };
            out.set(&meta.name, value);
        }
    }
    out
}
