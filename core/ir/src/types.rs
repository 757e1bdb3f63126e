//! The type lattice.
//!
//! Types form a closed algebra over which the validator checks operator and
//! call compatibility. `Unknown` is the top element; `Optional(T)` is a
//! supertype of both `T` and `Null`; `Union` is the least upper bound of its
//! members. Numeric values are a single `Number` type at this level; backends
//! pick concrete representations.

use core::fmt;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

#[derive(Clone, PartialEq, Debug)]
pub enum Type {
    Number,
    String,
    Boolean,
    Null,
    Void,
    Array(Box<Type>),
    Object {
        fields: BTreeMap<String, Type>,
        open: bool,
    },
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
    },
    Optional(Box<Type>),
    Union(Vec<Type>),
    Unknown,
}

impl Type {
    #[must_use]
    pub fn array(element: Type) -> Self {
        Type::Array(Box::new(element))
    }

    #[must_use]
    pub fn optional(base: Type) -> Self {
        Type::Optional(Box::new(base))
    }

    #[must_use]
    pub fn function(params: Vec<Type>, ret: Type) -> Self {
        Type::Function {
            params,
            ret: Box::new(ret),
        }
    }

    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Type::Number)
    }

    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self, Type::String)
    }

    #[must_use]
    pub fn is_boolean(&self) -> bool {
        matches!(self, Type::Boolean)
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    /// Subtype relation of the lattice.
    ///
    /// Reflexive; `Unknown` is the top element. `Optional` admits its base
    /// and `Null`; a `Union` admits anything admitted by one of its members;
    /// arrays are covariant; functions are contravariant in parameters and
    /// covariant in the result; a closed object is a subtype of an open one
    /// with a subset of its fields.
    #[must_use]
    pub fn is_subtype_of(&self, other: &Type) -> bool {
        if self == other || matches!(other, Type::Unknown) {
            return true;
        }
        match (self, other) {
            (Type::Union(members), _) => members.iter().all(|m| m.is_subtype_of(other)),
            (_, Type::Optional(base)) => {
                matches!(self, Type::Null) || self.is_subtype_of(base)
            }
            (_, Type::Union(members)) => members.iter().any(|m| self.is_subtype_of(m)),
            (Type::Array(a), Type::Array(b)) => a.is_subtype_of(b),
            (
                Type::Function {
                    params: pa,
                    ret: ra,
                },
                Type::Function {
                    params: pb,
                    ret: rb,
                },
            ) => {
                pa.len() == pb.len()
                    && pb.iter().zip(pa).all(|(b, a)| b.is_subtype_of(a))
                    && ra.is_subtype_of(rb)
            }
            (
                Type::Object {
                    fields: fa,
                    open: false,
                },
                Type::Object {
                    fields: fb,
                    open: true,
                },
            ) => fb
                .iter()
                .all(|(name, ty)| fa.get(name).is_some_and(|t| t.is_subtype_of(ty))),
            _ => false,
        }
    }

    /// Two types are compatible when either is a subtype of the other.
    /// `Unknown` is compatible with everything.
    #[must_use]
    pub fn is_compatible_with(&self, other: &Type) -> bool {
        self.is_subtype_of(other) || other.is_subtype_of(self)
    }

    /// Least upper bound of two types.
    ///
    /// Equal types join to themselves, `Null` joins into `Optional`, and
    /// unrelated types join into a flattened, deduplicated `Union`.
    #[must_use]
    pub fn union_with(self, other: Type) -> Type {
        if self == other {
            return self;
        }
        if self.is_subtype_of(&other) {
            return other;
        }
        if other.is_subtype_of(&self) {
            return self;
        }
        match (self, other) {
            (Type::Null, t) | (t, Type::Null) => Type::optional(t),
            (a, b) => {
                let mut members = Vec::new();
                for t in [a, b] {
                    match t {
                        Type::Union(inner) => members.extend(inner),
                        t => members.push(t),
                    }
                }
                let mut unique: Vec<Type> = Vec::new();
                for t in members {
                    if !unique.contains(&t) {
                        unique.push(t);
                    }
                }
                Type::Union(unique)
            }
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Type::Number => write!(f, "number"),
            Type::String => write!(f, "string"),
            Type::Boolean => write!(f, "boolean"),
            Type::Null => write!(f, "null"),
            Type::Void => write!(f, "void"),
            Type::Array(element) => write!(f, "{element}[]"),
            Type::Object { fields, open } => {
                write!(f, "{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                if *open {
                    if !fields.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "..")?;
                }
                write!(f, "}}")
            }
            Type::Function { params, ret } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") => {ret}")
            }
            Type::Optional(base) => write!(f, "{base}?"),
            Type::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{m}")?;
                }
                Ok(())
            }
            Type::Unknown => write!(f, "unknown"),
        }
    }
}
