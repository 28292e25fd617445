//! The type model: primitive, user, array, pointer, and function types,
//! structural equality, and implicit integer promotion.
//!
//! Ported from `original_source/src/type.h` + `type.c`. Per spec.md §9's
//! "tagged-variant dispatch" design note, this is a plain Rust enum
//! carrying exactly the fields each shape needs, rather than a C-style
//! discriminated union.

use std::fmt;

use crate::symbol::UserId;

/// The target pointer size and the maximum scalar alignment, matching
/// `PTR_SIZE`/`MAX_ALIGNMENT` in `type.h`.
pub const PTR_SIZE: u32 = 4;
pub const MAX_ALIGNMENT: u32 = 4;

/// One of the eight primitive scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Void,
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
}

impl Primitive {
    /// Size in bytes, or `0` for `void` (which is incomplete and has no
    /// meaningful size).
    #[must_use]
    pub fn size(self) -> u32 {
        match self {
            Primitive::Void => 0,
            Primitive::Bool | Primitive::U8 | Primitive::I8 => 1,
            Primitive::U16 | Primitive::I16 => 2,
            Primitive::U32 | Primitive::I32 => 4,
        }
    }

    #[must_use]
    pub fn alignment(self) -> u32 {
        self.size().max(1)
    }

    /// Whether this primitive is a signed integer type. Panics on `void`
    /// and `bool`, matching `is_signed`'s `assert(0)` on those inputs:
    /// callers must only invoke this on `is_int` types.
    #[must_use]
    pub fn is_signed(self) -> bool {
        match self {
            Primitive::U8 | Primitive::U16 | Primitive::U32 => false,
            Primitive::I8 | Primitive::I16 | Primitive::I32 => true,
            Primitive::Void | Primitive::Bool => {
                unreachable!("is_signed called on a non-integer primitive")
            }
        }
    }
}

/// The calling convention a function type is lowered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallConv {
    Cdecl,
    Stdcall,
    Thiscall,
}

impl Default for CallConv {
    fn default() -> Self {
        CallConv::Cdecl
    }
}

/// The type of a function designator (never a storage type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncSig {
    pub return_type: Box<Type>,
    pub args: Vec<Type>,
    pub variadic: bool,
    pub call_conv: CallConv,
}

/// The shape of a type, before size/alignment are folded in.
#[derive(Debug, Clone)]
pub enum TypeKind {
    Primitive(Primitive),
    /// A named composite type; compared nominally by `UserId`.
    User(UserId),
    /// `size == 0` denotes an unsized array (pointer-to-element with
    /// auto-decay semantics), per spec.md's `is_array_ptr`.
    Array { elem: Box<Type>, size: u32 },
    Pointer { inner: Box<Type>, level: u32 },
    Function(FuncSig),
}

/// An immutable type descriptor: shape plus the derived size/alignment/
/// completeness every shape carries in the original `Type` struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    pub kind: TypeKind,
    pub size: u32,
    pub alignment: u32,
    /// `void` is the only type with no size; everything else (including
    /// unsized arrays and pointers, which are fixed at `PTR_SIZE`) is
    /// complete.
    pub incomplete: bool,
}

impl Type {
    #[must_use]
    pub fn primitive(p: Primitive) -> Type {
        Type { incomplete: matches!(p, Primitive::Void), size: p.size(), alignment: p.alignment(), kind: TypeKind::Primitive(p) }
    }

    #[must_use]
    pub fn pointer(inner: Type, level: u32) -> Type {
        debug_assert!(level >= 1);
        Type { kind: TypeKind::Pointer { inner: Box::new(inner), level }, size: PTR_SIZE, alignment: PTR_SIZE, incomplete: false }
    }

    #[must_use]
    pub fn array(elem: Type, size: u32) -> Type {
        if size == 0 {
            Type { size: PTR_SIZE, alignment: PTR_SIZE, incomplete: false, kind: TypeKind::Array { elem: Box::new(elem), size } }
        } else {
            let elem_size = elem.size;
            let alignment = elem.alignment;
            Type { size: elem_size * size, alignment, incomplete: false, kind: TypeKind::Array { elem: Box::new(elem), size } }
        }
    }

    #[must_use]
    pub fn user(id: UserId, size: u32, alignment: u32) -> Type {
        Type { kind: TypeKind::User(id), size, alignment, incomplete: false }
    }

    #[must_use]
    pub fn function(sig: FuncSig) -> Type {
        Type { kind: TypeKind::Function(sig), size: 0, alignment: 0, incomplete: true }
    }

    #[must_use]
    pub fn void() -> Type {
        Type::primitive(Primitive::Void)
    }

    /// `get_string_type`: the canonical unsized `[u8]`, used for string
    /// literals and decayed string-like parameters.
    #[must_use]
    pub fn string() -> Type {
        Type::array(Type::primitive(Primitive::U8), 0)
    }

    /// `get_void_ptr_type`: the canonical `void*`.
    #[must_use]
    pub fn void_ptr() -> Type {
        Type::pointer(Type::void(), 1)
    }

    #[must_use]
    pub fn is_bool(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(Primitive::Bool))
    }

    /// An integer primitive: not `void`, not `bool`.
    #[must_use]
    pub fn is_int(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(p) if !matches!(p, Primitive::Void | Primitive::Bool))
    }

    #[must_use]
    pub fn is_ptr(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer { .. })
    }

    /// An unsized array, semantically a pointer-to-element.
    #[must_use]
    pub fn is_array_ptr(&self) -> bool {
        matches!(&self.kind, TypeKind::Array { size: 0, .. })
    }

    #[must_use]
    pub fn is_ptr_like(&self) -> bool {
        self.is_ptr() || self.is_array_ptr()
    }

    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(Primitive::Void))
    }

    #[must_use]
    pub fn is_void_ptr(&self) -> bool {
        matches!(&self.kind, TypeKind::Pointer { inner, level: 1 } if inner.is_void())
    }

    /// The pointee/element type, for pointers and arrays (sized or not).
    #[must_use]
    pub fn inner(&self) -> Option<&Type> {
        match &self.kind {
            TypeKind::Pointer { inner, .. } | TypeKind::Array { elem: inner, .. } => Some(inner),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_primitive(&self) -> Option<Primitive> {
        match self.kind {
            TypeKind::Primitive(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_function(&self) -> Option<&FuncSig> {
        match &self.kind {
            TypeKind::Function(sig) => Some(sig),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_user(&self) -> Option<UserId> {
        match self.kind {
            TypeKind::User(id) => Some(id),
            _ => None,
        }
    }

    /// One level of pointer indirection wrapping `self` (or, if `self` is
    /// already a pointer, the same pointer one level deeper), matching
    /// `type_check_unaryop`'s handling of `&`.
    #[must_use]
    pub fn addr_of(&self) -> Type {
        match &self.kind {
            TypeKind::Pointer { inner, level } => Type::pointer((**inner).clone(), level + 1),
            _ => Type::pointer(self.clone(), 1),
        }
    }

    /// One level of pointer indirection removed, collapsing to the inner
    /// type at level 0 and to the array element for unsized arrays,
    /// matching `type_check_unaryop`'s handling of `*`.
    #[must_use]
    pub fn deref_once(&self) -> Type {
        match &self.kind {
            TypeKind::Pointer { inner, level } if *level > 1 => Type::pointer((**inner).clone(), level - 1),
            TypeKind::Pointer { inner, .. } => (**inner).clone(),
            TypeKind::Array { elem, .. } => (**elem).clone(),
            _ => unreachable!("deref_once called on a non-pointer-like type"),
        }
    }
}

/// Structural equality (`is_equal_type`): primitives by tag, user types
/// by nominal identity, arrays by size *and* element type, pointers by
/// level *and* inner type, functions by variadic flag + return type +
/// positional argument list.
impl PartialEq for TypeKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeKind::Primitive(a), TypeKind::Primitive(b)) => a == b,
            (TypeKind::User(a), TypeKind::User(b)) => a == b,
            (TypeKind::Array { elem: ea, size: sa }, TypeKind::Array { elem: eb, size: sb }) => sa == sb && ea == eb,
            (TypeKind::Pointer { inner: ia, level: la }, TypeKind::Pointer { inner: ib, level: lb }) => la == lb && ia == ib,
            (TypeKind::Function(a), TypeKind::Function(b)) => {
                a.variadic == b.variadic && a.return_type == b.return_type && a.args == b.args
            }
            _ => false,
        }
    }
}
impl Eq for TypeKind {}

/// Implicit integer promotion (`implicit_type_convert`): the exact case
/// table from the original, not a re-derivation, to avoid silently
/// changing corner-case behavior.
#[must_use]
pub fn implicit_promote(a: Primitive, b: Primitive) -> Primitive {
    use Primitive::{I16, I32, I8, U16, U32, U8};
    match a {
        U8 => match b {
            U8 | I8 => U8,
            U16 | I16 => U16,
            U32 | I32 => U32,
            _ => unreachable!("implicit_promote on a non-integer primitive"),
        },
        U16 => match b {
            U8 | U16 | I8 | I16 => U16,
            U32 | I32 => U32,
            _ => unreachable!("implicit_promote on a non-integer primitive"),
        },
        U32 => U32,
        I8 => b,
        I16 => match b {
            U8 | U16 => U16,
            U32 => U32,
            I8 | I16 => I16,
            I32 => I32,
            _ => unreachable!("implicit_promote on a non-integer primitive"),
        },
        I32 => match b {
            U8 | U16 | U32 => U32,
            I8 | I16 | I32 => I32,
            _ => unreachable!("implicit_promote on a non-integer primitive"),
        },
        _ => unreachable!("implicit_promote on a non-integer primitive"),
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Primitive::Void => "void",
            Primitive::Bool => "bool",
            Primitive::U8 => "u8",
            Primitive::I8 => "i8",
            Primitive::U16 => "u16",
            Primitive::I16 => "i16",
            Primitive::U32 => "u32",
            Primitive::I32 => "i32",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Primitive; 6] = [Primitive::U8, Primitive::I8, Primitive::U16, Primitive::I16, Primitive::U32, Primitive::I32];

    #[test]
    fn promotion_is_idempotent() {
        for a in ALL {
            assert_eq!(implicit_promote(a, a), a, "implicit(a, a) != a for {a:?}");
        }
    }

    #[test]
    fn promotion_is_commutative() {
        for a in ALL {
            for b in ALL {
                assert_eq!(implicit_promote(a, b), implicit_promote(b, a), "asymmetry at ({a:?}, {b:?})");
            }
        }
    }

    #[test]
    fn promotion_widens_to_unsigned_on_ties() {
        // u16 vs i16: equal width, one unsigned -> u16.
        assert_eq!(implicit_promote(Primitive::U16, Primitive::I16), Primitive::U16);
        // i32 vs u8: i32 is already wider -> i32.
        assert_eq!(implicit_promote(Primitive::I32, Primitive::U8), Primitive::I32);
    }

    #[test]
    fn pointer_and_unsized_array_are_word_sized() {
        assert_eq!(Type::void_ptr().size, PTR_SIZE);
        assert_eq!(Type::void_ptr().alignment, PTR_SIZE);
        assert_eq!(Type::string().size, PTR_SIZE);
    }

    #[test]
    fn void_is_incomplete() {
        assert!(Type::void().incomplete);
        assert!(!Type::void_ptr().incomplete);
    }

    #[test]
    fn array_equality_checks_size_and_element() {
        let a = Type::array(Type::primitive(Primitive::I32), 4);
        let b = Type::array(Type::primitive(Primitive::I32), 4);
        let c = Type::array(Type::primitive(Primitive::I32), 5);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn pointer_equality_checks_level_and_inner() {
        let p1 = Type::pointer(Type::primitive(Primitive::I32), 1);
        let p2 = Type::pointer(Type::primitive(Primitive::I32), 2);
        assert_ne!(p1, p2);
        assert_eq!(p1.addr_of(), p2);
    }

    #[test]
    fn deref_collapses_at_level_zero() {
        let p1 = Type::pointer(Type::primitive(Primitive::I32), 1);
        assert_eq!(p1.deref_once(), Type::primitive(Primitive::I32));
    }
}
