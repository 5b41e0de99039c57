//! Core XML parsing primitives
//!
//! This module contains the fundamental building blocks for XML parsing:
//! - Arena: append-only storage whose items never move
//! - StringView: zero-copy slice of the input with search and numeric parsing
//! - Hash: seeded 32-bit hash behind the entity table
//! - Scanner: SIMD-accelerated delimiter detection using memchr
//! - Entities: entity table and reference resolution (Cow, zero-copy when possible)
//! - Attributes: attribute parsing and name splitting
//! - Encoding: BOM handling and UTF-16 rejection
//! - DTD: DOCTYPE and internal subset parsing

pub mod arena;
pub mod attributes;
pub mod dtd;
pub mod encoding;
pub mod entities;
pub mod hash;
pub mod scanner;
pub mod view;
