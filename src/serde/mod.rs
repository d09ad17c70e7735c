//! Helpers for serialization and deserialization.

pub mod string_or_number;
