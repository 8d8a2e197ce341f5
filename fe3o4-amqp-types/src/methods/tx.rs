//! `tx` class methods
//!
//! Every method in this class is argument-free, so the variants live
//! directly on [`Method`](super::Method) with nothing to encode or decode
//! beyond the `(class-id, method-id)` pair.
