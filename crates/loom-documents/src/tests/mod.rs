//! Tests for the document store.
