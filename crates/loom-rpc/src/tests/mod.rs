//! Tests for the connection and dispatch layers.

mod support;
