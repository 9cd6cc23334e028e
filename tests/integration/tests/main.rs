//! End-to-End Integration Tests
//!
//! These tests drive the SSO authenticator through `http` requests, with
//! an in-memory directory and profile store standing in for the platform.

mod common;
mod group_sync;
mod ldap_client;
