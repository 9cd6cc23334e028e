//! End-to-end tests for the trusted LDAP bridge live under `tests/`.
