// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// legible-security — Credentials, token lifecycle, and content fingerprinting.
//
// The device token is long-lived and obtained once through registration; the
// user token is derived from it and renewed shortly before it expires. Expiry
// is judged from an unverified read of the token claims, which is a scheduling
// hint and never an authentication check.

pub mod auth;
pub mod claims;
pub mod credentials;
pub mod integrity;
pub mod monitor;

pub use auth::{AuthTokenManager, TokenExchanger};
pub use claims::{TokenInfo, TokenKind, TokenStatus, mask_token, read_claims_unverified};
pub use credentials::{CredentialStore, Credentials};
pub use integrity::{hash_bytes, hash_file, verify_file};
pub use monitor::{TokenMonitor, TokenStatistics};
